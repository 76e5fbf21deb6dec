//! Quality levels, the derived per-frame profile, and load samples.
//!
//! Every axis has ordered levels, L0 being the cheapest. The adaptive
//! controller moves levels; this module only maps levels to concrete
//! parameters and keeps them inside their documented bounds.

use serde::{Deserialize, Serialize};

/// Particle keep-ratio per particle level (L0..L3).
pub const PARTICLE_KEEP_RATIOS: [f32; 4] = [0.25, 0.5, 0.75, 1.0];

/// LOD bias per detail level (L0..L2). Zero means native detail.
pub const DETAIL_LOD_BIAS: [f32; 3] = [2.0, 1.0, 0.0];

/// Entity cull distance per detail level (L0..L2), in view-depth units.
pub const DETAIL_CULL_DISTANCE: [f32; 3] = [1500.0, 3000.0, f32::INFINITY];

/// Shadow rendering quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowQuality {
    /// Pre-baked blob shadows.
    Baked = 0,
    /// Dynamic shadows.
    #[default]
    Dynamic = 1,
}

/// Fog layering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FogLayering {
    /// One fog layer.
    Single = 0,
    /// Layered fog.
    #[default]
    Multi = 1,
}

/// One adaptive axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityAxis {
    /// Particle keep-ratio.
    Particles,
    /// Shadow quality.
    Shadows,
    /// Fog layering.
    Fog,
    /// LOD bias and entity cull distance.
    Detail,
}

impl QualityAxis {
    /// All axes, in controller evaluation order.
    pub const ALL: [Self; 4] = [Self::Particles, Self::Shadows, Self::Fog, Self::Detail];

    /// Highest (best) level on this axis.
    #[must_use]
    pub const fn max_level(self) -> u8 {
        match self {
            Self::Particles => (PARTICLE_KEEP_RATIOS.len() - 1) as u8,
            Self::Shadows | Self::Fog => 1,
            Self::Detail => (DETAIL_LOD_BIAS.len() - 1) as u8,
        }
    }
}

/// Level per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityLevels {
    /// Particle level, 0..=3.
    pub particles: u8,
    /// Shadow quality.
    pub shadows: ShadowQuality,
    /// Fog layering.
    pub fog: FogLayering,
    /// Detail level, 0..=2.
    pub detail: u8,
}

impl QualityLevels {
    /// Best quality on every axis.
    pub const BEST: Self = Self {
        particles: QualityAxis::Particles.max_level(),
        shadows: ShadowQuality::Dynamic,
        fog: FogLayering::Multi,
        detail: QualityAxis::Detail.max_level(),
    };

    /// Cheapest quality on every axis.
    pub const WORST: Self = Self {
        particles: 0,
        shadows: ShadowQuality::Baked,
        fog: FogLayering::Single,
        detail: 0,
    };

    /// Level of one axis as a number.
    #[must_use]
    pub const fn level(&self, axis: QualityAxis) -> u8 {
        match axis {
            QualityAxis::Particles => self.particles,
            QualityAxis::Shadows => self.shadows as u8,
            QualityAxis::Fog => self.fog as u8,
            QualityAxis::Detail => self.detail,
        }
    }

    /// Sets one axis, clamping to its range.
    pub fn set_level(&mut self, axis: QualityAxis, level: u8) {
        let level = level.min(axis.max_level());
        match axis {
            QualityAxis::Particles => self.particles = level,
            QualityAxis::Shadows => {
                self.shadows = if level == 0 { ShadowQuality::Baked } else { ShadowQuality::Dynamic };
            }
            QualityAxis::Fog => {
                self.fog = if level == 0 { FogLayering::Single } else { FogLayering::Multi };
            }
            QualityAxis::Detail => self.detail = level,
        }
    }

    /// Returns a copy with every axis inside its range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.particles = self.particles.min(QualityAxis::Particles.max_level());
        self.detail = self.detail.min(QualityAxis::Detail.max_level());
        self
    }
}

impl Default for QualityLevels {
    fn default() -> Self {
        Self::BEST
    }
}

/// Parameters that change what the culling stage keeps.
///
/// Display lists are compiled through culling, so a change here invalidates
/// every compiled list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingKey {
    /// Particle keep-ratio.
    pub particle_keep_ratio: f32,
    /// Entity cull distance.
    pub cull_distance: f32,
}

/// Immutable per-frame quality snapshot.
///
/// Built once per frame and shared as `Arc<QualityProfile>`; never mutated
/// while referenced.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityProfile {
    /// Levels this profile was derived from.
    pub levels: QualityLevels,
    /// Fraction of particles kept, in [0, 1].
    pub particle_keep_ratio: f32,
    /// Entities beyond this view depth are culled. Positive, may be infinite.
    pub cull_distance: f32,
    /// Shadow quality.
    pub shadows: ShadowQuality,
    /// Fog layering.
    pub fog: FogLayering,
    /// LOD bias, >= 0.
    pub lod_bias: f32,
    /// Incremented whenever the levels change.
    pub generation: u64,
}

impl QualityProfile {
    /// Derives a profile from levels.
    #[must_use]
    pub fn from_levels(levels: QualityLevels, generation: u64) -> Self {
        let levels = levels.clamped();
        let detail = usize::from(levels.detail);
        Self {
            levels,
            particle_keep_ratio: PARTICLE_KEEP_RATIOS[usize::from(levels.particles)].clamp(0.0, 1.0),
            cull_distance: DETAIL_CULL_DISTANCE[detail],
            shadows: levels.shadows,
            fog: levels.fog,
            lod_bias: DETAIL_LOD_BIAS[detail].max(0.0),
            generation,
        }
    }

    /// Best-quality profile, generation zero.
    #[must_use]
    pub fn best() -> Self {
        Self::from_levels(QualityLevels::BEST, 0)
    }

    /// True when no lossy filter is active.
    #[must_use]
    pub fn is_lossless(&self) -> bool {
        self.particle_keep_ratio >= 1.0 && self.cull_distance.is_infinite()
    }

    /// The part of the profile that affects culling output.
    #[must_use]
    pub fn culling_key(&self) -> CullingKey {
        CullingKey {
            particle_keep_ratio: self.particle_keep_ratio,
            cull_distance: self.cull_distance,
        }
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::best()
    }
}

/// One frame of load measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSample {
    /// Active entities reported by the game.
    pub entity_count: u32,
    /// Active particles reported by the game.
    pub particle_count: u32,
    /// Frame time in milliseconds.
    pub frame_time_ms: f32,
    /// Covered area over viewport area.
    pub overdraw_estimate: f32,
}

impl LoadSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(entity_count: u32, particle_count: u32, frame_time_ms: f32, overdraw_estimate: f32) -> Self {
        Self { entity_count, particle_count, frame_time_ms, overdraw_estimate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_profile_is_lossless() {
        let profile = QualityProfile::best();
        assert!(profile.is_lossless());
        assert_eq!(profile.particle_keep_ratio, 1.0);
        assert_eq!(profile.lod_bias, 0.0);
    }

    #[test]
    fn test_worst_profile_bounds() {
        let profile = QualityProfile::from_levels(QualityLevels::WORST, 3);
        assert_eq!(profile.particle_keep_ratio, 0.25);
        assert_eq!(profile.shadows, ShadowQuality::Baked);
        assert!(profile.cull_distance > 0.0);
        assert!(!profile.is_lossless());
        assert_eq!(profile.generation, 3);
    }

    #[test]
    fn test_set_level_clamps() {
        let mut levels = QualityLevels::BEST;
        levels.set_level(QualityAxis::Particles, 9);
        assert_eq!(levels.particles, 3);
        levels.set_level(QualityAxis::Shadows, 0);
        assert_eq!(levels.shadows, ShadowQuality::Baked);
        assert_eq!(levels.level(QualityAxis::Shadows), 0);
    }

    #[test]
    fn test_out_of_range_levels_are_clamped_in_profile() {
        let levels = QualityLevels { particles: 200, detail: 9, ..QualityLevels::BEST };
        let profile = QualityProfile::from_levels(levels, 0);
        assert_eq!(profile.levels.particles, 3);
        assert_eq!(profile.levels.detail, 2);
    }
}
