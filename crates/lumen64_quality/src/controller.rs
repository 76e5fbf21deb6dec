//! # Adaptive Quality Controller
//!
//! One hysteresis state machine per axis:
//!
//! ```text
//!            pressure > drop                pressure > drop
//!   ┌────┐ <─────────────── ┌────┐ <─────────────── ┌────┐
//!   │ L0 │                  │ L1 │                  │ Ln │  (start)
//!   └────┘ ───────────────> └────┘ ───────────────> └────┘
//!          raise_window calm frames (pressure < raise)
//! ```
//!
//! Each axis reads the signal that drives its cost:
//!
//! | Axis      | Pressure                                       |
//! |-----------|------------------------------------------------|
//! | Particles | max(frame / target, particles / budget)        |
//! | Shadows   | max(frame / target, entities / budget)         |
//! | Fog       | max(frame / target, overdraw / budget)         |
//! | Detail    | max(frame / target, entities / budget)         |

use std::sync::Arc;

use lumen64_core::{
    FrameTelemetry, LoadSample, QualityAxis, QualityConfig, QualityLevels, QualityProfile,
    SceneId, SceneOverrideConfig,
};
use tracing::{debug, info};

use crate::history::LoadHistory;
use crate::overrides::SceneOverrides;

/// What happened to one axis on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Level unchanged.
    Hold,
    /// Dropped one level.
    Dropped {
        /// Level before.
        from: u8,
        /// Level after.
        to: u8,
    },
    /// Raised one level.
    Raised {
        /// Level before.
        from: u8,
        /// Level after.
        to: u8,
    },
}

/// Hysteresis state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisState {
    /// Current level.
    pub level: u8,
    /// Highest level.
    pub max_level: u8,
    /// Consecutive calm frames since the last transition.
    pub calm_frames: u32,
}

impl AxisState {
    /// Starts at the best level.
    #[must_use]
    pub const fn new(max_level: u8) -> Self {
        Self { level: max_level, max_level, calm_frames: 0 }
    }

    /// Applies one frame of pressure.
    pub fn step(&mut self, pressure: f32, config: &QualityConfig) -> Transition {
        if pressure > config.drop_pressure {
            self.calm_frames = 0;
            if self.level > 0 {
                let from = self.level;
                self.level -= 1;
                return Transition::Dropped { from, to: self.level };
            }
            return Transition::Hold;
        }

        if pressure < config.raise_pressure {
            if self.level == self.max_level {
                self.calm_frames = 0;
                return Transition::Hold;
            }
            self.calm_frames += 1;
            if self.calm_frames >= config.raise_window {
                self.calm_frames = 0;
                let from = self.level;
                self.level += 1;
                return Transition::Raised { from, to: self.level };
            }
            return Transition::Hold;
        }

        // Between the thresholds: not calm enough to count toward a raise.
        self.calm_frames = 0;
        Transition::Hold
    }

    /// Moves one level toward `target` and restarts the calm count.
    pub fn step_toward(&mut self, target: u8) -> Transition {
        self.calm_frames = 0;
        let target = target.min(self.max_level);
        let from = self.level;
        if from > target {
            self.level -= 1;
            Transition::Dropped { from, to: self.level }
        } else if from < target {
            self.level += 1;
            Transition::Raised { from, to: self.level }
        } else {
            Transition::Hold
        }
    }
}

/// Adaptive controller. Lives on the graphics thread.
#[derive(Debug)]
pub struct AdaptiveController {
    config: QualityConfig,
    axes: [AxisState; 4],
    history: LoadHistory,
    overrides: SceneOverrides,
    active_override: Option<SceneId>,
    profile: Arc<QualityProfile>,
    generation: u64,
}

impl AdaptiveController {
    /// Creates a controller at best quality.
    #[must_use]
    pub fn new(config: QualityConfig, overrides: &[SceneOverrideConfig]) -> Self {
        let history = LoadHistory::new(config.history_len);
        Self {
            config,
            axes: QualityAxis::ALL.map(|axis| AxisState::new(axis.max_level())),
            history,
            overrides: SceneOverrides::from_config(overrides),
            active_override: None,
            profile: Arc::new(QualityProfile::best()),
            generation: 0,
        }
    }

    /// Current levels.
    #[must_use]
    pub fn levels(&self) -> QualityLevels {
        let mut levels = QualityLevels::BEST;
        for (axis, state) in QualityAxis::ALL.iter().zip(&self.axes) {
            levels.set_level(*axis, state.level);
        }
        levels
    }

    /// Current profile.
    #[must_use]
    pub fn profile(&self) -> Arc<QualityProfile> {
        Arc::clone(&self.profile)
    }

    /// State of one axis.
    #[must_use]
    pub fn axis(&self, axis: QualityAxis) -> AxisState {
        self.axes[axis_index(axis)]
    }

    /// Load history.
    #[must_use]
    pub const fn history(&self) -> &LoadHistory {
        &self.history
    }

    /// Scene whose override is in force, if any.
    #[must_use]
    pub const fn active_override(&self) -> Option<&SceneId> {
        self.active_override.as_ref()
    }

    /// Pressure of one axis for a sample.
    #[must_use]
    pub fn pressure(&self, axis: QualityAxis, sample: &LoadSample) -> f32 {
        let c = &self.config;
        let frame = sample.frame_time_ms / c.target_frame_ms;
        let signal = match axis {
            QualityAxis::Particles => sample.particle_count as f32 / c.particle_budget as f32,
            QualityAxis::Shadows | QualityAxis::Detail => {
                sample.entity_count as f32 / c.entity_budget as f32
            }
            QualityAxis::Fog => sample.overdraw_estimate / c.overdraw_budget,
        };
        // A NaN sample counts as no pressure.
        let pressure = frame.max(signal);
        if pressure.is_nan() {
            0.0
        } else {
            pressure
        }
    }

    /// Feeds one frame and returns the profile for the next frame.
    ///
    /// While `scene` has an override each axis walks one level per frame
    /// toward the forced level, regardless of load. Once the scene changes,
    /// the axes continue from where they are under the normal rules.
    pub fn observe(&mut self, sample: LoadSample, scene: Option<&SceneId>) -> Arc<QualityProfile> {
        self.history.push(sample);
        let before = self.levels();

        if let Some(forced) = self.overrides.resolve(scene) {
            if self.active_override.as_ref() != scene {
                info!(scene = ?scene, ?forced, "scene quality override in force");
                self.active_override = scene.cloned();
            }
            for (axis, state) in QualityAxis::ALL.iter().zip(self.axes.iter_mut()) {
                if let Transition::Dropped { from, to } | Transition::Raised { from, to } =
                    state.step_toward(forced.level(*axis))
                {
                    debug!(?axis, from, to, "quality moved toward scene override");
                }
            }
        } else {
            if let Some(ended) = self.active_override.take() {
                info!(scene = %ended, "scene quality override ended");
            }
            for axis in QualityAxis::ALL {
                let pressure = self.pressure(axis, &sample);
                let transition = self.axes[axis_index(axis)].step(pressure, &self.config);
                match transition {
                    Transition::Hold => {}
                    Transition::Dropped { from, to } => {
                        debug!(?axis, from, to, pressure, "quality dropped");
                    }
                    Transition::Raised { from, to } => {
                        debug!(?axis, from, to, pressure, "quality raised");
                    }
                }
            }
        }

        let after = self.levels();
        if after != before {
            self.generation += 1;
            self.profile = Arc::new(QualityProfile::from_levels(after, self.generation));
        }
        self.profile()
    }

    /// Copies frame-time statistics and levels into a telemetry record.
    pub fn fill_telemetry(&self, telemetry: &mut FrameTelemetry) {
        let stats = self.history.frame_time_stats();
        telemetry.frame_time_min_ms = stats.min_ms;
        telemetry.frame_time_avg_ms = stats.avg_ms;
        telemetry.frame_time_max_ms = stats.max_ms;
        telemetry.quality = self.levels();
    }
}

const fn axis_index(axis: QualityAxis) -> usize {
    match axis {
        QualityAxis::Particles => 0,
        QualityAxis::Shadows => 1,
        QualityAxis::Fog => 2,
        QualityAxis::Detail => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen64_core::{FogLayering, ShadowQuality};

    fn controller() -> AdaptiveController {
        AdaptiveController::new(QualityConfig::default(), &[])
    }

    fn heavy() -> LoadSample {
        LoadSample::new(35, 150, 30.0, 1.0)
    }

    fn light() -> LoadSample {
        LoadSample::new(10, 20, 10.0, 1.0)
    }

    #[test]
    fn test_starts_at_best() {
        let controller = controller();
        assert_eq!(controller.levels(), QualityLevels::BEST);
        assert!(controller.profile().is_lossless());
    }

    #[test]
    fn test_single_bad_frame_drops_one_level() {
        let mut controller = controller();
        let profile = controller.observe(heavy(), None);
        assert_eq!(profile.levels.particles, 2);
        assert_eq!(profile.shadows, ShadowQuality::Baked);
        assert_eq!(profile.fog, FogLayering::Single);
        assert_eq!(profile.levels.detail, 1);
        assert_eq!(profile.generation, 1);
    }

    #[test]
    fn test_raise_waits_for_full_window() {
        let mut controller = controller();
        controller.observe(heavy(), None);
        for _ in 0..19 {
            controller.observe(light(), None);
        }
        assert_eq!(controller.levels().particles, 2);
        controller.observe(light(), None);
        assert_eq!(controller.levels().particles, 3);
    }

    #[test]
    fn test_middle_band_resets_calm_count() {
        let mut controller = controller();
        controller.observe(heavy(), None);
        for _ in 0..15 {
            controller.observe(light(), None);
        }
        // 16.7ms is pressure 1.0: neither calm nor overloaded.
        controller.observe(LoadSample::new(10, 20, 16.7, 1.0), None);
        for _ in 0..19 {
            controller.observe(light(), None);
        }
        assert_eq!(controller.levels().particles, 2);
        controller.observe(light(), None);
        assert_eq!(controller.levels().particles, 3);
    }

    #[test]
    fn test_axis_specific_signal() {
        let mut controller = controller();
        // Fast frame, particle budget blown: only particles drop.
        controller.observe(LoadSample::new(0, 500, 5.0, 0.0), None);
        let levels = controller.levels();
        assert_eq!(levels.particles, 2);
        assert_eq!(levels.shadows, ShadowQuality::Dynamic);
        assert_eq!(levels.detail, 2);
    }

    #[test]
    fn test_nan_frame_time_is_ignored() {
        let mut controller = controller();
        controller.observe(LoadSample::new(0, 0, f32::NAN, 0.0), None);
        assert_eq!(controller.levels(), QualityLevels::BEST);
    }

    #[test]
    fn test_scene_override_forces_and_releases() {
        let overrides = [SceneOverrideConfig {
            scene: "boss".into(),
            particles: Some(0),
            shadows: None,
            fog: None,
            detail: None,
        }];
        let mut controller = AdaptiveController::new(QualityConfig::default(), &overrides);
        let boss = SceneId::new("boss");

        // Forced even though load is light, one level per frame.
        let profile = controller.observe(light(), Some(&boss));
        assert_eq!(profile.levels.particles, 2);
        assert_eq!(controller.active_override(), Some(&boss));
        assert_eq!(controller.observe(light(), Some(&boss)).levels.particles, 1);

        // Heavy load cannot push a forced axis anywhere else.
        let profile = controller.observe(heavy(), Some(&boss));
        assert_eq!(profile.levels.particles, 0);
        assert_eq!(profile.shadows, ShadowQuality::Dynamic);
        let profile = controller.observe(heavy(), Some(&boss));
        assert_eq!(profile.levels.particles, 0);
        assert_eq!(profile.shadows, ShadowQuality::Dynamic);

        // After the scene ends, the axis climbs from the forced level.
        let field = SceneId::new("field");
        for _ in 0..20 {
            controller.observe(light(), Some(&field));
        }
        assert!(controller.active_override().is_none());
        assert_eq!(controller.levels().particles, 1);
    }

    #[test]
    fn test_scene_override_never_skips_a_level() {
        let overrides = [SceneOverrideConfig {
            scene: "cutscene".into(),
            particles: Some(0),
            shadows: Some(ShadowQuality::Baked),
            fog: None,
            detail: None,
        }];
        let mut controller = AdaptiveController::new(QualityConfig::default(), &overrides);
        let cutscene = SceneId::new("cutscene");

        let mut previous = controller.levels();
        let mut generations = Vec::new();
        for _ in 0..6 {
            let profile = controller.observe(light(), Some(&cutscene));
            let levels = profile.levels;
            assert!(previous.particles - levels.particles <= 1);
            assert!(previous.shadows as u8 - levels.shadows as u8 <= 1);
            previous = levels;
            generations.push(profile.generation);
        }
        assert_eq!(previous.particles, 0);
        assert_eq!(previous.shadows as u8, 0);
        // Three particle steps, shadows moving alongside.
        assert_eq!(generations, vec![1, 2, 3, 3, 3, 3]);
    }

    #[test]
    fn test_generation_only_moves_on_change() {
        let mut controller = controller();
        let a = controller.observe(light(), None);
        let b = controller.observe(light(), None);
        assert_eq!(a.generation, 0);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_fill_telemetry() {
        let mut controller = controller();
        controller.observe(LoadSample::new(0, 0, 10.0, 0.0), None);
        controller.observe(LoadSample::new(0, 0, 20.0, 0.0), None);
        let mut telemetry = FrameTelemetry::default();
        controller.fill_telemetry(&mut telemetry);
        assert_eq!(telemetry.frame_time_min_ms, 10.0);
        assert_eq!(telemetry.frame_time_avg_ms, 15.0);
        assert_eq!(telemetry.frame_time_max_ms, 20.0);
    }
}
