//! Primitive culling.
//!
//! Tests run cheapest and safest first. The first three are exact: they
//! only discard what cannot produce a pixel. The last two are the lossy
//! quality filters and are inert at best quality.
//!
//! ```text
//! (a) |signed area| <= epsilon          -> Degenerate
//! (b) bounds outside scissor + margin   -> OutsideScissor
//! (c) facing rejected by cull mode      -> BackFacing
//! (d) entity beyond cull distance       -> Distance
//! (e) particle not on the keep stride   -> ParticleDecimated
//! ```
//!
//! Every tolerance widens the keep region. A false discard is a missing
//! triangle; a false keep costs only fillrate.

use std::sync::Arc;

use lumen64_core::{
    CullMode, CullingConfig, Fingerprint, FingerprintBuilder, Primitive, PrimitiveKind,
    QualityProfile, Rect, StateSlot, StateValue, Winding,
};

/// Why a primitive was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullReason {
    /// Zero or near-zero area.
    Degenerate,
    /// Entirely outside the scissor rectangle.
    OutsideScissor,
    /// Facing rejected by the cull mode.
    BackFacing,
    /// Entity beyond the profile's cull distance.
    Distance,
    /// Particle dropped by decimation.
    ParticleDecimated,
}

/// Outcome of a culling test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullDecision {
    /// Submit the primitive.
    Keep,
    /// Drop it.
    Discard(CullReason),
}

impl CullDecision {
    /// True for [`CullDecision::Keep`].
    #[inline]
    #[must_use]
    pub const fn is_keep(self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Culling-relevant state, as last requested upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CullState {
    /// Active scissor. `None` means unclipped.
    pub scissor: Option<Rect>,
    /// Active cull mode.
    pub cull_mode: CullMode,
    /// Winding treated as front facing.
    pub front_face: Winding,
}

/// Culling counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Primitives tested.
    pub tested: u32,
    /// Discarded as degenerate.
    pub degenerate: u32,
    /// Discarded outside the scissor.
    pub outside_scissor: u32,
    /// Discarded by facing.
    pub back_facing: u32,
    /// Entities past the cull distance.
    pub entities_culled: u32,
    /// Particles dropped by decimation.
    pub particles_skipped: u32,
    /// Entity primitives seen.
    pub entities_total: u32,
    /// Particle primitives seen.
    pub particles_total: u32,
}

impl CullStats {
    /// Counts one decision.
    pub fn record(&mut self, kind: PrimitiveKind, decision: CullDecision) {
        self.tested += 1;
        match kind {
            PrimitiveKind::Entity => self.entities_total += 1,
            PrimitiveKind::Particle => self.particles_total += 1,
            PrimitiveKind::World => {}
        }
        if let CullDecision::Discard(reason) = decision {
            match reason {
                CullReason::Degenerate => self.degenerate += 1,
                CullReason::OutsideScissor => self.outside_scissor += 1,
                CullReason::BackFacing => self.back_facing += 1,
                CullReason::Distance => self.entities_culled += 1,
                CullReason::ParticleDecimated => self.particles_skipped += 1,
            }
        }
    }

    /// Total discarded for any reason.
    #[must_use]
    pub const fn discarded(&self) -> u32 {
        self.degenerate
            + self.outside_scissor
            + self.back_facing
            + self.entities_culled
            + self.particles_skipped
    }

    /// Adds another set of counters.
    pub fn merge(&mut self, other: &Self) {
        self.tested += other.tested;
        self.degenerate += other.degenerate;
        self.outside_scissor += other.outside_scissor;
        self.back_facing += other.back_facing;
        self.entities_culled += other.entities_culled;
        self.particles_skipped += other.particles_skipped;
        self.entities_total += other.entities_total;
        self.particles_total += other.particles_total;
    }
}

/// Keeps particle `ordinal` when the running count of kept particles at
/// `ratio` steps up on it. Spreads exactly `ratio` of any run evenly.
#[inline]
#[must_use]
pub fn keep_on_stride(ordinal: u32, ratio: f32) -> bool {
    if ratio >= 1.0 {
        return true;
    }
    if ratio <= 0.0 {
        return false;
    }
    let ratio = f64::from(ratio);
    let i = f64::from(ordinal);
    ((i + 1.0) * ratio).floor() > (i * ratio).floor()
}

/// Culling stage. Owned by the graphics thread.
#[derive(Debug, Clone)]
pub struct CullingStage {
    config: CullingConfig,
    state: CullState,
    profile: Arc<QualityProfile>,
    stats: CullStats,
}

impl CullingStage {
    /// Creates a stage at best quality with default state.
    #[must_use]
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            state: CullState::default(),
            profile: Arc::new(QualityProfile::best()),
            stats: CullStats::default(),
        }
    }

    /// Tracked state.
    #[must_use]
    pub const fn state(&self) -> &CullState {
        &self.state
    }

    /// Profile in use.
    #[must_use]
    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    /// Switches to a new profile. Returns true if culling output may change.
    pub fn set_profile(&mut self, profile: Arc<QualityProfile>) -> bool {
        let changed = profile.culling_key() != self.profile.culling_key();
        self.profile = profile;
        changed
    }

    /// Observes a state write. Slots that do not affect culling are ignored.
    pub fn observe(&mut self, slot: StateSlot, value: &StateValue) {
        match (slot, value) {
            (StateSlot::Scissor, StateValue::Rect(rect)) => self.state.scissor = Some(*rect),
            (StateSlot::CullMode, StateValue::Cull(mode)) => self.state.cull_mode = *mode,
            (StateSlot::FrontFace, StateValue::Winding(winding)) => self.state.front_face = *winding,
            _ => {}
        }
    }

    /// Tests one primitive. `ordinal` is the particle's position in its
    /// decimation run and is ignored for other kinds.
    #[must_use]
    pub fn test(&self, primitive: &Primitive, ordinal: u32) -> CullDecision {
        let signed_area = primitive.signed_area();
        if signed_area.abs() <= self.config.degenerate_area_epsilon {
            return CullDecision::Discard(CullReason::Degenerate);
        }

        if let Some(scissor) = self.state.scissor {
            let clip = scissor.expanded(self.config.scissor_tolerance);
            let b = primitive.bounds();
            if b.max_x < clip.x0 || b.min_x > clip.x1 || b.max_y < clip.y0 || b.min_y > clip.y1 {
                return CullDecision::Discard(CullReason::OutsideScissor);
            }
        }

        let winding = if signed_area > 0.0 { Winding::CounterClockwise } else { Winding::Clockwise };
        let front = winding == self.state.front_face;
        let rejected = match self.state.cull_mode {
            CullMode::None => false,
            CullMode::Back => !front,
            CullMode::Front => front,
            CullMode::Both => true,
        };
        if rejected {
            return CullDecision::Discard(CullReason::BackFacing);
        }

        match primitive.kind {
            PrimitiveKind::World => CullDecision::Keep,
            PrimitiveKind::Entity => {
                if primitive.nearest_depth() > self.profile.cull_distance {
                    CullDecision::Discard(CullReason::Distance)
                } else {
                    CullDecision::Keep
                }
            }
            PrimitiveKind::Particle => {
                if keep_on_stride(ordinal, self.profile.particle_keep_ratio) {
                    CullDecision::Keep
                } else {
                    CullDecision::Discard(CullReason::ParticleDecimated)
                }
            }
        }
    }

    /// Tests a primitive and counts the decision.
    pub fn test_and_record(&mut self, primitive: &Primitive, ordinal: u32) -> CullDecision {
        let decision = self.test(primitive, ordinal);
        self.stats.record(primitive.kind, decision);
        decision
    }

    /// Adds counters from a replayed display list.
    pub fn merge_stats(&mut self, stats: &CullStats) {
        self.stats.merge(stats);
    }

    /// Returns the counters and starts a new frame.
    pub fn take_stats(&mut self) -> CullStats {
        std::mem::take(&mut self.stats)
    }

    /// Fingerprint of everything that decides what this stage keeps.
    ///
    /// Mixed into display-list keys so a list compiled under one scissor or
    /// cull mode is never replayed under another.
    #[must_use]
    pub fn state_fingerprint(&self) -> Fingerprint {
        let mut builder = FingerprintBuilder::new();
        match &self.state.scissor {
            Some(rect) => {
                builder.update_u8(1);
                builder.rect(rect);
            }
            None => builder.update_u8(0),
        }
        builder.cull_mode(self.state.cull_mode);
        builder.winding(self.state.front_face);
        let key = self.profile.culling_key();
        builder.update_f32(key.particle_keep_ratio);
        builder.update_f32(key.cull_distance);
        builder.finish()
    }
}
