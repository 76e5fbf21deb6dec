//! # Telemetry
//!
//! Read-only counters published once per frame.
//!
//! ```text
//! graphics thread ──publish_frame()──> TelemetryHub <──latest()── overlay
//!                 ──publish_profile()─>             <──profile()── culling (next frame)
//! producer thread ──PacingCounters (atomics)──────>
//! ```
//!
//! Writers replace whole snapshots; readers copy them out. Nobody calls back
//! into the pipeline through the hub.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::quality::{QualityLevels, QualityProfile};

/// Per-frame counters from the graphics stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTelemetry {
    /// Index of the frame these counters describe.
    pub frame_index: u64,
    /// Whether the frame reached present.
    pub presented: bool,

    // Culling
    /// Particles seen.
    pub particles_total: u32,
    /// Particles dropped by decimation.
    pub particles_skipped: u32,
    /// Entity primitives seen.
    pub entities_total: u32,
    /// Entity primitives beyond the cull distance.
    pub entities_culled: u32,
    /// Primitives run through the culling test.
    pub primitives_tested: u32,
    /// Primitives discarded for any reason.
    pub primitives_discarded: u32,

    // Display lists
    /// Display-list cache hits this frame.
    pub dl_hits: u32,
    /// Display-list cache misses this frame.
    pub dl_misses: u32,
    /// Entries evicted this frame.
    pub dl_evictions: u32,

    // Batching and state
    /// Batches submitted.
    pub batch_count: u32,
    /// Commands submitted.
    pub commands_submitted: u32,
    /// State transitions requested.
    pub state_requests: u32,
    /// Requests that matched the snapshot and were dropped.
    pub state_suppressed: u32,

    // Load
    /// This frame's time in milliseconds.
    pub frame_time_ms: f32,
    /// Minimum frame time over the load history.
    pub frame_time_min_ms: f32,
    /// Mean frame time over the load history.
    pub frame_time_avg_ms: f32,
    /// Maximum frame time over the load history.
    pub frame_time_max_ms: f32,
    /// Covered area over viewport area.
    pub overdraw_estimate: f32,

    // Failures
    /// Frames dropped because the host failed, since startup.
    pub dropped_frames: u64,
    /// Current run of failed frames.
    pub consecutive_failures: u32,

    /// Quality levels in effect after this frame.
    pub quality: QualityLevels,
}

impl FrameTelemetry {
    /// Display-list hit rate in [0, 1]; zero when no list was requested.
    #[must_use]
    pub fn dl_hit_rate(&self) -> f32 {
        ratio(self.dl_hits, self.dl_hits + self.dl_misses)
    }

    /// Fraction of state requests that were redundant.
    #[must_use]
    pub fn state_suppression_rate(&self) -> f32 {
        ratio(self.state_suppressed, self.state_requests)
    }

    /// Fraction of particles dropped.
    #[must_use]
    pub fn particle_skip_rate(&self) -> f32 {
        ratio(self.particles_skipped, self.particles_total)
    }
}

fn ratio(part: u32, whole: u32) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

/// Producer-side pacing counters.
#[derive(Debug, Default)]
pub struct PacingCounters {
    frames_submitted: AtomicU64,
    frames_completed: AtomicU64,
    backpressure_stalls: AtomicU64,
    audio_packets: AtomicU64,
    degraded_sync: AtomicBool,
}

impl PacingCounters {
    /// Counts a frame handed to the graphics stage.
    pub fn record_submitted(&self) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a frame the graphics stage finished.
    pub fn record_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an enqueue that blocked past the stall timeout.
    pub fn record_stall(&self) {
        self.backpressure_stalls.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an audio packet handed off.
    pub fn record_audio_packet(&self) {
        self.audio_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the synchronous-fallback flag.
    pub fn set_degraded(&self, degraded: bool) {
        self.degraded_sync.store(degraded, Ordering::Relaxed);
    }

    /// Copies the counters out.
    #[must_use]
    pub fn snapshot(&self) -> PacingSnapshot {
        PacingSnapshot {
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            backpressure_stalls: self.backpressure_stalls.load(Ordering::Relaxed),
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            degraded_sync: self.degraded_sync.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PacingCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingSnapshot {
    /// Frames handed to the graphics stage.
    pub frames_submitted: u64,
    /// Frames the graphics stage finished (presented or dropped).
    pub frames_completed: u64,
    /// Enqueues that blocked past the stall timeout.
    pub backpressure_stalls: u64,
    /// Audio packets handed off.
    pub audio_packets: u64,
    /// Whether the pacer is in synchronous fallback.
    pub degraded_sync: bool,
}

/// Shared telemetry sink.
#[derive(Debug)]
pub struct TelemetryHub {
    frame: RwLock<FrameTelemetry>,
    profile: RwLock<Arc<QualityProfile>>,
    pacing: PacingCounters,
}

impl TelemetryHub {
    /// Empty hub with the best-quality profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame: RwLock::new(FrameTelemetry::default()),
            profile: RwLock::new(Arc::new(QualityProfile::best())),
            pacing: PacingCounters::default(),
        }
    }

    /// Replaces the frame snapshot.
    pub fn publish_frame(&self, telemetry: FrameTelemetry) {
        *self.frame.write() = telemetry;
    }

    /// Latest frame snapshot.
    #[must_use]
    pub fn latest(&self) -> FrameTelemetry {
        *self.frame.read()
    }

    /// Replaces the published profile.
    pub fn publish_profile(&self, profile: Arc<QualityProfile>) {
        *self.profile.write() = profile;
    }

    /// Latest published profile.
    #[must_use]
    pub fn profile(&self) -> Arc<QualityProfile> {
        Arc::clone(&self.profile.read())
    }

    /// Pacing counters.
    #[must_use]
    pub const fn pacing(&self) -> &PacingCounters {
        &self.pacing
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_handle_zero() {
        let telemetry = FrameTelemetry::default();
        assert_eq!(telemetry.dl_hit_rate(), 0.0);
        assert_eq!(telemetry.state_suppression_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let telemetry = FrameTelemetry {
            dl_hits: 3,
            dl_misses: 1,
            state_requests: 10,
            state_suppressed: 4,
            ..FrameTelemetry::default()
        };
        assert_eq!(telemetry.dl_hit_rate(), 0.75);
        assert_eq!(telemetry.state_suppression_rate(), 0.4);
    }

    #[test]
    fn test_hub_publishes_snapshots() {
        let hub = TelemetryHub::new();
        let held = hub.profile();
        let worse = Arc::new(QualityProfile::from_levels(QualityLevels::WORST, 1));
        hub.publish_profile(Arc::clone(&worse));
        assert_eq!(held.generation, 0);
        assert_eq!(hub.profile().generation, 1);

        hub.pacing().record_submitted();
        hub.pacing().set_degraded(true);
        let snapshot = hub.pacing().snapshot();
        assert_eq!(snapshot.frames_submitted, 1);
        assert!(snapshot.degraded_sync);
    }
}
