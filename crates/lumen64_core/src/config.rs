//! # Render Configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! is a valid configuration. Values outside their range are clamped by
//! [`RenderConfig::sanitized`] with a warning rather than rejected; only
//! malformed TOML is an error.
//!
//! ```toml
//! backend = "recording"
//!
//! [threading]
//! graphics_queue_depth = 3
//!
//! [quality]
//! target_frame_ms = 33.3
//!
//! [[scene_overrides]]
//! scene = "boss_arena"
//! particles = 1
//! shadows = "baked"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::quality::{FogLayering, QualityLevels, ShadowQuality};

/// Smallest and largest allowed queue depth.
pub const QUEUE_DEPTH_RANGE: (usize, usize) = (1, 3);

/// Upper bound on explicitly requested worker threads.
pub const MAX_WORKER_THREADS: usize = 64;

/// Thread and queue layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingConfig {
    /// Run graphics on a dedicated thread.
    pub enable_async_graphics: bool,
    /// Run audio on a dedicated thread.
    pub enable_async_audio: bool,
    /// Start the general worker pool.
    pub enable_worker_threads: bool,
    /// Worker count; 0 picks one from available parallelism.
    pub worker_thread_count: usize,
    /// Frames in flight toward the graphics thread (1-3).
    pub graphics_queue_depth: usize,
    /// Packets in flight toward the audio thread (1-3).
    pub audio_queue_depth: usize,
    /// Experimental: fingerprint display lists on the worker pool.
    pub enable_parallel_rsp: bool,
    /// A blocked enqueue longer than this counts as a stall.
    pub backpressure_stall_ms: u64,
    /// Consecutive stalled frames before falling back to synchronous hand-off.
    pub stall_limit: u32,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            enable_async_graphics: true,
            enable_async_audio: true,
            enable_worker_threads: true,
            worker_thread_count: 0,
            graphics_queue_depth: 2,
            audio_queue_depth: 2,
            enable_parallel_rsp: false,
            backpressure_stall_ms: 50,
            stall_limit: 8,
        }
    }
}

/// Batching and display-list cache sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Commands per batch before a forced flush.
    pub batch_capacity: usize,
    /// Compiled display lists kept in the cache.
    pub display_list_capacity: usize,
    /// Consecutive failed frames before the graphics thread gives up.
    pub max_consecutive_submit_failures: u32,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_capacity: 1024,
            display_list_capacity: 256,
            max_consecutive_submit_failures: 3,
        }
    }
}

/// Culling tolerances. Both bias toward keeping geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Primitives with |signed area| at or below this are degenerate.
    pub degenerate_area_epsilon: f32,
    /// The scissor rect is grown by this many pixels before the outside test.
    pub scissor_tolerance: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            degenerate_area_epsilon: 1e-6,
            scissor_tolerance: 0.5,
        }
    }
}

/// Adaptive quality thresholds.
///
/// Pressure is a load measurement divided by its budget; 1.0 is "at budget".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Frame-time budget in milliseconds.
    pub target_frame_ms: f32,
    /// A single frame above this pressure drops one level.
    pub drop_pressure: f32,
    /// Frames below this pressure count toward a raise.
    pub raise_pressure: f32,
    /// Consecutive calm frames needed to raise one level.
    pub raise_window: u32,
    /// Entity budget.
    pub entity_budget: u32,
    /// Particle budget.
    pub particle_budget: u32,
    /// Overdraw budget (covered area / viewport area).
    pub overdraw_budget: f32,
    /// Load samples retained for frame-time statistics.
    pub history_len: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            target_frame_ms: 16.7,
            drop_pressure: 1.2,
            raise_pressure: 0.8,
            raise_window: 20,
            entity_budget: 30,
            particle_budget: 100,
            overdraw_budget: 4.0,
            history_len: 120,
        }
    }
}

/// Output resolution used for overdraw estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { width: 320, height: 240 }
    }
}

impl ViewportConfig {
    /// Viewport area in pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

/// Host backend selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Accepts and drops everything.
    #[default]
    Null,
    /// Captures batches and presents for inspection.
    Recording,
}

/// Forced quality levels for one scene.
///
/// Axes left out keep their best level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOverrideConfig {
    /// Scene the override applies to.
    pub scene: String,
    /// Particle level (0-3).
    #[serde(default)]
    pub particles: Option<u8>,
    /// Shadow quality.
    #[serde(default)]
    pub shadows: Option<ShadowQuality>,
    /// Fog layering.
    #[serde(default)]
    pub fog: Option<FogLayering>,
    /// Detail level (0-2).
    #[serde(default)]
    pub detail: Option<u8>,
}

impl SceneOverrideConfig {
    /// The forced levels.
    #[must_use]
    pub fn levels(&self) -> QualityLevels {
        let best = QualityLevels::BEST;
        QualityLevels {
            particles: self.particles.unwrap_or(best.particles),
            shadows: self.shadows.unwrap_or(best.shadows),
            fog: self.fog.unwrap_or(best.fog),
            detail: self.detail.unwrap_or(best.detail),
        }
        .clamped()
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Host backend.
    pub backend: BackendKind,
    /// Threads and queues.
    pub threading: ThreadingConfig,
    /// Batching.
    pub batching: BatchingConfig,
    /// Culling tolerances.
    pub culling: CullingConfig,
    /// Adaptive quality.
    pub quality: QualityConfig,
    /// Output resolution.
    pub viewport: ViewportConfig,
    /// Per-scene forced levels.
    pub scene_overrides: Vec<SceneOverrideConfig>,
}

impl RenderConfig {
    /// Parses TOML and clamps the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or mistyped fields.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        Ok(config.sanitized())
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not valid configuration.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Serializes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns a copy with every value inside its valid range.
    ///
    /// Each adjustment is logged at warn level.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let t = &mut self.threading;
        t.graphics_queue_depth = clamp_usize("threading.graphics_queue_depth", t.graphics_queue_depth, QUEUE_DEPTH_RANGE);
        t.audio_queue_depth = clamp_usize("threading.audio_queue_depth", t.audio_queue_depth, QUEUE_DEPTH_RANGE);
        t.worker_thread_count = clamp_usize("threading.worker_thread_count", t.worker_thread_count, (0, MAX_WORKER_THREADS));
        if t.backpressure_stall_ms == 0 {
            warn!(field = "threading.backpressure_stall_ms", "zero stall timeout, using 1");
            t.backpressure_stall_ms = 1;
        }
        if t.stall_limit == 0 {
            warn!(field = "threading.stall_limit", "zero stall limit, using 1");
            t.stall_limit = 1;
        }

        let b = &mut self.batching;
        b.batch_capacity = clamp_usize("batching.batch_capacity", b.batch_capacity, (1, 1 << 20));
        b.display_list_capacity =
            clamp_usize("batching.display_list_capacity", b.display_list_capacity, (1, 1 << 16));
        if b.max_consecutive_submit_failures == 0 {
            warn!(field = "batching.max_consecutive_submit_failures", "zero failure bound, using 1");
            b.max_consecutive_submit_failures = 1;
        }

        let defaults = CullingConfig::default();
        let c = &mut self.culling;
        c.degenerate_area_epsilon =
            clamp_f32("culling.degenerate_area_epsilon", c.degenerate_area_epsilon, 0.0, 1.0, defaults.degenerate_area_epsilon);
        c.scissor_tolerance =
            clamp_f32("culling.scissor_tolerance", c.scissor_tolerance, 0.0, 64.0, defaults.scissor_tolerance);

        let defaults = QualityConfig::default();
        let q = &mut self.quality;
        q.target_frame_ms = clamp_f32("quality.target_frame_ms", q.target_frame_ms, 1.0, 1000.0, defaults.target_frame_ms);
        q.drop_pressure = clamp_f32("quality.drop_pressure", q.drop_pressure, 0.1, 100.0, defaults.drop_pressure);
        q.raise_pressure = clamp_f32("quality.raise_pressure", q.raise_pressure, 0.01, 100.0, defaults.raise_pressure);
        if q.raise_pressure >= q.drop_pressure {
            warn!(
                raise = q.raise_pressure,
                drop = q.drop_pressure,
                "quality.raise_pressure must be below quality.drop_pressure, using defaults"
            );
            q.raise_pressure = defaults.raise_pressure;
            q.drop_pressure = defaults.drop_pressure;
        }
        if q.raise_window == 0 {
            warn!(field = "quality.raise_window", "zero raise window, using 1");
            q.raise_window = 1;
        }
        if q.entity_budget == 0 {
            warn!(field = "quality.entity_budget", "zero budget, using 1");
            q.entity_budget = 1;
        }
        if q.particle_budget == 0 {
            warn!(field = "quality.particle_budget", "zero budget, using 1");
            q.particle_budget = 1;
        }
        q.overdraw_budget = clamp_f32("quality.overdraw_budget", q.overdraw_budget, 0.1, 1000.0, defaults.overdraw_budget);
        q.history_len = clamp_usize("quality.history_len", q.history_len, (1, 10_000));

        let v = &mut self.viewport;
        if v.width == 0 || v.height == 0 {
            warn!(width = v.width, height = v.height, "empty viewport, using default");
            *v = ViewportConfig::default();
        }

        for scene in &mut self.scene_overrides {
            if scene.particles.is_some_and(|p| p > 3) || scene.detail.is_some_and(|d| d > 2) {
                warn!(scene = %scene.scene, "override level out of range, clamping");
                scene.particles = scene.particles.map(|p| p.min(3));
                scene.detail = scene.detail.map(|d| d.min(2));
            }
        }

        self
    }

    /// Forced levels for a scene, if an override exists.
    #[must_use]
    pub fn scene_override(&self, scene: &str) -> Option<QualityLevels> {
        self.scene_overrides
            .iter()
            .find(|o| o.scene == scene)
            .map(SceneOverrideConfig::levels)
    }
}

fn clamp_usize(field: &'static str, value: usize, (min, max): (usize, usize)) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(field, value, clamped, "configuration value out of range, clamping");
    }
    clamped
}

fn clamp_f32(field: &'static str, value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        warn!(field, fallback, "configuration value is NaN, using default");
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if (clamped - value).abs() > f32::EPSILON {
        warn!(field, value, clamped, "configuration value out of range, clamping");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = RenderConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.threading.graphics_queue_depth, 2);
        assert!(!config.threading.enable_parallel_rsp);
        assert_eq!(config.batching.display_list_capacity, 256);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let config = RenderConfig::from_toml_str(
            r"
            [threading]
            graphics_queue_depth = 9
            audio_queue_depth = 0

            [culling]
            scissor_tolerance = -3.0
            ",
        )
        .expect("parses");
        assert_eq!(config.threading.graphics_queue_depth, 3);
        assert_eq!(config.threading.audio_queue_depth, 1);
        assert_eq!(config.culling.scissor_tolerance, 0.0);
    }

    #[test]
    fn test_inverted_pressures_reset() {
        let mut config = RenderConfig::default();
        config.quality.raise_pressure = 2.0;
        config.quality.drop_pressure = 1.5;
        let config = config.sanitized();
        assert!(config.quality.raise_pressure < config.quality.drop_pressure);
    }

    #[test]
    fn test_nan_uses_default() {
        let mut config = RenderConfig::default();
        config.quality.target_frame_ms = f32::NAN;
        assert_eq!(config.sanitized().quality.target_frame_ms, 16.7);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let err = RenderConfig::from_toml_str("[threading\nbroken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_scene_override_levels() {
        let config = RenderConfig::from_toml_str(
            r#"
            backend = "recording"

            [[scene_overrides]]
            scene = "boss_arena"
            particles = 7
            shadows = "baked"
            "#,
        )
        .expect("parses");
        assert_eq!(config.backend, BackendKind::Recording);
        let levels = config.scene_override("boss_arena").expect("override present");
        assert_eq!(levels.particles, 3);
        assert_eq!(levels.shadows, ShadowQuality::Baked);
        assert_eq!(levels.fog, FogLayering::Multi);
        assert!(config.scene_override("title").is_none());
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = RenderConfig::default().to_toml_string().expect("serializes");
        let back = RenderConfig::from_toml_str(&text).expect("parses");
        assert_eq!(back, RenderConfig::default());
    }
}
