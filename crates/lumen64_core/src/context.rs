//! Owned runtime context.
//!
//! Replaces process-wide settings and counters: the configuration and the
//! telemetry hub are built once at startup and handed to every component.

use std::sync::Arc;

use crate::config::RenderConfig;
use crate::telemetry::TelemetryHub;

/// Configuration plus telemetry, shared by every stage.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Sanitized, immutable configuration.
    pub config: Arc<RenderConfig>,
    /// Telemetry sink.
    pub telemetry: Arc<TelemetryHub>,
}

impl RenderContext {
    /// Builds a context, clamping the configuration first.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config: Arc::new(config.sanitized()),
            telemetry: Arc::new(TelemetryHub::new()),
        }
    }

    /// Shorthand for the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_sanitizes() {
        let mut config = RenderConfig::default();
        config.threading.graphics_queue_depth = 0;
        let context = RenderContext::new(config);
        assert_eq!(context.config().threading.graphics_queue_depth, 1);
    }

    #[test]
    fn test_clones_share_telemetry() {
        let context = RenderContext::default();
        let other = context.clone();
        other.telemetry.pacing().record_stall();
        assert_eq!(context.telemetry.pacing().snapshot().backpressure_stalls, 1);
    }
}
