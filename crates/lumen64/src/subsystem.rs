//! # Subsystem Lifecycle
//!
//! One owned handle for the whole layer. `init` builds the context, the host
//! backend, the graphics-thread frame processor, and the pacer; `shutdown`
//! drains every queue and joins every thread. Nothing is process-global, so
//! several subsystems can coexist (tests rely on this).

use std::path::Path;
use std::sync::Arc;

use lumen64_core::{
    AudioPacket, AudioSink, ConfigError, Frame, FrameTelemetry, PacingError, PacingSnapshot,
    QualityProfile, RenderConfig, RenderContext,
};
use lumen64_pacing::{FramePacer, ShutdownReport, SilentAudio};
use lumen64_render::{Backend, FrameProcessor, HostBackend, RecordingHandle};
use thiserror::Error;
use tracing::info;

/// Subsystem start-up or operation failed.
#[derive(Error, Debug)]
pub enum SubsystemError {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pacing stage failed.
    #[error(transparent)]
    Pacing(#[from] PacingError),
}

/// Result type for subsystem operations.
pub type SubsystemResult<T> = Result<T, SubsystemError>;

/// The running render-command layer.
#[derive(Debug)]
pub struct Subsystem {
    context: RenderContext,
    pacer: FramePacer,
    recording: Option<RecordingHandle>,
}

impl Subsystem {
    /// Starts with the backend named in the configuration and a silent
    /// audio sink.
    ///
    /// # Errors
    ///
    /// Fails if a pipeline thread cannot be spawned.
    pub fn init(config: RenderConfig) -> SubsystemResult<Self> {
        let backend = Backend::create(config.backend);
        let recording = backend.recording();
        let mut subsystem = Self::init_with(config, backend, SilentAudio::new())?;
        subsystem.recording = recording;
        Ok(subsystem)
    }

    /// Loads the TOML file at `path` and starts.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or a thread cannot be
    /// spawned.
    pub fn from_config_file(path: impl AsRef<Path>) -> SubsystemResult<Self> {
        let config = RenderConfig::load(path)?;
        Self::init(config)
    }

    /// Starts with a caller-supplied backend and audio sink.
    ///
    /// # Errors
    ///
    /// Fails if a pipeline thread cannot be spawned.
    pub fn init_with<B, A>(config: RenderConfig, backend: B, audio: A) -> SubsystemResult<Self>
    where
        B: HostBackend + Send + 'static,
        A: AudioSink,
    {
        let context = RenderContext::new(config);
        let caps = backend.query_caps();
        let processor = FrameProcessor::new(context.clone(), backend);
        let pacer = FramePacer::start(context.clone(), processor, audio)?;
        info!(backend = caps.name, "render subsystem initialized");
        Ok(Self {
            context,
            pacer,
            recording: None,
        })
    }

    /// Queues a frame for the graphics thread.
    ///
    /// # Errors
    ///
    /// [`PacingError::GraphicsStopped`] once the graphics stage has failed.
    pub fn submit_frame(&mut self, frame: Frame) -> SubsystemResult<()> {
        Ok(self.pacer.submit_frame(frame)?)
    }

    /// Queues an audio packet for the mixer.
    ///
    /// # Errors
    ///
    /// [`PacingError::AudioStopped`] if the audio thread is gone.
    pub fn submit_audio(&mut self, packet: AudioPacket) -> SubsystemResult<()> {
        Ok(self.pacer.submit_audio(packet)?)
    }

    /// Runs a job on the worker pool.
    ///
    /// # Errors
    ///
    /// [`PacingError::WorkerPoolClosed`] after shutdown.
    pub fn spawn_job<F>(&self, job: F) -> SubsystemResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        Ok(self.pacer.spawn_job(job)?)
    }

    /// Telemetry of the most recently finished frame.
    #[must_use]
    pub fn telemetry(&self) -> FrameTelemetry {
        self.context.telemetry.latest()
    }

    /// Producer-side pacing counters.
    #[must_use]
    pub fn pacing(&self) -> PacingSnapshot {
        self.context.telemetry.pacing().snapshot()
    }

    /// The quality profile the graphics stage is using.
    #[must_use]
    pub fn quality_profile(&self) -> Arc<QualityProfile> {
        self.context.telemetry.profile()
    }

    /// The effective (sanitized) configuration.
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        self.context.config()
    }

    /// Shared context.
    #[must_use]
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Inspection handle when running on the recording backend.
    #[must_use]
    pub fn recording(&self) -> Option<&RecordingHandle> {
        self.recording.as_ref()
    }

    /// Processes every in-flight frame, joins all threads, and reports.
    #[must_use]
    pub fn shutdown(self) -> ShutdownReport {
        let report = self.pacer.shutdown();
        info!(
            frames = report.frames_processed,
            clean = report.is_clean(),
            "render subsystem shut down"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen64_core::{BackendKind, RenderCommand, StateSlot, StateValue};

    fn recording_config() -> RenderConfig {
        RenderConfig {
            backend: BackendKind::Recording,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_init_exposes_recording_handle() {
        let subsystem = Subsystem::init(recording_config()).unwrap();
        assert!(subsystem.recording().is_some());
        let report = subsystem.shutdown();
        assert!(report.is_clean());
    }

    #[test]
    fn test_null_backend_has_no_handle() {
        let subsystem = Subsystem::init(RenderConfig::default()).unwrap();
        assert!(subsystem.recording().is_none());
        let _ = subsystem.shutdown();
    }

    #[test]
    fn test_frames_reach_host_after_shutdown() {
        let mut subsystem = Subsystem::init(recording_config()).unwrap();
        let handle = subsystem.recording().cloned().unwrap();
        for i in 0..5 {
            let frame = Frame::new(i)
                .with_frame_time(8.0)
                .with_item(RenderCommand::set(StateSlot::Texture0, StateValue::Handle(1)));
            subsystem.submit_frame(frame).unwrap();
        }
        let report = subsystem.shutdown();
        assert_eq!(report.frames_processed, 5);
        assert_eq!(handle.present_count(), 5);
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = Subsystem::from_config_file("/nonexistent/lumen64.toml").unwrap_err();
        assert!(matches!(err, SubsystemError::Config(ConfigError::Io { .. })));
    }
}
