//! # Error Types
//!
//! One error enum per layer. Recoverable conditions (out-of-range config,
//! a single failed frame) are handled where they occur and never surface
//! here; these enums carry what the caller must act on.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML is malformed or a field has the wrong type.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written back as TOML.
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The host API refused an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A batch was rejected.
    #[error("batch submission rejected: {0}")]
    SubmitRejected(String),

    /// Present failed.
    #[error("present failed: {0}")]
    PresentFailed(String),

    /// The device is gone.
    #[error("host device lost")]
    DeviceLost,
}

/// Result type for host backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// The graphics stage cannot continue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Too many consecutive frames failed to submit or present.
    #[error("{consecutive} consecutive frames failed, last error: {last}")]
    SubmitFailures {
        /// Failed frames in a row.
        consecutive: u32,
        /// The most recent backend error.
        last: BackendError,
    },
}

/// Result type for the graphics stage.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Frame pacing failures seen by the producer.
#[derive(Error, Debug)]
pub enum PacingError {
    /// The graphics thread has stopped; no further frames are accepted.
    #[error("graphics thread stopped")]
    GraphicsStopped,

    /// The audio thread has stopped.
    #[error("audio thread stopped")]
    AudioStopped,

    /// The worker pool is shut down.
    #[error("worker pool closed")]
    WorkerPoolClosed,

    /// A job panicked, so its result is missing.
    #[error("{0} worker job(s) panicked")]
    WorkerPanicked(usize),

    /// A pipeline thread could not be started.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

/// Result type for frame pacing.
pub type PacingResult<T> = Result<T, PacingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_message_names_cause() {
        let err = PipelineError::SubmitFailures {
            consecutive: 3,
            last: BackendError::DeviceLost,
        };
        assert_eq!(err.to_string(), "3 consecutive frames failed, last error: host device lost");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("missing.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("missing.toml"));
    }
}
