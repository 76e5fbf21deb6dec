//! Host API boundary.
//!
//! The set of backends is closed and chosen once at startup from
//! [`BackendKind`]. [`HostBackend`] stays a trait so tests and embedders can
//! drive the pipeline with their own implementation.

use std::sync::Arc;

use lumen64_core::error::BackendResult;
use lumen64_core::{BackendError, BackendKind, RenderCommand};
use parking_lot::Mutex;
use tracing::debug;

/// What the host can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCaps {
    /// Backend name, for logs.
    pub name: &'static str,
    /// Largest batch the host accepts in one submit, if bounded.
    pub max_batch_len: Option<usize>,
}

/// Host graphics API.
///
/// Called only from the graphics thread.
pub trait HostBackend {
    /// Submits one batch. Order of submitted batches is draw order.
    ///
    /// # Errors
    ///
    /// Returns an error when the host rejects the batch.
    fn submit(&mut self, batch: &[RenderCommand]) -> BackendResult<()>;

    /// Presents the frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot present.
    fn present(&mut self) -> BackendResult<()>;

    /// Capabilities, queried once at startup.
    fn query_caps(&self) -> BackendCaps;

    /// Drops work submitted for a frame that will not be presented.
    fn discard_frame(&mut self) {}
}

/// Accepts everything and draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend {
    presents: u64,
}

impl NullBackend {
    /// Creates a null backend.
    #[must_use]
    pub const fn new() -> Self {
        Self { presents: 0 }
    }

    /// Frames presented so far.
    #[must_use]
    pub const fn presents(&self) -> u64 {
        self.presents
    }
}

impl HostBackend for NullBackend {
    fn submit(&mut self, _batch: &[RenderCommand]) -> BackendResult<()> {
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        self.presents += 1;
        Ok(())
    }

    fn query_caps(&self) -> BackendCaps {
        BackendCaps { name: "null", max_batch_len: None }
    }
}

/// Everything a [`RecordingBackend`] has seen.
#[derive(Debug, Default)]
struct RecordingLog {
    batches: Vec<Vec<RenderCommand>>,
    pending: Vec<RenderCommand>,
    frames: Vec<Vec<RenderCommand>>,
    discarded_frames: u64,
    fail_submits: u32,
    fail_presents: u32,
}

/// Shared view of a [`RecordingBackend`], usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandle {
    log: Arc<Mutex<RecordingLog>>,
}

impl RecordingHandle {
    /// Every accepted batch, in submission order.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<RenderCommand>> {
        self.log.lock().batches.clone()
    }

    /// Commands of every presented frame, one entry per present.
    #[must_use]
    pub fn presented_frames(&self) -> Vec<Vec<RenderCommand>> {
        self.log.lock().frames.clone()
    }

    /// Number of presents.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.log.lock().frames.len()
    }

    /// Frames abandoned after a failure.
    #[must_use]
    pub fn discarded_frames(&self) -> u64 {
        self.log.lock().discarded_frames
    }

    /// Makes the next `count` submits fail.
    pub fn fail_next_submits(&self, count: u32) {
        self.log.lock().fail_submits = count;
    }

    /// Makes the next `count` presents fail.
    pub fn fail_next_presents(&self, count: u32) {
        self.log.lock().fail_presents = count;
    }

    /// Forgets everything recorded.
    pub fn clear(&self) {
        let mut log = self.log.lock();
        log.batches.clear();
        log.pending.clear();
        log.frames.clear();
        log.discarded_frames = 0;
    }
}

/// Captures batches and presents. Supports failure injection.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    handle: RecordingHandle,
}

impl RecordingBackend {
    /// Creates a recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting the recording.
    #[must_use]
    pub fn handle(&self) -> RecordingHandle {
        self.handle.clone()
    }
}

impl HostBackend for RecordingBackend {
    fn submit(&mut self, batch: &[RenderCommand]) -> BackendResult<()> {
        let mut log = self.handle.log.lock();
        if log.fail_submits > 0 {
            log.fail_submits -= 1;
            return Err(BackendError::SubmitRejected("injected submit failure".into()));
        }
        log.batches.push(batch.to_vec());
        log.pending.extend_from_slice(batch);
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        let mut log = self.handle.log.lock();
        if log.fail_presents > 0 {
            log.fail_presents -= 1;
            return Err(BackendError::PresentFailed("injected present failure".into()));
        }
        let frame = std::mem::take(&mut log.pending);
        log.frames.push(frame);
        Ok(())
    }

    fn query_caps(&self) -> BackendCaps {
        BackendCaps { name: "recording", max_batch_len: None }
    }

    fn discard_frame(&mut self) {
        let mut log = self.handle.log.lock();
        log.pending.clear();
        log.discarded_frames += 1;
    }
}

/// The backend selected at startup.
#[derive(Debug, Clone)]
pub enum Backend {
    /// See [`NullBackend`].
    Null(NullBackend),
    /// See [`RecordingBackend`].
    Recording(RecordingBackend),
}

impl Backend {
    /// Builds the backend named by the configuration.
    #[must_use]
    pub fn create(kind: BackendKind) -> Self {
        debug!(?kind, "creating host backend");
        match kind {
            BackendKind::Null => Self::Null(NullBackend::new()),
            BackendKind::Recording => Self::Recording(RecordingBackend::new()),
        }
    }

    /// Recording handle, for the recording backend.
    #[must_use]
    pub fn recording(&self) -> Option<RecordingHandle> {
        match self {
            Self::Recording(recorder) => Some(recorder.handle()),
            Self::Null(_) => None,
        }
    }
}

impl HostBackend for Backend {
    fn submit(&mut self, batch: &[RenderCommand]) -> BackendResult<()> {
        match self {
            Self::Null(b) => b.submit(batch),
            Self::Recording(b) => b.submit(batch),
        }
    }

    fn present(&mut self) -> BackendResult<()> {
        match self {
            Self::Null(b) => b.present(),
            Self::Recording(b) => b.present(),
        }
    }

    fn query_caps(&self) -> BackendCaps {
        match self {
            Self::Null(b) => b.query_caps(),
            Self::Recording(b) => b.query_caps(),
        }
    }

    fn discard_frame(&mut self) {
        match self {
            Self::Null(b) => b.discard_frame(),
            Self::Recording(b) => b.discard_frame(),
        }
    }
}
