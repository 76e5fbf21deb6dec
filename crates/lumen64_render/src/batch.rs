//! Command batching.
//!
//! Commands accumulate in one buffer and reach the host in exactly the order
//! they were accepted. A batch is closed early when:
//!
//! - the buffer is full (flush, then append)
//! - a non-deferrable state change arrives (flush, then append)
//! - a barrier arrives (append, then flush)
//! - the frame ends (`present`)

use lumen64_core::error::BackendResult;
use lumen64_core::RenderCommand;

use crate::backend::HostBackend;

/// Per-frame batching counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Batches submitted.
    pub batches: u32,
    /// Commands submitted.
    pub commands: u32,
    /// Flushes caused by a barrier or a non-deferrable change.
    pub forced_flushes: u32,
    /// Flushes caused by a full buffer.
    pub capacity_flushes: u32,
}

/// Ordered, capacity-bounded batch builder in front of the host.
#[derive(Debug)]
pub struct CommandBatcher<B: HostBackend> {
    backend: B,
    buffer: Vec<RenderCommand>,
    capacity: usize,
    stats: BatchStats,
}

impl<B: HostBackend> CommandBatcher<B> {
    /// Creates a batcher. Capacity is limited by the host's batch limit.
    #[must_use]
    pub fn new(backend: B, capacity: usize) -> Self {
        let caps = backend.query_caps();
        let capacity = caps
            .max_batch_len
            .map_or(capacity, |limit| capacity.min(limit))
            .max(1);
        Self {
            backend,
            buffer: Vec::with_capacity(capacity),
            capacity,
            stats: BatchStats::default(),
        }
    }

    /// Appends a command, flushing where ordering requires it.
    ///
    /// # Errors
    ///
    /// Returns the host error if a flush fails. The buffer keeps its content
    /// until [`discard`](Self::discard).
    pub fn accept(&mut self, command: RenderCommand) -> BackendResult<()> {
        if command.requires_flush_before() && !self.buffer.is_empty() {
            self.stats.forced_flushes += 1;
            self.flush()?;
        }
        if self.buffer.len() >= self.capacity {
            self.stats.capacity_flushes += 1;
            self.flush()?;
        }
        let closes_batch = command.requires_flush_after();
        self.buffer.push(command);
        if closes_batch {
            self.stats.forced_flushes += 1;
            self.flush()?;
        }
        Ok(())
    }

    /// Submits the pending batch, if any.
    ///
    /// # Errors
    ///
    /// Returns the host error; pending commands stay buffered.
    pub fn flush(&mut self) -> BackendResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.backend.submit(&self.buffer)?;
        self.stats.batches += 1;
        self.stats.commands += self.buffer.len() as u32;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes and presents the frame.
    ///
    /// # Errors
    ///
    /// Returns the first host error from the flush or the present.
    pub fn present(&mut self) -> BackendResult<()> {
        self.flush()?;
        self.backend.present()
    }

    /// Drops unsubmitted commands and abandons the frame on the host.
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.backend.discard_frame();
    }

    /// Commands waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Effective capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The host backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The host backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the counters and starts a new frame.
    pub fn take_stats(&mut self) -> BatchStats {
        std::mem::take(&mut self.stats)
    }
}
