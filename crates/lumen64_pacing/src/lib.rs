//! # LUMEN64 Pacing
//!
//! Moves work between threads without reordering or dropping it.
//!
//! ```text
//!                   bounded (1-3)               completions
//! producer ──Frame──────────────> graphics ─────────────────┐
//!    │                             thread                   │
//!    │  ◄───────────────────────────────────────────────────┘
//!    │                                          (synchronous fallback waits here)
//!    ├──AudioPacket─────────────> audio thread
//!    │
//!    └──jobs──> WorkerPool (N workers, ordered map)
//! ```
//!
//! With async graphics or audio disabled the corresponding stage runs inline
//! on the producer thread.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod pacer;
pub mod pool;
pub mod queue;

pub use pacer::{FramePacer, ShutdownReport, SilentAudio, RECOVERY_FRAMES};
pub use pool::{resolve_worker_count, WorkerPool, WorkerPoolStats};
pub use queue::{bounded_queue, PushOutcome, QueueReceiver, QueueSender};
