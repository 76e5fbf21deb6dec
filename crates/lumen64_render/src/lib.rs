//! # LUMEN64 Render
//!
//! The graphics-thread half of the render-command layer.
//!
//! ```text
//! Frame items
//!    │
//!    ├─ Command ──────────┬─ SetState ──> StateCache ──(changed)──┐
//!    │                    └─ Draw ──────> CullingStage ──(keep)───┤
//!    │                                        │                   │
//!    ├─ DisplayList ──> DisplayListCache      │ FillrateTracker   ▼
//!    │                   hit: replay ─────────┴────────────> CommandBatcher ──> HostBackend
//!    │                   miss: compile, insert, replay                          submit/present
//!    │
//!    └─ Invalidate ──> StateCache / DisplayListCache
//!
//! end of frame: LoadSample ──> AdaptiveController ──> profile for next frame
//! ```
//!
//! Every type in this crate is owned by one thread. Nothing here locks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod batch;
pub mod culling;
pub mod display_list;
pub mod fillrate;
pub mod pipeline;
pub mod state;

pub use backend::{Backend, BackendCaps, HostBackend, NullBackend, RecordingBackend, RecordingHandle};
pub use batch::{BatchStats, CommandBatcher};
pub use culling::{CullDecision, CullReason, CullState, CullStats, CullingStage};
pub use display_list::{compile, CompiledList, DisplayListCache, DisplayListEntry, DisplayListStats};
pub use fillrate::{FillrateSample, FillrateTracker};
pub use pipeline::{FrameProcessor, ProcessorStats};
pub use state::{StateCache, StateStats};
