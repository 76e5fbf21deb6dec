//! # LUMEN64 Quality
//!
//! Adaptive quality control for the render-command layer.
//!
//! ```text
//! LoadSample ──> LoadHistory (min/avg/max)
//!      │
//!      ▼
//! per-axis pressure ──> AxisState (hysteresis) ──> QualityLevels
//!                                                      │
//! SceneOverrides (forced baseline) ───────────────────>│
//!                                                      ▼
//!                                          Arc<QualityProfile> (next frame)
//! ```
//!
//! Dropping reacts to a single bad frame; raising waits for a full window of
//! calm frames. No axis moves more than one level per frame.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod history;
pub mod overrides;

pub use controller::{AdaptiveController, AxisState, Transition};
pub use history::{FrameTimeStats, LoadHistory};
pub use overrides::SceneOverrides;
