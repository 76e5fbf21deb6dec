//! # LUMEN64
//!
//! Render-command optimization layer between an emulated fixed-function
//! microcode interpreter and a host GPU API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          LUMEN64 SUBSYSTEM                           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  interpreter ──Frame──> ┌──────────────┐  bounded  ┌──────────────┐  │
//! │                         │  PACING      │──────────>│  RENDER      │  │
//! │                         │  • queues    │           │  • state     │  │
//! │  mixer <──AudioPacket── │  • workers   │           │  • culling   │──┼──> host API
//! │                         │  • fallback  │           │  • batching  │  │
//! │                         └──────────────┘           │  • DL cache  │  │
//! │                                                    └──────┬───────┘  │
//! │                         ┌──────────────┐  LoadSample      │          │
//! │                         │  QUALITY     │<─────────────────┘          │
//! │                         │  • axes      │──profile (next frame)──>    │
//! │                         │  • overrides │                             │
//! │                         └──────────────┘                             │
//! │                                                                      │
//! │  CORE: commands, fingerprints, config, telemetry, errors, context    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `subsystem`: init/shutdown and the producer-facing API

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod subsystem;

// Re-export the layers
pub use lumen64_core as core;
pub use lumen64_pacing as pacing;
pub use lumen64_quality as quality;
pub use lumen64_render as render;

pub use subsystem::{Subsystem, SubsystemError, SubsystemResult};
