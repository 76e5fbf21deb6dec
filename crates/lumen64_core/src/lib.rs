//! # LUMEN64 Core
//!
//! Shared data model for the render-command optimization layer that sits
//! between an emulated fixed-function microcode interpreter and the host GPU.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐   Frame    ┌──────────────┐   batches   ┌──────────────┐
//! │  Interpreter │──────────>│   Graphics   │────────────>│   Host API   │
//! │  (producer)  │  (queue)  │    thread    │  submit()   │  present()   │
//! └──────────────┘           └──────┬───────┘             └──────────────┘
//!                                   │ FrameTelemetry + Arc<QualityProfile>
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ TelemetryHub │ ◄── overlay / reporting (read-only)
//!                            └──────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. Producers publish immutable snapshots, consumers never call back.
//! 2. Everything a component needs arrives through a [`RenderContext`].
//! 3. Fingerprints are 128-bit; a collision silently corrupts a draw.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod primitive;
pub mod quality;
pub mod stage;
pub mod telemetry;

pub use command::{CullMode, InvalidateScope, Rect, RenderCommand, StateSlot, StateValue, Winding};
pub use config::{
    BackendKind, BatchingConfig, CullingConfig, QualityConfig, RenderConfig, SceneOverrideConfig,
    ThreadingConfig, ViewportConfig,
};
pub use context::RenderContext;
pub use error::{
    BackendError, BackendResult, ConfigError, ConfigResult, PacingError, PacingResult, PipelineError,
    PipelineResult,
};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use frame::{AudioPacket, DisplayListRequest, Frame, FrameItem, GameLoad, SceneId};
pub use primitive::{Bounds, Primitive, PrimitiveKind, Vertex};
pub use quality::{
    CullingKey, FogLayering, LoadSample, QualityAxis, QualityLevels, QualityProfile, ShadowQuality,
};
pub use stage::{AudioSink, GraphicsSink};
pub use telemetry::{FrameTelemetry, PacingCounters, PacingSnapshot, TelemetryHub};
