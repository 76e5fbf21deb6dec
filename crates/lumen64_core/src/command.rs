//! Render commands and tracked host state.
//!
//! The interpreter emits an ordered stream of [`RenderCommand`]s. State is
//! modelled as a closed set of [`StateSlot`]s so the state cache can keep a
//! fixed-size snapshot instead of a map.

use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::primitive::Primitive;

/// Axis-aligned screen rectangle (scissor, viewport).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x0: f32,
    /// Top edge (inclusive).
    pub y0: f32,
    /// Right edge (exclusive).
    pub x1: f32,
    /// Bottom edge (exclusive).
    pub y1: f32,
}

impl Rect {
    /// Creates a rectangle from its edges.
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle anchored at the origin.
    #[must_use]
    pub const fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Width of the rectangle (zero when inverted).
    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    /// Height of the rectangle (zero when inverted).
    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Area in pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns the rectangle grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.x0 - margin, self.y0 - margin, self.x1 + margin, self.y1 + margin)
    }
}

/// Which faces the fixed-function pipeline discards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullMode {
    /// Two-sided rendering: nothing is discarded by facing.
    #[default]
    None,
    /// Discard back faces.
    Back,
    /// Discard front faces.
    Front,
    /// Discard everything (used by some microcodes to skip geometry).
    Both,
}

/// Vertex order of a primitive in screen space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winding {
    /// Positive signed area.
    #[default]
    CounterClockwise,
    /// Negative signed area.
    Clockwise,
}

/// Host state slots tracked by the state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateSlot {
    /// Blender configuration.
    BlendMode = 0,
    /// Depth compare/update bits.
    DepthMode = 1,
    /// Face culling mode.
    CullMode = 2,
    /// Which winding counts as front facing.
    FrontFace = 3,
    /// Scissor rectangle.
    Scissor = 4,
    /// Viewport rectangle.
    Viewport = 5,
    /// Color combiner equation.
    Combiner = 6,
    /// Fog color register.
    FogColor = 7,
    /// Primitive color register.
    PrimitiveColor = 8,
    /// Environment color register.
    EnvironmentColor = 9,
    /// Texture bound to tile 0.
    Texture0 = 10,
    /// Texture bound to tile 1.
    Texture1 = 11,
    /// Color image (render target).
    RenderTarget = 12,
}

impl StateSlot {
    /// Number of tracked slots.
    pub const COUNT: usize = 13;

    /// Every slot, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::BlendMode,
        Self::DepthMode,
        Self::CullMode,
        Self::FrontFace,
        Self::Scissor,
        Self::Viewport,
        Self::Combiner,
        Self::FogColor,
        Self::PrimitiveColor,
        Self::EnvironmentColor,
        Self::Texture0,
        Self::Texture1,
        Self::RenderTarget,
    ];

    /// Dense index into a snapshot array.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether a change to this slot may sit in a batch behind earlier work.
    ///
    /// A render-target switch must not: everything recorded against the old
    /// target is flushed first.
    #[inline]
    #[must_use]
    pub const fn is_deferrable(self) -> bool {
        !matches!(self, Self::RenderTarget)
    }
}

/// Value stored in a state slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// Boolean toggle.
    Bool(bool),
    /// Packed register bits.
    Bits(u64),
    /// RGBA8 color.
    Color([u8; 4]),
    /// Rectangle (scissor/viewport).
    Rect(Rect),
    /// Culling mode.
    Cull(CullMode),
    /// Front-face winding.
    Winding(Winding),
    /// Host resource handle (texture, render target).
    Handle(u32),
}

/// Scope of an out-of-band invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateScope {
    /// One slot changed behind the cache's back.
    Slot(StateSlot),
    /// Host state is unknown; every slot re-emits on next set.
    AllState,
    /// State is unknown and compiled display lists are suspect.
    Caches,
}

/// A single GPU operation descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Change one slot of host state.
    SetState {
        /// The slot being written.
        slot: StateSlot,
        /// The new value.
        value: StateValue,
    },
    /// Draw one primitive.
    Draw(Primitive),
    /// Clear the current render target.
    Clear {
        /// Clear color.
        color: [u8; 4],
        /// Depth clear value, if the depth buffer is cleared too.
        depth: Option<f32>,
    },
    /// Ordering barrier: everything before it reaches the host first.
    Barrier,
}

impl RenderCommand {
    /// Shorthand for a state write.
    #[must_use]
    pub const fn set(slot: StateSlot, value: StateValue) -> Self {
        Self::SetState { slot, value }
    }

    /// Returns true for commands that force a flush before they enter a batch.
    #[must_use]
    pub fn requires_flush_before(&self) -> bool {
        matches!(self, Self::SetState { slot, .. } if !slot.is_deferrable())
    }

    /// Returns true for commands that close the batch they enter.
    #[must_use]
    pub fn requires_flush_after(&self) -> bool {
        matches!(self, Self::Barrier)
    }

    /// Stable content fingerprint of this command.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut builder = FingerprintBuilder::new();
        builder.command(self);
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_indices_are_dense() {
        for (i, slot) in StateSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn test_render_target_is_not_deferrable() {
        assert!(!StateSlot::RenderTarget.is_deferrable());
        assert!(StateSlot::Texture0.is_deferrable());

        let switch = RenderCommand::set(StateSlot::RenderTarget, StateValue::Handle(2));
        assert!(switch.requires_flush_before());
        assert!(RenderCommand::Barrier.requires_flush_after());
    }

    #[test]
    fn test_rect_expanded() {
        let rect = Rect::from_size(320.0, 240.0).expanded(0.5);
        assert_eq!(rect, Rect::new(-0.5, -0.5, 320.5, 240.5));
        assert_eq!(Rect::new(10.0, 10.0, 5.0, 20.0).area(), 0.0);
    }
}
