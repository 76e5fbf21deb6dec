//! 128-bit content fingerprints.
//!
//! Display-list keys must never collide: a collision replays the wrong
//! compiled sequence and corrupts the frame without any error. Keys are
//! xxh3-128 digests over a tagged, length-prefixed encoding of every field
//! that determines compiled output.

use std::fmt;

use xxhash_rust::xxh3::{xxh3_128, Xxh3};

use crate::command::{CullMode, Rect, RenderCommand, StateSlot, StateValue, Winding};
use crate::primitive::Primitive;

/// Stable 128-bit content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fingerprint(pub u128);

impl Fingerprint {
    /// Fingerprint of a raw byte string.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(xxh3_128(bytes))
    }

    /// Fingerprint of an ordered command sequence.
    #[must_use]
    pub fn of_commands(commands: &[RenderCommand]) -> Self {
        let mut builder = FingerprintBuilder::new();
        builder.update_u64(commands.len() as u64);
        for command in commands {
            builder.command(command);
        }
        builder.finish()
    }

    /// Mixes another fingerprint into this one. Order matters.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.0.to_le_bytes());
        bytes[16..].copy_from_slice(&other.0.to_le_bytes());
        Self(xxh3_128(&bytes))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:032x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// Encoding tags. Every variant starts with a distinct tag so that two
// different command shapes never produce the same byte stream.
const TAG_SET_STATE: u8 = 0x01;
const TAG_DRAW: u8 = 0x02;
const TAG_CLEAR: u8 = 0x03;
const TAG_BARRIER: u8 = 0x04;

/// Streaming fingerprint builder.
pub struct FingerprintBuilder {
    hasher: Xxh3,
}

impl FingerprintBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { hasher: Xxh3::new() }
    }

    /// Feeds raw bytes.
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Feeds one byte.
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update(&[value]);
    }

    /// Feeds a u32 (little endian).
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Feeds a u64 (little endian).
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Feeds an f32 by bit pattern.
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// Feeds a rectangle.
    pub fn rect(&mut self, rect: &Rect) {
        self.update_f32(rect.x0);
        self.update_f32(rect.y0);
        self.update_f32(rect.x1);
        self.update_f32(rect.y1);
    }

    /// Feeds a state slot and its value.
    pub fn state(&mut self, slot: StateSlot, value: &StateValue) {
        self.update_u8(slot as u8);
        match value {
            StateValue::Bool(b) => {
                self.update_u8(0);
                self.update_u8(u8::from(*b));
            }
            StateValue::Bits(bits) => {
                self.update_u8(1);
                self.update_u64(*bits);
            }
            StateValue::Color(rgba) => {
                self.update_u8(2);
                self.update_bytes(rgba);
            }
            StateValue::Rect(rect) => {
                self.update_u8(3);
                self.rect(rect);
            }
            StateValue::Cull(mode) => {
                self.update_u8(4);
                self.cull_mode(*mode);
            }
            StateValue::Winding(winding) => {
                self.update_u8(5);
                self.winding(*winding);
            }
            StateValue::Handle(handle) => {
                self.update_u8(6);
                self.update_u32(*handle);
            }
        }
    }

    /// Feeds a cull mode.
    pub fn cull_mode(&mut self, mode: CullMode) {
        self.update_u8(match mode {
            CullMode::None => 0,
            CullMode::Back => 1,
            CullMode::Front => 2,
            CullMode::Both => 3,
        });
    }

    /// Feeds a winding.
    pub fn winding(&mut self, winding: Winding) {
        self.update_u8(match winding {
            Winding::CounterClockwise => 0,
            Winding::Clockwise => 1,
        });
    }

    /// Feeds a primitive: kind, vertex count, then raw vertex bytes.
    pub fn primitive(&mut self, primitive: &Primitive) {
        self.update_u8(primitive.kind as u8);
        self.update_u64(primitive.vertices.len() as u64);
        self.update_bytes(primitive.vertex_bytes());
    }

    /// Feeds one command.
    pub fn command(&mut self, command: &RenderCommand) {
        match command {
            RenderCommand::SetState { slot, value } => {
                self.update_u8(TAG_SET_STATE);
                self.state(*slot, value);
            }
            RenderCommand::Draw(primitive) => {
                self.update_u8(TAG_DRAW);
                self.primitive(primitive);
            }
            RenderCommand::Clear { color, depth } => {
                self.update_u8(TAG_CLEAR);
                self.update_bytes(color);
                match depth {
                    Some(d) => {
                        self.update_u8(1);
                        self.update_f32(*d);
                    }
                    None => self.update_u8(0),
                }
            }
            RenderCommand::Barrier => self.update_u8(TAG_BARRIER),
        }
    }

    /// Finishes the digest.
    #[must_use]
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.hasher.digest128())
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Vertex;

    #[test]
    fn test_combine_is_order_sensitive() {
        let a = Fingerprint::of_bytes(b"a");
        let b = Fingerprint::of_bytes(b"b");
        assert_ne!(a.combine(b), b.combine(a));
        assert_eq!(a.combine(b), a.combine(b));
    }

    #[test]
    fn test_command_shapes_do_not_alias() {
        let barrier = RenderCommand::Barrier.fingerprint();
        let clear = RenderCommand::Clear { color: [0; 4], depth: None }.fingerprint();
        let state = RenderCommand::set(StateSlot::BlendMode, StateValue::Bits(0)).fingerprint();
        assert_ne!(barrier, clear);
        assert_ne!(clear, state);
    }

    #[test]
    fn test_state_value_variants_do_not_alias() {
        let handle = RenderCommand::set(StateSlot::Texture0, StateValue::Handle(1)).fingerprint();
        let bits = RenderCommand::set(StateSlot::Texture0, StateValue::Bits(1)).fingerprint();
        assert_ne!(handle, bits);
    }

    #[test]
    fn test_primitive_kind_is_part_of_fingerprint() {
        let prim = Primitive::triangle(
            Vertex::at(0.0, 0.0, 1.0),
            Vertex::at(1.0, 0.0, 1.0),
            Vertex::at(0.0, 1.0, 1.0),
        );
        let world = RenderCommand::Draw(prim.clone()).fingerprint();
        let particle = RenderCommand::Draw(prim.with_kind(crate::PrimitiveKind::Particle)).fingerprint();
        assert_ne!(world, particle);
    }
}
