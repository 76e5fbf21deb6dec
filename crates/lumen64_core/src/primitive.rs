//! Primitives produced per draw call.
//!
//! A primitive is ephemeral: built by the interpreter for one draw, tested
//! by the culling stage, submitted or dropped, then discarded.

use bytemuck::{Pod, Zeroable};

use crate::command::Winding;

/// A transformed vertex.
///
/// `position` is screen-space x/y plus view depth in z.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Screen x, screen y, view depth.
    pub position: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Shade color.
    pub color: [u8; 4],
}

impl Vertex {
    /// Creates an untextured white vertex.
    #[must_use]
    pub const fn at(x: f32, y: f32, depth: f32) -> Self {
        Self {
            position: [x, y, depth],
            uv: [0.0, 0.0],
            color: [255, 255, 255, 255],
        }
    }
}

/// What a primitive belongs to, for the lossy quality filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveKind {
    /// Level geometry. Never dropped by quality filters.
    #[default]
    World = 0,
    /// Actor geometry, subject to the cull distance.
    Entity = 1,
    /// Particle quad, subject to the keep-ratio.
    Particle = 2,
}

/// Screen-space bounding extent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    /// Minimum x.
    pub min_x: f32,
    /// Minimum y.
    pub min_y: f32,
    /// Maximum x.
    pub max_x: f32,
    /// Maximum y.
    pub max_y: f32,
}

impl Bounds {
    /// Area of the box.
    #[must_use]
    pub fn area(&self) -> f32 {
        (self.max_x - self.min_x).max(0.0) * (self.max_y - self.min_y).max(0.0)
    }
}

/// A vertex set (triangle or convex fan) with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Vertices in submission order.
    pub vertices: Vec<Vertex>,
    /// Kind used by quality filters.
    pub kind: PrimitiveKind,
}

impl Primitive {
    /// Creates a primitive from its vertices.
    #[must_use]
    pub fn new(vertices: Vec<Vertex>, kind: PrimitiveKind) -> Self {
        Self { vertices, kind }
    }

    /// Creates a world triangle.
    #[must_use]
    pub fn triangle(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self::new(vec![a, b, c], PrimitiveKind::World)
    }

    /// Returns the same primitive tagged with another kind.
    #[must_use]
    pub fn with_kind(mut self, kind: PrimitiveKind) -> Self {
        self.kind = kind;
        self
    }

    /// Signed area of the polygon (shoelace formula).
    ///
    /// Positive for counter-clockwise order, negative for clockwise.
    /// Accumulates in f64 so large screen coordinates keep small areas exact.
    #[must_use]
    pub fn signed_area(&self) -> f32 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice_area = 0.0_f64;
        for i in 0..n {
            let [x0, y0, _] = self.vertices[i].position;
            let [x1, y1, _] = self.vertices[(i + 1) % n].position;
            twice_area += f64::from(x0) * f64::from(y1) - f64::from(x1) * f64::from(y0);
        }
        (twice_area * 0.5) as f32
    }

    /// Absolute area in pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    /// Winding derived from the signed area, `None` for degenerate input.
    #[must_use]
    pub fn winding(&self) -> Option<Winding> {
        let area = self.signed_area();
        if area > 0.0 {
            Some(Winding::CounterClockwise)
        } else if area < 0.0 {
            Some(Winding::Clockwise)
        } else {
            None
        }
    }

    /// Screen-space bounding box. Empty primitives yield a zero box.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let mut iter = self.vertices.iter();
        let Some(first) = iter.next() else {
            return Bounds::default();
        };
        let [x, y, _] = first.position;
        let mut bounds = Bounds { min_x: x, min_y: y, max_x: x, max_y: y };
        for v in iter {
            let [x, y, _] = v.position;
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        bounds
    }

    /// Smallest view depth among the vertices.
    #[must_use]
    pub fn nearest_depth(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.position[2])
            .fold(f32::INFINITY, f32::min)
    }

    /// Raw vertex bytes, for fingerprinting.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
