//! Best-effort overdraw estimate.
//!
//! Sums the screen area of every submitted primitive. No depth or
//! occlusion information is used, so the estimate is an upper bound on real
//! overdraw. Good enough to steer fog layering.

/// One frame of fillrate data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FillrateSample {
    /// Sum of submitted primitive areas, in pixels.
    pub covered_area: f64,
    /// Primitives submitted.
    pub draw_count: u32,
    /// `covered_area / viewport area`.
    pub overdraw: f32,
}

/// Per-frame coverage accumulator.
#[derive(Debug, Clone)]
pub struct FillrateTracker {
    viewport_area: f64,
    covered_area: f64,
    draw_count: u32,
}

impl FillrateTracker {
    /// Creates a tracker for a viewport of `width` x `height` pixels.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport_area: (f64::from(width) * f64::from(height)).max(1.0),
            covered_area: 0.0,
            draw_count: 0,
        }
    }

    /// Adds submitted work.
    #[inline]
    pub fn record(&mut self, primitive_area: f32, draw_count: u32) {
        if primitive_area.is_finite() && primitive_area > 0.0 {
            self.covered_area += f64::from(primitive_area);
        }
        self.draw_count += draw_count;
    }

    /// Returns this frame's sample and starts the next frame.
    pub fn reset(&mut self) -> FillrateSample {
        let sample = FillrateSample {
            covered_area: self.covered_area,
            draw_count: self.draw_count,
            overdraw: (self.covered_area / self.viewport_area) as f32,
        };
        self.covered_area = 0.0;
        self.draw_count = 0;
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overdraw_ratio() {
        let mut tracker = FillrateTracker::new(100, 100);
        tracker.record(5_000.0, 1);
        tracker.record(15_000.0, 1);
        let sample = tracker.reset();
        assert_eq!(sample.draw_count, 2);
        assert_eq!(sample.overdraw, 2.0);

        let empty = tracker.reset();
        assert_eq!(empty.overdraw, 0.0);
        assert_eq!(empty.draw_count, 0);
    }

    #[test]
    fn test_ignores_non_finite_area() {
        let mut tracker = FillrateTracker::new(10, 10);
        tracker.record(f32::NAN, 1);
        tracker.record(f32::INFINITY, 1);
        assert_eq!(tracker.reset().covered_area, 0.0);
    }
}
