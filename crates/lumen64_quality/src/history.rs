//! Rolling window of load samples.

use std::collections::VecDeque;

use lumen64_core::LoadSample;

/// Frame-time statistics over the window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTimeStats {
    /// Fastest frame (ms).
    pub min_ms: f32,
    /// Mean frame time (ms).
    pub avg_ms: f32,
    /// Slowest frame (ms).
    pub max_ms: f32,
}

/// Fixed-capacity history of the most recent samples.
#[derive(Debug, Clone)]
pub struct LoadHistory {
    samples: VecDeque<LoadSample>,
    capacity: usize,
    total_frame_ms: f64,
}

impl LoadHistory {
    /// Creates a history holding at most `capacity` samples (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_frame_ms: 0.0,
        }
    }

    /// Appends a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: LoadSample) {
        if self.samples.len() == self.capacity {
            if let Some(old) = self.samples.pop_front() {
                self.total_frame_ms -= f64::from(old.frame_time_ms);
            }
        }
        self.total_frame_ms += f64::from(sample.frame_time_ms);
        self.samples.push_back(sample);
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<&LoadSample> {
        self.samples.back()
    }

    /// Samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window size.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LoadSample> {
        self.samples.iter()
    }

    /// Frame-time min/avg/max. All zero when empty.
    #[must_use]
    pub fn frame_time_stats(&self) -> FrameTimeStats {
        if self.samples.is_empty() {
            return FrameTimeStats::default();
        }
        let (min_ms, max_ms) = self
            .samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.frame_time_ms), hi.max(s.frame_time_ms))
            });
        FrameTimeStats {
            min_ms,
            avg_ms: (self.total_frame_ms / self.samples.len() as f64) as f32,
            max_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: f32) -> LoadSample {
        LoadSample::new(0, 0, ms, 0.0)
    }

    #[test]
    fn test_empty_stats() {
        let history = LoadHistory::new(4);
        assert!(history.is_empty());
        assert_eq!(history.frame_time_stats(), FrameTimeStats::default());
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut history = LoadHistory::new(3);
        for ms in [40.0, 10.0, 20.0, 30.0] {
            history.push(frame(ms));
        }
        assert_eq!(history.len(), 3);
        let stats = history.frame_time_stats();
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 30.0);
        assert_eq!(stats.avg_ms, 20.0);
        assert_eq!(history.latest().map(|s| s.frame_time_ms), Some(30.0));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut history = LoadHistory::new(0);
        history.push(frame(1.0));
        history.push(frame(2.0));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.frame_time_stats().avg_ms, 2.0);
    }
}
