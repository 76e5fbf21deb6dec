//! Redundant state-transition elimination.
//!
//! The cache holds the last value it let through for every slot. A request
//! equal to that value is dropped; anything else becomes a real
//! `SetState` command and updates the snapshot. All host state mutation goes
//! through here, so if anything else touches host state the slot must be
//! invalidated or the cache would suppress a transition the host needs.
//!
//! Separately from the emitted snapshot the cache remembers the last value
//! upstream *requested* per slot. Invalidation forgets only what the host is
//! known to hold; [`StateCache::restore`] replays the requested values after
//! a dropped frame left the host in an unknown state.

use lumen64_core::{InvalidateScope, RenderCommand, StateSlot, StateValue};

/// Per-frame state-cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    /// Transitions requested.
    pub requests: u32,
    /// Transitions emitted to the batcher.
    pub emitted: u32,
    /// Transitions dropped as redundant.
    pub suppressed: u32,
    /// Invalidations received.
    pub invalidations: u32,
}

impl StateStats {
    /// Fraction of requests that were suppressed.
    #[must_use]
    pub fn suppression_rate(&self) -> f32 {
        if self.requests == 0 {
            0.0
        } else {
            self.suppressed as f32 / self.requests as f32
        }
    }
}

/// Last-known host state per slot.
#[derive(Debug, Clone)]
pub struct StateCache {
    snapshot: [Option<StateValue>; StateSlot::COUNT],
    requested: [Option<StateValue>; StateSlot::COUNT],
    stats: StateStats,
}

impl StateCache {
    /// Empty cache: the first request for every slot is emitted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: [None; StateSlot::COUNT],
            requested: [None; StateSlot::COUNT],
            stats: StateStats::default(),
        }
    }

    /// Requests a transition.
    ///
    /// Returns the command to submit, or `None` if the host is already in
    /// that state.
    #[inline]
    pub fn set_state(&mut self, slot: StateSlot, value: StateValue) -> Option<RenderCommand> {
        self.stats.requests += 1;
        self.requested[slot.index()] = Some(value);
        let cached = &mut self.snapshot[slot.index()];
        if *cached == Some(value) {
            self.stats.suppressed += 1;
            return None;
        }
        *cached = Some(value);
        self.stats.emitted += 1;
        Some(RenderCommand::set(slot, value))
    }

    /// Last emitted value for a slot, `None` when unknown.
    #[must_use]
    pub fn get(&self, slot: StateSlot) -> Option<StateValue> {
        self.snapshot[slot.index()]
    }

    /// Last value requested upstream for a slot, emitted or not.
    #[must_use]
    pub fn requested(&self, slot: StateSlot) -> Option<StateValue> {
        self.requested[slot.index()]
    }

    /// Records a request that will not reach the host (the rest of a frame
    /// being dropped). The next [`restore`](Self::restore) emits it.
    pub fn note_requested(&mut self, slot: StateSlot, value: StateValue) {
        self.requested[slot.index()] = Some(value);
    }

    /// Transitions that bring the host back to every requested value the
    /// snapshot does not hold, in slot order. The snapshot is updated as if
    /// they were emitted.
    pub fn restore(&mut self) -> Vec<RenderCommand> {
        let mut commands = Vec::new();
        for slot in StateSlot::ALL {
            let i = slot.index();
            if let Some(value) = self.requested[i] {
                if self.snapshot[i] != Some(value) {
                    self.snapshot[i] = Some(value);
                    self.stats.emitted += 1;
                    commands.push(RenderCommand::set(slot, value));
                }
            }
        }
        commands
    }

    /// Forgets one slot.
    pub fn invalidate_slot(&mut self, slot: StateSlot) {
        self.snapshot[slot.index()] = None;
        self.stats.invalidations += 1;
    }

    /// Forgets every slot.
    pub fn invalidate_all(&mut self) {
        self.snapshot = [None; StateSlot::COUNT];
        self.stats.invalidations += 1;
    }

    /// Applies an upstream invalidation.
    pub fn invalidate(&mut self, scope: InvalidateScope) {
        match scope {
            InvalidateScope::Slot(slot) => self.invalidate_slot(slot),
            InvalidateScope::AllState | InvalidateScope::Caches => self.invalidate_all(),
        }
    }

    /// Current counters.
    #[must_use]
    pub const fn stats(&self) -> StateStats {
        self.stats
    }

    /// Returns the counters and starts a new frame.
    pub fn take_stats(&mut self) -> StateStats {
        std::mem::take(&mut self.stats)
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}
