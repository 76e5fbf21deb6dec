//! Display-list compilation and caching.
//!
//! A compiled list is the request's commands after culling, with the cull
//! counters and covered area computed once. Replaying a hit skips every
//! culling test. Keys combine the content fingerprint with the culling
//! state at entry:
//!
//! ```text
//! key = content_fp ⊕ culling.state_fingerprint()
//!        (128-bit)     (scissor, cull mode, front face, keep-ratio, cull distance)
//! ```
//!
//! The cache is bounded. At capacity the least recently used entry is
//! evicted; lookups and inserts both count as use.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use lumen64_core::{Fingerprint, PrimitiveKind, RenderCommand};
use tracing::debug;

use crate::culling::{CullStats, CullingStage};

/// Result of compiling a display list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledList {
    /// Commands that survive culling, in order.
    pub commands: Vec<RenderCommand>,
    /// Culling counters for one replay.
    pub cull: CullStats,
    /// Screen area of the kept primitives.
    pub covered_area: f32,
    /// Kept draw commands.
    pub draw_count: u32,
}

impl CompiledList {
    /// Number of compiled commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when nothing survived culling.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Compiles a command sequence against the given culling state.
///
/// The stage is cloned; the caller's stage and counters are untouched.
/// Particle decimation ordinals restart at zero for every list so that the
/// result depends only on the key.
#[must_use]
pub fn compile(commands: &[RenderCommand], culling: &CullingStage) -> CompiledList {
    let mut stage = culling.clone();
    stage.take_stats();
    let mut compiled = CompiledList {
        commands: Vec::with_capacity(commands.len()),
        ..CompiledList::default()
    };
    let mut particle_ordinal = 0u32;

    for command in commands {
        match command {
            RenderCommand::SetState { slot, value } => {
                stage.observe(*slot, value);
                compiled.commands.push(command.clone());
            }
            RenderCommand::Draw(primitive) => {
                let ordinal = particle_ordinal;
                if primitive.kind == PrimitiveKind::Particle {
                    particle_ordinal += 1;
                }
                if stage.test_and_record(primitive, ordinal).is_keep() {
                    compiled.covered_area += primitive.area();
                    compiled.draw_count += 1;
                    compiled.commands.push(command.clone());
                }
            }
            RenderCommand::Clear { .. } | RenderCommand::Barrier => {
                compiled.commands.push(command.clone());
            }
        }
    }

    compiled.cull = stage.take_stats();
    compiled
}

/// One cached list.
#[derive(Debug, Clone)]
pub struct DisplayListEntry {
    /// Cache key.
    pub fingerprint: Fingerprint,
    /// Compiled sequence.
    pub compiled: Arc<CompiledList>,
    /// Logical clock value of the last lookup or insert.
    pub last_used: u64,
    /// Compiled command count.
    pub size: usize,
}

/// Display-list cache counters, per frame or since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayListStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
    /// Full invalidations.
    pub invalidations: u64,
}

impl DisplayListStats {
    /// Hit rate in [0, 1].
    #[must_use]
    pub fn hit_rate(&self) -> f32 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            (self.hits as f64 / lookups as f64) as f32
        }
    }
}

/// Bounded LRU of compiled display lists. Graphics thread only.
#[derive(Debug)]
pub struct DisplayListCache {
    entries: LruCache<Fingerprint, DisplayListEntry>,
    clock: u64,
    frame: DisplayListStats,
    lifetime: DisplayListStats,
}

impl DisplayListCache {
    /// Creates a cache holding at most `capacity` lists (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            clock: 0,
            frame: DisplayListStats::default(),
            lifetime: DisplayListStats::default(),
        }
    }

    /// Looks up a key, marking it most recently used on a hit.
    pub fn lookup(&mut self, key: Fingerprint) -> Option<Arc<CompiledList>> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_used = clock;
                self.frame.hits += 1;
                self.lifetime.hits += 1;
                Some(Arc::clone(&entry.compiled))
            }
            None => {
                self.frame.misses += 1;
                self.lifetime.misses += 1;
                None
            }
        }
    }

    /// Stores a compiled list. Returns the key evicted to make room, if any.
    ///
    /// Inserting an existing key replaces its entry.
    pub fn insert(&mut self, key: Fingerprint, compiled: Arc<CompiledList>) -> Option<Fingerprint> {
        self.clock += 1;
        let entry = DisplayListEntry {
            fingerprint: key,
            size: compiled.len(),
            compiled,
            last_used: self.clock,
        };
        match self.entries.push(key, entry) {
            Some((old_key, _)) if old_key != key => {
                self.frame.evictions += 1;
                self.lifetime.evictions += 1;
                debug!(evicted = %old_key, "display list evicted");
                Some(old_key)
            }
            _ => None,
        }
    }

    /// Drops every entry.
    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "display list cache invalidated");
        }
        self.entries.clear();
        self.frame.invalidations += 1;
        self.lifetime.invalidations += 1;
    }

    /// True if the key is cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.contains(key)
    }

    /// Entry for a key without touching recency.
    #[must_use]
    pub fn peek(&self, key: &Fingerprint) -> Option<&DisplayListEntry> {
        self.entries.peek(key)
    }

    /// Cached lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of lists.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Counters since startup.
    #[must_use]
    pub const fn lifetime_stats(&self) -> DisplayListStats {
        self.lifetime
    }

    /// Returns this frame's counters and starts the next frame.
    pub fn take_frame_stats(&mut self) -> DisplayListStats {
        std::mem::take(&mut self.frame)
    }
}
