//! # Frame Processor
//!
//! Drives one frame through every stage on the graphics thread.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ 1. ITEMS      state cache, culling, display lists -> batcher  │
//! │ 2. PRESENT    final flush + present                           │
//! │               on failure: discard, invalidate state, count    │
//! │ 3. MEASURE    LoadSample (frame time, counts, overdraw)       │
//! │ 4. ADAPT      controller -> profile for the next frame        │
//! │               culling-relevant change invalidates the DL cache│
//! │ 5. PUBLISH    FrameTelemetry + profile into the hub           │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! A frame is presented whole or not at all. Host failures drop the frame
//! and keep going; only a run of `max_consecutive_submit_failures` failed
//! frames stops the stage.
//!
//! State set after the failing command is still tracked (the culling view
//! and the requested values), and the next frame opens by re-emitting every
//! requested value the host may have lost.

use std::sync::Arc;
use std::time::Instant;

use lumen64_core::error::{BackendResult, PipelineResult};
use lumen64_core::{
    BackendError, DisplayListRequest, Frame, FrameItem, FrameTelemetry, GraphicsSink,
    InvalidateScope, LoadSample, PipelineError, PrimitiveKind, QualityProfile, RenderCommand,
    RenderContext,
};
use lumen64_quality::AdaptiveController;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, HostBackend};
use crate::batch::CommandBatcher;
use crate::culling::CullingStage;
use crate::display_list::{compile, CompiledList, DisplayListCache};
use crate::fillrate::FillrateTracker;
use crate::state::StateCache;

/// Lifetime counters of a processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Frames that reached present.
    pub frames_presented: u64,
    /// Frames dropped after a host failure.
    pub frames_dropped: u64,
    /// Current run of failed frames.
    pub consecutive_failures: u32,
}

/// Graphics-thread frame processor.
pub struct FrameProcessor<B: HostBackend = Backend> {
    context: RenderContext,
    state: StateCache,
    culling: CullingStage,
    batcher: CommandBatcher<B>,
    display_lists: DisplayListCache,
    fillrate: FillrateTracker,
    controller: AdaptiveController,
    particle_ordinal: u32,
    restore_pending: bool,
    last_frame_end: Option<Instant>,
    stats: ProcessorStats,
}

impl<B: HostBackend> FrameProcessor<B> {
    /// Builds the stage stack around a host backend.
    #[must_use]
    pub fn new(context: RenderContext, backend: B) -> Self {
        let config = Arc::clone(&context.config);
        let caps = backend.query_caps();
        info!(
            backend = caps.name,
            batch_capacity = config.batching.batch_capacity,
            display_lists = config.batching.display_list_capacity,
            "frame processor ready"
        );
        Self {
            state: StateCache::new(),
            culling: CullingStage::new(config.culling.clone()),
            batcher: CommandBatcher::new(backend, config.batching.batch_capacity),
            display_lists: DisplayListCache::new(config.batching.display_list_capacity),
            fillrate: FillrateTracker::new(config.viewport.width, config.viewport.height),
            controller: AdaptiveController::new(config.quality.clone(), &config.scene_overrides),
            particle_ordinal: 0,
            restore_pending: false,
            last_frame_end: None,
            stats: ProcessorStats::default(),
            context,
        }
    }

    /// Processes one frame. See the module docs for the phases.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SubmitFailures`] once the configured number
    /// of consecutive frames has failed.
    pub fn process(&mut self, frame: Frame) -> PipelineResult<()> {
        let started = Instant::now();
        let index = frame.index;
        let scene = frame.scene.clone();
        let load = frame.load;
        let reported_ms = frame.frame_time_ms;
        self.particle_ordinal = 0;

        // 1-2. Items and present.
        let outcome = self.run_items(frame.items).and_then(|()| self.batcher.present());
        let presented = match outcome {
            Ok(()) => {
                self.stats.frames_presented += 1;
                self.stats.consecutive_failures = 0;
                true
            }
            Err(err) => {
                self.drop_frame(index, &err);
                let limit = self.context.config.batching.max_consecutive_submit_failures;
                if self.stats.consecutive_failures >= limit {
                    error!(
                        frame = index,
                        consecutive = self.stats.consecutive_failures,
                        error = %err,
                        "host keeps failing, stopping graphics stage"
                    );
                    return Err(PipelineError::SubmitFailures {
                        consecutive: self.stats.consecutive_failures,
                        last: err,
                    });
                }
                false
            }
        };

        // 3. Measure.
        let now = Instant::now();
        let measured_ms = self
            .last_frame_end
            .map_or_else(|| now - started, |last| now - last)
            .as_secs_f32()
            * 1000.0;
        self.last_frame_end = Some(now);
        let frame_time_ms = reported_ms.unwrap_or(measured_ms);
        let fill = self.fillrate.reset();
        let sample = LoadSample::new(load.entity_count, load.particle_count, frame_time_ms, fill.overdraw);

        // 4. Adapt.
        let profile = self.controller.observe(sample, scene.as_ref());
        self.apply_profile(Arc::clone(&profile));

        // 5. Publish.
        let cull = self.culling.take_stats();
        let state = self.state.take_stats();
        let batch = self.batcher.take_stats();
        let dl = self.display_lists.take_frame_stats();
        let mut telemetry = FrameTelemetry {
            frame_index: index,
            presented,
            particles_total: cull.particles_total,
            particles_skipped: cull.particles_skipped,
            entities_total: cull.entities_total,
            entities_culled: cull.entities_culled,
            primitives_tested: cull.tested,
            primitives_discarded: cull.discarded(),
            dl_hits: frame_count(dl.hits),
            dl_misses: frame_count(dl.misses),
            dl_evictions: frame_count(dl.evictions),
            batch_count: batch.batches,
            commands_submitted: batch.commands,
            state_requests: state.requests,
            state_suppressed: state.suppressed,
            frame_time_ms,
            overdraw_estimate: fill.overdraw,
            dropped_frames: self.stats.frames_dropped,
            consecutive_failures: self.stats.consecutive_failures,
            ..FrameTelemetry::default()
        };
        self.controller.fill_telemetry(&mut telemetry);
        debug!(
            frame = index,
            presented,
            batches = telemetry.batch_count,
            dl_hit_rate = telemetry.dl_hit_rate(),
            suppression = telemetry.state_suppression_rate(),
            frame_ms = frame_time_ms,
            "frame processed"
        );
        let hub = &self.context.telemetry;
        hub.publish_frame(telemetry);
        hub.publish_profile(profile);
        Ok(())
    }

    fn run_items(&mut self, items: Vec<FrameItem>) -> BackendResult<()> {
        let mut items = items.into_iter();
        if std::mem::take(&mut self.restore_pending) {
            for transition in self.state.restore() {
                if let Err(err) = self.batcher.accept(transition) {
                    self.shadow_items(items);
                    return Err(err);
                }
            }
        }
        while let Some(item) = items.next() {
            let outcome = match item {
                FrameItem::Command(command) => self.execute(command),
                FrameItem::DisplayList(request) => self.display_list(&request),
                FrameItem::Invalidate(scope) => {
                    self.invalidate(scope);
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                self.shadow_items(items);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Walks the rest of a failing frame without submitting anything.
    fn shadow_items(&mut self, items: impl Iterator<Item = FrameItem>) {
        for item in items {
            match item {
                FrameItem::Command(command) => self.shadow_command(&command),
                FrameItem::DisplayList(request) => {
                    for command in request.commands() {
                        self.shadow_command(command);
                    }
                }
                FrameItem::Invalidate(scope) => self.invalidate(scope),
            }
        }
    }

    fn shadow_command(&mut self, command: &RenderCommand) {
        if let RenderCommand::SetState { slot, value } = command {
            self.culling.observe(*slot, value);
            self.state.note_requested(*slot, *value);
        }
    }

    fn execute(&mut self, command: RenderCommand) -> BackendResult<()> {
        match command {
            RenderCommand::SetState { slot, value } => {
                self.culling.observe(slot, &value);
                match self.state.set_state(slot, value) {
                    Some(transition) => self.batcher.accept(transition),
                    None => Ok(()),
                }
            }
            RenderCommand::Draw(primitive) => {
                let ordinal = self.particle_ordinal;
                if primitive.kind == PrimitiveKind::Particle {
                    self.particle_ordinal += 1;
                }
                if self.culling.test_and_record(&primitive, ordinal).is_keep() {
                    self.fillrate.record(primitive.area(), 1);
                    self.batcher.accept(RenderCommand::Draw(primitive))
                } else {
                    Ok(())
                }
            }
            other => self.batcher.accept(other),
        }
    }

    fn display_list(&mut self, request: &DisplayListRequest) -> BackendResult<()> {
        let key = request.fingerprint().combine(self.culling.state_fingerprint());
        let compiled = if let Some(hit) = self.display_lists.lookup(key) {
            hit
        } else {
            let compiled = Arc::new(compile(request.commands(), &self.culling));
            self.display_lists.insert(key, Arc::clone(&compiled));
            compiled
        };
        self.replay(&compiled)
    }

    fn replay(&mut self, compiled: &CompiledList) -> BackendResult<()> {
        self.culling.merge_stats(&compiled.cull);
        self.fillrate.record(compiled.covered_area, compiled.draw_count);
        let mut commands = compiled.commands.iter();
        while let Some(command) = commands.next() {
            let outcome = match command {
                RenderCommand::SetState { slot, value } => {
                    self.culling.observe(*slot, value);
                    match self.state.set_state(*slot, *value) {
                        Some(transition) => self.batcher.accept(transition),
                        None => Ok(()),
                    }
                }
                other => self.batcher.accept(other.clone()),
            };
            if let Err(err) = outcome {
                for rest in commands {
                    self.shadow_command(rest);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn invalidate(&mut self, scope: InvalidateScope) {
        self.state.invalidate(scope);
        if scope == InvalidateScope::Caches {
            self.display_lists.invalidate_all();
        }
    }

    fn drop_frame(&mut self, index: u64, err: &BackendError) {
        self.batcher.discard();
        // The host may have applied part of the frame's state.
        self.state.invalidate_all();
        self.restore_pending = true;
        self.stats.frames_dropped += 1;
        self.stats.consecutive_failures += 1;
        warn!(
            frame = index,
            consecutive = self.stats.consecutive_failures,
            error = %err,
            "frame dropped after host failure"
        );
    }

    fn apply_profile(&mut self, profile: Arc<QualityProfile>) {
        if self.culling.set_profile(profile) {
            debug!(
                keep_ratio = self.culling.profile().particle_keep_ratio,
                cull_distance = self.culling.profile().cull_distance,
                "culling profile changed, dropping compiled display lists"
            );
            self.display_lists.invalidate_all();
        }
    }

    /// Lifetime counters.
    #[must_use]
    pub const fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Display-list cache.
    #[must_use]
    pub const fn display_lists(&self) -> &DisplayListCache {
        &self.display_lists
    }

    /// State cache.
    #[must_use]
    pub const fn state_cache(&self) -> &StateCache {
        &self.state
    }

    /// Adaptive controller.
    #[must_use]
    pub const fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    /// Host backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        self.batcher.backend()
    }

    /// Shared context.
    #[must_use]
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }
}

/// Per-frame display-list counts fit the telemetry record's `u32` fields.
fn frame_count(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl<B: HostBackend + Send + 'static> GraphicsSink for FrameProcessor<B> {
    fn process_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        self.process(frame)
    }

    fn finish(&mut self) {
        let dl = self.display_lists.lifetime_stats();
        info!(
            presented = self.stats.frames_presented,
            dropped = self.stats.frames_dropped,
            dl_hit_rate = dl.hit_rate(),
            dl_evictions = dl.evictions,
            "graphics stage finished"
        );
    }
}
