//! # Frame Pacer
//!
//! Owns the graphics thread, the audio thread, and the worker pool.
//!
//! ```text
//! submit_frame(frame)
//!   ├── parallel RSP: tag display lists on the pool (ordered)
//!   ├── push to graphics queue (blocks when full, never drops)
//!   │     └── stalled push ──► stall run ──(stall_limit)──► DEGRADED
//!   ├── DEGRADED: wait until the graphics thread completes this frame
//!   │     └── RECOVERY_FRAMES calm frames ──► normal pipelining
//!   └── drain completions ──► pacing counters
//! ```
//!
//! Frames reach the graphics sink in submission order. A fatal sink error
//! stops the graphics thread; every later submit returns
//! [`PacingError::GraphicsStopped`] and [`FramePacer::shutdown`] reports the
//! error.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use lumen64_core::error::PacingResult;
use lumen64_core::{
    AudioPacket, AudioSink, DisplayListRequest, Frame, FrameItem, GraphicsSink, PacingError,
    PacingSnapshot, PipelineError, RenderContext,
};
use tracing::{debug, error, info, warn};

use crate::pool::WorkerPool;
use crate::queue::{bounded_queue, PushOutcome, QueueReceiver, QueueSender};

/// Calm frames in synchronous fallback before pipelining resumes.
pub const RECOVERY_FRAMES: u32 = 120;

/// What the pacer did over its lifetime.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Frames the graphics stage finished (presented or dropped).
    pub frames_processed: u64,
    /// Audio packets mixed.
    pub audio_packets: u64,
    /// The error that stopped the graphics stage, if any.
    pub error: Option<PipelineError>,
    /// The graphics thread panicked.
    pub graphics_panicked: bool,
    /// Final pacing counters.
    pub pacing: PacingSnapshot,
}

impl ShutdownReport {
    /// True when the graphics stage ran until shutdown without failing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && !self.graphics_panicked
    }
}

/// Audio sink that discards packets. Counts samples so tests can see the
/// packets arrived.
#[derive(Debug, Default)]
pub struct SilentAudio {
    samples: u64,
}

impl SilentAudio {
    /// New sink.
    #[must_use]
    pub const fn new() -> Self {
        Self { samples: 0 }
    }

    /// Samples seen so far.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }
}

impl AudioSink for SilentAudio {
    fn mix(&mut self, packet: AudioPacket) {
        self.samples += packet.samples.len() as u64;
    }
}

struct GraphicsExit {
    processed: u64,
    error: Option<PipelineError>,
}

enum GraphicsStage {
    Threaded {
        queue: Option<QueueSender<Frame>>,
        completions: Receiver<u64>,
        handle: Option<JoinHandle<GraphicsExit>>,
    },
    Inline {
        sink: Box<dyn GraphicsSink>,
        processed: u64,
        error: Option<PipelineError>,
    },
}

enum AudioStage {
    Threaded {
        queue: Option<QueueSender<AudioPacket>>,
        handle: Option<JoinHandle<u64>>,
    },
    Inline {
        sink: Box<dyn AudioSink>,
        mixed: u64,
    },
}

/// Synchronous-fallback bookkeeping.
#[derive(Debug, Default)]
struct Backpressure {
    stall_run: u32,
    degraded: bool,
    calm_frames: u32,
}

/// Hands frames and audio to their stages in order.
pub struct FramePacer {
    context: RenderContext,
    graphics: GraphicsStage,
    audio: AudioStage,
    pool: WorkerPool,
    backpressure: Backpressure,
    submitted: u64,
    completed: u64,
    stall_after: Duration,
    closed: bool,
}

impl FramePacer {
    /// Starts the stages the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::ThreadSpawn`] if a thread cannot be created.
    pub fn start<G, A>(context: RenderContext, graphics: G, audio: A) -> PacingResult<Self>
    where
        G: GraphicsSink,
        A: AudioSink,
    {
        let threading = context.config().threading.clone();
        let stall_after = Duration::from_millis(threading.backpressure_stall_ms);

        let pool = if threading.enable_worker_threads {
            WorkerPool::new(threading.worker_thread_count)?
        } else {
            WorkerPool::inline()
        };

        let graphics = if threading.enable_async_graphics {
            let (queue, frames) = bounded_queue::<Frame>(threading.graphics_queue_depth, stall_after);
            let (done_tx, completions) = unbounded();
            let handle = thread::Builder::new()
                .name("lumen64-graphics".into())
                .spawn(move || graphics_loop(graphics, frames, &done_tx))
                .map_err(PacingError::ThreadSpawn)?;
            GraphicsStage::Threaded {
                queue: Some(queue),
                completions,
                handle: Some(handle),
            }
        } else {
            GraphicsStage::Inline {
                sink: Box::new(graphics),
                processed: 0,
                error: None,
            }
        };

        let audio = if threading.enable_async_audio {
            let (queue, packets) = bounded_queue::<AudioPacket>(threading.audio_queue_depth, stall_after);
            let mut sink = audio;
            let handle = thread::Builder::new()
                .name("lumen64-audio".into())
                .spawn(move || {
                    let mut mixed = 0u64;
                    for packet in packets {
                        sink.mix(packet);
                        mixed += 1;
                    }
                    sink.finish();
                    mixed
                })
                .map_err(PacingError::ThreadSpawn)?;
            AudioStage::Threaded {
                queue: Some(queue),
                handle: Some(handle),
            }
        } else {
            AudioStage::Inline {
                sink: Box::new(audio),
                mixed: 0,
            }
        };

        info!(
            async_graphics = threading.enable_async_graphics,
            async_audio = threading.enable_async_audio,
            workers = pool.worker_count(),
            graphics_depth = threading.graphics_queue_depth,
            parallel_rsp = threading.enable_parallel_rsp,
            "frame pacer started"
        );

        Ok(Self {
            context,
            graphics,
            audio,
            pool,
            backpressure: Backpressure::default(),
            submitted: 0,
            completed: 0,
            stall_after,
            closed: false,
        })
    }

    /// Hands a frame to the graphics stage. Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::GraphicsStopped`] once the graphics stage has
    /// stopped. The frame is not processed.
    pub fn submit_frame(&mut self, mut frame: Frame) -> PacingResult<()> {
        if self.context.config().threading.enable_parallel_rsp && self.pool.is_threaded() {
            self.tag_display_lists(&mut frame)?;
        }

        match &mut self.graphics {
            GraphicsStage::Inline { sink, processed, error } => {
                if error.is_some() {
                    return Err(PacingError::GraphicsStopped);
                }
                self.context.telemetry.pacing().record_submitted();
                match sink.process_frame(frame) {
                    Ok(()) => {
                        *processed += 1;
                        self.context.telemetry.pacing().record_completed();
                        Ok(())
                    }
                    Err(err) => {
                        error!(error = %err, "graphics stage stopped");
                        sink.finish();
                        *error = Some(err);
                        Err(PacingError::GraphicsStopped)
                    }
                }
            }
            GraphicsStage::Threaded { queue, .. } => {
                let queue = queue.as_ref().ok_or(PacingError::GraphicsStopped)?;
                let index = frame.index;
                let outcome = queue.push(frame).map_err(|_| PacingError::GraphicsStopped)?;
                self.submitted += 1;
                self.context.telemetry.pacing().record_submitted();
                self.after_push(index, outcome)
            }
        }
    }

    /// Hands an audio packet to the audio stage.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::AudioStopped`] if the audio thread is gone.
    pub fn submit_audio(&mut self, packet: AudioPacket) -> PacingResult<()> {
        match &mut self.audio {
            AudioStage::Inline { sink, mixed } => {
                sink.mix(packet);
                *mixed += 1;
            }
            AudioStage::Threaded { queue, .. } => {
                let queue = queue.as_ref().ok_or(PacingError::AudioStopped)?;
                let outcome = queue.push(packet).map_err(|_| PacingError::AudioStopped)?;
                if outcome.is_stall() {
                    debug!("audio queue stalled");
                }
            }
        }
        self.context.telemetry.pacing().record_audio_packet();
        Ok(())
    }

    /// Runs a job on the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::WorkerPoolClosed`] after shutdown.
    pub fn spawn_job<F>(&self, job: F) -> PacingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.execute(job)
    }

    /// The worker pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The shared context.
    #[must_use]
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    /// True while in synchronous fallback.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.backpressure.degraded
    }

    /// Drains every queue, joins every thread, and reports.
    #[must_use]
    pub fn shutdown(mut self) -> ShutdownReport {
        self.close()
    }

    fn after_push(&mut self, index: u64, outcome: PushOutcome) -> PacingResult<()> {
        let stall_limit = self.context.config().threading.stall_limit;
        let pacing = self.context.telemetry.pacing();

        if outcome.is_stall() {
            pacing.record_stall();
            self.backpressure.stall_run += 1;
            self.backpressure.calm_frames = 0;
            debug!(frame = index, run = self.backpressure.stall_run, "graphics queue stalled");
        } else {
            self.backpressure.stall_run = 0;
        }

        if !self.backpressure.degraded && self.backpressure.stall_run >= stall_limit {
            self.backpressure.degraded = true;
            self.backpressure.calm_frames = 0;
            pacing.set_degraded(true);
            warn!(
                frame = index,
                stalls = self.backpressure.stall_run,
                "graphics queue saturated, falling back to synchronous hand-off"
            );
        }

        if self.backpressure.degraded {
            let waited = self.wait_for_completion(self.submitted)?;
            if waited > self.stall_after {
                self.backpressure.calm_frames = 0;
            } else {
                self.backpressure.calm_frames += 1;
            }
            if self.backpressure.calm_frames >= RECOVERY_FRAMES {
                self.backpressure = Backpressure::default();
                self.context.telemetry.pacing().set_degraded(false);
                info!(frame = index, "graphics queue recovered, pipelining resumed");
            }
        }

        self.drain_completions();
        Ok(())
    }

    /// Blocks until `target` frames have completed. Returns the time spent.
    fn wait_for_completion(&mut self, target: u64) -> PacingResult<Duration> {
        let GraphicsStage::Threaded { completions, .. } = &self.graphics else {
            return Ok(Duration::ZERO);
        };
        let started = Instant::now();
        while self.completed < target {
            match completions.recv() {
                Ok(done) => {
                    self.completed = done;
                    self.context.telemetry.pacing().record_completed();
                }
                Err(_) => return Err(PacingError::GraphicsStopped),
            }
        }
        Ok(started.elapsed())
    }

    fn drain_completions(&mut self) {
        if let GraphicsStage::Threaded { completions, .. } = &self.graphics {
            for done in completions.try_iter() {
                self.completed = done;
                self.context.telemetry.pacing().record_completed();
            }
        }
    }

    /// Fingerprints untagged display lists across the pool and puts them
    /// back in their original positions.
    fn tag_display_lists(&self, frame: &mut Frame) -> PacingResult<()> {
        let positions: Vec<usize> = frame
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                FrameItem::DisplayList(request) if !request.is_tagged() => Some(i),
                _ => None,
            })
            .collect();
        if positions.len() < 2 {
            return Ok(());
        }

        let requests: Vec<DisplayListRequest> = positions
            .iter()
            .filter_map(|&i| match &frame.items[i] {
                FrameItem::DisplayList(request) => Some(request.clone()),
                _ => None,
            })
            .collect();
        let tagged = self.pool.map_ordered(requests, |mut request| {
            request.ensure_tagged();
            request
        })?;
        for (i, request) in positions.into_iter().zip(tagged) {
            frame.items[i] = FrameItem::DisplayList(request);
        }
        Ok(())
    }

    fn close(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.closed {
            report.pacing = self.context.telemetry.pacing().snapshot();
            return report;
        }
        self.closed = true;

        match &mut self.graphics {
            GraphicsStage::Threaded { queue, completions, handle } => {
                // Closing the queue lets the thread drain what is in flight.
                queue.take();
                if let Some(handle) = handle.take() {
                    match handle.join() {
                        Ok(exit) => {
                            report.frames_processed = exit.processed;
                            report.error = exit.error;
                        }
                        Err(_) => {
                            error!("graphics thread panicked");
                            report.graphics_panicked = true;
                        }
                    }
                }
                for done in completions.try_iter() {
                    self.completed = done;
                    self.context.telemetry.pacing().record_completed();
                }
            }
            GraphicsStage::Inline { sink, processed, error } => {
                if error.is_none() {
                    sink.finish();
                }
                report.frames_processed = *processed;
                report.error = error.take();
            }
        }

        match &mut self.audio {
            AudioStage::Threaded { queue, handle } => {
                queue.take();
                if let Some(handle) = handle.take() {
                    match handle.join() {
                        Ok(mixed) => report.audio_packets = mixed,
                        Err(_) => warn!("audio thread panicked"),
                    }
                }
            }
            AudioStage::Inline { sink, mixed } => {
                sink.finish();
                report.audio_packets = *mixed;
            }
        }

        self.pool.shutdown();
        self.context.telemetry.pacing().set_degraded(false);
        report.pacing = self.context.telemetry.pacing().snapshot();

        info!(
            frames = report.frames_processed,
            audio_packets = report.audio_packets,
            stalls = report.pacing.backpressure_stalls,
            failed = report.error.is_some(),
            "frame pacer shut down"
        );
        report
    }
}

impl Drop for FramePacer {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for FramePacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePacer")
            .field("submitted", &self.submitted)
            .field("completed", &self.completed)
            .field("degraded", &self.backpressure.degraded)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn graphics_loop<G: GraphicsSink>(
    mut sink: G,
    frames: QueueReceiver<Frame>,
    completions: &Sender<u64>,
) -> GraphicsExit {
    let mut processed = 0u64;
    let mut failure = None;

    while let Some(frame) = frames.pop() {
        let index = frame.index;
        match sink.process_frame(frame) {
            Ok(()) => {
                processed += 1;
                // The producer may already be gone during shutdown.
                let _ = completions.send(processed);
            }
            Err(err) => {
                error!(frame = index, error = %err, "graphics stage stopped");
                failure = Some(err);
                break;
            }
        }
    }

    sink.finish();
    GraphicsExit { processed, error: failure }
}
