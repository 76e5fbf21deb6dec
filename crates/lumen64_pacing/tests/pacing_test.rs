//! Threaded pacing behaviour: ordering, backpressure, fallback, shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lumen64_core::{AudioPacket, AudioSink, Frame, GraphicsSink, PipelineResult, RenderConfig, RenderContext};
use lumen64_pacing::{bounded_queue, FramePacer, SilentAudio, RECOVERY_FRAMES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Records frame indices, sleeping per frame as the delay function says.
struct SlowSink<F> {
    seen: Arc<Mutex<Vec<u64>>>,
    delay: F,
}

impl<F> GraphicsSink for SlowSink<F>
where
    F: FnMut(u64) -> Duration + Send + 'static,
{
    fn process_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        thread::sleep((self.delay)(frame.index));
        self.seen.lock().unwrap().push(frame.index);
        Ok(())
    }
}

fn slow_sink<F>(delay: F) -> (SlowSink<F>, Arc<Mutex<Vec<u64>>>)
where
    F: FnMut(u64) -> Duration + Send + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    (SlowSink { seen: Arc::clone(&seen), delay }, seen)
}

struct OrderedAudio(Arc<Mutex<Vec<u64>>>);

impl AudioSink for OrderedAudio {
    fn mix(&mut self, packet: AudioPacket) {
        self.0.lock().unwrap().push(packet.frame_index);
    }
}

#[test]
fn test_fifo_under_concurrent_load() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let delays: Vec<u64> = (0..300).map(|_| rng.gen_range(0..300)).collect();
    let (sink, seen) = slow_sink(move |i| Duration::from_micros(delays[i as usize % delays.len()]));
    let audio_seen = Arc::new(Mutex::new(Vec::new()));

    let mut config = RenderConfig::default();
    config.threading.graphics_queue_depth = 3;
    config.threading.audio_queue_depth = 1;
    config.threading.worker_thread_count = 3;
    let mut pacer = FramePacer::start(RenderContext::new(config), sink, OrderedAudio(Arc::clone(&audio_seen))).unwrap();

    let jobs_done = Arc::new(AtomicUsize::new(0));
    for i in 0..300u64 {
        let counter = Arc::clone(&jobs_done);
        pacer
            .spawn_job(move || {
                thread::sleep(Duration::from_micros(50));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        pacer.submit_audio(AudioPacket::new(i, vec![0; 32])).unwrap();
        pacer.submit_frame(Frame::new(i)).unwrap();
    }

    let report = pacer.shutdown();
    assert!(report.is_clean());
    assert_eq!(report.frames_processed, 300);
    assert_eq!(report.audio_packets, 300);
    assert_eq!(*seen.lock().unwrap(), (0..300).collect::<Vec<_>>());
    assert_eq!(*audio_seen.lock().unwrap(), (0..300).collect::<Vec<_>>());
    assert_eq!(jobs_done.load(Ordering::SeqCst), 300);
    assert_eq!(report.pacing.frames_submitted, 300);
    assert_eq!(report.pacing.frames_completed, 300);
}

#[test]
fn test_queue_keeps_per_producer_order() {
    let (tx, rx) = bounded_queue::<(usize, u32)>(2, Duration::from_millis(10));
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let tx = tx.clone();
            thread::spawn(move || {
                for n in 0..250 {
                    tx.push((p, n)).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let mut next = [0u32; 4];
    for (p, n) in rx {
        assert_eq!(n, next[p], "producer {p} out of order");
        next[p] += 1;
    }
    for handle in producers {
        handle.join().unwrap();
    }
    assert_eq!(next, [250; 4]);
}

#[test]
fn test_saturated_queue_degrades_then_recovers() {
    let (sink, seen) = slow_sink(|i| if i < 6 { Duration::from_millis(40) } else { Duration::ZERO });
    let mut config = RenderConfig::default();
    config.threading.graphics_queue_depth = 1;
    config.threading.backpressure_stall_ms = 20;
    config.threading.stall_limit = 2;
    config.threading.worker_thread_count = 1;
    let context = RenderContext::new(config);
    let telemetry = Arc::clone(&context.telemetry);
    let mut pacer = FramePacer::start(context, sink, SilentAudio::new()).unwrap();

    let mut degraded_at = None;
    let mut recovered_at = None;
    let total = 6 + u64::from(RECOVERY_FRAMES) + 20;
    for i in 0..total {
        pacer.submit_frame(Frame::new(i)).unwrap();
        if degraded_at.is_none() && pacer.is_degraded() {
            assert!(telemetry.pacing().snapshot().degraded_sync);
            degraded_at = Some(i);
        }
        if degraded_at.is_some() && recovered_at.is_none() && !pacer.is_degraded() {
            recovered_at = Some(i);
        }
    }

    let degraded_at = degraded_at.expect("pacer never degraded");
    let recovered_at = recovered_at.expect("pacer never recovered");
    assert!(degraded_at < 6);
    assert!(recovered_at - degraded_at >= u64::from(RECOVERY_FRAMES));
    assert!(!telemetry.pacing().snapshot().degraded_sync);

    let report = pacer.shutdown();
    assert!(report.pacing.backpressure_stalls >= 2);
    assert_eq!(report.frames_processed, total);
    assert_eq!(*seen.lock().unwrap(), (0..total).collect::<Vec<_>>());
}

#[test]
fn test_shutdown_processes_in_flight_frames() {
    let (sink, seen) = slow_sink(|_| Duration::from_millis(5));
    let mut config = RenderConfig::default();
    config.threading.graphics_queue_depth = 3;
    let mut pacer = FramePacer::start(RenderContext::new(config), sink, SilentAudio::new()).unwrap();
    for i in 0..10 {
        pacer.submit_frame(Frame::new(i)).unwrap();
    }
    let report = pacer.shutdown();
    assert_eq!(report.frames_processed, 10);
    assert_eq!(seen.lock().unwrap().len(), 10);
}

#[test]
fn test_drop_joins_threads() {
    let (sink, seen) = slow_sink(|_| Duration::from_millis(2));
    {
        let mut pacer = FramePacer::start(RenderContext::default(), sink, SilentAudio::new()).unwrap();
        for i in 0..4 {
            pacer.submit_frame(Frame::new(i)).unwrap();
        }
    }
    assert_eq!(seen.lock().unwrap().len(), 4);
}
