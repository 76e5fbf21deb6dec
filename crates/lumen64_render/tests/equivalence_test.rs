//! The optimized path must be indistinguishable from submitting every
//! command as-is, for frames whose primitives are all visible at best
//! quality.

use lumen64_core::{
    CullMode, DisplayListRequest, Frame, FrameItem, Primitive, PrimitiveKind, Rect, RenderCommand,
    RenderConfig, RenderContext, StateSlot, StateValue, Vertex,
};
use lumen64_render::{FrameProcessor, RecordingBackend};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

type Snapshot = [Option<StateValue>; StateSlot::COUNT];

/// (draw, effective state) pairs as the host would observe them.
fn observe(commands: impl IntoIterator<Item = RenderCommand>, state: &mut Snapshot) -> Vec<(Primitive, Snapshot)> {
    let mut draws = Vec::new();
    for command in commands {
        match command {
            RenderCommand::SetState { slot, value } => state[slot.index()] = Some(value),
            RenderCommand::Draw(primitive) => draws.push((primitive, *state)),
            RenderCommand::Clear { .. } | RenderCommand::Barrier => {}
        }
    }
    draws
}

fn visible_triangle(rng: &mut ChaCha8Rng) -> RenderCommand {
    let x = rng.gen_range(0.0..300.0_f32);
    let y = rng.gen_range(0.0..220.0_f32);
    let size = rng.gen_range(1.0..20.0_f32);
    RenderCommand::Draw(Primitive::new(
        vec![
            Vertex::at(x, y, 50.0),
            Vertex::at(x + size, y, 50.0),
            Vertex::at(x, y + size, 50.0),
        ],
        PrimitiveKind::World,
    ))
}

fn state_change(rng: &mut ChaCha8Rng) -> RenderCommand {
    match rng.gen_range(0..6) {
        0 => RenderCommand::set(StateSlot::Texture0, StateValue::Handle(rng.gen_range(0..3))),
        1 => RenderCommand::set(StateSlot::BlendMode, StateValue::Bits(rng.gen_range(0..2))),
        2 => RenderCommand::set(StateSlot::Combiner, StateValue::Bits(rng.gen_range(0..4))),
        3 => RenderCommand::set(StateSlot::PrimitiveColor, StateValue::Color([rng.gen_range(0..2), 0, 0, 255])),
        4 => RenderCommand::set(StateSlot::Scissor, StateValue::Rect(Rect::from_size(320.0, 240.0))),
        _ => RenderCommand::set(StateSlot::CullMode, StateValue::Cull(CullMode::Back)),
    }
}

fn random_commands(rng: &mut ChaCha8Rng, len: usize) -> Vec<RenderCommand> {
    (0..len)
        .map(|_| match rng.gen_range(0..10) {
            0..=3 => state_change(rng),
            4 => RenderCommand::Barrier,
            5 => RenderCommand::set(StateSlot::RenderTarget, StateValue::Handle(rng.gen_range(0..2))),
            _ => visible_triangle(rng),
        })
        .collect()
}

#[test]
fn test_optimized_matches_pass_through() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut config = RenderConfig::default();
    config.batching.batch_capacity = 16;
    config.batching.display_list_capacity = 4;
    let recorder = RecordingBackend::new();
    let handle = recorder.handle();
    let mut processor = FrameProcessor::new(RenderContext::new(config), recorder);

    let lists: Vec<DisplayListRequest> = (0..6)
        .map(|_| DisplayListRequest::new(random_commands(&mut rng, 24)))
        .collect();

    let mut expected_state: Snapshot = [None; StateSlot::COUNT];
    let mut expected = Vec::new();

    for index in 0..40 {
        let mut frame = Frame::new(index).with_frame_time(8.0);
        let mut flat = Vec::new();
        for _ in 0..rng.gen_range(1..6) {
            if rng.gen_bool(0.5) {
                let list = &lists[rng.gen_range(0..lists.len())];
                flat.extend_from_slice(list.commands());
                frame.push(FrameItem::DisplayList(list.clone()));
            } else {
                let commands = random_commands(&mut rng, 12);
                flat.extend(commands.iter().cloned());
                for command in commands {
                    frame.push(command);
                }
            }
        }
        expected.extend(observe(flat, &mut expected_state));
        processor.process(frame).unwrap();
    }

    let mut host_state: Snapshot = [None; StateSlot::COUNT];
    let actual: Vec<_> = handle
        .presented_frames()
        .into_iter()
        .flat_map(|commands| observe(commands, &mut host_state))
        .collect();

    assert_eq!(handle.present_count(), 40);
    assert_eq!(actual.len(), expected.len());
    assert_eq!(actual, expected);

    let lifetime = processor.display_lists().lifetime_stats();
    assert!(lifetime.hits > 0);
    assert!(processor.display_lists().len() <= 4);
}

#[test]
fn test_redundant_state_never_reaches_host() {
    let recorder = RecordingBackend::new();
    let handle = recorder.handle();
    let mut processor = FrameProcessor::new(RenderContext::default(), recorder);

    let mut frame = Frame::new(0).with_frame_time(8.0);
    for _ in 0..50 {
        frame.push(RenderCommand::set(StateSlot::Texture0, StateValue::Handle(1)));
        frame.push(RenderCommand::set(StateSlot::BlendMode, StateValue::Bits(2)));
    }
    processor.process(frame).unwrap();

    let submitted = &handle.presented_frames()[0];
    assert_eq!(submitted.len(), 2);
    let telemetry = processor.context().telemetry.latest();
    assert_eq!(telemetry.state_requests, 100);
    assert_eq!(telemetry.state_suppressed, 98);
}
