//! Stage seams between the pacer and the work it schedules.
//!
//! The pacer owns threads and queues; what runs on those threads is a sink.
//! The graphics sink is the frame processor, the audio sink is the external
//! mixer.

use crate::error::PipelineResult;
use crate::frame::{AudioPacket, Frame};

/// Consumer of frames on the graphics thread.
pub trait GraphicsSink: Send + 'static {
    /// Processes one frame to completion: present, or drop it whole.
    ///
    /// # Errors
    ///
    /// Returns an error only when the stage cannot continue. A single failed
    /// frame is handled internally.
    fn process_frame(&mut self, frame: Frame) -> PipelineResult<()>;

    /// Called once after the last frame, before the thread exits.
    fn finish(&mut self) {}
}

/// Consumer of audio packets on the audio thread.
pub trait AudioSink: Send + 'static {
    /// Mixes one packet.
    fn mix(&mut self, packet: AudioPacket);

    /// Called once after the last packet.
    fn finish(&mut self) {}
}
