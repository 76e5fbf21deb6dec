//! Frames handed from the interpreter to the graphics thread.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::{InvalidateScope, RenderCommand};
use crate::fingerprint::Fingerprint;

/// Identifier of a game scene, used to look up quality overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    /// Creates a scene id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The scene name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game-state load signals reported with a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameLoad {
    /// Active entities.
    pub entity_count: u32,
    /// Active particles.
    pub particle_count: u32,
}

/// A display-list invocation.
///
/// The command sequence is shared, so resubmitting the same list every frame
/// only clones an `Arc`. Upstream may tag the request with a fingerprint;
/// untagged requests are hashed on first use.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayListRequest {
    commands: Arc<[RenderCommand]>,
    tag: Option<Fingerprint>,
}

impl DisplayListRequest {
    /// Untagged request.
    #[must_use]
    pub fn new(commands: impl Into<Arc<[RenderCommand]>>) -> Self {
        Self { commands: commands.into(), tag: None }
    }

    /// Request carrying an upstream fingerprint.
    #[must_use]
    pub fn tagged(commands: impl Into<Arc<[RenderCommand]>>, fingerprint: Fingerprint) -> Self {
        Self { commands: commands.into(), tag: Some(fingerprint) }
    }

    /// The command sequence.
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Shared handle to the command sequence.
    #[must_use]
    pub fn shared_commands(&self) -> Arc<[RenderCommand]> {
        Arc::clone(&self.commands)
    }

    /// True when a fingerprint is already attached.
    #[must_use]
    pub const fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Content fingerprint, computed if the request is untagged.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.tag.unwrap_or_else(|| Fingerprint::of_commands(&self.commands))
    }

    /// Attaches the content fingerprint if none is present.
    pub fn ensure_tagged(&mut self) -> Fingerprint {
        let fingerprint = self.fingerprint();
        self.tag = Some(fingerprint);
        fingerprint
    }
}

/// One item of a frame, processed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameItem {
    /// An immediate command.
    Command(RenderCommand),
    /// A display-list invocation.
    DisplayList(DisplayListRequest),
    /// Out-of-band invalidation from upstream.
    Invalidate(InvalidateScope),
}

impl From<RenderCommand> for FrameItem {
    fn from(command: RenderCommand) -> Self {
        Self::Command(command)
    }
}

impl From<DisplayListRequest> for FrameItem {
    fn from(request: DisplayListRequest) -> Self {
        Self::DisplayList(request)
    }
}

/// Everything the interpreter produced for one presented frame.
///
/// A frame is atomic: it is presented whole or dropped whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Monotonic frame number.
    pub index: u64,
    /// Active scene, if known.
    pub scene: Option<SceneId>,
    /// Game-state load signals.
    pub load: GameLoad,
    /// Authoritative frame time. When absent the graphics thread measures
    /// present-to-present time itself.
    pub frame_time_ms: Option<f32>,
    /// Ordered frame content.
    pub items: Vec<FrameItem>,
}

impl Frame {
    /// Empty frame.
    #[must_use]
    pub fn new(index: u64) -> Self {
        Self { index, ..Self::default() }
    }

    /// Sets the scene.
    #[must_use]
    pub fn with_scene(mut self, scene: SceneId) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Sets the game load.
    #[must_use]
    pub fn with_load(mut self, entity_count: u32, particle_count: u32) -> Self {
        self.load = GameLoad { entity_count, particle_count };
        self
    }

    /// Sets an authoritative frame time.
    #[must_use]
    pub fn with_frame_time(mut self, frame_time_ms: f32) -> Self {
        self.frame_time_ms = Some(frame_time_ms);
        self
    }

    /// Appends one item.
    pub fn push(&mut self, item: impl Into<FrameItem>) {
        self.items.push(item.into());
    }

    /// Appends one item, builder style.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<FrameItem>) -> Self {
        self.push(item);
        self
    }

    /// Number of display-list requests in the frame.
    #[must_use]
    pub fn display_list_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, FrameItem::DisplayList(_)))
            .count()
    }
}

/// Interleaved samples for one frame, handed to the audio thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioPacket {
    /// Frame the samples belong to.
    pub frame_index: u64,
    /// Interleaved PCM samples.
    pub samples: Vec<i16>,
}

impl AudioPacket {
    /// Creates a packet.
    #[must_use]
    pub fn new(frame_index: u64, samples: Vec<i16>) -> Self {
        Self { frame_index, samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_fingerprint_matches_content() {
        let commands = vec![RenderCommand::Barrier];
        let mut request = DisplayListRequest::new(commands.clone());
        assert!(!request.is_tagged());
        let fp = request.ensure_tagged();
        assert!(request.is_tagged());
        assert_eq!(fp, Fingerprint::of_commands(&commands));
    }

    #[test]
    fn test_tag_is_trusted() {
        let tag = Fingerprint(42);
        let request = DisplayListRequest::tagged(vec![RenderCommand::Barrier], tag);
        assert_eq!(request.fingerprint(), tag);
    }

    #[test]
    fn test_frame_builder() {
        let frame = Frame::new(7)
            .with_load(3, 4)
            .with_frame_time(16.0)
            .with_item(RenderCommand::Barrier)
            .with_item(DisplayListRequest::new(Vec::<RenderCommand>::new()));
        assert_eq!(frame.index, 7);
        assert_eq!(frame.load.particle_count, 4);
        assert_eq!(frame.items.len(), 2);
        assert_eq!(frame.display_list_count(), 1);
    }
}
