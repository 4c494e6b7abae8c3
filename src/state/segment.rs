use serde::{Deserialize, Serialize};

/// Opaque reference to a segment in one turn's [`SegmentStore`].
///
/// Surfaces key their widgets by handle instead of holding references into
/// the store, so the store stays the single owner of segment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentHandle(usize);

impl SegmentHandle {
    /// Position of the segment within its turn.
    pub fn position(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text(TextSegment),
    /// Argument state lives in the turn's tool-call tracker under `tool_call_id`.
    ToolCall(ToolCallSegment),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextSegment {
    pub content: String,
    pub sealed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallSegment {
    pub tool_call_id: String,
    pub tool_name: String,
    pub sealed: bool,
}

impl Segment {
    pub fn is_sealed(&self) -> bool {
        match self {
            Segment::Text(text) => text.sealed,
            Segment::ToolCall(call) => call.sealed,
        }
    }

    /// A sealed text segment that never received content; surfaces drop it.
    pub fn is_empty_eligible(&self) -> bool {
        matches!(self, Segment::Text(text) if text.sealed && text.content.is_empty())
    }

    pub fn as_text(&self) -> Option<&TextSegment> {
        match self {
            Segment::Text(text) => Some(text),
            Segment::ToolCall(_) => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallSegment> {
        match self {
            Segment::ToolCall(call) => Some(call),
            Segment::Text(_) => None,
        }
    }

    fn seal(&mut self) {
        match self {
            Segment::Text(text) => text.sealed = true,
            Segment::ToolCall(call) => call.sealed = true,
        }
    }
}

/// Ordered, append-only segments of one turn. At most one segment is active
/// (unsealed); opening a new segment requires the previous one to be sealed.
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    active: Option<SegmentHandle>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, handle: SegmentHandle) -> Option<&Segment> {
        self.segments.get(handle.0)
    }

    pub fn active(&self) -> Option<SegmentHandle> {
        self.active
    }

    pub fn active_segment(&self) -> Option<&Segment> {
        self.active.and_then(|handle| self.get(handle))
    }

    /// Handle of the active segment when it is an open text segment.
    pub fn active_text(&self) -> Option<SegmentHandle> {
        self.active
            .filter(|handle| matches!(self.get(*handle), Some(Segment::Text(_))))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentHandle, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (SegmentHandle(index), segment))
    }

    /// Segments a surface should show: everything except empty-eligible text.
    pub fn visible(&self) -> impl Iterator<Item = (SegmentHandle, &Segment)> {
        self.iter().filter(|(_, segment)| !segment.is_empty_eligible())
    }

    pub fn unsealed_count(&self) -> usize {
        self.segments.iter().filter(|s| !s.is_sealed()).count()
    }

    pub fn open_text(&mut self) -> SegmentHandle {
        self.push(Segment::Text(TextSegment::default()))
    }

    pub fn open_tool_call(&mut self, tool_call_id: &str, tool_name: &str) -> SegmentHandle {
        self.push(Segment::ToolCall(ToolCallSegment {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            sealed: false,
        }))
    }

    /// Append to the active text segment. Returns `false` (and changes nothing)
    /// when `handle` is not the active text segment.
    pub fn append_text(&mut self, handle: SegmentHandle, content: &str) -> bool {
        if self.active != Some(handle) {
            return false;
        }
        match self.segments.get_mut(handle.0) {
            Some(Segment::Text(text)) if !text.sealed => {
                text.content.push_str(content);
                true
            }
            _ => false,
        }
    }

    /// Seal the active segment, if any, and return its handle.
    pub fn seal_active(&mut self) -> Option<SegmentHandle> {
        let handle = self.active.take()?;
        if let Some(segment) = self.segments.get_mut(handle.0) {
            segment.seal();
        }
        Some(handle)
    }

    fn push(&mut self, segment: Segment) -> SegmentHandle {
        self.seal_active();
        let handle = SegmentHandle(self.segments.len());
        self.segments.push(segment);
        self.active = Some(handle);
        handle
    }
}
