use super::segment::{Segment, SegmentHandle, SegmentStore};
use super::tool_calls::{ToolCallEntry, ToolCallTracker};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local identifier for one submitted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Streaming,
    Complete,
    Error,
    /// Stopped by the user. Not a failure.
    Cancelled,
}

impl TurnStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TurnStatus::Streaming)
    }
}

/// One assistant response to one user message.
#[derive(Debug, Clone)]
pub struct Turn {
    id: TurnId,
    session_id: Option<String>,
    status: TurnStatus,
    diagnostic: Option<String>,
    pub(super) segments: SegmentStore,
    pub(super) tool_calls: ToolCallTracker,
}

impl Turn {
    pub fn new(id: TurnId) -> Self {
        Self {
            id,
            session_id: None,
            status: TurnStatus::Streaming,
            diagnostic: None,
            segments: SegmentStore::new(),
            tool_calls: ToolCallTracker::new(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    /// Server-side conversation id bound by the `session` event.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Terminal failure message, set when the turn ends in `Error`.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    pub fn tool_calls(&self) -> &ToolCallTracker {
        &self.tool_calls
    }

    pub fn segment(&self, handle: SegmentHandle) -> Option<&Segment> {
        self.segments.get(handle)
    }

    /// Tracker entry behind a tool-call segment.
    pub fn tool_call_for(&self, handle: SegmentHandle) -> Option<&ToolCallEntry> {
        let call = self.segments.get(handle)?.as_tool_call()?;
        self.tool_calls.get(&call.tool_call_id)
    }

    /// Concatenated text of every text segment, in order.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|(_, segment)| segment.as_text())
            .map(|text| text.content.as_str())
            .collect()
    }

    pub(super) fn bind_session(&mut self, session_id: String) {
        self.session_id = Some(session_id);
    }

    pub(super) fn finish(&mut self, status: TurnStatus, diagnostic: Option<String>) {
        self.status = status;
        self.diagnostic = diagnostic;
    }
}
