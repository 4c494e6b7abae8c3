/// Canonical stream event consumed by the demultiplexer.
///
/// Every upstream spelling is mapped onto this shape by
/// [`normalize_frame`](super::normalize_frame) before it reaches the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Session {
        session_id: String,
    },
    TextDelta {
        content: String,
    },
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        initial_arguments: String,
    },
    /// `tool_call_id` is `None` when the wire frame targets the active call implicitly.
    ToolCallArgsDelta {
        tool_call_id: Option<String>,
        fragment: String,
    },
    ToolCallEnd {
        tool_call_id: Option<String>,
        final_arguments: Option<String>,
    },
    Error {
        message: String,
    },
    StreamEnd,
}

impl TurnEvent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextDelta {
            content: content.into(),
        }
    }

    pub fn tool_start(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        initial_arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            initial_arguments: initial_arguments.into(),
        }
    }

    pub fn tool_args(tool_call_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::ToolCallArgsDelta {
            tool_call_id: Some(tool_call_id.into()),
            fragment: fragment.into(),
        }
    }

    pub fn tool_end(tool_call_id: impl Into<String>) -> Self {
        Self::ToolCallEnd {
            tool_call_id: Some(tool_call_id.into()),
            final_arguments: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TurnEvent::Session { .. } => "session",
            TurnEvent::TextDelta { .. } => "text-delta",
            TurnEvent::ToolCallStart { .. } => "tool-call-start",
            TurnEvent::ToolCallArgsDelta { .. } => "tool-call-args-delta",
            TurnEvent::ToolCallEnd { .. } => "tool-call-end",
            TurnEvent::Error { .. } => "error",
            TurnEvent::StreamEnd => "stream-end",
        }
    }
}
