use thiserror::Error;

/// The chat stream could not be opened or dropped mid-flight. Aborts the turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("chat request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("chat stream interrupted: {0}")]
    Stream(String),
}

impl TransportError {
    /// Text shown to the user as the turn's terminal diagnostic.
    pub fn display_message(&self) -> String {
        match self {
            TransportError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Out-of-order or unknown-id event. Logged and absorbed; the turn continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("argument fragment for tool call '{got}' while '{active}' is active")]
    ArgumentsForInactiveCall { active: String, got: String },

    #[error("argument fragment with no active tool call")]
    ArgumentsWithoutActiveCall,

    #[error("tool_call_end for '{got}' while '{active}' is active")]
    EndForInactiveCall { active: String, got: String },

    #[error("tool_call_end with no active tool call")]
    EndWithoutActiveCall,

    #[error("tool call '{0}' was already started in this turn")]
    DuplicateToolCall(String),

    #[error("tool_call_start for '{next}' while '{running}' is still running")]
    OverlappingToolCall { running: String, next: String },

    #[error("text delta while tool call '{0}' is still running")]
    TextDuringToolCall(String),

    #[error("session event after turn content already arrived")]
    LateSession,
}

/// Tool arguments were not valid JSON once the call completed. Never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool arguments are not valid JSON: {0}")]
pub struct ArgumentParseError(pub String);

impl From<serde_json::Error> for ArgumentParseError {
    fn from(error: serde_json::Error) -> Self {
        Self(error.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a turn is already streaming in this chat session")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,
}
