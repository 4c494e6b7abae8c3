use super::TurnEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub provider: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkPayload {
    #[serde(rename = "type")]
    pub chunk_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "toolCall", alias = "tool_call")]
    pub tool_call: Option<WireToolCall>,
}

/// Tool call as emitted upstream. Providers disagree on key casing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireToolCall {
    #[serde(default, alias = "ID")]
    pub id: Option<String>,
    #[serde(default, alias = "Function")]
    pub function: Option<WireFunction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFunction {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default, alias = "Arguments")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
}

impl WireToolCall {
    fn name(&self) -> Option<&str> {
        self.function
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    fn arguments(&self) -> Option<String> {
        self.function
            .as_ref()
            .and_then(|f| f.arguments.as_ref())
            .and_then(arguments_text)
    }
}

// Arguments normally arrive as a JSON string; tolerate an inline object too.
fn arguments_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Map one SSE frame onto the canonical event shape.
///
/// Returns `Ok(None)` for frames that carry no turn content (unknown event
/// types, the per-round `done` chunk, empty text).
pub fn normalize_frame(event_type: &str, data: &str) -> Result<Option<TurnEvent>, serde_json::Error> {
    match event_type {
        "session" => {
            let payload: SessionPayload = serde_json::from_str(data)?;
            Ok(Some(TurnEvent::Session {
                session_id: payload.session_id,
            }))
        }
        "chunk" => {
            let payload: ChunkPayload = serde_json::from_str(data)?;
            Ok(normalize_chunk(payload))
        }
        "error" => {
            let payload: ErrorPayload = serde_json::from_str(data)?;
            Ok(Some(TurnEvent::Error {
                message: payload
                    .error
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
            }))
        }
        _ => Ok(None),
    }
}

fn normalize_chunk(payload: ChunkPayload) -> Option<TurnEvent> {
    match payload.chunk_type.as_str() {
        "text" => payload
            .content
            .filter(|content| !content.is_empty())
            .map(|content| TurnEvent::TextDelta { content }),
        "tool_call_start" => {
            let tool_call = payload.tool_call.unwrap_or_default();
            Some(TurnEvent::ToolCallStart {
                tool_name: tool_call.name().unwrap_or("tool").to_string(),
                initial_arguments: tool_call.arguments().unwrap_or_default(),
                tool_call_id: tool_call.id.unwrap_or_default(),
            })
        }
        "tool_call_args" => Some(TurnEvent::ToolCallArgsDelta {
            tool_call_id: payload
                .tool_call
                .and_then(|tc| tc.id)
                .filter(|id| !id.is_empty()),
            fragment: payload.content.unwrap_or_default(),
        }),
        "tool_call_end" => {
            let (tool_call_id, final_arguments) = match payload.tool_call {
                Some(tool_call) => {
                    let arguments = tool_call.arguments().filter(|args| !args.is_empty());
                    (tool_call.id.filter(|id| !id.is_empty()), arguments)
                }
                None => (None, None),
            };
            Some(TurnEvent::ToolCallEnd {
                tool_call_id,
                final_arguments,
            })
        }
        other => {
            tracing::debug!(chunk_type = other, "ignoring non-content chunk");
            None
        }
    }
}
