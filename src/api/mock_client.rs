use super::client::{ByteStream, ChatTransport};
use crate::error::TransportError;
use crate::types::ChatRequest;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

/// What the scripted stream does after its frames are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTail {
    End,
    /// Never yields again; only cancellation ends the turn.
    Hang,
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    frames: Vec<String>,
    tail: MockTail,
    open_error: Option<TransportError>,
}

impl MockResponse {
    pub fn frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            tail: MockTail::End,
            open_error: None,
        }
    }

    pub fn open_error(error: TransportError) -> Self {
        Self {
            frames: Vec::new(),
            tail: MockTail::End,
            open_error: Some(error),
        }
    }

    pub fn then(mut self, tail: MockTail) -> Self {
        self.tail = tail;
        self
    }
}

/// Scripted [`ChatTransport`]: hands out one prepared response per request and
/// records every request it receives.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_response(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if responses.is_empty() {
            return Err(TransportError::Request {
                url: "mock://chat".to_string(),
                message: "MockTransport: no more responses configured".to_string(),
            });
        }
        let response = responses.remove(0);
        if let Some(error) = response.open_error {
            return Err(error);
        }

        let chunks: Vec<Result<Bytes, TransportError>> = response
            .frames
            .into_iter()
            .map(|s| {
                let framed = if s.ends_with("\n\n") { s } else { format!("{s}\n\n") };
                Ok(Bytes::from(framed))
            })
            .collect();
        let head = stream::iter(chunks);

        let stream: ByteStream = match response.tail {
            MockTail::End => Box::pin(head),
            MockTail::Hang => Box::pin(head.chain(stream::pending())),
            MockTail::Fail(message) => Box::pin(head.chain(stream::once(async move {
                Err(TransportError::Stream(message))
            }))),
        };
        Ok(stream)
    }
}

impl ChatTransport for MockTransport {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<ByteStream, TransportError>> {
        let result = self.next_response(request);
        Box::pin(async move { result })
    }
}

/// SSE frame helpers for scripting responses.
pub mod frames {
    use serde_json::json;

    pub fn session(session_id: &str) -> String {
        format!("event: session\ndata: {}", json!({ "sessionId": session_id }))
    }

    pub fn text(content: &str) -> String {
        format!("event: chunk\ndata: {}", json!({ "type": "text", "content": content }))
    }

    pub fn tool_call_start(id: &str, name: &str, arguments: &str) -> String {
        format!(
            "event: chunk\ndata: {}",
            json!({
                "type": "tool_call_start",
                "toolCall": { "id": id, "type": "function", "function": { "name": name, "arguments": arguments } }
            })
        )
    }

    pub fn tool_call_args(fragment: &str) -> String {
        format!(
            "event: chunk\ndata: {}",
            json!({ "type": "tool_call_args", "content": fragment })
        )
    }

    pub fn tool_call_end(id: Option<&str>, arguments: Option<&str>) -> String {
        let data = match id {
            Some(id) => json!({
                "type": "tool_call_end",
                "toolCall": { "id": id, "function": { "arguments": arguments.unwrap_or("") } }
            }),
            None => json!({ "type": "tool_call_end" }),
        };
        format!("event: chunk\ndata: {data}")
    }

    pub fn done() -> String {
        format!("event: chunk\ndata: {}", json!({ "type": "done" }))
    }

    pub fn error(message: &str) -> String {
        format!("event: error\ndata: {}", json!({ "error": message }))
    }
}
