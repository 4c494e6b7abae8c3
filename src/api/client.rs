use super::logging::WireLog;
use crate::config::Config;
use crate::error::TransportError;
use crate::types::ChatRequest;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

const CHAT_PATH: &str = "/api/chat";
const DEFAULT_FAILURE_MESSAGE: &str = "Chat failed";

/// Opens one server-pushed event stream per submitted message.
pub trait ChatTransport: Send + Sync {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<ByteStream, TransportError>>;
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    chat_url: String,
    wire_log: WireLog,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url: chat_url(&config.base_url),
            wire_log: WireLog::from_env(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub async fn create_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        self.wire_log.request(&self.chat_url, request);

        let response = self
            .http
            .post(&self.chat_url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| map_request_error(error, &self.chat_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.wire_log.rejected_status(&self.chat_url, status.as_u16(), &body);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: failure_message(&body),
            });
        }

        tracing::debug!(url = %self.chat_url, "chat stream opened");
        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|error| TransportError::Stream(error.to_string())));
        Ok(Box::pin(stream))
    }
}

impl ChatTransport for ChatClient {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<ByteStream, TransportError>> {
        Box::pin(self.create_stream(request))
    }
}

fn chat_url(base_url: &str) -> String {
    format!("{}{CHAT_PATH}", base_url.trim().trim_end_matches('/'))
}

fn map_request_error(error: reqwest::Error, request_url: &str) -> TransportError {
    let message = if error.is_connect() {
        format!("could not connect ({error})")
    } else if error.is_timeout() {
        format!("timed out ({error})")
    } else {
        error.to_string()
    };
    TransportError::Request {
        url: request_url.to_string(),
        message,
    }
}

/// Error text from a failed chat response: the JSON `error` field when present.
pub(crate) fn failure_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_joins_base_without_double_slash() {
        assert_eq!(
            chat_url("http://127.0.0.1:4000/"),
            "http://127.0.0.1:4000/api/chat"
        );
        assert_eq!(
            chat_url(" https://docs.example.com "),
            "https://docs.example.com/api/chat"
        );
    }

    #[test]
    fn test_failure_message_prefers_json_error_field() {
        assert_eq!(failure_message(r#"{"error":"No API key"}"#), "No API key");
        assert_eq!(failure_message(r#"{"error":"  "}"#), "Chat failed");
        assert_eq!(failure_message("<html>502</html>"), "Chat failed");
        assert_eq!(failure_message(""), "Chat failed");
    }
}
