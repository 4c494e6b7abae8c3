use crate::types::ChatRequest;
use crate::util::parse_bool_flag;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const WIRE_LOG_ENV: &str = "OPENDOC_WIRE_LOG";

/// Destination for wire traces, chosen by `OPENDOC_WIRE_LOG`.
///
/// Unset or a false flag disables tracing, a true flag routes records through
/// `tracing` at debug level, and any other value names a file to append to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireLog {
    Off,
    Tracing,
    File(PathBuf),
}

impl WireLog {
    pub fn from_env() -> Self {
        std::env::var(WIRE_LOG_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or(WireLog::Off)
    }

    fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return WireLog::Off;
        }
        match parse_bool_flag(value) {
            Some(true) => WireLog::Tracing,
            Some(false) => WireLog::Off,
            None => WireLog::File(PathBuf::from(value)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != WireLog::Off
    }

    pub fn request(&self, url: &str, request: &ChatRequest) {
        if self.is_enabled() {
            self.write(&request_record(url, request));
        }
    }

    pub fn rejected_status(&self, url: &str, status: u16, body: &str) {
        if self.is_enabled() {
            self.write(&status_record(url, status, body));
        }
    }

    pub fn rejected_frame(&self, event_type: &str, data: &str, error: &serde_json::Error) {
        if self.is_enabled() {
            self.write(&frame_record(event_type, data, error));
        }
    }

    fn write(&self, record: &str) {
        match self {
            WireLog::Off => {}
            WireLog::Tracing => tracing::debug!(target: "opendoc_chat::wire", "{record}"),
            WireLog::File(path) => {
                if let Err(error) = append_record(path, record) {
                    tracing::debug!(path = %path.display(), %error, "wire log unavailable");
                    tracing::debug!(target: "opendoc_chat::wire", "{record}");
                }
            }
        }
    }
}

fn request_record(url: &str, request: &ChatRequest) -> String {
    let body = serde_json::to_string(request).unwrap_or_else(|_| "<unserializable>".to_string());
    format!(
        "-> POST {url} provider={} session={} message_chars={}\n   {body}\n",
        request.provider,
        request.session_id.as_deref().unwrap_or("<new>"),
        request.message.chars().count(),
    )
}

fn status_record(url: &str, status: u16, body: &str) -> String {
    let body = if body.trim().is_empty() { "<empty body>" } else { body.trim() };
    format!("<- HTTP {status} from {url}\n   {body}\n")
}

// Rejected frames are written back in SSE form so they can be replayed.
fn frame_record(event_type: &str, data: &str, error: &serde_json::Error) -> String {
    let mut record = format!("<- rejected frame: {error}\n   event: {event_type}\n");
    for line in data.split('\n') {
        record.push_str("   data: ");
        record.push_str(line);
        record.push('\n');
    }
    record
}

fn append_record(path: &Path, record: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(record.as_bytes())
}
