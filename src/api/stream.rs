use super::logging::WireLog;
use crate::types::{normalize_frame, TurnEvent};

/// Incremental SSE framing for the chat stream.
///
/// Bytes are buffered until a blank line closes a frame so multi-byte UTF-8
/// sequences split across reads decode intact.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a frame terminator.
    scanned: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<TurnEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();
        let mut start = 0;
        // Back up one byte: the terminator may straddle the previous read.
        let mut from = self.scanned.saturating_sub(1);

        while let Some(end) = find_frame_end(&self.buffer[from..]) {
            let terminator = from + end;
            let frame = String::from_utf8_lossy(&self.buffer[start..terminator]).into_owned();
            if let Some(event) = decode_frame(&frame) {
                events.push(event);
            }
            start = terminator + 2;
            from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len();

        events
    }

    /// Decode whatever is left once the transport reaches EOF.
    pub fn finish(&mut self) -> Vec<TurnEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let frame = String::from_utf8_lossy(&rest);
        if frame.trim().is_empty() {
            return Vec::new();
        }
        decode_frame(&frame).into_iter().collect()
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn decode_frame(frame: &str) -> Option<TurnEvent> {
    let mut event_type = None;
    let mut data: Option<String> = None;

    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        }
    }

    let (Some(event_type), Some(data)) = (event_type, data) else {
        tracing::debug!(frame, "skipping SSE frame without event type or data");
        return None;
    };

    match normalize_frame(&event_type, &data) {
        Ok(Some(event)) => Some(event),
        Ok(None) => None,
        Err(error) => {
            tracing::warn!(%error, event_type = %event_type, "dropping undecodable SSE frame");
            WireLog::from_env().rejected_frame(&event_type, &data, &error);
            None
        }
    }
}
