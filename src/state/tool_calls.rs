use crate::error::{ArgumentParseError, ProtocolViolation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    Done,
    /// The turn failed or was cancelled before the call completed.
    Error,
}

impl ToolCallStatus {
    pub fn is_running(self) -> bool {
        self == ToolCallStatus::Running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallEntry {
    pub id: String,
    pub name: String,
    /// Fragments in arrival order; not necessarily valid JSON until `Done`.
    pub arguments_raw: String,
    pub arguments_final: Option<Value>,
    pub parse_error: Option<String>,
    pub status: ToolCallStatus,
}

impl ToolCallEntry {
    fn new(id: &str, name: &str, seed: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments_raw: seed.to_string(),
            arguments_final: None,
            parse_error: None,
            status: ToolCallStatus::Running,
        }
    }

    /// Final arguments once settled, otherwise a best-effort parse of the
    /// partial text received so far.
    pub fn current_arguments(&self) -> Option<Value> {
        if self.arguments_final.is_some() {
            return self.arguments_final.clone();
        }
        serde_json::from_str(&self.arguments_raw).ok()
    }

    fn settle(&mut self, status: ToolCallStatus) {
        match parse_arguments(&self.arguments_raw) {
            Ok(value) => {
                self.arguments_final = Some(value);
                self.parse_error = None;
            }
            Err(error) => {
                tracing::debug!(tool_call_id = %self.id, %error, "keeping raw tool arguments");
                self.arguments_final = None;
                self.parse_error = Some(error.0);
            }
        }
        self.status = status;
    }
}

/// Parse settled tool arguments. Empty text means "no arguments".
pub fn parse_arguments(raw: &str) -> Result<Value, ArgumentParseError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    Ok(serde_json::from_str(raw)?)
}

/// Lifecycle of every tool call in one turn, keyed by tool-call id.
#[derive(Debug, Clone, Default)]
pub struct ToolCallTracker {
    entries: Vec<ToolCallEntry>,
    by_id: HashMap<String, usize>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn start(&mut self, id: &str, name: &str, seed: &str) -> Result<&ToolCallEntry, ProtocolViolation> {
        if self.by_id.contains_key(id) {
            return Err(ProtocolViolation::DuplicateToolCall(id.to_string()));
        }
        let index = self.entries.len();
        self.entries.push(ToolCallEntry::new(id, name, seed));
        self.by_id.insert(id.to_string(), index);
        Ok(&self.entries[index])
    }

    /// Append a fragment. No-op (returns `false`) for unknown or settled ids.
    pub fn append_args(&mut self, id: &str, fragment: &str) -> bool {
        match self.running_mut(id) {
            Some(entry) => {
                entry.arguments_raw.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Settle a running call as `Done`. A non-empty `final_override` replaces
    /// the accumulated fragments as the authoritative arguments.
    pub fn finish(&mut self, id: &str, final_override: Option<&str>) -> Option<&ToolCallEntry> {
        let entry = self.running_mut(id)?;
        if let Some(arguments) = final_override.filter(|args| !args.is_empty()) {
            entry.arguments_raw = arguments.to_string();
        }
        entry.settle(ToolCallStatus::Done);
        Some(&*entry)
    }

    /// Settle a running call as `Error`, keeping whatever arrived.
    pub fn interrupt(&mut self, id: &str) -> Option<&ToolCallEntry> {
        let entry = self.running_mut(id)?;
        entry.settle(ToolCallStatus::Error);
        Some(&*entry)
    }

    pub fn get(&self, id: &str) -> Option<&ToolCallEntry> {
        self.by_id.get(id).map(|index| &self.entries[*index])
    }

    /// Entries in start order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolCallEntry> {
        self.entries.iter()
    }

    fn running_mut(&mut self, id: &str) -> Option<&mut ToolCallEntry> {
        let index = *self.by_id.get(id)?;
        let entry = &mut self.entries[index];
        if entry.status.is_running() {
            Some(entry)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragments_accumulate_and_parse_on_finish() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "read_file", "").unwrap();
        assert!(tracker.append_args("t1", "{\"path\":"));
        assert_eq!(tracker.get("t1").unwrap().current_arguments(), None);
        assert!(tracker.append_args("t1", "\"a.md\"}"));

        let entry = tracker.finish("t1", None).unwrap();
        assert_eq!(entry.status, ToolCallStatus::Done);
        assert_eq!(entry.arguments_final, Some(json!({"path": "a.md"})));
        assert_eq!(entry.arguments_raw, "{\"path\":\"a.md\"}");
    }

    #[test]
    fn test_override_replaces_accumulated_arguments() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "write_file", "{\"pa").unwrap();
        let entry = tracker.finish("t1", Some("{\"path\":\"b.md\"}")).unwrap();
        assert_eq!(entry.arguments_final, Some(json!({"path": "b.md"})));
    }

    #[test]
    fn test_empty_override_keeps_accumulated_arguments() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "list_files", "{\"path\":\".\"}").unwrap();
        let entry = tracker.finish("t1", Some("")).unwrap();
        assert_eq!(entry.arguments_final, Some(json!({"path": "."})));
    }

    #[test]
    fn test_parse_failure_keeps_raw_text() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "edit_file", "{\"path\": oops").unwrap();
        let entry = tracker.finish("t1", None).unwrap();
        assert_eq!(entry.status, ToolCallStatus::Done);
        assert!(entry.arguments_final.is_none());
        assert!(entry.parse_error.is_some());
        assert_eq!(entry.arguments_raw, "{\"path\": oops");
    }

    #[test]
    fn test_empty_arguments_settle_to_empty_object() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "build", "").unwrap();
        let entry = tracker.finish("t1", None).unwrap();
        assert_eq!(entry.arguments_final, Some(json!({})));
    }

    #[test]
    fn test_events_after_done_are_ignored() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "build", "").unwrap();
        tracker.finish("t1", None).unwrap();

        assert!(!tracker.append_args("t1", "{}"));
        assert!(tracker.finish("t1", Some("{\"x\":1}")).is_none());
        assert!(tracker.interrupt("t1").is_none());
        assert_eq!(
            tracker.start("t1", "build", ""),
            Err(ProtocolViolation::DuplicateToolCall("t1".to_string()))
        );
        assert_eq!(tracker.get("t1").unwrap().arguments_final, Some(json!({})));
    }

    #[test]
    fn test_unknown_id_is_a_no_op() {
        let mut tracker = ToolCallTracker::new();
        assert!(!tracker.append_args("ghost", "{}"));
        assert!(tracker.finish("ghost", None).is_none());
        assert!(tracker.get("ghost").is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_interrupt_marks_error_with_best_effort_parse() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("t1", "read_file", "{\"path\":\"a").unwrap();
        let entry = tracker.interrupt("t1").unwrap();
        assert_eq!(entry.status, ToolCallStatus::Error);
        assert!(entry.arguments_final.is_none());
        assert_eq!(entry.arguments_raw, "{\"path\":\"a");
    }

    #[test]
    fn test_iteration_follows_start_order() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("b", "build", "").unwrap();
        tracker.start("a", "get_config", "").unwrap();
        let ids: Vec<_> = tracker.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(tracker.len(), 2);
    }
}
