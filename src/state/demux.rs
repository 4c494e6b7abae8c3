use super::segment::{Segment, SegmentHandle};
use super::turn::{Turn, TurnId, TurnStatus};
use super::update::{emit_turn_update, TurnUpdate, TurnUpdateSender};
use crate::error::{ProtocolViolation, TransportError};
use crate::tool_preview::extract_detail;
use crate::types::TurnEvent;
use crate::ui::scheduler::RenderScheduler;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct ActiveToolCall {
    id: String,
    handle: SegmentHandle,
}

/// Routes one turn's events into its segment store and tool-call tracker.
///
/// Events are applied strictly in arrival order. Protocol violations are
/// logged and dropped; once the turn reaches a terminal status every later
/// event is ignored.
pub struct StreamDemultiplexer {
    turn: Turn,
    scheduler: RenderScheduler,
    active_tool_call: Option<ActiveToolCall>,
    updates: Option<TurnUpdateSender>,
}

impl StreamDemultiplexer {
    pub fn new(id: TurnId, render_window: Duration, updates: Option<TurnUpdateSender>) -> Self {
        Self {
            turn: Turn::new(id),
            scheduler: RenderScheduler::new(render_window),
            active_tool_call: None,
            updates,
        }
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn into_turn(self) -> Turn {
        self.turn
    }

    pub fn is_finished(&self) -> bool {
        self.turn.status().is_terminal()
    }

    /// Segment currently receiving content.
    pub fn active_segment(&self) -> Option<SegmentHandle> {
        self.turn.segments.active()
    }

    /// Segment of the running tool call, the target of argument fragments.
    pub fn active_tool_call(&self) -> Option<SegmentHandle> {
        self.active_tool_call.as_ref().map(|call| call.handle)
    }

    pub fn next_render_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    pub fn apply(&mut self, event: TurnEvent, now: Instant) {
        if self.is_finished() {
            tracing::debug!(
                turn = %self.turn.id(),
                event = event.kind(),
                "ignoring event after turn finished"
            );
            return;
        }

        match event {
            TurnEvent::Session { session_id } => self.on_session(session_id),
            TurnEvent::TextDelta { content } => self.on_text_delta(&content, now),
            TurnEvent::ToolCallStart {
                tool_call_id,
                tool_name,
                initial_arguments,
            } => self.on_tool_call_start(tool_call_id, &tool_name, &initial_arguments),
            TurnEvent::ToolCallArgsDelta {
                tool_call_id,
                fragment,
            } => self.on_tool_call_args(tool_call_id.as_deref(), &fragment),
            TurnEvent::ToolCallEnd {
                tool_call_id,
                final_arguments,
            } => self.on_tool_call_end(tool_call_id.as_deref(), final_arguments.as_deref()),
            TurnEvent::Error { message } => self.finalize(TurnStatus::Error, Some(message)),
            TurnEvent::StreamEnd => self.finalize(TurnStatus::Complete, None),
        }
    }

    /// Render the active text segment if its debounce deadline has passed.
    /// A due render whose segment is no longer the open text segment is dropped.
    pub fn poll_render(&mut self, now: Instant) -> bool {
        let Some(target) = self.scheduler.take_due(now) else {
            return false;
        };
        if self.turn.segments.active_text() != Some(target) {
            tracing::debug!(turn = %self.turn.id(), segment = target.position(), "dropping stale render");
            return false;
        }
        self.render_text(target);
        true
    }

    /// Render the pending text now with its full content. Safe to call any
    /// number of times; a no-op when nothing is pending.
    pub fn flush_render(&mut self) {
        let Some(target) = self.scheduler.pending_target() else {
            return;
        };
        self.scheduler.clear();
        if self.turn.segments.active_text() == Some(target) {
            self.render_text(target);
        }
    }

    /// The transport failed; abort with the error as the terminal diagnostic.
    pub fn fail_transport(&mut self, error: &TransportError) {
        if self.is_finished() {
            return;
        }
        tracing::warn!(turn = %self.turn.id(), %error, "chat transport failed");
        self.finalize(TurnStatus::Error, Some(error.display_message()));
    }

    /// User cancellation: seal what exists and stop. Idempotent.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        self.finalize(TurnStatus::Cancelled, None);
    }

    fn on_session(&mut self, session_id: String) {
        if self.turn.session_id().is_some() {
            tracing::debug!(turn = %self.turn.id(), "session already bound; ignoring");
            return;
        }
        if !self.turn.segments.is_empty() {
            self.violation(ProtocolViolation::LateSession);
        }
        self.turn.bind_session(session_id.clone());
        self.emit(TurnUpdate::SessionBound { session_id });
    }

    fn on_text_delta(&mut self, content: &str, now: Instant) {
        if content.is_empty() {
            return;
        }
        if let Some(call) = &self.active_tool_call {
            self.violation(ProtocolViolation::TextDuringToolCall(call.id.clone()));
            self.end_active_tool_call(None);
        }

        let handle = match self.turn.segments.active_text() {
            Some(handle) => handle,
            None => self.open_text_segment(),
        };
        self.turn.segments.append_text(handle, content);
        self.scheduler.note_delta(handle, now);
    }

    fn on_tool_call_start(&mut self, tool_call_id: String, tool_name: &str, seed: &str) {
        let tool_call_id = if tool_call_id.is_empty() {
            format!("{}-call-{}", self.turn.id(), self.turn.tool_calls.len() + 1)
        } else {
            tool_call_id
        };
        if self.turn.tool_calls.get(&tool_call_id).is_some() {
            self.violation(ProtocolViolation::DuplicateToolCall(tool_call_id));
            return;
        }
        if let Some(running) = &self.active_tool_call {
            self.violation(ProtocolViolation::OverlappingToolCall {
                running: running.id.clone(),
                next: tool_call_id.clone(),
            });
            self.end_active_tool_call(None);
        }

        self.seal_active_segment();
        let detail = match self.turn.tool_calls.start(&tool_call_id, tool_name, seed) {
            Ok(entry) => extract_detail(entry),
            Err(violation) => {
                self.violation(violation);
                return;
            }
        };
        let handle = self.turn.segments.open_tool_call(&tool_call_id, tool_name);
        self.emit_opened(handle);
        if !seed.is_empty() {
            self.emit(TurnUpdate::ToolCallArgs {
                handle,
                fragment: seed.to_string(),
                detail,
            });
        }
        self.active_tool_call = Some(ActiveToolCall {
            id: tool_call_id,
            handle,
        });
    }

    fn on_tool_call_args(&mut self, tool_call_id: Option<&str>, fragment: &str) {
        let Some(active) = self.active_tool_call.clone() else {
            self.violation(ProtocolViolation::ArgumentsWithoutActiveCall);
            return;
        };
        if let Some(got) = tool_call_id.filter(|id| *id != active.id) {
            self.violation(ProtocolViolation::ArgumentsForInactiveCall {
                active: active.id,
                got: got.to_string(),
            });
            return;
        }
        if fragment.is_empty() || !self.turn.tool_calls.append_args(&active.id, fragment) {
            return;
        }

        let detail = self
            .turn
            .tool_calls
            .get(&active.id)
            .and_then(extract_detail);
        self.emit(TurnUpdate::ToolCallArgs {
            handle: active.handle,
            fragment: fragment.to_string(),
            detail,
        });
    }

    fn on_tool_call_end(&mut self, tool_call_id: Option<&str>, final_arguments: Option<&str>) {
        let Some(active) = &self.active_tool_call else {
            self.violation(ProtocolViolation::EndWithoutActiveCall);
            return;
        };
        if let Some(got) = tool_call_id.filter(|id| *id != active.id) {
            self.violation(ProtocolViolation::EndForInactiveCall {
                active: active.id.clone(),
                got: got.to_string(),
            });
            return;
        }
        self.end_active_tool_call(final_arguments);
    }

    /// Settle the running call as done, seal its segment and open the empty
    /// text segment that receives whatever follows.
    fn end_active_tool_call(&mut self, final_arguments: Option<&str>) {
        let Some(active) = self.active_tool_call.take() else {
            return;
        };
        if let Some(entry) = self.turn.tool_calls.finish(&active.id, final_arguments) {
            let entry = entry.clone();
            self.emit(TurnUpdate::ToolCallSettled {
                handle: active.handle,
                entry,
            });
        }
        self.seal_active_segment();
        self.open_text_segment();
    }

    fn finalize(&mut self, status: TurnStatus, diagnostic: Option<String>) {
        if let Some(active) = self.active_tool_call.take() {
            let settled = match status {
                TurnStatus::Complete => self.turn.tool_calls.finish(&active.id, None),
                _ => self.turn.tool_calls.interrupt(&active.id),
            };
            if let Some(entry) = settled {
                let entry = entry.clone();
                self.emit(TurnUpdate::ToolCallSettled {
                    handle: active.handle,
                    entry,
                });
            }
        }

        self.seal_active_segment();
        self.scheduler.clear();
        self.turn.finish(status, diagnostic.clone());
        tracing::debug!(turn = %self.turn.id(), ?status, "turn finished");
        self.emit(TurnUpdate::Finished { status, diagnostic });
    }

    fn open_text_segment(&mut self) -> SegmentHandle {
        self.seal_active_segment();
        let handle = self.turn.segments.open_text();
        self.emit_opened(handle);
        handle
    }

    /// Seal the active segment. Text gets its final exact render first and
    /// any queued render for it is cancelled.
    fn seal_active_segment(&mut self) {
        if let Some(handle) = self.turn.segments.active_text() {
            if self.scheduler.pending_target() == Some(handle) {
                self.flush_render();
            } else {
                let has_content = self
                    .turn
                    .segments
                    .get(handle)
                    .and_then(Segment::as_text)
                    .is_some_and(|text| !text.content.is_empty());
                // Sealing always ends on an exact render, even after a timed one.
                if has_content {
                    self.render_text(handle);
                }
            }
        }

        if let Some(handle) = self.turn.segments.seal_active() {
            let empty_eligible = self
                .turn
                .segments
                .get(handle)
                .is_some_and(Segment::is_empty_eligible);
            self.emit(TurnUpdate::SegmentSealed {
                handle,
                empty_eligible,
            });
        }
    }

    fn render_text(&self, handle: SegmentHandle) {
        if let Some(text) = self.turn.segments.get(handle).and_then(Segment::as_text) {
            self.emit(TurnUpdate::TextRender {
                handle,
                content: text.content.clone(),
            });
        }
    }

    fn emit_opened(&self, handle: SegmentHandle) {
        if let Some(segment) = self.turn.segments.get(handle) {
            self.emit(TurnUpdate::SegmentOpened {
                handle,
                segment: segment.clone(),
            });
        }
    }

    fn emit(&self, update: TurnUpdate) {
        emit_turn_update(self.updates.as_ref(), update);
    }

    fn violation(&self, violation: ProtocolViolation) {
        tracing::warn!(turn = %self.turn.id(), %violation, "protocol violation; event dropped");
    }
}
