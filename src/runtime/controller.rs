use super::driver::drive_turn;
use crate::api::ChatTransport;
use crate::config::{Config, Provider};
use crate::error::ControllerError;
use crate::state::{StreamDemultiplexer, Turn, TurnId, TurnStatus, TurnUpdate};
use crate::types::ChatRequest;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Streaming,
    Complete,
    Error,
    Cancelled,
}

impl From<TurnStatus> for ControllerState {
    fn from(status: TurnStatus) -> Self {
        match status {
            TurnStatus::Streaming => ControllerState::Streaming,
            TurnStatus::Complete => ControllerState::Complete,
            TurnStatus::Error => ControllerState::Error,
            TurnStatus::Cancelled => ControllerState::Cancelled,
        }
    }
}

/// A submitted turn: its update feed, live status and final result.
pub struct TurnHandle {
    id: TurnId,
    cancel: CancellationToken,
    status: watch::Receiver<TurnStatus>,
    updates: mpsc::UnboundedReceiver<TurnUpdate>,
    task: JoinHandle<Turn>,
}

impl TurnHandle {
    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn status(&self) -> TurnStatus {
        *self.status.borrow()
    }

    /// Stop the turn. Idempotent, and a no-op once the turn has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next surface update; `None` once the turn has finished, every update
    /// has been delivered and the controller has settled (its state and
    /// session id already reflect this turn).
    pub async fn next_update(&mut self) -> Option<TurnUpdate> {
        self.updates.recv().await
    }

    pub async fn wait(self) -> Result<Turn, JoinError> {
        self.task.await
    }
}

/// Owns the conversation with the workbench: at most one streaming turn at a
/// time, and the session id that ties consecutive turns together.
pub struct TurnController<T: ChatTransport + 'static> {
    transport: Arc<T>,
    provider: Provider,
    render_window: Duration,
    next_turn: AtomicU64,
    state: Arc<watch::Sender<ControllerState>>,
    session_id: Arc<Mutex<Option<String>>>,
}

impl<T: ChatTransport + 'static> TurnController<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        let (state, _) = watch::channel(ControllerState::Idle);
        Self {
            transport: Arc::new(transport),
            provider: config.provider,
            render_window: config.render_debounce,
            next_turn: AtomicU64::new(1),
            state: Arc::new(state),
            session_id: Arc::default(),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Session id bound by the most recent turn, sent with the next request.
    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Forget the server-side conversation; the next turn starts a new one.
    pub fn reset_session(&self) {
        *self
            .session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Start a turn for `message`. Must be called from within a tokio runtime.
    pub fn submit(&self, message: impl Into<String>) -> Result<TurnHandle, ControllerError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if *state == ControllerState::Streaming {
                return false;
            }
            *state = ControllerState::Streaming;
            accepted = true;
            true
        });
        if !accepted {
            return Err(ControllerError::Busy);
        }

        let id = TurnId(self.next_turn.fetch_add(1, Ordering::Relaxed));
        let request = ChatRequest {
            message,
            session_id: self.session_id(),
            provider: self.provider.as_str().to_string(),
        };
        tracing::debug!(turn = %id, session = ?request.session_id, "submitting turn");

        let (update_tx, updates) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(TurnStatus::Streaming);
        let demux = StreamDemultiplexer::new(id, self.render_window, Some(update_tx));
        let cancel = CancellationToken::new();

        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let session_slot = Arc::clone(&self.session_id);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let demux = drive_turn(transport.as_ref(), request, demux, token).await;
            let turn = demux.turn();
            if let Some(session_id) = turn.session_id() {
                *session_slot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session_id.to_string());
            }
            status_tx.send_replace(turn.status());
            state.send_replace(ControllerState::from(turn.status()));
            tracing::debug!(turn = %turn.id(), status = ?turn.status(), "turn settled");
            // Settled state is visible before the update feed closes.
            demux.into_turn()
        });

        Ok(TurnHandle {
            id,
            cancel,
            status,
            updates,
            task,
        })
    }

    /// Cancel `handle`'s turn. Same as [`TurnHandle::cancel`].
    pub fn cancel(&self, handle: &TurnHandle) {
        handle.cancel();
    }
}
