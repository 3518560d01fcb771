//! Cancellation controller: binds one in-flight chat request to a token.
//!
//! A request moves `Idle -> Sending -> Streaming -> {Completed | Aborted | Failed}`.
//! The read loop runs on its own task and reports progress through a
//! [`RequestHandle`]. Cancellation is cooperative; it is observed at the next
//! chunk boundary and never retried.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::assembler::{AssemblerOutput, StreamAssembler};
use crate::client::ChatTransport;
use crate::error::{AiError, Result};
use crate::protocol::ChatRequest;
use crate::sse::StreamEvent;

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Completed | RequestState::Aborted | RequestState::Failed
        )
    }
}

/// Progress reported while a request runs.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    StateChanged(RequestState),
    Delta(AssemblerOutput),
}

/// Final result of a request.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Always a terminal state.
    pub state: RequestState,
    /// Full reply when completed, the partial reply otherwise.
    pub text: String,
    /// Set only for [`RequestState::Failed`].
    pub error: Option<AiError>,
}

impl TurnOutcome {
    /// Completed text, or the error that ended the request.
    pub fn into_result(self) -> Result<String> {
        match self.state {
            RequestState::Completed => Ok(self.text),
            RequestState::Aborted => Err(AiError::Aborted),
            _ => Err(self.error.unwrap_or_else(|| {
                AiError::InvalidState(format!("request ended as {:?}", self.state))
            })),
        }
    }
}

/// Cloneable trigger for cancelling a request from elsewhere, such as a
/// signal handler.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    /// Request cancellation. Idempotent; a no-op once the request finished.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle to one started request.
pub struct RequestHandle {
    session_id: String,
    abort: AbortHandle,
    state: watch::Receiver<RequestState>,
    events: mpsc::UnboundedReceiver<TurnEvent>,
    task: JoinHandle<TurnOutcome>,
}

impl RequestHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn state(&self) -> RequestState {
        *self.state.borrow()
    }

    /// Next progress event; `None` once the request reached a terminal state
    /// and every event was received.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.recv().await
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => TurnOutcome {
                state: RequestState::Failed,
                text: String::new(),
                error: Some(AiError::InvalidState(format!("request task failed: {e}"))),
            },
        }
    }
}

/// Starts requests one at a time and keeps a way to abort the active one.
pub struct CancellationController {
    transport: Arc<dyn ChatTransport>,
    active: Option<(watch::Receiver<RequestState>, AbortHandle)>,
}

impl CancellationController {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            active: None,
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Whether a started request has not reached a terminal state yet.
    ///
    /// A closed state channel means the request task is gone, even if it
    /// never reported a terminal state.
    pub fn is_busy(&self) -> bool {
        self.active.as_ref().is_some_and(|(state, _)| {
            state.has_changed().is_ok() && !state.borrow().is_terminal()
        })
    }

    /// Issue `request` and start reading its stream on a new task.
    ///
    /// Fails with [`AiError::InvalidState`] while another request is active.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, request: ChatRequest) -> Result<RequestHandle> {
        if self.is_busy() {
            return Err(AiError::InvalidState(
                "another request is already in flight".to_string(),
            ));
        }

        let token = CancellationToken::new();
        let abort = AbortHandle {
            token: token.clone(),
        };
        let (state_tx, state_rx) = watch::channel(RequestState::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session_id = request.session_id.clone();

        let reporter = Reporter { state_tx, event_tx };
        let task = tokio::spawn(run_request(
            self.transport.clone(),
            request,
            token,
            reporter,
        ));

        self.active = Some((state_rx.clone(), abort.clone()));

        Ok(RequestHandle {
            session_id,
            abort,
            state: state_rx,
            events: event_rx,
            task,
        })
    }

    /// Abort the active request, if any.
    pub fn abort_active(&self) {
        if let Some((_, abort)) = &self.active {
            abort.abort();
        }
    }
}

struct Reporter {
    state_tx: watch::Sender<RequestState>,
    event_tx: mpsc::UnboundedSender<TurnEvent>,
}

impl Reporter {
    fn set(&self, state: RequestState) {
        self.state_tx.send_replace(state);
        // The receiver may already be gone; the outcome is still returned by the task.
        let _ = self.event_tx.send(TurnEvent::StateChanged(state));
    }

    fn delta(&self, output: AssemblerOutput) {
        let _ = self.event_tx.send(TurnEvent::Delta(output));
    }
}

async fn run_request(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    token: CancellationToken,
    reporter: Reporter,
) -> TurnOutcome {
    let mut assembler = StreamAssembler::new();
    let session_id = request.session_id.clone();

    reporter.set(RequestState::Sending);
    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = transport.open_stream(&request) => Some(result),
    };

    let mut stream = match opened {
        None => return aborted(&transport, &session_id, &assembler, &reporter),
        Some(Err(error)) => return failed(error, &assembler, &reporter),
        Some(Ok(stream)) => stream,
    };

    reporter.set(RequestState::Streaming);
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return aborted(&transport, &session_id, &assembler, &reporter),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(StreamEvent::Fragment(fragment))) => match assembler.consume(&fragment) {
                Ok(output) => reporter.delta(output),
                Err(error) => return failed(error, &assembler, &reporter),
            },
            Some(Ok(StreamEvent::Done)) => break,
            Some(Err(error)) => return failed(error, &assembler, &reporter),
            None => {
                tracing::debug!(%session_id, "Stream closed without end sentinel");
                break;
            }
        }
    }

    match assembler.finalize() {
        Ok(text) => {
            tracing::info!(%session_id, chars = text.chars().count(), "Reply completed");
            reporter.set(RequestState::Completed);
            TurnOutcome {
                state: RequestState::Completed,
                text,
                error: None,
            }
        }
        Err(error) => failed(error, &assembler, &reporter),
    }
}

fn aborted(
    transport: &Arc<dyn ChatTransport>,
    session_id: &str,
    assembler: &StreamAssembler,
    reporter: &Reporter,
) -> TurnOutcome {
    tracing::info!(%session_id, "Request aborted");

    // Stop notification is fire-and-forget.
    let transport = transport.clone();
    let stop_session = session_id.to_string();
    tokio::spawn(async move {
        if let Err(error) = transport.stop(&stop_session).await {
            tracing::warn!(session_id = %stop_session, %error, "Stop request failed");
        }
    });

    reporter.set(RequestState::Aborted);
    TurnOutcome {
        state: RequestState::Aborted,
        text: assembler.text().to_string(),
        error: None,
    }
}

fn failed(error: AiError, assembler: &StreamAssembler, reporter: &Reporter) -> TurnOutcome {
    tracing::warn!(%error, "Request failed");
    reporter.set(RequestState::Failed);
    TurnOutcome {
        state: RequestState::Failed,
        text: assembler.text().to_string(),
        error: Some(error),
    }
}
