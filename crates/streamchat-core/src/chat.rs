//! Command-driven chat front end shared by the CLI and tests.
//!
//! [`StreamingChatSession`] owns the session store, the request controller
//! and the model catalog. Front ends send [`Command`]s and watch replies grow
//! through a [`TurnObserver`]; they never touch the store directly.

use std::sync::Arc;

use serde::Serialize;
use streamchat_ai::{
    AbortHandle, AssemblerOutput, CancellationController, ChatRequest, ChatTransport,
    HistoryMessage, RequestState, TurnEvent, TurnOutcome,
};
use tracing::{debug, warn};

use crate::catalog::{ModelCatalog, ModelListing};
use crate::config::ChatSettings;
use crate::error::{Result, SessionError};
use crate::models::{ChatMessage, ChatRole, ChatSession};
use crate::store::SessionStore;

/// Prefix of the status line left in place of a failed reply.
pub const FAILURE_NOTICE: &str = "Sorry, an error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewChat,
    Switch(String),
    Delete(String),
    SelectModel(String),
    Send(String),
    /// Re-issue the last user message of the active session when it never
    /// got a reply.
    Resend,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    SessionCreated { session_id: String },
    Switched { session_id: String },
    Deleted { deleted: String, active: String },
    ModelSelected { model: String },
    Turn(TurnSummary),
}

/// How one request ended and what was kept.
#[derive(Debug, Clone, Serialize)]
pub struct TurnSummary {
    pub session_id: String,
    pub state: RequestState,
    /// Reply text that was frozen into the session, if any.
    pub content: String,
    pub error: Option<String>,
}

/// Hooks for presenting a reply while it streams.
pub trait TurnObserver {
    /// Called once the request is started; the handle aborts it.
    fn on_started(&mut self, _abort: &AbortHandle) {}

    fn on_state(&mut self, _state: RequestState) {}

    fn on_delta(&mut self, _output: &AssemblerOutput) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TurnObserver for NullObserver {}

pub struct StreamingChatSession {
    store: SessionStore,
    controller: CancellationController,
    catalog: ModelCatalog,
    settings: ChatSettings,
}

impl StreamingChatSession {
    /// Chat over `transport` with an in-memory model catalog.
    pub fn new(
        store: SessionStore,
        transport: Arc<dyn ChatTransport>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            catalog: ModelCatalog::new(transport.clone()),
            controller: CancellationController::new(transport),
            settings,
        }
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn sessions(&self) -> Vec<&ChatSession> {
        self.store.list_sessions()
    }

    pub fn active(&self) -> Result<&ChatSession> {
        self.store.active_session()
    }

    /// Saved selection, else the configured default.
    pub fn selected_model(&self) -> Option<String> {
        self.catalog
            .selected_model()
            .or_else(|| self.settings.default_model.clone())
    }

    /// Current model list; a saved selection it no longer offers is
    /// replaced by its first model.
    pub async fn models(&mut self) -> Result<ModelListing> {
        let listing = self.catalog.models().await;
        self.catalog.reconcile_selection(&listing.models)?;
        Ok(listing)
    }

    /// Refetch the model list and repair a selection that is no longer offered.
    pub async fn refresh_models(&mut self) -> Result<ModelListing> {
        let listing = self.catalog.refresh().await;
        self.catalog.reconcile_selection(&listing.models)?;
        Ok(listing)
    }

    pub async fn dispatch(
        &mut self,
        command: Command,
        observer: &mut dyn TurnObserver,
    ) -> Result<CommandOutcome> {
        debug!(?command, "Dispatching chat command");
        match command {
            Command::NewChat => {
                let session_id = self.store.create_session()?.id.clone();
                Ok(CommandOutcome::SessionCreated { session_id })
            }
            Command::Switch(session_id) => {
                self.store.switch_session(&session_id)?;
                Ok(CommandOutcome::Switched { session_id })
            }
            Command::Delete(session_id) => {
                self.store.delete_session(&session_id)?;
                Ok(CommandOutcome::Deleted {
                    deleted: session_id,
                    active: self.store.active_id().to_string(),
                })
            }
            Command::SelectModel(model) => {
                self.select_model(&model).await?;
                Ok(CommandOutcome::ModelSelected { model })
            }
            Command::Send(text) => self.send(&text, observer).await.map(CommandOutcome::Turn),
            Command::Resend => self.resend(observer).await.map(CommandOutcome::Turn),
        }
    }

    pub async fn select_model(&mut self, model_id: &str) -> Result<()> {
        let listing = self.catalog.models().await;
        self.catalog.select_model(model_id, &listing.models)
    }

    /// Append `text` to the active session and stream the reply.
    pub async fn send(
        &mut self,
        text: &str,
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnSummary> {
        let input = text.trim();
        if input.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let session_id = self.store.active_id().to_string();
        if self.store.is_turn_in_progress(&session_id) {
            return Err(SessionError::TurnInProgress(session_id));
        }

        let history = self.store.history(&session_id)?;
        self.store
            .append_message(&session_id, ChatMessage::user(input))?;
        self.run_turn(session_id, input.to_string(), history, observer)
            .await
    }

    /// Re-issue the trailing unanswered user message of the active session.
    pub async fn resend(&mut self, observer: &mut dyn TurnObserver) -> Result<TurnSummary> {
        let session_id = self.store.active_id().to_string();
        let mut history = self.store.history(&session_id)?;
        let input = match history.last() {
            Some(last) if last.role == streamchat_ai::Role::User => last.content.clone(),
            _ => return Err(SessionError::NothingToResend(session_id)),
        };
        history.pop();
        self.run_turn(session_id, input, history, observer).await
    }

    async fn run_turn(
        &mut self,
        session_id: String,
        user_input: String,
        history: Vec<HistoryMessage>,
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnSummary> {
        if self.catalog.selected_model().is_some() {
            self.models().await?;
        }
        let model = self.selected_model();
        self.store.set_session_model(&session_id, model.clone())?;

        let request = ChatRequest::new(session_id.clone(), user_input)
            .with_history(history)
            .with_model(model)
            .with_system_prompt(self.settings.system_prompt.clone());

        self.store.begin_turn(&session_id)?;
        let mut handle = match self.controller.start(request) {
            Ok(handle) => handle,
            Err(error) => {
                self.store.abandon_turn(&session_id, None)?;
                return Err(error.into());
            }
        };
        observer.on_started(&handle.abort_handle());

        while let Some(event) = handle.next_event().await {
            match event {
                TurnEvent::StateChanged(state) => observer.on_state(state),
                TurnEvent::Delta(output) => {
                    let text = &output.accumulated_text;
                    if let Err(error) = self.store.update_draft(&session_id, text) {
                        warn!(%session_id, %error, "Dropping reply delta");
                    }
                    observer.on_delta(&output);
                }
            }
        }

        let outcome = handle.wait().await;
        self.apply_outcome(session_id, outcome)
    }

    fn apply_outcome(&mut self, session_id: String, outcome: TurnOutcome) -> Result<TurnSummary> {
        let TurnOutcome { state, text, error } = outcome;
        let mut summary = TurnSummary {
            session_id,
            state,
            content: String::new(),
            error: None,
        };

        match state {
            RequestState::Completed | RequestState::Aborted if !text.is_empty() => {
                self.store.finish_turn(&summary.session_id, text.clone())?;
                summary.content = text;
            }
            RequestState::Completed | RequestState::Aborted => {
                self.store.abandon_turn(&summary.session_id, None)?;
            }
            _ => {
                let message = error
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| format!("request ended as {state:?}"));
                self.store.abandon_turn(
                    &summary.session_id,
                    Some(format!("{FAILURE_NOTICE}: {message}")),
                )?;
                summary.error = Some(message);
            }
        }
        Ok(summary)
    }
}

/// Whether the last visible message of `session` is a user message left
/// without a reply.
pub fn awaiting_reply(session: &ChatSession) -> bool {
    session
        .messages
        .iter()
        .rev()
        .find(|message| !message.is_status)
        .is_some_and(|message| message.role == ChatRole::User)
}
