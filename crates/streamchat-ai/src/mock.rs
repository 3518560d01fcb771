//! Deterministic transport for tests, driven by a scripted reply.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{ChatTransport, EventStream};
use crate::error::{AiError, Result};
use crate::protocol::{ChatRequest, ModelInfo};
use crate::sse::StreamEvent;

/// One scripted step of a streamed reply.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Fragment(String),
    Done,
    /// Yield a network error.
    Error(String),
    /// Sleep before the next step.
    Delay(u64),
    /// Never produce another item.
    Hang,
}

impl ScriptStep {
    pub fn fragment(text: impl Into<String>) -> Self {
        ScriptStep::Fragment(text.into())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    requests: Vec<ChatRequest>,
    stops: Vec<String>,
}

/// A transport replaying the same script for every request.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Vec<ScriptStep>,
    open_error: Option<(u16, String)>,
    models: Option<Vec<ModelInfo>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Every request fails with the given HTTP status before streaming.
    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            open_error: Some((status, message.into())),
            ..Self::default()
        }
    }

    /// Serve `models` from the models endpoint; without this it fails.
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.lock().stops.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream> {
        self.lock().requests.push(request.clone());

        if let Some((status, message)) = &self.open_error {
            return Err(AiError::Http {
                status: *status,
                message: message.clone(),
                retry_after_secs: None,
            });
        }

        let script = self.script.clone();
        Ok(Box::pin(async_stream::stream! {
            for step in script {
                match step {
                    ScriptStep::Fragment(text) => yield Ok(StreamEvent::Fragment(text)),
                    ScriptStep::Done => yield Ok(StreamEvent::Done),
                    ScriptStep::Error(message) => yield Err(AiError::Network(message)),
                    ScriptStep::Delay(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
        }))
    }

    async fn stop(&self, session_id: &str) -> Result<()> {
        self.lock().stops.push(session_id.to_string());
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.models
            .clone()
            .ok_or_else(|| AiError::Network("models endpoint unavailable".to_string()))
    }
}
