//! Chat API transport trait and its HTTP implementation.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};

use crate::config::ClientConfig;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::protocol::{ChatRequest, ModelInfo, ModelList, StopRequest};
use crate::retry::{RetryPolicy, response_to_error};
use crate::sse::{SseDecoder, StreamEvent};

/// Decoded events of one streamed reply, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Boundary with the remote chat API.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the chat call and return its event stream once the response
    /// headers arrived.
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream>;

    /// Ask the server to stop generating for `session_id`.
    async fn stop(&self, session_id: &str) -> Result<()>;

    /// Fetch the models offered by the API.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// HTTP transport with a single retry policy shared by every call site.
pub struct HttpChatClient {
    client: Client,
    config: ClientConfig,
    retry: RetryPolicy,
}

impl HttpChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&config)?,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Send with retries; only failures before a successful status are retried.
    async fn send_with_retry<F>(&self, operation: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => response_to_error(response).await,
                Err(e) => AiError::from(e),
            };

            if !error.is_retryable() || attempt >= self.retry.max_retries {
                tracing::debug!(operation, attempt, error = %error, "Chat API request failed");
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry.delay_for(attempt, error.retry_after());
            tracing::warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying chat API request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let url = self.config.url(&self.config.chat_path);
        tracing::debug!(
            session_id = %request.session_id,
            history = request.history.len(),
            model = request.model.as_deref().unwrap_or("-"),
            "Opening chat stream"
        );

        let response = self
            .send_with_retry("chat", || self.client.post(&url).json(request))
            .await?;
        let mut byte_stream = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AiError::Network(format!("Stream error: {e}")));
                        return;
                    }
                };

                for event in decoder.push(&chunk) {
                    yield Ok(event);
                }
            }

            // The last line may lack a trailing newline after an interrupted connection.
            for event in decoder.finish() {
                yield Ok(event);
            }
        }))
    }

    async fn stop(&self, session_id: &str) -> Result<()> {
        let body = StopRequest {
            session_id: session_id.to_string(),
        };
        let response = self
            .client
            .post(self.config.url(&self.config.stop_path))
            .timeout(self.request_timeout())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response).await);
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.config.url(&self.config.models_path);
        let response = self
            .send_with_retry("models", || {
                self.client.get(&url).timeout(self.request_timeout())
            })
            .await?;

        let body = response.text().await?;
        let list: ModelList = serde_json::from_str(&body)
            .map_err(|e| AiError::Parse(format!("invalid model list: {e}")))?;
        Ok(list.models)
    }
}
