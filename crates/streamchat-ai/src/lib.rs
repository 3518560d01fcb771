//! StreamChat AI - client side of a streaming chat API
//!
//! - [`HttpChatClient`] talks to the remote API with one retry policy
//! - [`SseDecoder`] turns the `data:` stream into [`StreamEvent`]s
//! - [`StreamAssembler`] grows the reply and tracks fenced code blocks
//! - [`CancellationController`] runs one request at a time and aborts it on demand

pub mod assembler;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
mod http_client;
pub mod protocol;
pub mod retry;
pub mod sse;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use assembler::{AssemblerOutput, StreamAssembler};
pub use client::{ChatTransport, EventStream, HttpChatClient};
pub use config::ClientConfig;
pub use controller::{
    AbortHandle, CancellationController, RequestHandle, RequestState, TurnEvent, TurnOutcome,
};
pub use error::{AiError, Result};
pub use protocol::{ChatRequest, HistoryMessage, ModelInfo, ModelList, Role};
pub use retry::RetryPolicy;
pub use sse::{SseDecoder, StreamEvent};
