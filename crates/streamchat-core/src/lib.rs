//! StreamChat Core - sessions, model selection and the chat command loop
//!
//! - [`SessionStore`] owns sessions and persists them through a [`SessionBackend`]
//! - [`ModelCatalog`] caches the models endpoint and remembers the selection
//! - [`StreamingChatSession`] turns [`Command`]s into requests and stored replies

pub mod backend;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod paths;
pub mod store;

pub use backend::{MemoryBackend, RedbSessionBackend, SessionBackend, StoreSnapshot};
pub use catalog::{CatalogSource, MODEL_CACHE_TTL, ModelCatalog, ModelListing, default_models};
pub use chat::{
    Command, CommandOutcome, NullObserver, StreamingChatSession, TurnObserver, TurnSummary,
};
pub use config::ChatSettings;
pub use error::{Result, SessionError};
pub use models::{ChatMessage, ChatRole, ChatSession, ChatSessionSummary};
pub use store::SessionStore;
