pub mod chat;
pub mod models;
pub mod send;
pub mod session;
pub mod utils;
