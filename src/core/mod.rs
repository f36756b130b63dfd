pub mod chat_stream;
pub mod config;
pub mod errors;
pub mod history_cache;
pub mod sse;
