//! Ragline is a terminal-first client for retrieval-augmented chat backends
//! that deliver answers as incrementally streamed events.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the streaming consumer: transport setup, event decoding,
//!   incremental state publication, cancellation, plus configuration and the
//!   per-chat history cache.
//! - [`api`] defines the wire payloads and typed clients for the backend's
//!   chat registry, history store, and document-storage endpoints.
//! - [`cli`] parses command-line arguments and drives one-shot operations,
//!   including the interactive `ask` stream.
//! - [`utils`] holds small shared helpers such as URL joining.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
