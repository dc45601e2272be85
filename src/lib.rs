//! Schedly: natural-language appointment scheduling.
//!
//! A free-text request ("Schedule a meeting with John tomorrow at 2pm") is
//! turned into a plan by a language model, then executed against a small
//! tool API backed by SQLite.

pub mod availability;
pub mod db;
pub mod error;
pub mod llm;
mod migrations;
pub mod orchestrator;
pub mod plan;
mod pty;
pub mod services;
pub mod state;
pub mod store;
pub mod time_resolver;
pub mod tools;
pub mod types;
pub mod util;
