//! Sort new mail into keep, promotional and spam folders.

pub mod config;
pub mod error;
pub mod gate;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod scorer;
pub mod store;
pub mod triage;
