// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod action_log;
pub mod app;
pub mod config;
pub mod data;
pub mod diagnose;
pub mod engine;
pub mod fpl;
pub mod llm;
pub mod notify;
pub mod summary;
