//! Durable, append-only record of completed and failed transcription jobs.

pub mod storage;

pub use storage::{HistoryEntry, HistoryStore, NewHistoryEntry};
