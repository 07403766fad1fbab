//! Application command handlers for poolscribe.
//!
//! This module organizes command handling into separate submodules, each
//! responsible for a specific application command.
//!
//! # Commands
//! - `transcribe`: Run a single or double transcription against the pool
//! - `balances`: Show remaining credential balances from the ledger
//! - `history`: View or clear the transcription job history

pub mod balances;
pub mod history;
pub mod transcribe;

pub use balances::handle_balances;
pub use history::handle_history;
pub use transcribe::{handle_transcribe, TranscribeArgs};
