//! Configuration management for poolscribe.
//!
//! Handles loading and saving application configuration from TOML files in
//! the user's config directory, and locates the data directory holding the
//! ledger and history databases.

pub mod file;

pub use file::{AudioConfig, CredentialConfig, PoolscribeConfig, TranscriptionConfig};

use std::path::PathBuf;

/// Returns the data directory for durable state (ledger, history), creating
/// it if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
        .join(".local")
        .join("share")
        .join("poolscribe");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
