//! Configuration file management for poolscribe.
//!
//! This module handles loading and saving application configuration from TOML
//! files. Configuration is stored in the user's config directory and carries
//! the transcription options, audio pre-processing options, and the list of
//! pre-funded credentials seeding the pool.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Transcription and orchestration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Language code forwarded to the service
    #[serde(default = "default_language")]
    pub language: String,
    /// Add punctuation and capitalization
    #[serde(default = "default_true")]
    pub punctuate: bool,
    /// Convert numbers from written to numerical format
    #[serde(default = "default_true")]
    pub numerals: bool,
    /// Payloads above this byte size are split into chunks
    #[serde(default = "default_chunk_threshold_bytes")]
    pub chunk_threshold_bytes: usize,
    /// Retry budget per chunk, capped by the pool size
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_threshold_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_retries() -> usize {
    3
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            punctuate: true,
            numerals: true,
            chunk_threshold_bytes: default_chunk_threshold_bytes(),
            max_retries: default_max_retries(),
        }
    }
}

/// Audio pre-processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Strip long silences before transcription
    #[serde(default)]
    pub remove_silences: bool,
    /// Playback speed factor applied before transcription (1.0 = unchanged)
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    /// Sample rate the payload is normalized to (16000 recommended for
    /// speech recognition)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_speed_factor() -> f64 {
    1.0
}

fn default_sample_rate() -> u32 {
    16000
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            remove_silences: false,
            speed_factor: default_speed_factor(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// One pre-funded credential as configured by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Stable identifier used in the ledger
    pub id: String,
    /// API key sent to the transcription service
    pub key: String,
    /// Balance in dollars the ledger is seeded with on first sight
    #[serde(default)]
    pub initial_balance: f64,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolscribeConfig {
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

impl PoolscribeConfig {
    /// Loads configuration from the user's config directory, writing and
    /// returning defaults when no config file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            let config = PoolscribeConfig::default();
            config.save()?;
            tracing::info!(
                "Created default configuration at {}",
                config_path.display()
            );
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: PoolscribeConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file, creating the directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_path = home_dir
        .join(".config")
        .join("poolscribe")
        .join("poolscribe.toml");

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: PoolscribeConfig = toml::from_str(
            r#"
            [[credentials]]
            id = "key-1"
            key = "dg-secret"
            initial_balance = 1.0
            "#,
        )
        .expect("parse");

        assert_eq!(config.transcription.language, "fr");
        assert!(config.transcription.punctuate);
        assert_eq!(config.transcription.chunk_threshold_bytes, 20 * 1024 * 1024);
        assert_eq!(config.audio.speed_factor, 1.0);
        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.credentials[0].initial_balance, 1.0);
    }
}
