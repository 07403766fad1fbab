//! Transcription API client.
//!
//! The orchestrator talks to the transcription service through the
//! `TranscribeService` trait so the job runner can be exercised against a mock
//! in tests. The only production implementation is the Deepgram client.

mod deepgram;

pub use deepgram::DeepgramService;

use async_trait::async_trait;

use super::error::TranscribeError;
use super::model::Model;

/// Request options forwarded to the transcription service.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Add punctuation and capitalization
    pub punctuate: bool,
    /// Convert numbers from written to numerical format
    pub numerals: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            punctuate: true,
            numerals: true,
        }
    }
}

/// Successful response from the transcription service for one chunk.
///
/// The transcript may be empty; the job runner treats that as a failure for
/// retry purposes. `billed_seconds` is the provider-reported audio duration
/// used for the final charge when present.
#[derive(Debug, Clone)]
pub struct ServiceTranscript {
    pub transcript: String,
    pub billed_seconds: Option<f64>,
}

/// Interface to the external speech-to-text service.
#[async_trait]
pub trait TranscribeService: Send + Sync {
    /// Transcribes a single audio chunk with the given credential secret.
    ///
    /// # Errors
    /// - `TranscribeError::Auth` if the service rejects the credential
    /// - `TranscribeError::Service` for network failures, timeouts, and
    ///   non-auth HTTP errors
    async fn transcribe_chunk(
        &self,
        payload: &[u8],
        credential_secret: &str,
        language: &str,
        model: Model,
        options: &TranscribeOptions,
    ) -> Result<ServiceTranscript, TranscribeError>;
}
