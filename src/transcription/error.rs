//! Error taxonomy for transcription jobs.
//!
//! Every failure in the orchestrator is represented as a typed error, never a
//! panic. Transient kinds (auth rejection, empty transcript, service error)
//! are consumed by the job runner's retry loop; terminal kinds surface to the
//! caller as a failed job outcome.

use thiserror::Error;

/// Errors raised while transcribing a chunk or running a job.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Credential rejected by the service. Not retryable on the same
    /// credential; the pool marks it exhausted immediately.
    #[error("credential rejected by the transcription service")]
    Auth,

    /// Service returned success but no transcript text. Retried with a
    /// different credential.
    #[error("transcription service returned an empty transcript")]
    EmptyResult,

    /// Network failure, timeout, or non-auth HTTP error. Retryable.
    #[error("transcription service error: {0}")]
    Service(String),

    /// No credential has sufficient estimated balance. Terminal.
    #[error("no credential has sufficient balance for the estimated cost")]
    PoolExhausted,

    /// Retry budget exhausted for a chunk. Terminal, aborts the whole job.
    #[error("retry budget exhausted while transcribing chunk {0}")]
    ChunkTranscriptionFailed(usize),
}

impl TranscribeError {
    /// Returns the stable classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscribeError::Auth => ErrorKind::Auth,
            TranscribeError::EmptyResult => ErrorKind::EmptyResult,
            TranscribeError::Service(_) => ErrorKind::Service,
            TranscribeError::PoolExhausted => ErrorKind::PoolExhausted,
            TranscribeError::ChunkTranscriptionFailed(_) => {
                ErrorKind::ChunkTranscriptionFailed
            }
        }
    }

    /// Whether the retry loop may attempt the chunk again (with the same or a
    /// different credential depending on the kind).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranscribeError::Auth
                | TranscribeError::EmptyResult
                | TranscribeError::Service(_)
        )
    }
}

/// Stable error classification carried on job results and history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    EmptyResult,
    Service,
    PoolExhausted,
    ChunkTranscriptionFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth_error",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Service => "service_error",
            ErrorKind::PoolExhausted => "pool_exhausted",
            ErrorKind::ChunkTranscriptionFailed => "chunk_transcription_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
