//! Transcription service for audio-to-text conversion.
//!
//! This module holds the building blocks of a transcription job: the model
//! table with its metered rates, cost estimation, chunk splitting and
//! reassembly, the error taxonomy, and the API client behind the
//! `TranscribeService` trait.

pub mod api;
pub mod chunk;
pub mod cost;
pub mod error;
pub mod model;

pub use api::{DeepgramService, ServiceTranscript, TranscribeOptions, TranscribeService};
pub use chunk::{Chunk, ChunkSequencer};
pub use error::{ErrorKind, TranscribeError};
pub use model::Model;

/// A single audio submission, immutable once built.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// WAV-encoded audio (mono, fixed sample rate) after pre-processing
    pub payload: Vec<u8>,
    /// Duration of the payload in seconds
    pub duration_seconds: f64,
    /// BCP-47 language code forwarded to the service
    pub language: String,
    /// Model used in single-transcription mode
    pub model: Model,
    /// Payloads above this byte size are split into chunks
    pub chunk_threshold_bytes: usize,
    /// Display name recorded in history
    pub alias: String,
    /// Where the audio came from (file path), recorded in history
    pub audio_reference: String,
}
