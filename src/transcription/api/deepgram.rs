//! Deepgram API implementation.
//!
//! Sends raw WAV audio to the Deepgram listen endpoint with token
//! authentication and request options as query parameters. Transcripts are
//! read from the first alternative of the first channel; the billed audio
//! duration is taken from the response metadata.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ServiceTranscript, TranscribeOptions, TranscribeService};
use crate::transcription::error::TranscribeError;
use crate::transcription::model::Model;

/// Request timeout for a single chunk upload. Large chunks over slow links
/// take a while; a hung connection past this point counts as a service error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Deepgram transcription client.
pub struct DeepgramService {
    client: reqwest::Client,
}

/// Deepgram listen response (only the fields the orchestrator consumes).
#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    metadata: Option<ListenMetadata>,
    #[serde(default)]
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenMetadata {
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl DeepgramService {
    /// Creates a new client with the standard request timeout.
    ///
    /// # Errors
    /// - If the underlying HTTP client cannot be constructed
    pub fn new() -> Result<Self, TranscribeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                TranscribeError::Service(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    fn listen_url(language: &str, model: Model, options: &TranscribeOptions) -> String {
        format!(
            "{}?language={}&model={}&punctuate={}&numerals={}",
            model.endpoint(),
            urlencoding::encode(language),
            model.api_model_name(),
            options.punctuate,
            options.numerals
        )
    }
}

#[async_trait]
impl TranscribeService for DeepgramService {
    async fn transcribe_chunk(
        &self,
        payload: &[u8],
        credential_secret: &str,
        language: &str,
        model: Model,
        options: &TranscribeOptions,
    ) -> Result<ServiceTranscript, TranscribeError> {
        let url = Self::listen_url(language, model, options);

        tracing::debug!(
            "Deepgram API Call:\n  URL: {}\n  Method: POST\n  Headers:\n    Authorization: Token <redacted>\n    Content-Type: audio/wav\n  Body: {} bytes",
            url,
            payload.len()
        );

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Token {credential_secret}"))
            .header("Content-Type", "audio/wav")
            .body(payload.to_vec())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let message = if e.is_connect() {
                    "Failed to connect to the Deepgram API server. Check your internet connection.".to_string()
                } else if e.is_timeout() {
                    "Request to Deepgram timed out. The API server is not responding.".to_string()
                } else {
                    format!("Deepgram network error: {e}")
                };
                return Err(TranscribeError::Service(message));
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            tracing::warn!("Deepgram rejected credential (status {status})");
            return Err(TranscribeError::Auth);
        }
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscribeError::Service(format!(
                "Deepgram API error (status {status}): {error_body}"
            )));
        }

        let listen: ListenResponse = response.json().await.map_err(|e| {
            TranscribeError::Service(format!("failed to parse Deepgram response: {e}"))
        })?;

        let transcript = listen
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        let billed_seconds = listen.metadata.and_then(|m| m.duration);

        tracing::debug!(
            "Deepgram API Response:\n  Status: Success\n  Transcription length: {} characters\n  Billed duration: {:?}",
            transcript.len(),
            billed_seconds
        );

        Ok(ServiceTranscript {
            transcript,
            billed_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_url_encodes_options() {
        let options = TranscribeOptions {
            punctuate: true,
            numerals: false,
        };
        let url = DeepgramService::listen_url("fr", Model::Fast, &options);
        assert_eq!(
            url,
            "https://api.deepgram.com/v1/listen?language=fr&model=nova-2&punctuate=true&numerals=false"
        );
    }

    #[test]
    fn test_listen_response_parses_nested_transcript() {
        let body = r#"{
            "metadata": {"duration": 62.5},
            "results": {"channels": [{"alternatives": [{"transcript": "bonjour"}]}]}
        }"#;
        let listen: ListenResponse = serde_json::from_str(body).expect("parse");
        let transcript = listen
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();
        assert_eq!(transcript, "bonjour");
        assert_eq!(listen.metadata.and_then(|m| m.duration), Some(62.5));
    }
}
