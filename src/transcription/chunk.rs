//! Splitting oversized audio into ordered chunks.
//!
//! The transcription service rejects very large uploads, so payloads above a
//! configurable byte threshold are split into contiguous time ranges sized
//! proportionally from the total byte size versus total duration. Chunks are
//! transcribed independently and their transcripts reassembled in sequence
//! order. No attempt is made to avoid splitting mid-word.

use std::io::Cursor;

use anyhow::{anyhow, Result};

/// A bounded-size contiguous slice of one audio request.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk within the request, starting at 0
    pub sequence_index: usize,
    /// WAV-encoded audio for this time range
    pub payload: Vec<u8>,
    /// Duration of this time range in seconds
    pub duration_seconds: f64,
}

/// Splits audio payloads into ordered chunks and reassembles transcripts.
#[derive(Debug, Clone)]
pub struct ChunkSequencer {
    threshold_bytes: usize,
}

impl ChunkSequencer {
    pub fn new(threshold_bytes: usize) -> Self {
        Self { threshold_bytes }
    }

    /// Splits a WAV payload into ordered chunks.
    ///
    /// Payloads at or below the threshold produce a single chunk spanning the
    /// whole request. Larger payloads are cut into time ranges of
    /// `step = total_duration * threshold / total_bytes` seconds, the last
    /// chunk possibly shorter, each re-encoded as a standalone WAV file.
    ///
    /// # Errors
    /// - If the payload is not a PCM WAV stream with 16-bit samples
    pub fn split(&self, payload: &[u8], duration_seconds: f64) -> Result<Vec<Chunk>> {
        if payload.len() <= self.threshold_bytes || duration_seconds <= 0.0 {
            return Ok(vec![Chunk {
                sequence_index: 0,
                payload: payload.to_vec(),
                duration_seconds,
            }]);
        }

        let reader = hound::WavReader::new(Cursor::new(payload))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(anyhow!(
                "unsupported audio payload: expected 16-bit PCM WAV, got {:?}/{} bits",
                spec.sample_format,
                spec.bits_per_sample
            ));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow!("failed to decode audio samples: {e}"))?;

        let step_duration =
            duration_seconds * self.threshold_bytes as f64 / payload.len() as f64;
        let chunk_count = (duration_seconds / step_duration).ceil() as usize;
        let samples_per_step =
            (step_duration * spec.sample_rate as f64) as usize * spec.channels as usize;

        tracing::debug!(
            "Splitting {} bytes / {:.1}s into {} chunks of ~{:.1}s",
            payload.len(),
            duration_seconds,
            chunk_count,
            step_duration
        );

        let mut chunks = Vec::with_capacity(chunk_count);
        for index in 0..chunk_count {
            let start = (index * samples_per_step).min(samples.len());
            let end = ((index + 1) * samples_per_step).min(samples.len());
            let slice = &samples[start..end];

            let mut buffer = Vec::new();
            {
                let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
                for sample in slice {
                    writer.write_sample(*sample)?;
                }
                writer.finalize()?;
            }

            let frames = slice.len() / spec.channels as usize;
            chunks.push(Chunk {
                sequence_index: index,
                payload: buffer,
                duration_seconds: frames as f64 / spec.sample_rate as f64,
            });
        }

        Ok(chunks)
    }

    /// Joins per-chunk transcripts into one text, ordered by sequence index.
    ///
    /// Chunks are joined with a single separating space. Empty transcripts
    /// still occupy their position rather than being silently dropped.
    pub fn join(mut parts: Vec<(usize, String)>) -> String {
        parts.sort_by_key(|(index, _)| *index);
        parts
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
