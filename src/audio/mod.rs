//! Audio pre-processing ahead of transcription.
//!
//! The orchestrator treats pre-processing as a black box invoked once per
//! request: raw audio in, normalized WAV out (mono, fixed sample rate, 16-bit
//! PCM) with the resulting duration. Silence removal and tempo change are
//! delegated to ffmpeg filters.

pub mod ffmpeg;

use std::io::Cursor;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};

/// Silence shorter than this is kept (milliseconds as seconds for ffmpeg).
const SILENCE_MIN_DURATION: &str = "0.7";
/// Level below which audio counts as silence.
const SILENCE_THRESHOLD_DB: &str = "-35dB";
/// Accepted speed factor range; `atempo_chain` assumes a positive factor.
const MIN_SPEED_FACTOR: f64 = 0.25;
const MAX_SPEED_FACTOR: f64 = 4.0;

/// Normalized audio ready for chunking and upload.
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    /// WAV payload (mono, 16-bit PCM)
    pub payload: Vec<u8>,
    /// Duration of the payload in seconds, after filters
    pub duration_seconds: f64,
}

/// Runs the pre-processing pipeline on an audio file.
///
/// Applies optional silence removal and tempo change, and normalizes the
/// stream to mono 16-bit PCM WAV at the given sample rate. The duration is
/// probed from the transformed payload, so speed changes are reflected in the
/// billed estimate.
///
/// # Errors
/// - If the speed factor is outside the accepted range
/// - If ffmpeg is not installed or exits with an error
/// - If the transformed payload is not a readable WAV stream
pub fn prepare(
    input: &Path,
    sample_rate: u32,
    remove_silences: bool,
    speed_factor: f64,
) -> Result<PreparedAudio> {
    if !(MIN_SPEED_FACTOR..=MAX_SPEED_FACTOR).contains(&speed_factor) {
        return Err(anyhow!(
            "speed factor {speed_factor} out of range ({MIN_SPEED_FACTOR} to {MAX_SPEED_FACTOR})"
        ));
    }

    let ffmpeg_path = ffmpeg::find_ffmpeg()?;

    let output_path = std::env::temp_dir().join(format!(
        "poolscribe_prepared_{}.wav",
        std::process::id()
    ));

    let mut filters: Vec<String> = Vec::new();
    if remove_silences {
        filters.push(format!(
            "silenceremove=stop_periods=-1:stop_duration={SILENCE_MIN_DURATION}:stop_threshold={SILENCE_THRESHOLD_DB}"
        ));
    }
    if (speed_factor - 1.0).abs() > 1e-2 {
        filters.extend(atempo_chain(speed_factor));
    }

    let mut command = Command::new(&ffmpeg_path);
    command.arg("-y").arg("-i").arg(input);
    if !filters.is_empty() {
        command.arg("-af").arg(filters.join(","));
    }
    command
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(sample_rate.to_string())
        .arg("-sample_fmt")
        .arg("s16")
        .arg("-f")
        .arg("wav")
        .arg(&output_path);

    tracing::debug!("Running ffmpeg pre-processing: {:?}", command);
    let output = command
        .output()
        .map_err(|e| anyhow!("Failed to run ffmpeg: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = std::fs::remove_file(&output_path);
        return Err(anyhow!("ffmpeg pre-processing failed: {stderr}"));
    }

    let payload = std::fs::read(&output_path)?;
    let _ = std::fs::remove_file(&output_path);

    let duration_seconds = probe_duration(&payload)?;
    tracing::info!(
        "Pre-processed {} -> {:.1}s of audio ({} bytes)",
        input.display(),
        duration_seconds,
        payload.len()
    );

    Ok(PreparedAudio {
        payload,
        duration_seconds,
    })
}

/// Reads the duration in seconds from a WAV payload.
///
/// # Errors
/// - If the payload is not a valid WAV stream
pub fn probe_duration(payload: &[u8]) -> Result<f64> {
    let reader = hound::WavReader::new(Cursor::new(payload))
        .map_err(|e| anyhow!("not a readable WAV payload: {e}"))?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(frames as f64 / spec.sample_rate as f64)
}

/// Decomposes a speed factor into a chain of ffmpeg atempo filters.
///
/// atempo only accepts factors in [0.5, 2.0], so larger or smaller factors
/// are reached by chaining steps.
fn atempo_chain(factor: f64) -> Vec<String> {
    let mut filters = Vec::new();
    let mut remaining = factor;
    while remaining > 2.0 {
        filters.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        filters.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    filters.push(format!("atempo={remaining}"));
    filters
}
