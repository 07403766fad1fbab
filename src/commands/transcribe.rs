//! Transcribe an audio file against the credential pool.
//!
//! Pre-processes the audio, builds the transcription request, and runs either
//! a single-model job or double transcription. In double mode each model's
//! result is printed as soon as it completes; failure of one model does not
//! suppress the other's output.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::audio;
use crate::config::PoolscribeConfig;
use crate::job::JobOutcome;
use crate::state::OrchestratorState;
use crate::transcription::{Model, TranscriptionRequest};

/// Options collected from the command line for one transcription run.
#[derive(Debug)]
pub struct TranscribeArgs {
    pub file: PathBuf,
    pub language: Option<String>,
    pub model: Option<String>,
    pub double: bool,
    pub remove_silences: bool,
    pub speed: Option<f64>,
    pub alias: Option<String>,
    pub output: Option<String>,
}

/// Handles the `transcribe` command.
///
/// # Errors
/// - If no credentials are configured
/// - If the audio file is missing or pre-processing fails
/// - If the job (or both jobs in double mode) ends in a terminal failure
pub async fn handle_transcribe(args: TranscribeArgs) -> Result<()> {
    tracing::info!("=== poolscribe Transcribe Command ===");

    if !args.file.exists() {
        return Err(anyhow!("Audio file not found: {}", args.file.display()));
    }

    let config = PoolscribeConfig::load_or_default()?;
    if config.credentials.is_empty() {
        return Err(anyhow!(
            "No credentials configured. Add [[credentials]] entries to \
             ~/.config/poolscribe/poolscribe.toml"
        ));
    }

    let single_model = match &args.model {
        Some(id) => Model::from_id(id)
            .ok_or_else(|| anyhow!("Unknown model: {id} (expected 'fast' or 'accurate')"))?,
        None => Model::Fast,
    };

    // Pre-processing runs once per request, before chunking.
    let remove_silences = args.remove_silences || config.audio.remove_silences;
    let speed_factor = args.speed.unwrap_or(config.audio.speed_factor);
    let prepared = audio::prepare(
        &args.file,
        config.audio.sample_rate,
        remove_silences,
        speed_factor,
    )?;

    let alias = args.alias.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string())
    });

    let request = Arc::new(TranscriptionRequest {
        payload: prepared.payload,
        duration_seconds: prepared.duration_seconds,
        language: args
            .language
            .clone()
            .unwrap_or_else(|| config.transcription.language.clone()),
        model: single_model,
        chunk_threshold_bytes: config.transcription.chunk_threshold_bytes,
        alias,
        audio_reference: args.file.display().to_string(),
    });

    let state = OrchestratorState::init(config)?;

    if args.double {
        run_double(&state, request, args.output).await
    } else {
        run_single(&state, request, single_model, args.output).await
    }
}

async fn run_single(
    state: &OrchestratorState,
    request: Arc<TranscriptionRequest>,
    model: Model,
    output: Option<String>,
) -> Result<()> {
    let runner = state.runner();
    let outcome = runner.run(&request, model).await;

    if !outcome.success {
        return Err(outcome_error(&outcome));
    }

    write_output(&outcome.transcript, output.as_deref())?;
    report_cost(state, &[&outcome]);
    Ok(())
}

async fn run_double(
    state: &OrchestratorState,
    request: Arc<TranscriptionRequest>,
    output: Option<String>,
) -> Result<()> {
    let coordinator = state.coordinator();
    let mut receiver = coordinator.launch(request, Model::Fast, Model::Accurate);

    let mut outcomes: Vec<JobOutcome> = Vec::with_capacity(2);
    while let Some(outcome) = receiver.recv().await {
        // Surface each result as soon as it is available.
        if outcome.success {
            println!("[{}]", outcome.model.description());
            println!("{}\n", outcome.transcript);
        } else {
            eprintln!(
                "[{}] transcription failed: {}",
                outcome.model.description(),
                outcome
                    .error_kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown error".to_string())
            );
        }
        outcomes.push(outcome);
    }

    if let Some(path) = output.as_deref() {
        let combined = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| format!("[{}]\n{}", o.model.description(), o.transcript))
            .collect::<Vec<_>>()
            .join("\n\n");
        std::fs::write(path, combined)
            .map_err(|e| anyhow!("Failed to write to file '{path}': {e}"))?;
    }

    report_cost(state, &outcomes.iter().collect::<Vec<_>>());

    if outcomes.iter().all(|o| !o.success) {
        return Err(anyhow!("both transcriptions failed"));
    }
    Ok(())
}

fn outcome_error(outcome: &JobOutcome) -> anyhow::Error {
    match outcome.error_kind {
        Some(kind) => anyhow!("transcription failed: {kind}"),
        None => anyhow!("transcription failed"),
    }
}

fn write_output(transcript: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, transcript)
                .map_err(|e| anyhow!("Failed to write to file '{path}': {e}"))?;
            tracing::debug!("Transcript written to file: {path}");
        }
        None => {
            println!("{transcript}");
        }
    }
    Ok(())
}

fn report_cost(state: &OrchestratorState, outcomes: &[&JobOutcome]) {
    let total: f64 = outcomes.iter().map(|o| o.total_cost).sum();
    let remaining: f64 = state.pool.snapshot().iter().map(|c| c.balance).sum();
    eprintln!("Cost: ${total:.4} (remaining pool balance: ${remaining:.4})");
    tracing::info!(
        "Transcription finished: charged ${:.4}, pool balance ${:.4}",
        total,
        remaining
    );
}
