//! Job execution: one model's transcription of one request.
//!
//! The job runner splits a request into chunks, drives each chunk through the
//! credential pool and the transcription service strictly in sequence order,
//! and retries a failing chunk with a different credential under a single
//! retry policy. Terminal outcomes, success or failure, are appended to the
//! history exactly once.

pub mod dual;

pub use dual::DualModelCoordinator;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::history::{HistoryStore, NewHistoryEntry};
use crate::pool::CredentialPool;
use crate::transcription::chunk::{Chunk, ChunkSequencer};
use crate::transcription::cost;
use crate::transcription::error::{ErrorKind, TranscribeError};
use crate::transcription::{Model, TranscribeOptions, TranscribeService, TranscriptionRequest};

/// Result of transcribing one chunk.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub sequence_index: usize,
    pub transcript: String,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    /// Final charge for this chunk in dollars
    pub charged_cost: f64,
    /// Credential that paid for this chunk
    pub credential_id: String,
    pub elapsed_ms: u64,
}

/// Aggregated terminal result of one job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub model: Model,
    /// Chunk transcripts joined in sequence order (empty on failure)
    pub transcript: String,
    /// Total charged cost in dollars (zero on failure; charges for chunks
    /// completed before the failure stay on the balances)
    pub total_cost: f64,
    pub total_elapsed_ms: u64,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
}

/// Retry budget and retryable-error predicate shared by all jobs.
///
/// All retryable failures draw on a single per-chunk budget: a transient
/// service error consumes an attempt the same way a rejected or drained
/// credential does, rather than getting a dedicated retry of its own.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// Attempts allowed for one chunk: the first try plus up to
    /// `min(pool_size, max_retries)` retries. A pool that empties mid-retry
    /// still gets one more selection, so exhaustion surfaces as
    /// `PoolExhausted` rather than a generic chunk failure.
    pub fn max_attempts(&self, pool_size: usize) -> usize {
        self.max_retries.min(pool_size) + 1
    }

    pub fn is_retryable(&self, error: &TranscribeError) -> bool {
        error.is_retryable()
    }
}

/// Drives one model's transcription of one request against the shared pool.
pub struct JobRunner {
    pool: Arc<CredentialPool>,
    service: Arc<dyn TranscribeService>,
    history: Arc<Mutex<HistoryStore>>,
    retry: RetryPolicy,
    options: TranscribeOptions,
}

impl JobRunner {
    pub fn new(
        pool: Arc<CredentialPool>,
        service: Arc<dyn TranscribeService>,
        history: Arc<Mutex<HistoryStore>>,
        retry: RetryPolicy,
        options: TranscribeOptions,
    ) -> Self {
        Self {
            pool,
            service,
            history,
            retry,
            options,
        }
    }

    /// Runs the whole job for one model: split, transcribe chunks in
    /// sequence, join, record. Never panics; every failure is a typed
    /// outcome.
    pub async fn run(&self, request: &TranscriptionRequest, model: Model) -> JobOutcome {
        let started = Instant::now();
        tracing::info!(
            "Starting {} transcription of '{}' ({:.1}s)",
            model.id(),
            request.alias,
            request.duration_seconds
        );

        let sequencer = ChunkSequencer::new(request.chunk_threshold_bytes);
        let chunks = match sequencer.split(&request.payload, request.duration_seconds) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!("Failed to split audio payload: {e}");
                let outcome = self.failed_outcome(model, ErrorKind::Service, started);
                self.record(request, &outcome);
                return outcome;
            }
        };

        let mut results: Vec<JobResult> = Vec::with_capacity(chunks.len());
        let mut failure: Option<TranscribeError> = None;
        for chunk in &chunks {
            match self.transcribe_chunk(chunk, model, &request.language).await {
                Ok(result) => results.push(result),
                Err(error) => {
                    // Remaining chunks are not attempted.
                    tracing::warn!(
                        "{} job for '{}' failed at chunk {}: {error}",
                        model.id(),
                        request.alias,
                        chunk.sequence_index
                    );
                    failure = Some(error);
                    break;
                }
            }
        }

        let outcome = match failure {
            None => {
                let total_cost = results.iter().map(|r| r.charged_cost).sum();
                let transcript = ChunkSequencer::join(
                    results
                        .iter()
                        .map(|r| (r.sequence_index, r.transcript.clone()))
                        .collect(),
                );
                JobOutcome {
                    model,
                    transcript,
                    total_cost,
                    total_elapsed_ms: started.elapsed().as_millis() as u64,
                    success: true,
                    error_kind: None,
                }
            }
            Some(error) => self.failed_outcome(model, error.kind(), started),
        };

        self.record(request, &outcome);
        outcome
    }

    fn failed_outcome(&self, model: Model, kind: ErrorKind, started: Instant) -> JobOutcome {
        JobOutcome {
            model,
            transcript: String::new(),
            total_cost: 0.0,
            total_elapsed_ms: started.elapsed().as_millis() as u64,
            success: false,
            error_kind: Some(kind),
        }
    }

    /// Transcribes one chunk, rotating credentials on failure.
    ///
    /// Authentication failures and empty transcripts exhaust the credential
    /// and retry with a different one; service errors return the reservation
    /// and retry. `PoolExhausted` and a spent retry budget are terminal.
    async fn transcribe_chunk(
        &self,
        chunk: &Chunk,
        model: Model,
        language: &str,
    ) -> Result<JobResult, TranscribeError> {
        let estimated_cost = cost::estimate(chunk.duration_seconds, model);
        let max_attempts = self.retry.max_attempts(self.pool.size());

        for attempt in 1..=max_attempts {
            let selection = self
                .pool
                .select_credential(estimated_cost)
                .ok_or(TranscribeError::PoolExhausted)?;

            let attempt_started = Instant::now();
            let response = self
                .service
                .transcribe_chunk(
                    &chunk.payload,
                    &selection.secret,
                    language,
                    model,
                    &self.options,
                )
                .await;
            let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

            match response {
                Ok(service_transcript)
                    if !service_transcript.transcript.trim().is_empty() =>
                {
                    let billed_seconds = service_transcript
                        .billed_seconds
                        .unwrap_or(chunk.duration_seconds);
                    let actual_cost = cost::estimate(billed_seconds, model);
                    self.pool.charge(&selection, actual_cost).map_err(|e| {
                        TranscribeError::Service(format!("failed to persist charge: {e}"))
                    })?;

                    return Ok(JobResult {
                        sequence_index: chunk.sequence_index,
                        transcript: service_transcript.transcript.trim().to_string(),
                        success: true,
                        error_kind: None,
                        charged_cost: actual_cost,
                        credential_id: selection.id,
                        elapsed_ms,
                    });
                }
                Ok(_) => {
                    tracing::warn!(
                        "Empty transcript for chunk {} (attempt {attempt}/{max_attempts}), rotating credential",
                        chunk.sequence_index
                    );
                    self.pool.mark_failed(&selection);
                }
                Err(TranscribeError::Auth) => {
                    tracing::warn!(
                        "Credential {} rejected on chunk {} (attempt {attempt}/{max_attempts})",
                        selection.id,
                        chunk.sequence_index
                    );
                    self.pool.mark_failed(&selection);
                }
                Err(error) => {
                    self.pool.release(&selection);
                    if !self.retry.is_retryable(&error) {
                        return Err(error);
                    }
                    tracing::warn!(
                        "Service error on chunk {} (attempt {attempt}/{max_attempts}): {error}",
                        chunk.sequence_index
                    );
                }
            }
        }

        Err(TranscribeError::ChunkTranscriptionFailed(chunk.sequence_index))
    }

    /// Appends the terminal outcome to the history. Failures here are logged
    /// rather than turning a finished job into an error.
    fn record(&self, request: &TranscriptionRequest, outcome: &JobOutcome) {
        let entry = NewHistoryEntry {
            alias: request.alias.clone(),
            model: outcome.model.id().to_string(),
            source_duration_seconds: request.duration_seconds,
            elapsed_ms: outcome.total_elapsed_ms,
            cost: outcome.total_cost,
            transcript: outcome.transcript.clone(),
            error: outcome.error_kind.map(|k| k.as_str().to_string()),
            audio_reference: request.audio_reference.clone(),
        };

        match self.history.lock() {
            Ok(mut history) => {
                if let Err(e) = history.append(&entry) {
                    tracing::warn!("Failed to record job in history: {e}");
                }
            }
            Err(_) => tracing::warn!("History lock poisoned; job not recorded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::pool::{CredentialStatus, Ledger};
    use crate::config::CredentialConfig;
    use crate::transcription::ServiceTranscript;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Mock service that replays a scripted sequence of responses, then
    /// succeeds with a fixed transcript.
    struct ScriptedService {
        script: Mutex<VecDeque<Result<ServiceTranscript, TranscribeError>>>,
    }

    impl ScriptedService {
        fn new(script: Vec<Result<ServiceTranscript, TranscribeError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }

        fn ok(transcript: &str) -> Result<ServiceTranscript, TranscribeError> {
            Ok(ServiceTranscript {
                transcript: transcript.to_string(),
                billed_seconds: None,
            })
        }
    }

    #[async_trait]
    impl TranscribeService for ScriptedService {
        async fn transcribe_chunk(
            &self,
            _payload: &[u8],
            _credential_secret: &str,
            _language: &str,
            _model: Model,
            _options: &TranscribeOptions,
        ) -> Result<ServiceTranscript, TranscribeError> {
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Self::ok("fallback"))
        }
    }

    struct Fixture {
        runner: JobRunner,
        pool: Arc<CredentialPool>,
        history: Arc<Mutex<HistoryStore>>,
        _dir: tempfile::TempDir,
    }

    fn fixture(
        balances: &[(&str, f64)],
        max_retries: usize,
        script: Vec<Result<ServiceTranscript, TranscribeError>>,
    ) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::open(dir.path()).expect("ledger");
        let configured: Vec<CredentialConfig> = balances
            .iter()
            .map(|(id, balance)| CredentialConfig {
                id: id.to_string(),
                key: format!("secret-{id}"),
                initial_balance: *balance,
            })
            .collect();
        let pool = Arc::new(CredentialPool::load(&configured, ledger).expect("pool"));
        let history = Arc::new(Mutex::new(
            HistoryStore::new(dir.path()).expect("history"),
        ));
        let runner = JobRunner::new(
            Arc::clone(&pool),
            Arc::new(ScriptedService::new(script)),
            Arc::clone(&history),
            RetryPolicy::new(max_retries),
            TranscribeOptions::default(),
        );
        Fixture {
            runner,
            pool,
            history,
            _dir: dir,
        }
    }

    fn request(payload: Vec<u8>, duration_seconds: f64, threshold: usize) -> TranscriptionRequest {
        TranscriptionRequest {
            payload,
            duration_seconds,
            language: "fr".to_string(),
            model: Model::Fast,
            chunk_threshold_bytes: threshold,
            alias: "meeting".to_string(),
            audio_reference: "/tmp/meeting.wav".to_string(),
        }
    }

    /// Builds a mono 16-bit WAV payload of the given duration.
    fn make_wav(duration_seconds: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Vec::new();
        {
            let mut writer =
                hound::WavWriter::new(Cursor::new(&mut buffer), spec).expect("wav writer");
            let total = (duration_seconds * sample_rate as f64) as usize;
            for n in 0..total {
                writer.write_sample((n % 64) as i16).expect("sample");
            }
            writer.finalize().expect("finalize");
        }
        buffer
    }

    fn balance_of(pool: &CredentialPool, id: &str) -> f64 {
        pool.snapshot()
            .into_iter()
            .find(|c| c.id == id)
            .expect("credential")
            .balance
    }

    #[tokio::test]
    async fn test_single_chunk_success_charges_and_records() {
        let fx = fixture(&[("a", 1.0)], 3, vec![ScriptedService::ok("bonjour à tous")]);
        let req = request(vec![0u8; 256], 60.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(outcome.success);
        assert_eq!(outcome.transcript, "bonjour à tous");
        let expected = cost::estimate(60.0, Model::Fast);
        assert!((outcome.total_cost - expected).abs() < 1e-9);
        assert!((balance_of(&fx.pool, "a") - (1.0 - expected)).abs() < 1e-9);

        let entries = fx.history.lock().unwrap().all(None).expect("all");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].error.is_none());
        assert!((entries[0].cost - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_billed_duration_overrides_estimate() {
        let fx = fixture(
            &[("a", 1.0)],
            3,
            vec![Ok(ServiceTranscript {
                transcript: "texte".to_string(),
                billed_seconds: Some(120.0),
            })],
        );
        let req = request(vec![0u8; 256], 60.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        let expected = cost::estimate(120.0, Model::Fast);
        assert!((outcome.total_cost - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_auth_failure_rotates_to_next_credential() {
        let fx = fixture(
            &[("a", 1.0), ("b", 1.0)],
            3,
            vec![Err(TranscribeError::Auth), ScriptedService::ok("sauvé")],
        );
        let req = request(vec![0u8; 256], 30.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(outcome.success);
        let snapshot = fx.pool.snapshot();
        let a = snapshot.iter().find(|c| c.id == "a").unwrap();
        assert_eq!(a.status, CredentialStatus::Exhausted);
        assert_eq!(a.balance, 1.0);
        assert!(balance_of(&fx.pool, "b") < 1.0);
    }

    #[tokio::test]
    async fn test_empty_result_retries_with_different_credential() {
        let fx = fixture(
            &[("a", 1.0), ("b", 1.0)],
            3,
            vec![ScriptedService::ok("   "), ScriptedService::ok("deuxième")],
        );
        let req = request(vec![0u8; 256], 30.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(outcome.success);
        assert_eq!(outcome.transcript, "deuxième");
        let a = fx
            .pool
            .snapshot()
            .into_iter()
            .find(|c| c.id == "a")
            .unwrap();
        assert_eq!(a.status, CredentialStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_pool_exhausted_is_terminal_without_charge() {
        // Both balances are below the estimate for a 60s chunk.
        let fx = fixture(&[("a", 0.001), ("b", 0.002)], 3, vec![]);
        let req = request(vec![0u8; 256], 60.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::PoolExhausted));
        assert_eq!(outcome.total_cost, 0.0);
        assert_eq!(balance_of(&fx.pool, "a"), 0.001);
        assert_eq!(balance_of(&fx.pool, "b"), 0.002);

        let entries = fx.history.lock().unwrap().all(None).expect("all");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cost, 0.0);
        assert_eq!(entries[0].transcript, "");
        assert_eq!(entries[0].error.as_deref(), Some("pool_exhausted"));
    }

    #[tokio::test]
    async fn test_service_errors_exhaust_retry_budget() {
        let fx = fixture(
            &[("a", 1.0), ("b", 1.0), ("c", 1.0)],
            2,
            vec![
                Err(TranscribeError::Service("timeout".into())),
                Err(TranscribeError::Service("timeout".into())),
                Err(TranscribeError::Service("timeout".into())),
            ],
        );
        let req = request(vec![0u8; 256], 30.0, 1024);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error_kind,
            Some(ErrorKind::ChunkTranscriptionFailed)
        );
        // Service errors release reservations and never charge.
        for credential in fx.pool.snapshot() {
            assert_eq!(credential.balance, 1.0);
            assert_eq!(credential.status, CredentialStatus::Active);
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_aborts_remaining_chunks() {
        // 125s split into two chunks; the second chunk exhausts the only
        // credential, so the job fails after the first chunk's charge.
        let payload = make_wav(125.0, 800);
        let threshold = 100 * 800 * 2;
        let fx = fixture(
            &[("a", 1.0)],
            3,
            vec![ScriptedService::ok("un"), Err(TranscribeError::Auth)],
        );
        let req = request(payload, 125.0, threshold);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::PoolExhausted));
        // The first chunk's charge is final, not refunded.
        assert!(balance_of(&fx.pool, "a") < 1.0);
        let entries = fx.history.lock().unwrap().all(None).expect("all");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cost, 0.0);
    }

    #[tokio::test]
    async fn test_end_to_end_two_chunk_job() {
        let payload = make_wav(125.0, 800);
        let threshold = 100 * 800 * 2;
        let fx = fixture(
            &[("a", 1.0)],
            3,
            vec![
                ScriptedService::ok("première partie"),
                ScriptedService::ok("seconde partie"),
            ],
        );
        let req = request(payload, 125.0, threshold);

        let outcome = fx.runner.run(&req, Model::Fast).await;

        assert!(outcome.success);
        assert_eq!(outcome.transcript, "première partie seconde partie");
        // Two charges summing to the whole request's estimated cost.
        let expected_total = cost::estimate(125.0, Model::Fast);
        assert!((outcome.total_cost - expected_total).abs() < 1e-4);
        assert!((balance_of(&fx.pool, "a") - (1.0 - outcome.total_cost)).abs() < 1e-9);
    }

    #[test]
    fn test_retry_policy_budget_is_capped_by_pool_size() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.max_attempts(2), 3);
        assert_eq!(policy.max_attempts(10), 6);
        assert_eq!(RetryPolicy::new(0).max_attempts(3), 1);
    }
}
