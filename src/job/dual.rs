//! Double transcription: two models, two concurrent jobs.
//!
//! Launches one job per model on its own tokio task over the shared
//! credential pool. The two outcomes are independent: the fast model's result
//! is delivered on the channel as soon as it finishes, and failure of one job
//! never cancels the other. Each job records its own history entry.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use super::{JobOutcome, JobRunner};
use crate::transcription::{Model, TranscriptionRequest};

/// Coordinates the two concurrent jobs of double transcription mode.
pub struct DualModelCoordinator {
    runner: Arc<JobRunner>,
}

impl DualModelCoordinator {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }

    /// Spawns one job per model and returns a channel delivering each
    /// outcome as it completes, in completion order.
    pub fn launch(
        &self,
        request: Arc<TranscriptionRequest>,
        fast_model: Model,
        accurate_model: Model,
    ) -> mpsc::Receiver<JobOutcome> {
        let (sender, receiver) = mpsc::channel(2);

        for model in [fast_model, accurate_model] {
            let runner = Arc::clone(&self.runner);
            let request = Arc::clone(&request);
            let sender = sender.clone();
            tokio::spawn(async move {
                let outcome = runner.run(&request, model).await;
                if sender.send(outcome).await.is_err() {
                    tracing::warn!("Double transcription receiver dropped before {} finished", model.id());
                }
            });
        }

        receiver
    }

    /// Runs both jobs to completion and returns `(fast, accurate)` outcomes.
    ///
    /// # Errors
    /// - If either job's task is lost before delivering an outcome
    pub async fn run_double(
        &self,
        request: Arc<TranscriptionRequest>,
        fast_model: Model,
        accurate_model: Model,
    ) -> Result<(JobOutcome, JobOutcome)> {
        let mut receiver = self.launch(request, fast_model, accurate_model);

        let mut fast = None;
        let mut accurate = None;
        while let Some(outcome) = receiver.recv().await {
            if outcome.model == fast_model {
                fast = Some(outcome);
            } else {
                accurate = Some(outcome);
            }
        }

        match (fast, accurate) {
            (Some(fast), Some(accurate)) => Ok((fast, accurate)),
            _ => Err(anyhow::anyhow!(
                "double transcription task ended without delivering an outcome"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialConfig;
    use crate::history::HistoryStore;
    use crate::job::RetryPolicy;
    use crate::pool::{CredentialPool, Ledger};
    use crate::transcription::error::{ErrorKind, TranscribeError};
    use crate::transcription::{ServiceTranscript, TranscribeOptions, TranscribeService};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fast model answers immediately; the accurate model stalls briefly and
    /// then gets its credential rejected, so the fast job always settles its
    /// charge first.
    struct SplitBrainService;

    #[async_trait]
    impl TranscribeService for SplitBrainService {
        async fn transcribe_chunk(
            &self,
            _payload: &[u8],
            _credential_secret: &str,
            _language: &str,
            model: Model,
            _options: &TranscribeOptions,
        ) -> Result<ServiceTranscript, TranscribeError> {
            match model {
                Model::Fast => Ok(ServiceTranscript {
                    transcript: "résultat rapide".to_string(),
                    billed_seconds: None,
                }),
                Model::Accurate => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(TranscribeError::Auth)
                }
            }
        }
    }

    fn dual_fixture() -> (DualModelCoordinator, Arc<CredentialPool>, Arc<Mutex<HistoryStore>>, tempfile::TempDir)
    {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::open(dir.path()).expect("ledger");
        let configured = vec![
            CredentialConfig {
                id: "a".to_string(),
                key: "secret-a".to_string(),
                initial_balance: 1.0,
            },
            CredentialConfig {
                id: "b".to_string(),
                key: "secret-b".to_string(),
                initial_balance: 1.0,
            },
        ];
        let pool = Arc::new(CredentialPool::load(&configured, ledger).expect("pool"));
        let history = Arc::new(Mutex::new(HistoryStore::new(dir.path()).expect("history")));
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&pool),
            Arc::new(SplitBrainService),
            Arc::clone(&history),
            RetryPolicy::new(3),
            TranscribeOptions::default(),
        ));
        (DualModelCoordinator::new(runner), pool, history, dir)
    }

    fn sample_request() -> Arc<TranscriptionRequest> {
        Arc::new(TranscriptionRequest {
            payload: vec![0u8; 256],
            duration_seconds: 30.0,
            language: "fr".to_string(),
            model: Model::Fast,
            chunk_threshold_bytes: 1024,
            alias: "réunion".to_string(),
            audio_reference: "/tmp/réunion.wav".to_string(),
        })
    }

    #[tokio::test]
    async fn test_dual_outcomes_are_independent() {
        let (coordinator, _pool, history, _dir) = dual_fixture();

        let (fast, accurate) = coordinator
            .run_double(sample_request(), Model::Fast, Model::Accurate)
            .await
            .expect("run_double");

        assert!(fast.success);
        assert_eq!(fast.transcript, "résultat rapide");
        assert!(fast.total_cost > 0.0);

        assert!(!accurate.success);
        assert_eq!(accurate.error_kind, Some(ErrorKind::PoolExhausted));
        assert_eq!(accurate.total_cost, 0.0);

        // One history entry per model.
        let entries = history.lock().unwrap().all(None).expect("all");
        assert_eq!(entries.len(), 2);
        let failed = entries.iter().find(|e| e.error.is_some()).expect("failed entry");
        assert_eq!(failed.cost, 0.0);
        assert_eq!(failed.transcript, "");
        let succeeded = entries.iter().find(|e| e.error.is_none()).expect("success entry");
        assert!(succeeded.cost > 0.0);
    }

    #[tokio::test]
    async fn test_fast_outcome_arrives_first_on_the_channel() {
        let (coordinator, _pool, _history, _dir) = dual_fixture();

        let mut receiver =
            coordinator.launch(sample_request(), Model::Fast, Model::Accurate);

        let first = receiver.recv().await.expect("first outcome");
        assert_eq!(first.model, Model::Fast);
        assert!(first.success);

        let second = receiver.recv().await.expect("second outcome");
        assert_eq!(second.model, Model::Accurate);
        assert!(!second.success);
    }
}
