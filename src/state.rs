//! Process-wide orchestrator state.
//!
//! One instance owns the credential pool, history store, and service client,
//! and hands them to job runners. Durable state lives in the data directory;
//! nothing is kept in ambient globals.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::config::{self, PoolscribeConfig};
use crate::history::HistoryStore;
use crate::job::{DualModelCoordinator, JobRunner, RetryPolicy};
use crate::pool::{CredentialPool, Ledger};
use crate::transcription::{DeepgramService, TranscribeOptions, TranscribeService};

pub struct OrchestratorState {
    pub config: PoolscribeConfig,
    pub pool: Arc<CredentialPool>,
    pub history: Arc<Mutex<HistoryStore>>,
    service: Arc<dyn TranscribeService>,
}

impl OrchestratorState {
    /// Loads durable state and builds the shared handles.
    ///
    /// # Errors
    /// - If the data directory, ledger, or history store cannot be opened
    /// - If the HTTP client cannot be constructed
    pub fn init(config: PoolscribeConfig) -> Result<Self> {
        let data_dir = config::data_dir()?;
        let ledger = Ledger::open(&data_dir)?;
        let pool = Arc::new(CredentialPool::load(&config.credentials, ledger)?);
        let history = Arc::new(Mutex::new(HistoryStore::new(&data_dir)?));
        let service: Arc<dyn TranscribeService> = Arc::new(DeepgramService::new()?);

        Ok(Self {
            config,
            pool,
            history,
            service,
        })
    }

    /// Builds a job runner over the shared pool, service, and history.
    pub fn runner(&self) -> Arc<JobRunner> {
        let options = TranscribeOptions {
            punctuate: self.config.transcription.punctuate,
            numerals: self.config.transcription.numerals,
        };
        Arc::new(JobRunner::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.service),
            Arc::clone(&self.history),
            RetryPolicy::new(self.config.transcription.max_retries),
            options,
        ))
    }

    /// Builds the coordinator for double transcription mode.
    pub fn coordinator(&self) -> DualModelCoordinator {
        DualModelCoordinator::new(self.runner())
    }
}
