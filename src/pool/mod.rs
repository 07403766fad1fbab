//! Credential pool: selection, charging, and failure marking.
//!
//! All credentials and balances live behind one pool-wide lock. Selection
//! reserves the estimated cost so that concurrent jobs cannot both spend the
//! same remaining credit; the reservation is settled by `charge` or returned
//! by `release`/`mark_failed`. Balances are persisted to the ledger before a
//! charge returns.

pub mod ledger;

pub use ledger::Ledger;

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;

use crate::config::CredentialConfig;

/// Lifecycle of a credential within one process.
///
/// `Exhausted` is terminal; only a fresh ledger load at restart (with
/// replenished funds) brings a credential back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Active,
    Exhausted,
}

/// An API key paired with a spendable balance.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    pub balance: f64,
    pub status: CredentialStatus,
    /// Credit reserved by in-flight selections, not yet charged
    reserved: f64,
}

/// Handle returned by `select_credential`, carrying the reservation that a
/// later `charge`, `release`, or `mark_failed` settles.
#[derive(Debug, Clone)]
pub struct SelectedCredential {
    pub id: String,
    pub secret: String,
    reserved: f64,
}

struct PoolInner {
    credentials: Vec<Credential>,
    /// Round-robin rotation pointer, stable across calls
    cursor: usize,
    ledger: Ledger,
}

/// Thread-safe pool of pre-funded credentials.
pub struct CredentialPool {
    inner: Mutex<PoolInner>,
}

impl CredentialPool {
    /// Builds the pool from configuration, seeding the ledger and loading the
    /// durable balance for each credential. Every credential starts Active.
    ///
    /// # Errors
    /// - If ledger seeding fails
    pub fn load(configured: &[CredentialConfig], ledger: Ledger) -> Result<Self> {
        let mut credentials = Vec::with_capacity(configured.len());
        for entry in configured {
            let balance = ledger.seed(&entry.id, entry.initial_balance)?;
            credentials.push(Credential {
                id: entry.id.clone(),
                secret: entry.key.clone(),
                balance,
                status: CredentialStatus::Active,
                reserved: 0.0,
            });
        }

        tracing::info!(
            "Credential pool loaded: {} credentials, total balance ${:.4}",
            credentials.len(),
            credentials.iter().map(|c| c.balance).sum::<f64>()
        );

        Ok(Self {
            inner: Mutex::new(PoolInner {
                credentials,
                cursor: 0,
                ledger,
            }),
        })
    }

    fn locked(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().expect("credential pool lock poisoned")
    }

    /// Number of credentials in the pool, regardless of status.
    pub fn size(&self) -> usize {
        self.locked().credentials.len()
    }

    /// Selects the next credential able to cover the estimated cost.
    ///
    /// Scans Active credentials in round-robin order from the rotation
    /// pointer and reserves the estimate on the first one whose unreserved
    /// balance covers it. An Active credential whose balance falls below the
    /// estimate (with nothing reserved) is marked Exhausted on the way past.
    /// Returns `None` when no credential is eligible; that is pool
    /// exhaustion, not an error.
    pub fn select_credential(&self, estimated_cost: f64) -> Option<SelectedCredential> {
        let mut inner = self.locked();
        let count = inner.credentials.len();
        if count == 0 {
            return None;
        }

        let start = inner.cursor;
        for offset in 0..count {
            let index = (start + offset) % count;
            let credential = &mut inner.credentials[index];
            if credential.status != CredentialStatus::Active {
                continue;
            }

            let available = credential.balance - credential.reserved;
            if available >= estimated_cost {
                credential.reserved += estimated_cost;
                let selection = SelectedCredential {
                    id: credential.id.clone(),
                    secret: credential.secret.clone(),
                    reserved: estimated_cost,
                };
                inner.cursor = (index + 1) % count;
                tracing::debug!(
                    "Selected credential {} (available ${:.4}, reserving ${:.4})",
                    selection.id,
                    available,
                    estimated_cost
                );
                return Some(selection);
            }

            if credential.reserved == 0.0 {
                tracing::info!(
                    "Credential {} exhausted: balance ${:.4} below estimate ${:.4}",
                    credential.id,
                    credential.balance,
                    estimated_cost
                );
                credential.status = CredentialStatus::Exhausted;
            }
        }

        None
    }

    /// Settles a selection by deducting the actual cost and persisting the
    /// new balance to the ledger before returning.
    ///
    /// Returns the remaining balance. Charges are final once billed; they are
    /// never refunded. The ledger is written before the in-memory balance is
    /// touched, so a failed write settles the reservation but leaves the
    /// balance matching durable state.
    ///
    /// # Errors
    /// - If the credential is unknown
    /// - If the ledger write fails
    pub fn charge(&self, selection: &SelectedCredential, actual_cost: f64) -> Result<f64> {
        let mut inner = self.locked();
        let PoolInner {
            credentials,
            ledger,
            ..
        } = &mut *inner;

        let credential = credentials
            .iter_mut()
            .find(|c| c.id == selection.id)
            .ok_or_else(|| anyhow::anyhow!("unknown credential: {}", selection.id))?;

        credential.reserved = (credential.reserved - selection.reserved).max(0.0);
        if actual_cost > credential.balance {
            tracing::warn!(
                "Charge ${:.4} exceeds balance ${:.4} for credential {}; clamping to zero",
                actual_cost,
                credential.balance,
                credential.id
            );
        }
        let new_balance = (credential.balance - actual_cost).max(0.0);

        ledger.record_balance(&selection.id, new_balance)?;
        credential.balance = new_balance;

        tracing::info!(
            "Charged ${:.4} to credential {} (remaining ${:.4})",
            actual_cost,
            selection.id,
            new_balance
        );
        Ok(new_balance)
    }

    /// Returns a reservation without charging, after a retryable service
    /// failure.
    pub fn release(&self, selection: &SelectedCredential) {
        let mut inner = self.locked();
        if let Some(credential) = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == selection.id)
        {
            credential.reserved = (credential.reserved - selection.reserved).max(0.0);
        }
    }

    /// Marks a credential Exhausted after an authentication failure or an
    /// empty result, returning its reservation. Terminal for this process.
    pub fn mark_failed(&self, selection: &SelectedCredential) {
        let mut inner = self.locked();
        if let Some(credential) = inner
            .credentials
            .iter_mut()
            .find(|c| c.id == selection.id)
        {
            credential.reserved = (credential.reserved - selection.reserved).max(0.0);
            if credential.status == CredentialStatus::Active {
                tracing::warn!("Credential {} marked as exhausted", credential.id);
                credential.status = CredentialStatus::Exhausted;
            }
        }
    }

    /// Snapshot of all credentials for display and tests.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.locked().credentials.clone()
    }
}
