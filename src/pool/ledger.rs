//! Durable credential-balance storage using SQLite.
//!
//! The ledger is the source of truth for remaining credit per credential. It
//! is seeded from configuration on first sight of a credential id and mutated
//! only by the credential pool, synchronously on every charge, so a crash
//! after a charge never loses the deduction. Restarting the process with
//! replenished balances is the only way an exhausted credential comes back.

use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;

/// Durable credential-id to balance map.
pub struct Ledger {
    connection: Connection,
}

impl Ledger {
    /// Opens (and if needed creates) the ledger database in the given data
    /// directory.
    ///
    /// # Errors
    /// - If the database file cannot be opened
    /// - If table creation fails
    pub fn open(data_dir: &Path) -> Result<Self> {
        let connection = Connection::open(data_dir.join("ledger.db"))?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS credits (
                credential_id TEXT PRIMARY KEY,
                balance REAL NOT NULL
            )",
            [],
        )?;

        Ok(Self { connection })
    }

    /// Registers a credential with its configured initial balance if it is
    /// not yet known, then returns the durable balance.
    ///
    /// An already-known credential keeps its persisted balance; the
    /// configured initial balance is ignored for it.
    ///
    /// # Errors
    /// - If the insert or lookup fails
    pub fn seed(&self, credential_id: &str, initial_balance: f64) -> Result<f64> {
        self.connection.execute(
            "INSERT OR IGNORE INTO credits (credential_id, balance) VALUES (?1, ?2)",
            params![credential_id, initial_balance],
        )?;

        let balance = self.connection.query_row(
            "SELECT balance FROM credits WHERE credential_id = ?1",
            params![credential_id],
            |row| row.get::<_, f64>(0),
        )?;

        Ok(balance)
    }

    /// Persists the new balance for a credential.
    ///
    /// # Errors
    /// - If the update fails or the credential is unknown
    pub fn record_balance(&self, credential_id: &str, balance: f64) -> Result<()> {
        let updated = self.connection.execute(
            "UPDATE credits SET balance = ?2 WHERE credential_id = ?1",
            params![credential_id, balance],
        )?;
        if updated == 0 {
            return Err(anyhow::anyhow!(
                "unknown credential in ledger: {credential_id}"
            ));
        }
        tracing::debug!("Ledger updated: {credential_id} -> {balance:.4}");
        Ok(())
    }

    /// Returns all known credential balances, ordered by credential id.
    ///
    /// # Errors
    /// - If the query fails
    pub fn balances(&self) -> Result<Vec<(String, f64)>> {
        let mut statement = self
            .connection
            .prepare("SELECT credential_id, balance FROM credits ORDER BY credential_id")?;
        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_keeps_persisted_balance_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let ledger = Ledger::open(dir.path()).expect("open");
            assert_eq!(ledger.seed("key-1", 1.0).expect("seed"), 1.0);
            ledger.record_balance("key-1", 0.25).expect("record");
        }

        // Reload reproduces the state as of the last completed charge, and
        // the configured initial balance no longer applies.
        let ledger = Ledger::open(dir.path()).expect("reopen");
        assert_eq!(ledger.seed("key-1", 1.0).expect("seed"), 0.25);
        assert_eq!(ledger.balances().expect("balances"), vec![("key-1".to_string(), 0.25)]);
    }

    #[test]
    fn test_record_balance_rejects_unknown_credential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::open(dir.path()).expect("open");
        assert!(ledger.record_balance("missing", 1.0).is_err());
    }
}
