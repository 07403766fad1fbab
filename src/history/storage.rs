//! Durable job history storage using SQLite.
//!
//! Every terminal job outcome, success or failure, is appended exactly once.
//! Entries are never mutated afterwards; the only way the collection shrinks
//! is the explicit `clear` operation.

use anyhow::Result;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// A single job record in the history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Unique identifier for this entry
    pub id: i64,
    /// Display name of the audio submission
    pub alias: String,
    /// Model id used for the job
    pub model: String,
    /// Duration of the source audio in seconds
    pub source_duration_seconds: f64,
    /// Wall-clock time the job took in milliseconds
    pub elapsed_ms: u64,
    /// Total charged cost in dollars (zero for failed jobs)
    pub cost: f64,
    /// The transcribed text (empty for failed jobs)
    pub transcript: String,
    /// Terminal error kind for failed jobs
    pub error: Option<String>,
    /// Where the audio came from
    pub audio_reference: String,
    /// When this entry was created
    pub created_at: DateTime<Local>,
}

/// Fields of a history entry supplied by the job runner; id and timestamp are
/// assigned on append.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub alias: String,
    pub model: String,
    pub source_duration_seconds: f64,
    pub elapsed_ms: u64,
    pub cost: f64,
    pub transcript: String,
    pub error: Option<String>,
    pub audio_reference: String,
}

/// Manages the job history database.
pub struct HistoryStore {
    /// Path to the SQLite database file
    database_path: PathBuf,
    /// Connection to the database (lazy-loaded)
    connection: Option<Connection>,
}

impl HistoryStore {
    /// Creates a new history store for the given data directory.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let database_path = data_dir.join("history.db");

        Ok(Self {
            database_path,
            connection: None,
        })
    }

    /// Initializes database connection and creates tables if necessary.
    ///
    /// # Errors
    /// - If the database file cannot be opened
    /// - If table creation fails
    fn get_connection(&mut self) -> Result<&Connection> {
        if self.connection.is_none() {
            let connection = Connection::open(&self.database_path)?;

            connection.execute(
                "CREATE TABLE IF NOT EXISTS jobs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    alias TEXT NOT NULL,
                    model TEXT NOT NULL,
                    source_duration_seconds REAL NOT NULL,
                    elapsed_ms INTEGER NOT NULL,
                    cost REAL NOT NULL,
                    transcript TEXT NOT NULL,
                    error TEXT,
                    audio_reference TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;

            self.connection = Some(connection);
        }

        Ok(self.connection.as_ref().unwrap())
    }

    /// Appends a terminal job outcome to the history.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If insertion fails
    pub fn append(&mut self, entry: &NewHistoryEntry) -> Result<i64> {
        let connection = self.get_connection()?;
        let timestamp = Local::now().to_rfc3339();

        connection.execute(
            "INSERT INTO jobs (alias, model, source_duration_seconds, elapsed_ms,
                               cost, transcript, error, audio_reference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.alias,
                entry.model,
                entry.source_duration_seconds,
                entry.elapsed_ms as i64,
                entry.cost,
                entry.transcript,
                entry.error,
                entry.audio_reference,
                timestamp
            ],
        )?;

        let id = connection.last_insert_rowid();
        tracing::debug!("Job recorded in history (id {id}, model {})", entry.model);
        Ok(id)
    }

    /// Retrieves history entries ordered by most recent first.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If query execution fails
    /// - If timestamp parsing fails
    pub fn all(&mut self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let connection = self.get_connection()?;

        let mut statement = connection.prepare(
            "SELECT id, alias, model, source_duration_seconds, elapsed_ms,
                    cost, transcript, error, audio_reference, created_at
             FROM jobs ORDER BY id DESC LIMIT ?1",
        )?;

        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let entries = statement
            .query_map(params![limit], |row| {
                let timestamp_str = row.get::<_, String>(9)?;
                let created_at = DateTime::parse_from_rfc3339(&timestamp_str)
                    .map(|dt| dt.with_timezone(&Local))
                    .map_err(|_| {
                        rusqlite::Error::InvalidParameterName(
                            "Invalid timestamp format".to_string(),
                        )
                    })?;

                Ok(HistoryEntry {
                    id: row.get(0)?,
                    alias: row.get(1)?,
                    model: row.get(2)?,
                    source_duration_seconds: row.get(3)?,
                    elapsed_ms: row.get::<_, i64>(4)? as u64,
                    cost: row.get(5)?,
                    transcript: row.get(6)?,
                    error: row.get(7)?,
                    audio_reference: row.get(8)?,
                    created_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Empties the history atomically.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If the delete fails
    pub fn clear(&mut self) -> Result<()> {
        let connection = self.get_connection()?;
        connection.execute("DELETE FROM jobs", [])?;
        tracing::info!("Job history cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(alias: &str, cost: f64) -> NewHistoryEntry {
        NewHistoryEntry {
            alias: alias.to_string(),
            model: "fast".to_string(),
            source_duration_seconds: 12.0,
            elapsed_ms: 450,
            cost,
            transcript: "bonjour".to_string(),
            error: None,
            audio_reference: "/tmp/a.wav".to_string(),
        }
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let mut store = HistoryStore::new(dir.path()).expect("store");
            store.append(&sample_entry("first", 0.01)).expect("append");
            store.append(&sample_entry("second", 0.02)).expect("append");
        }

        // A fresh store over the same directory sees the same entries.
        let mut store = HistoryStore::new(dir.path()).expect("store");
        let entries = store.all(None).expect("all");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].alias, "second");
        assert_eq!(entries[1].alias, "first");
    }

    #[test]
    fn test_limit_returns_most_recent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = HistoryStore::new(dir.path()).expect("store");
        for n in 0..5 {
            store
                .append(&sample_entry(&format!("job-{n}"), 0.01))
                .expect("append");
        }
        let entries = store.all(Some(2)).expect("all");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].alias, "job-4");
    }

    #[test]
    fn test_clear_empties_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = HistoryStore::new(dir.path()).expect("store");
        store.append(&sample_entry("gone", 0.01)).expect("append");
        store.clear().expect("clear");
        assert!(store.all(None).expect("all").is_empty());
    }
}
