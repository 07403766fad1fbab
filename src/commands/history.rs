//! View or clear the transcription job history.

use anyhow::Result;

use crate::config;
use crate::history::HistoryStore;

/// Handles the `history` command.
///
/// Lists the most recent job records, or empties the history atomically when
/// `clear` is set.
///
/// # Errors
/// - If the history database cannot be opened or queried
pub fn handle_history(clear: bool, limit: usize) -> Result<()> {
    let data_dir = config::data_dir()?;
    let mut store = HistoryStore::new(&data_dir)?;

    if clear {
        store.clear()?;
        println!("History cleared.");
        return Ok(());
    }

    let entries = store.all(Some(limit))?;
    if entries.is_empty() {
        println!("No transcriptions recorded yet.");
        return Ok(());
    }

    for entry in entries {
        let status = match &entry.error {
            Some(kind) => format!("failed ({kind})"),
            None => format!("${:.4}", entry.cost),
        };
        let mut preview: String = entry.transcript.chars().take(60).collect();
        if entry.transcript.chars().count() > 60 {
            preview.push('…');
        }
        println!(
            "{}  {:<20} {:<8} {:>7.1}s  {:<24} {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.alias,
            entry.model,
            entry.source_duration_seconds,
            status,
            preview
        );
    }

    Ok(())
}
