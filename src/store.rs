use std::io::Write;
use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, warn};

use crate::config::data_dir;
use crate::error::TrackerError;
use crate::model::time_entry::PersistableTimeEntry;

/// Entries older than this are dropped when the store is opened, so the file
/// stays bounded and recent-day queries never scan stale years.
pub const RETENTION_DAYS: i64 = 90;

/// Append-only record of saved time entries, one JSON object per line.
///
/// The file is the recovery surface: a human can delete a bad line and retry.
/// Single-writer access is assumed for the process lifetime.
pub struct TimeEntryStore {
    path: PathBuf,
}

impl TimeEntryStore {
    pub fn open_default() -> Result<Self, TrackerError> {
        Self::open(data_dir().join("timeentries.jsonl"))
    }

    pub fn open(path: PathBuf) -> Result<Self, TrackerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path };
        store.prune_older_than(RETENTION_DAYS)?;
        Ok(store)
    }

    pub fn append(&self, entry: &PersistableTimeEntry) -> Result<(), TrackerError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// All readable entries. A corrupt or partially written line is skipped
    /// with a warning rather than failing the whole load.
    pub fn load_all(&self) -> Vec<PersistableTimeEntry> {
        if !self.path.exists() {
            return Vec::new();
        }
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %self.path.display(), err = %e, "failed to read time entry store");
                return Vec::new();
            }
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(number, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(line = number + 1, err = %e, "skipping unreadable time entry record");
                    None
                }
            })
            .collect()
    }

    pub fn entries_for(&self, date: NaiveDate) -> Vec<PersistableTimeEntry> {
        self.load_all()
            .into_iter()
            .filter(|e| e.date == date)
            .collect()
    }

    pub fn total_hours_for(&self, date: NaiveDate) -> f64 {
        self.entries_for(date).iter().map(|e| e.hours).sum()
    }

    fn prune_older_than(&self, days: i64) -> Result<(), TrackerError> {
        if !self.path.exists() {
            return Ok(());
        }
        let cutoff = Local::now().date_naive() - Duration::days(days);
        let entries = self.load_all();
        let kept: Vec<&PersistableTimeEntry> =
            entries.iter().filter(|e| e.date >= cutoff).collect();
        if kept.len() == entries.len() {
            return Ok(());
        }

        debug!(
            removed = entries.len() - kept.len(),
            "pruning expired time entries"
        );
        let mut lines = kept
            .iter()
            .map(|e| serde_json::to_string(e))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }
        std::fs::write(&self.path, lines)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn entry(hours: f64, work_item_id: i64, date: NaiveDate) -> PersistableTimeEntry {
        PersistableTimeEntry {
            hours,
            work_item_id,
            burn: true,
            date,
        }
    }

    fn open_in(dir: &tempfile::TempDir) -> TimeEntryStore {
        TimeEntryStore::open(dir.path().join("timeentries.jsonl")).unwrap()
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);

        let today = Local::now().date_naive();
        let first = PersistableTimeEntry {
            hours: 2.5,
            work_item_id: 42,
            burn: false,
            date: today,
        };
        let second = entry(1.0, 7, today);
        store.append(&first).unwrap();
        store.append(&second).unwrap();

        let loaded = store.load_all();
        assert_eq!(loaded, vec![first, second]);
    }

    #[test]
    fn entries_are_filtered_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);

        let today = Local::now().date_naive();
        let yesterday = today - Duration::days(1);
        store.append(&entry(2.0, 1, today)).unwrap();
        store.append(&entry(3.0, 2, yesterday)).unwrap();
        store.append(&entry(1.5, 3, today)).unwrap();

        let todays = store.entries_for(today);
        assert_eq!(todays.len(), 2);
        assert_eq!(store.total_hours_for(today), 3.5);
        assert_eq!(store.total_hours_for(yesterday), 3.0);
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeentries.jsonl");
        let store = TimeEntryStore::open(path.clone()).unwrap();

        let today = Local::now().date_naive();
        store.append(&entry(2.0, 1, today)).unwrap();
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{\"hours\": 4.0, \"work_item").unwrap();
        }
        store.append(&entry(1.0, 2, today)).unwrap();

        let loaded = store.load_all();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].work_item_id, 1);
        assert_eq!(loaded[1].work_item_id, 2);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        assert!(store.load_all().is_empty());
        assert_eq!(store.total_hours_for(Local::now().date_naive()), 0.0);
    }

    #[test]
    fn expired_entries_are_pruned_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeentries.jsonl");

        let today = Local::now().date_naive();
        let ancient = today - Duration::days(RETENTION_DAYS + 10);
        {
            let store = TimeEntryStore::open(path.clone()).unwrap();
            store.append(&entry(4.0, 1, ancient)).unwrap();
            store.append(&entry(2.0, 2, today)).unwrap();
        }

        let reopened = TimeEntryStore::open(path).unwrap();
        let loaded = reopened.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].work_item_id, 2);
    }
}
