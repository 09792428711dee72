//! Local event/busytime/alarm store.
//!
//! The store is a set of keyed collections behind a shared handle. All writes
//! go through a [`Transaction`], which is applied all-or-nothing.
//!
//! A file-backed store may be shared by several processes. Commits take an
//! exclusive lock on `<store>.json.lock` and apply their operations to the
//! file's current contents, never to a snapshot read earlier.

mod transaction;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::CalSyncResult;
use crate::records::{
    Account, CalendarRecord, IcalComponentRecord, LocalAlarm, LocalBusytime, LocalEvent,
};

pub use transaction::{Transaction, TxSummary};

/// Every collection in the store, keyed by record key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    #[serde(default)]
    pub calendars: BTreeMap<String, CalendarRecord>,
    #[serde(default)]
    pub events: BTreeMap<String, LocalEvent>,
    #[serde(default)]
    pub ical_components: BTreeMap<String, IcalComponentRecord>,
    #[serde(default)]
    pub busytimes: BTreeMap<String, LocalBusytime>,
    #[serde(default)]
    pub alarms: BTreeMap<String, LocalAlarm>,
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub events: usize,
    pub ical_components: usize,
    pub busytimes: usize,
    pub alarms: usize,
}

/// Shared handle to the store. Clones refer to the same data.
#[derive(Debug, Clone)]
pub struct Store {
    data: Arc<Mutex<StoreData>>,
    writer: Arc<Mutex<()>>,
    path: Option<PathBuf>,
}

/// Held for the length of a commit. Dropping it releases both locks.
struct WriteGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: Option<File>,
}

impl Store {
    /// An empty store that lives only in memory.
    pub fn memory() -> Self {
        Store {
            data: Arc::new(Mutex::new(StoreData::default())),
            writer: Arc::new(Mutex::new(())),
            path: None,
        }
    }

    /// Open a file-backed store, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> CalSyncResult<Self> {
        let path = path.into();
        let data = read_file(&path)?;

        Ok(Store {
            data: Arc::new(Mutex::new(data)),
            writer: Arc::new(Mutex::new(())),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    // A panic while holding the lock never leaves partial writes behind
    // (commits swap in a fully built copy), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize writers: in this process through `writer`, across processes
    /// through an exclusive lock on the lock file.
    fn begin_write(&self) -> CalSyncResult<WriteGuard<'_>> {
        let local = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let file = match &self.path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                let file = File::create(path.with_extension("json.lock"))?;
                file.lock_exclusive()?;
                Some(file)
            }
            None => None,
        };

        Ok(WriteGuard {
            _local: local,
            _file: file,
        })
    }

    /// The data a commit should build on: the file as it is now, or the
    /// in-memory copy for a memory store.
    fn latest(&self) -> CalSyncResult<StoreData> {
        match &self.path {
            Some(path) => read_file(path),
            None => Ok(self.lock().clone()),
        }
    }

    /// Write a snapshot next to the target and rename it into place.
    fn persist(&self, data: &StoreData) -> CalSyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let temp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.lock().accounts.get(id).cloned()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.lock().accounts.values().cloned().collect()
    }

    pub fn calendar(&self, id: &str) -> Option<CalendarRecord> {
        self.lock().calendars.get(id).cloned()
    }

    pub fn calendars(&self) -> Vec<CalendarRecord> {
        self.lock().calendars.values().cloned().collect()
    }

    pub fn event(&self, id: &str) -> Option<LocalEvent> {
        self.lock().events.get(id).cloned()
    }

    pub fn events(&self) -> Vec<LocalEvent> {
        self.lock().events.values().cloned().collect()
    }

    pub fn events_for_calendar(&self, calendar_id: &str) -> Vec<LocalEvent> {
        self.lock()
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id)
            .cloned()
            .collect()
    }

    pub fn ical_component(&self, event_id: &str) -> Option<IcalComponentRecord> {
        self.lock().ical_components.get(event_id).cloned()
    }

    pub fn ical_components(&self) -> Vec<IcalComponentRecord> {
        self.lock().ical_components.values().cloned().collect()
    }

    pub fn busytimes(&self) -> Vec<LocalBusytime> {
        self.lock().busytimes.values().cloned().collect()
    }

    pub fn alarms(&self) -> Vec<LocalAlarm> {
        self.lock().alarms.values().cloned().collect()
    }

    /// Counts, optionally restricted to one calendar.
    pub fn counts(&self, calendar_id: Option<&str>) -> StoreCounts {
        let data = self.lock();
        let in_scope = |id: &str| calendar_id.is_none_or(|c| c == id);

        StoreCounts {
            events: data
                .events
                .values()
                .filter(|e| in_scope(&e.calendar_id))
                .count(),
            ical_components: data
                .ical_components
                .values()
                .filter(|c| in_scope(&c.calendar_id))
                .count(),
            busytimes: data
                .busytimes
                .values()
                .filter(|b| in_scope(&b.calendar_id))
                .count(),
            // Alarms carry no calendar id; scope them through their busytime.
            alarms: match calendar_id {
                None => data.alarms.len(),
                Some(_) => data
                    .alarms
                    .values()
                    .filter(|a| {
                        data.busytimes
                            .get(&a.busytime_id)
                            .is_some_and(|b| in_scope(&b.calendar_id))
                    })
                    .count(),
            },
        }
    }
}

fn read_file(path: &Path) -> CalSyncResult<StoreData> {
    if !path.exists() {
        return Ok(StoreData::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.json")).unwrap();
        assert!(store.events().is_empty());
        assert_eq!(store.counts(None), StoreCounts::default());
    }

    #[test]
    fn test_committed_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = Store::open(&path).unwrap();
        let mut tx = store.transaction();
        tx.put_calendar(CalendarRecord::new("cal", "acct", "Work"));
        tx.commit().unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.calendar("cal").map(|c| c.name), Some("Work".into()));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_commits_from_separate_handles_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        // Both handles read the empty file before either writes.
        let first = Store::open(&path).unwrap();
        let second = Store::open(&path).unwrap();

        let mut tx = first.transaction();
        tx.put_calendar(CalendarRecord::new("home", "acct", "Home"));
        tx.commit().unwrap();

        let mut tx = second.transaction();
        tx.put_calendar(CalendarRecord::new("work", "acct", "Work"));
        tx.commit().unwrap();

        let reopened = Store::open(&path).unwrap();
        assert!(reopened.calendar("home").is_some());
        assert!(reopened.calendar("work").is_some());
        // The committing handle also sees the other handle's write.
        assert!(second.calendar("home").is_some());
    }
}
