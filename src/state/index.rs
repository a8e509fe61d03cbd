use tracing::{error, warn};

use super::data::{EntryId, GeoEntry};
use super::library::{Snapshot, StoreError};

/// In-memory mirror of the water source collection.
///
/// The held sequence is only ever replaced wholesale by the next snapshot.
/// Entries are never edited here; writes go out to the store and come back
/// through the subscription.
#[derive(Debug, Default, Clone)]
pub struct EntryIndex {
    entries: Vec<GeoEntry>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from already parsed entries, keeping the first
    /// occurrence of each id.
    pub fn from_entries(entries: impl IntoIterator<Item = GeoEntry>) -> Self {
        let mut index = Self::new();
        index.replace(entries);
        index
    }

    fn replace(&mut self, entries: impl IntoIterator<Item = GeoEntry>) {
        let mut next: Vec<GeoEntry> = Vec::new();
        for entry in entries {
            if next.iter().any(|e| e.id == entry.id) {
                warn!(id = %entry.id, "duplicate id in snapshot, keeping first");
                continue;
            }
            next.push(entry);
        }
        self.entries = next;
    }

    /// Replace the held entries with the contents of `snapshot`.
    ///
    /// Records that don't parse are skipped with a warning so one bad record
    /// can't hide the rest of the collection.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        let entries = snapshot
            .iter()
            .filter_map(|(id, fields)| match GeoEntry::from_record(id, fields) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(id, error = %e, "skipping malformed water source");
                    None
                }
            })
            .collect::<Vec<_>>();
        self.replace(entries);
    }

    /// Subscription entry point. A failed delivery keeps the previous
    /// snapshot. Returns whether the index changed.
    pub fn on_event(&mut self, event: Result<Snapshot, StoreError>) -> bool {
        match event {
            Ok(snapshot) => {
                self.apply_snapshot(&snapshot);
                true
            }
            Err(e) => {
                error!(error = %e, "water source subscription failed, keeping last snapshot");
                false
            }
        }
    }

    pub fn entries(&self) -> &[GeoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&GeoEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&GeoEntry> {
        self.entries.get(index)
    }

    /// Case-insensitive exact title lookup
    pub fn find_by_title(&self, title: &str) -> Option<&GeoEntry> {
        let title = title.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.title.to_lowercase() == title)
    }
}
