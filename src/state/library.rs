use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Full contents of one collection, keyed by record id
pub type Snapshot = BTreeMap<String, Value>;

/// Callback invoked with every snapshot delivered for a subscribed collection
pub type SnapshotHandler = Box<dyn FnMut(Result<Snapshot, StoreError>) + Send>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to create store directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("field `{field}` of {collection}/{id} is not a counter")]
    NotACounter {
        collection: String,
        id: String,
        field: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One counter adjustment applied by [`EntryStore::increment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub field: &'static str,
    pub delta: i64,
    /// Lowest value the counter may reach. `None` lets it go negative.
    pub floor: Option<i64>,
}

/// The remote collection store the screens subscribe to and write through.
///
/// Collections are addressed by slash separated paths such as
/// `water_source` or `discussions/<id>/comments`. Reads only happen through
/// subscriptions, which always deliver the whole collection.
pub trait EntryStore {
    /// Register `handler` for `collection`. The current snapshot is delivered
    /// right away and a fresh one after every write to the collection.
    ///
    /// Handlers may subscribe or drop subscriptions while being called. A
    /// write made from inside a handler is not delivered back to that same
    /// handler.
    fn subscribe(
        &self,
        collection: &str,
        handler: SnapshotHandler,
    ) -> Result<Subscription, StoreError>;

    /// Overwrite all fields stored at `id`
    fn upsert(&self, collection: &str, id: &str, fields: &Value) -> Result<(), StoreError>;

    /// Merge `fields` into the existing record at `id`, leaving the fields
    /// not named untouched. Fails with `NotFound` if there is no record.
    fn update(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Store `fields` under a freshly generated key and return that key
    fn push(&self, collection: &str, fields: &Value) -> Result<String, StoreError>;

    /// Apply every delta to the counters of record `id` in one transaction:
    /// either all of them change or none do. A missing field counts as 0.
    /// Returns the stored values in the order of `deltas`.
    fn increment(
        &self,
        collection: &str,
        id: &str,
        deltas: &[CounterDelta],
    ) -> Result<Vec<i64>, StoreError>;
}

struct Listener {
    collection: String,
    handler: Arc<Mutex<SnapshotHandler>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Handle returned by [`EntryStore::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.listeners.remove(&self.id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The Library keeps every collection in a local SQLite database and
/// notifies subscribers after each write.
pub struct Library {
    conn: Connection,
    db_path: Option<PathBuf>,
    registry: Arc<Mutex<Registry>>,
}

impl Library {
    /// Open (or create) the database at `path` and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&db_path)?;
        info!(path = %db_path.display(), "store opened");

        Self::with_connection(conn, Some(db_path))
    }

    /// Store living only as long as this value, used by tests and previews
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        let library = Library {
            conn,
            db_path,
            registry: Arc::default(),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Creates the records table and its index if they don't exist.
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                collection      TEXT NOT NULL,
                id              TEXT NOT NULL,
                fields_json     TEXT NOT NULL,
                updated_at      INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_updated_at
             ON records(collection, updated_at DESC)",
            [],
        )?;

        debug!("store schema initialized");
        Ok(())
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Number of records in a collection
    pub fn record_count(&self, collection: &str) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Read the whole collection ordered by key
    pub fn snapshot(&self, collection: &str) -> Result<Snapshot, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields_json FROM records WHERE collection = ?1 ORDER BY id")?;

        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = Snapshot::new();
        for row in rows {
            let (id, json) = row?;
            snapshot.insert(id, serde_json::from_str(&json)?);
        }
        Ok(snapshot)
    }

    /// Deliver the current snapshot of `collection` to its subscribers
    fn notify(&self, collection: &str) {
        let snapshot = self.snapshot(collection);
        if let Err(e) = &snapshot {
            error!(collection, error = %e, "failed to read snapshot for subscribers");
        }

        // Handlers run with the registry unlocked
        let handlers: Vec<_> = match self.registry.lock() {
            Ok(registry) => registry
                .listeners
                .values()
                .filter(|listener| listener.collection == collection)
                .map(|listener| Arc::clone(&listener.handler))
                .collect(),
            Err(_) => return,
        };

        for handler in handlers {
            let Ok(mut handler) = handler.try_lock() else {
                warn!(collection, "subscriber busy, snapshot not delivered");
                continue;
            };
            let event = match &snapshot {
                Ok(snapshot) => Ok(snapshot.clone()),
                Err(e) => Err(StoreError::Unavailable(e.to_string())),
            };
            (*handler)(event);
        }
    }

    /// Read-modify-write of one record inside a transaction. Nothing is
    /// written when `edit` fails.
    fn modify<T>(
        &self,
        collection: &str,
        id: &str,
        edit: impl FnOnce(&mut Map<String, Value>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT fields_json FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        let mut fields: Map<String, Value> = serde_json::from_str(&json)?;
        let result = edit(&mut fields)?;

        tx.execute(
            "UPDATE records SET fields_json = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![
                serde_json::to_string(&fields)?,
                Utc::now().timestamp_millis(),
                collection,
                id
            ],
        )?;
        tx.commit()?;
        Ok(result)
    }

    fn write(&self, collection: &str, id: &str, fields: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO records (collection, id, fields_json, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET
                fields_json = excluded.fields_json,
                updated_at = excluded.updated_at",
            params![
                collection,
                id,
                serde_json::to_string(fields)?,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }
}

static PUSH_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time ordered key, so that pushed records snapshot in creation order
fn push_key() -> String {
    let sequence = PUSH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{:013}-{:08}", Utc::now().timestamp_millis(), sequence)
}

impl EntryStore for Library {
    fn subscribe(
        &self,
        collection: &str,
        mut handler: SnapshotHandler,
    ) -> Result<Subscription, StoreError> {
        // First delivery happens before registration so the handler never
        // runs while the registry is locked by someone else.
        handler(self.snapshot(collection));

        let mut registry = self
            .registry
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(
            id,
            Listener {
                collection: collection.to_string(),
                handler: Arc::new(Mutex::new(handler)),
            },
        );
        debug!(collection, id, "subscribed");

        Ok(Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        })
    }

    fn upsert(&self, collection: &str, id: &str, fields: &Value) -> Result<(), StoreError> {
        self.write(collection, id, fields)?;
        debug!(collection, id, "record written");
        self.notify(collection);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        debug!(collection, id, "record deleted");
        self.notify(collection);
        Ok(())
    }

    fn push(&self, collection: &str, fields: &Value) -> Result<String, StoreError> {
        let id = push_key();
        self.upsert(collection, &id, fields)?;
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        self.modify(collection, id, |record| {
            for (key, value) in fields {
                record.insert(key.clone(), value.clone());
            }
            Ok(())
        })?;
        debug!(collection, id, fields = fields.len(), "record updated");
        self.notify(collection);
        Ok(())
    }

    fn increment(
        &self,
        collection: &str,
        id: &str,
        deltas: &[CounterDelta],
    ) -> Result<Vec<i64>, StoreError> {
        let updated = self.modify(collection, id, |record| {
            deltas
                .iter()
                .map(|change| {
                    let current = match record.get(change.field) {
                        None | Some(Value::Null) => 0,
                        Some(value) => value.as_i64().ok_or_else(|| StoreError::NotACounter {
                            collection: collection.to_string(),
                            id: id.to_string(),
                            field: change.field.to_string(),
                        })?,
                    };
                    let mut value = current.saturating_add(change.delta);
                    if let Some(floor) = change.floor {
                        value = value.max(floor);
                    }
                    record.insert(change.field.to_string(), Value::from(value));
                    Ok(value)
                })
                .collect::<Result<Vec<i64>, StoreError>>()
        })?;

        debug!(collection, id, ?updated, "counters updated");
        self.notify(collection);
        Ok(updated)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    fn collect(library: &Library, collection: &str) -> (Subscription, mpsc::Receiver<Snapshot>) {
        let (tx, rx) = mpsc::channel();
        let subscription = library
            .subscribe(
                collection,
                Box::new(move |event| {
                    if let Ok(snapshot) = event {
                        let _ = tx.send(snapshot);
                    }
                }),
            )
            .unwrap();
        (subscription, rx)
    }

    #[test]
    fn test_subscribe_delivers_current_snapshot() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "Well"}))
            .unwrap();

        let (_subscription, rx) = collect(&library, "water_source");

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["1"]["title"], json!("Well"));
    }

    #[test]
    fn test_writes_deliver_full_snapshots() {
        let library = Library::in_memory().unwrap();
        let (_subscription, rx) = collect(&library, "water_source");
        assert!(rx.try_recv().unwrap().is_empty());

        library.upsert("water_source", "a", &json!({"title": "A"})).unwrap();
        library.upsert("water_source", "b", &json!({"title": "B"})).unwrap();
        library.delete("water_source", "a").unwrap();

        let sizes: Vec<usize> = rx.try_iter().map(|s| s.len()).collect();
        assert_eq!(sizes, vec![1, 2, 1]);
    }

    #[test]
    fn test_other_collections_are_not_notified() {
        let library = Library::in_memory().unwrap();
        let (_subscription, rx) = collect(&library, "water_source");
        rx.try_recv().unwrap();

        library.upsert("water_report", "1", &json!({"title": "Leak"})).unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let library = Library::in_memory().unwrap();
        let (subscription, rx) = collect(&library, "water_source");
        rx.try_recv().unwrap();

        subscription.unsubscribe();
        library.upsert("water_source", "1", &json!({"title": "A"})).unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_upsert_overwrites_all_fields() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "A", "description": "old"}))
            .unwrap();
        library.upsert("water_source", "1", &json!({"title": "B"})).unwrap();

        let snapshot = library.snapshot("water_source").unwrap();
        assert_eq!(snapshot["1"], json!({"title": "B"}));
        assert_eq!(library.record_count("water_source").unwrap(), 1);
    }

    #[test]
    fn test_push_generates_ordered_keys() {
        let library = Library::in_memory().unwrap();
        let first = library.push("discussions/1/comments", &json!({"content": "a"})).unwrap();
        let second = library.push("discussions/1/comments", &json!({"content": "b"})).unwrap();

        assert!(first < second);
        let snapshot = library.snapshot("discussions/1/comments").unwrap();
        let contents: Vec<&Value> = snapshot.values().map(|fields| &fields["content"]).collect();
        assert_eq!(contents, vec![&json!("a"), &json!("b")]);
    }

    fn votes(up: i64, down: i64) -> [CounterDelta; 2] {
        [
            CounterDelta { field: "upVotes", delta: up, floor: Some(0) },
            CounterDelta { field: "downVotes", delta: down, floor: Some(0) },
        ]
    }

    #[test]
    fn test_floored_counters_stop_at_zero() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "A", "upVotes": 1}))
            .unwrap();

        assert_eq!(library.increment("water_source", "1", &votes(1, 1)).unwrap(), vec![2, 1]);
        assert_eq!(library.increment("water_source", "1", &votes(-5, 0)).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_net_counter_goes_negative() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("discussions", "d1", &json!({"title": "Boil notice?", "likes": 0}))
            .unwrap();
        let likes = |delta| [CounterDelta { field: "likes", delta, floor: None }];

        assert_eq!(library.increment("discussions", "d1", &likes(-1)).unwrap(), vec![-1]);
        assert_eq!(library.increment("discussions", "d1", &likes(2)).unwrap(), vec![1]);
        assert_eq!(library.snapshot("discussions").unwrap()["d1"]["likes"], json!(1));
    }

    #[test]
    fn test_increment_missing_record() {
        let library = Library::in_memory().unwrap();

        let err = library.increment("water_source", "nope", &votes(1, 0)).unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_failed_counter_leaves_the_others_untouched() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("water_source", "1", &json!({"title": "A", "upVotes": 5, "downVotes": "x"}))
            .unwrap();
        let (_subscription, rx) = collect(&library, "water_source");
        rx.try_recv().unwrap();

        let err = library.increment("water_source", "1", &votes(-1, 1)).unwrap_err();

        assert!(matches!(err, StoreError::NotACounter { ref field, .. } if field == "downVotes"));
        assert_eq!(library.snapshot("water_source").unwrap()["1"]["upVotes"], json!(5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_merges_fields() {
        let library = Library::in_memory().unwrap();
        library
            .upsert("discussions", "d1", &json!({"title": "Old", "likes": 4, "image": "file:///a.jpg"}))
            .unwrap();
        let mut fields = Map::new();
        fields.insert("title".into(), json!("New"));

        library.update("discussions", "d1", &fields).unwrap();

        let snapshot = library.snapshot("discussions").unwrap();
        assert_eq!(
            snapshot["d1"],
            json!({"title": "New", "likes": 4, "image": "file:///a.jpg"})
        );
        assert!(matches!(
            library.update("discussions", "missing", &fields),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_handler_can_drop_its_own_subscription() {
        let library = Library::in_memory().unwrap();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let deliveries = Arc::new(AtomicU64::new(0));

        let handler_slot = Arc::clone(&slot);
        let handler_deliveries = Arc::clone(&deliveries);
        let subscription = library
            .subscribe(
                "water_source",
                Box::new(move |_| {
                    // stop listening after the first write
                    if handler_deliveries.fetch_add(1, Ordering::SeqCst) >= 1 {
                        handler_slot.lock().unwrap().take();
                    }
                }),
            )
            .unwrap();
        *slot.lock().unwrap() = Some(subscription);

        library.upsert("water_source", "1", &json!({"title": "A"})).unwrap();
        library.upsert("water_source", "2", &json!({"title": "B"})).unwrap();

        assert_eq!(deliveries.load(Ordering::SeqCst), 2);
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("water_map.db");

        {
            let library = Library::open(&path).unwrap();
            library.upsert("water_source", "1", &json!({"title": "A"})).unwrap();
        }

        let library = Library::open(&path).unwrap();
        assert_eq!(library.path(), Some(&path));
        assert_eq!(library.record_count("water_source").unwrap(), 1);
    }
}
