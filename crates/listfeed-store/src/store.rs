//! Record store: staging, commits, change notification
//!
//! A store works like an editing context. `insert`, `update` and `delete`
//! stage changes; `commit` closes the transaction. Committing applies the
//! staged changes to the visible record set, broadcasts exactly one
//! [`StoreChange`] for the transaction, and then writes the record set to
//! disk when the store is file-backed.
//!
//! A failed disk write is reported to the caller but the transaction is not
//! rolled back: the records stay visible and the store stays dirty, so the
//! next commit writes them again.
//!
//! Disk writes from concurrent commits are serialized. Each write takes the
//! newest committed record set, so the file never goes back to an older
//! transaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use listfeed_core::{FeedError, RecordId, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::query::RecordQuery;
use crate::record::{Record, RecordChange, StoreChange};

/// Capacity of the change broadcast; slow subscribers see `Lagged`.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

const STORE_FILE_VERSION: u32 = 1;

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Transaction number, or `None` when nothing was staged
    pub txn: Option<u64>,
    /// Number of record-level changes applied
    pub changes: usize,
}

/// Persistence layer holding records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Evaluate a query against committed records.
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>>;

    /// Look up one committed record.
    async fn get(&self, id: RecordId) -> Result<Option<Record>>;

    /// Stage a new record.
    async fn insert(&self, record: Record) -> Result<()>;

    /// Stage new field values for an existing record.
    async fn update(&self, record: Record) -> Result<()>;

    /// Stage a deletion. Returns whether the record existed.
    async fn delete(&self, id: RecordId) -> Result<bool>;

    /// Close the current transaction.
    async fn commit(&self) -> Result<CommitSummary>;

    /// Receive one notification per committed transaction.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        (**self).fetch(query).await
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        (**self).get(id).await
    }

    async fn insert(&self, record: Record) -> Result<()> {
        (**self).insert(record).await
    }

    async fn update(&self, record: Record) -> Result<()> {
        (**self).update(record).await
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        (**self).delete(id).await
    }

    async fn commit(&self) -> Result<CommitSummary> {
        (**self).commit().await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        (**self).subscribe()
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Insert(Record),
    Update(Record),
    Delete(RecordId),
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<RecordId, Record>,
    staged: Vec<Staged>,
    txn: u64,
    dirty: bool,
}

impl StoreState {
    fn exists_after_staging(&self, id: RecordId) -> bool {
        let mut exists = self.records.contains_key(&id);
        for change in &self.staged {
            match change {
                Staged::Insert(r) if r.id == id => exists = true,
                Staged::Delete(d) if *d == id => exists = false,
                _ => {}
            }
        }
        exists
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: Vec<Record>,
}

/// In-process store, optionally backed by a JSON file.
pub struct LocalRecordStore {
    state: Mutex<StoreState>,
    changes: broadcast::Sender<StoreChange>,
    path: Option<PathBuf>,
    /// Held for the whole snapshot-write-rename sequence
    writer: AsyncMutex<()>,
}

impl LocalRecordStore {
    /// Volatile store.
    pub fn in_memory() -> Self {
        Self::with_records(Vec::new(), None)
    }

    /// File-backed store; loads `path` if it exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path).await {
            Ok(bytes) => {
                let file: StoreFile = serde_json::from_slice(&bytes)?;
                if file.version != STORE_FILE_VERSION {
                    return Err(FeedError::storage(format!(
                        "unsupported store file version {} in {}",
                        file.version,
                        path.display()
                    )));
                }
                file.records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(FeedError::storage(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        info!(path = %path.display(), records = records.len(), "opened record store");
        Ok(Self::with_records(records, Some(path)))
    }

    fn with_records(records: Vec<Record>, path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(StoreState {
                records: records.into_iter().map(|r| (r.id, r)).collect(),
                ..StoreState::default()
            }),
            changes,
            path,
            writer: AsyncMutex::new(()),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether no records are committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether changes are staged but not committed.
    pub fn has_staged(&self) -> bool {
        !self.state.lock().staged.is_empty()
    }

    /// Whether committed records have not reached disk yet.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Write the committed records if any are not on disk yet.
    async fn persist(&self, path: &Path) -> Result<()> {
        let _writer = self.writer.lock().await;
        let (txn, mut records) = {
            let state = self.state.lock();
            if !state.dirty {
                return Ok(());
            }
            let records: Vec<Record> = state.records.values().cloned().collect();
            (state.txn, records)
        };
        records.sort_by_key(|r| r.id);
        let bytes = serde_json::to_vec_pretty(&StoreFile {
            version: STORE_FILE_VERSION,
            records,
        })?;

        // Write to a sibling temp file, then rename over the target.
        let tmp = path.with_extension("json.tmp");
        let write = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, path).await
        };
        write.await.map_err(|e| {
            FeedError::storage(format!("failed to write {}: {e}", path.display()))
        })?;

        // A commit that landed during the write still needs its own pass.
        let mut state = self.state.lock();
        if state.txn == txn {
            state.dirty = false;
        }
        debug!(txn, "records written");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        query.validate()?;
        let state = self.state.lock();
        Ok(query.evaluate(state.records.values()))
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.state.lock().records.get(&id).cloned())
    }

    async fn insert(&self, record: Record) -> Result<()> {
        let mut state = self.state.lock();
        if state.exists_after_staging(record.id) {
            return Err(FeedError::storage(format!("record {} already exists", record.id)));
        }
        state.staged.push(Staged::Insert(record));
        Ok(())
    }

    async fn update(&self, record: Record) -> Result<()> {
        let mut state = self.state.lock();
        if !state.exists_after_staging(record.id) {
            return Err(FeedError::storage(format!("record {} does not exist", record.id)));
        }
        state.staged.push(Staged::Update(record));
        Ok(())
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.exists_after_staging(id) {
            return Ok(false);
        }
        state.staged.push(Staged::Delete(id));
        Ok(true)
    }

    async fn commit(&self) -> Result<CommitSummary> {
        let (summary, notification) = {
            let mut state = self.state.lock();
            let staged = std::mem::take(&mut state.staged);
            let mut changes = Vec::with_capacity(staged.len());
            for change in staged {
                match change {
                    Staged::Insert(record) => {
                        state.records.insert(record.id, record.clone());
                        changes.push(RecordChange::Inserted(record));
                    }
                    Staged::Update(record) => {
                        if let Some(before) = state.records.insert(record.id, record.clone()) {
                            if before != record {
                                changes.push(RecordChange::Updated {
                                    before,
                                    after: record,
                                });
                            }
                        }
                    }
                    Staged::Delete(id) => {
                        if let Some(record) = state.records.remove(&id) {
                            changes.push(RecordChange::Deleted(record));
                        }
                    }
                }
            }
            if changes.is_empty() {
                (CommitSummary::default(), None)
            } else {
                state.txn += 1;
                state.dirty = true;
                let summary = CommitSummary {
                    txn: Some(state.txn),
                    changes: changes.len(),
                };
                let notification = StoreChange {
                    txn: state.txn,
                    changes,
                };
                (summary, Some(notification))
            }
        };

        if let Some(notification) = notification {
            debug!(txn = notification.txn, changes = summary.changes, "committed transaction");
            // No receivers is fine: nothing is observing yet.
            let _ = self.changes.send(notification);
        }

        if let Some(path) = self.path.as_deref() {
            if let Err(e) = self.persist(path).await {
                warn!(error = %e, "durable write failed, records kept in memory");
                return Err(e);
            }
        }
        Ok(summary)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use listfeed_core::Timestamp;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[tokio::test]
    async fn test_staged_changes_are_invisible_until_commit() {
        let store = LocalRecordStore::in_memory();
        store.insert(Record::new(ts(1))).await.unwrap();
        assert!(store.has_staged());
        assert!(store.fetch(&RecordQuery::by_timestamp()).await.unwrap().is_empty());

        let summary = store.commit().await.unwrap();
        assert_eq!(summary.txn, Some(1));
        assert_eq!(store.fetch(&RecordQuery::by_timestamp()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_notification_per_transaction() {
        let store = LocalRecordStore::in_memory();
        let mut rx = store.subscribe();
        store.insert(Record::new(ts(1))).await.unwrap();
        store.insert(Record::new(ts(2))).await.unwrap();
        store.commit().await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.txn, 1);
        assert_eq!(change.changes.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_commit_is_silent() {
        let store = LocalRecordStore::in_memory();
        let mut rx = store.subscribe();
        assert_eq!(store.commit().await.unwrap(), CommitSummary::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = LocalRecordStore::in_memory();
        let record = Record::new(ts(1));
        store.insert(record.clone()).await.unwrap();
        store.commit().await.unwrap();

        let mut rx = store.subscribe();
        let mut moved = record.clone();
        moved.timestamp = ts(5);
        store.update(moved.clone()).await.unwrap();
        store.commit().await.unwrap();
        assert_matches!(
            rx.recv().await.unwrap().changes.as_slice(),
            [RecordChange::Updated { .. }]
        );
        assert_eq!(store.get(record.id).await.unwrap(), Some(moved));

        assert!(store.delete(record.id).await.unwrap());
        store.commit().await.unwrap();
        assert_matches!(
            rx.recv().await.unwrap().changes.as_slice(),
            [RecordChange::Deleted(_)]
        );
        assert!(!store.delete(record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_duplicate_insert_and_unknown_update() {
        let store = LocalRecordStore::in_memory();
        let record = Record::new(ts(1));
        store.insert(record.clone()).await.unwrap();
        assert!(store.insert(record.clone()).await.is_err());
        assert!(store.update(Record::new(ts(2))).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_query_is_rejected() {
        let store = LocalRecordStore::in_memory();
        let err = store.fetch(&RecordQuery::sorted_by(vec![])).await.unwrap_err();
        assert_matches!(err, FeedError::InvalidQuery { .. });
    }

    #[tokio::test]
    async fn test_file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let record = Record::new(ts(7)).labelled("first");
        {
            let store = LocalRecordStore::open(&path).await.unwrap();
            assert!(store.is_empty());
            store.insert(record.clone()).await.unwrap();
            store.commit().await.unwrap();
            assert!(!store.is_dirty());
        }
        let reopened = LocalRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(record.id).await.unwrap(), Some(record));
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_concurrent_commits_both_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = LocalRecordStore::open(&path).await.unwrap();
        let first = Record::new(ts(1));
        let second = Record::new(ts(2));

        for _ in 0..20 {
            store.insert(Record::new(ts(0))).await.unwrap();
        }
        store.insert(first.clone()).await.unwrap();
        let (a, b) = futures::join!(store.commit(), async {
            store.insert(second.clone()).await.unwrap();
            store.commit().await
        });
        assert_eq!(a.unwrap().changes, 21);
        assert_eq!(b.unwrap().changes, 1);
        assert!(!store.is_dirty());

        let reopened = LocalRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 22);
        assert_eq!(reopened.get(first.id).await.unwrap(), Some(first));
        assert_eq!(reopened.get(second.id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_records_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("records.json");
        let store = LocalRecordStore::open(&path).await.unwrap();
        let mut rx = store.subscribe();
        store.insert(Record::new(ts(1))).await.unwrap();

        let err = store.commit().await.unwrap_err();
        assert_matches!(err, FeedError::Storage { .. });
        assert!(store.is_dirty());
        assert_eq!(store.len(), 1);
        assert_eq!(rx.recv().await.unwrap().txn, 1);
    }
}
