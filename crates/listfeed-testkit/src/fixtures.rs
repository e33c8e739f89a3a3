//! Test doubles for presenters and stores

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use listfeed_app::{CellContent, CellPresenter};
use listfeed_core::{FeedError, RecordId, Result};
use listfeed_store::{CommitSummary, LocalRecordStore, Record, RecordQuery, RecordStore, StoreChange};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Wraps a presenter and counts calls per identifier.
pub struct CountingPresenter<I> {
    inner: Arc<dyn CellPresenter<I>>,
    calls: Mutex<HashMap<I, usize>>,
}

impl<I: Clone + Eq + Hash> CountingPresenter<I> {
    /// Count calls made to `inner`.
    pub fn new<P: CellPresenter<I> + 'static>(inner: P) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(inner),
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Calls made for `item`.
    pub fn calls_for(&self, item: &I) -> usize {
        self.calls.lock().get(item).copied().unwrap_or(0)
    }

    /// Calls made in total.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Forget recorded calls.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl<I: Clone + Eq + Hash + Send + Sync> CellPresenter<I> for CountingPresenter<I> {
    fn cell_kind(&self) -> &'static str {
        self.inner.cell_kind()
    }

    fn present(&self, item: &I) -> Result<CellContent> {
        *self.calls.lock().entry(item.clone()).or_insert(0) += 1;
        self.inner.present(item)
    }
}

/// Presents every identifier with its debug text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugPresenter;

impl<I: fmt::Debug> CellPresenter<I> for DebugPresenter {
    fn cell_kind(&self) -> &'static str {
        "debug"
    }

    fn present(&self, item: &I) -> Result<CellContent> {
        Ok(CellContent::text(format!("{item:?}")))
    }
}

/// [`LocalRecordStore`] with switchable fetch and commit failures.
///
/// A failing commit behaves like a failed disk write: the staged records
/// are committed in memory and announced, then the error is returned.
pub struct FaultyStore {
    inner: LocalRecordStore,
    fail_fetch: AtomicBool,
    fail_commit: AtomicBool,
    fetches: AtomicUsize,
}

impl Default for FaultyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultyStore {
    /// Healthy volatile store.
    pub fn new() -> Self {
        Self {
            inner: LocalRecordStore::in_memory(),
            fail_fetch: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Make subsequent fetches fail or succeed.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent commits fail or succeed.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Fetch attempts so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Wrapped store.
    pub fn inner(&self) -> &LocalRecordStore {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FeedError::storage("injected fetch failure"));
        }
        self.inner.fetch(query).await
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: Record) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn update(&self, record: Record) -> Result<()> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn commit(&self) -> Result<CommitSummary> {
        let summary = self.inner.commit().await?;
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(FeedError::storage("injected commit failure"));
        }
        Ok(summary)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}
