//! Change observer
//!
//! Binds a [`RecordQuery`] to a [`RecordStore`]. The observer fetches the
//! query once at start, then re-fetches whenever a committed transaction
//! touches a record the query admits (before or after the change). Each
//! re-fetch publishes one generation-stamped [`Snapshot`] through a
//! [`Dynamic`] cell.
//!
//! ## Coalescing
//!
//! Notifications that arrive close together are folded into one re-fetch:
//! after the first notification the observer waits `batch_window_ms`, then
//! drains whatever else is queued (up to `max_batch`). Consumers that fall
//! behind only ever see the newest snapshot.
//!
//! ## Revisions
//!
//! Every snapshot carries, for each record that was ever edited in place,
//! the generation of its latest edit. A consumer that skipped generations
//! still re-presents records edited in the ones it missed.
//!
//! ## Failure
//!
//! A failed fetch is logged and the previous snapshot stays published. The
//! edits seen in the failed batch are kept for the next successful fetch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use listfeed_core::config::{ObserverConfig, Sectioning};
use listfeed_core::reactive::{Dynamic, Subscription};
use listfeed_core::{RecordId, Result, Snapshot};
use listfeed_store::{Record, RecordQuery, RecordStore, StoreChange};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::index::RecordIndex;

/// Section key of observed snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordSection {
    /// Everything, when sectioning is off
    Main,
    /// Records whose timestamp falls on this UTC day since the epoch
    Day(u64),
}

impl RecordSection {
    fn of(record: &Record, sectioning: Sectioning) -> Self {
        match sectioning {
            Sectioning::Single => RecordSection::Main,
            Sectioning::Day => RecordSection::Day(record.timestamp.epoch_day()),
        }
    }
}

/// Snapshots published by the observer.
pub type RecordSnapshot = Snapshot<RecordSection, RecordId>;

/// Notifications folded into one re-fetch.
#[derive(Debug, Default)]
struct PendingBatch {
    notifications: usize,
    relevant: bool,
    /// Notifications were lost; any record may have changed
    lagged: bool,
    reloads: HashSet<RecordId>,
}

impl PendingBatch {
    fn lagged() -> Self {
        Self {
            relevant: true,
            lagged: true,
            ..Self::default()
        }
    }

    fn merge(&mut self, other: PendingBatch) {
        self.notifications += other.notifications;
        self.relevant |= other.relevant;
        self.lagged |= other.lagged;
        self.reloads.extend(other.reloads);
    }

    fn absorb(&mut self, query: &RecordQuery, change: &StoreChange) {
        self.notifications += 1;
        for record_change in &change.changes {
            let before = record_change.before().is_some_and(|r| query.admits(r));
            let after = record_change.after().is_some_and(|r| query.admits(r));
            if before || after {
                self.relevant = true;
            }
            if before && after {
                self.reloads.insert(record_change.id());
            }
        }
    }
}

/// Watches a store query and publishes snapshots of its result.
pub struct ChangeObserver {
    store: Arc<dyn RecordStore>,
    query: RecordQuery,
    config: ObserverConfig,
    changes: broadcast::Receiver<StoreChange>,
    snapshots: Dynamic<RecordSnapshot>,
    index: RecordIndex,
    generation: u64,
    revisions: HashMap<RecordId, u64>,
    /// Edits from batches whose fetch failed
    deferred: PendingBatch,
}

impl ChangeObserver {
    /// Bind `query` to `store`.
    ///
    /// Subscribes to the store's change feed immediately, so no commit made
    /// after construction is missed.
    ///
    /// # Errors
    ///
    /// [`listfeed_core::FeedError::InvalidQuery`] when the query is malformed.
    pub fn new(store: Arc<dyn RecordStore>, query: RecordQuery, config: ObserverConfig) -> Result<Self> {
        query.validate()?;
        let changes = store.subscribe();
        Ok(Self {
            store,
            query,
            config,
            changes,
            snapshots: Dynamic::new(Snapshot::empty()),
            index: RecordIndex::new(),
            generation: 0,
            revisions: HashMap::new(),
            deferred: PendingBatch::default(),
        })
    }

    /// Observed query.
    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    /// Cell holding the latest snapshot.
    pub fn snapshots(&self) -> Dynamic<RecordSnapshot> {
        self.snapshots.clone()
    }

    /// Subscription starting at the current snapshot.
    pub fn subscribe(&self) -> Subscription<RecordSnapshot> {
        self.snapshots.subscribe()
    }

    /// Records behind the latest snapshot.
    pub fn index(&self) -> RecordIndex {
        self.index.clone()
    }

    /// Generation of the latest published snapshot; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fetch the query and publish a snapshot.
    ///
    /// Returns whether a snapshot was published. A fetch failure is logged
    /// and leaves the previous snapshot in place.
    pub async fn refresh(&mut self) -> bool {
        self.refresh_with(PendingBatch::default()).await
    }

    async fn refresh_with(&mut self, mut batch: PendingBatch) -> bool {
        batch.merge(std::mem::take(&mut self.deferred));
        let records = match self.store.fetch(&self.query).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, generation = self.generation, "fetch failed, keeping previous snapshot");
                self.deferred = batch;
                return false;
            }
        };
        self.generation += 1;
        let reloads = self.record_revisions(&records, &batch);
        let snapshot = self.build_snapshot(&records, &reloads);
        debug!(
            generation = self.generation,
            items = snapshot.item_count(),
            sections = snapshot.section_count(),
            "publishing snapshot"
        );
        // Index first so presenters can resolve every id in the new snapshot.
        self.index.publish(self.generation, records);
        self.snapshots.set(snapshot);
        true
    }

    /// Stamp this generation on every record edited in `batch` and forget
    /// records that left the result. Returns the ids edited now.
    fn record_revisions(&mut self, records: &[Record], batch: &PendingBatch) -> HashSet<RecordId> {
        let live: HashSet<RecordId> = records.iter().map(|r| r.id).collect();
        let reloads: HashSet<RecordId> = if batch.lagged {
            live.clone()
        } else {
            batch.reloads.intersection(&live).copied().collect()
        };
        for id in &reloads {
            self.revisions.insert(*id, self.generation);
        }
        self.revisions.retain(|id, _| live.contains(id));
        reloads
    }

    fn build_snapshot(&self, records: &[Record], reloads: &HashSet<RecordId>) -> RecordSnapshot {
        let mut sections: IndexMap<RecordSection, Vec<RecordId>> = IndexMap::new();
        for record in records {
            sections
                .entry(RecordSection::of(record, self.config.sectioning))
                .or_default()
                .push(record.id);
        }
        let reloaded = records
            .iter()
            .map(|r| r.id)
            .filter(|id| reloads.contains(id));
        sections
            .into_iter()
            .fold(Snapshot::builder(), |builder, (key, ids)| builder.items_in(key, ids))
            .reload(reloaded)
            .revisions(self.revisions.iter().map(|(id, g)| (*id, *g)))
            .generation(self.generation)
            .build()
    }

    /// Publish the initial snapshot and keep following the store on a
    /// background task.
    pub async fn start(mut self) -> ObserverHandle {
        self.refresh().await;
        let snapshots = self.snapshots.clone();
        let index = self.index.clone();
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        ObserverHandle {
            snapshots,
            index,
            shutdown,
            task,
        }
    }

    /// Follow the store until `shutdown` fires or the change feed closes.
    ///
    /// Does not publish an initial snapshot; [`ChangeObserver::start`] does.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        let window = Duration::from_millis(u64::from(self.config.batch_window_ms));
        info!(
            batch_window_ms = self.config.batch_window_ms,
            max_batch = self.config.max_batch,
            "change observer starting"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("shutdown signal received");
                    break;
                }

                received = self.changes.recv() => match received {
                    Ok(change) => {
                        let mut batch = PendingBatch::default();
                        batch.absorb(&self.query, &change);
                        if !window.is_zero() {
                            tokio::time::sleep(window).await;
                        }
                        self.drain_into(&mut batch);
                        if batch.relevant || self.deferred.relevant {
                            self.refresh_with(batch).await;
                        } else {
                            debug!(notifications = batch.notifications, "ignoring unrelated commits");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "change feed lagged, re-fetching");
                        self.refresh_with(PendingBatch::lagged()).await;
                    }
                    Err(RecvError::Closed) => {
                        info!("store change feed closed");
                        break;
                    }
                },
            }
        }

        self.snapshots.close();
        info!(generation = self.generation, "change observer stopped");
    }

    fn drain_into(&mut self, batch: &mut PendingBatch) {
        let max = usize::try_from(self.config.max_batch).unwrap_or(usize::MAX);
        while batch.notifications < max {
            match self.changes.try_recv() {
                Ok(change) => batch.absorb(&self.query, &change),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "change feed lagged while batching");
                    batch.relevant = true;
                    batch.lagged = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if batch.notifications > 1 {
            debug!(notifications = batch.notifications, "coalesced commits");
        }
    }
}

/// Running observer.
pub struct ObserverHandle {
    snapshots: Dynamic<RecordSnapshot>,
    index: RecordIndex,
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ObserverHandle {
    /// Subscription starting at the current snapshot.
    pub fn subscribe(&self) -> Subscription<RecordSnapshot> {
        self.snapshots.subscribe()
    }

    /// Cell holding the latest snapshot.
    pub fn snapshots(&self) -> Dynamic<RecordSnapshot> {
        self.snapshots.clone()
    }

    /// Records behind the latest snapshot.
    pub fn index(&self) -> RecordIndex {
        self.index.clone()
    }

    /// Stop the observer and wait for its task.
    pub async fn shutdown(self) {
        // A closed channel means the task already stopped.
        let _ = self.shutdown.send(()).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "observer task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use listfeed_core::{FeedError, Timestamp};
    use listfeed_store::{LocalRecordStore, RecordFilter, SortDescriptor, SortKey};

    fn config() -> ObserverConfig {
        ObserverConfig {
            batch_window_ms: 0,
            ..ObserverConfig::default()
        }
    }

    fn items(snapshot: &RecordSnapshot) -> Vec<RecordId> {
        snapshot.item_ids().copied().collect()
    }

    #[test]
    fn test_malformed_query_is_rejected_at_construction() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let err = ChangeObserver::new(store, RecordQuery::sorted_by(vec![]), config())
            .err()
            .unwrap();
        assert_matches!(err, FeedError::InvalidQuery { .. });
    }

    #[tokio::test]
    async fn test_refresh_publishes_sorted_snapshot() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let late = Record::new(Timestamp::from_millis(20));
        let early = Record::new(Timestamp::from_millis(10));
        store.insert(late.clone()).await.unwrap();
        store.insert(early.clone()).await.unwrap();
        store.commit().await.unwrap();

        let mut observer =
            ChangeObserver::new(store, RecordQuery::by_timestamp(), config()).unwrap();
        let mut sub = observer.subscribe();
        assert!(observer.refresh().await);

        let snapshot = sub.poll().unwrap();
        assert_eq!(items(&snapshot), vec![early.id, late.id]);
        assert_eq!(snapshot.generation(), Some(1));
        assert_eq!(observer.index().len(), 2);
    }

    #[tokio::test]
    async fn test_day_sectioning_groups_by_first_appearance() {
        const DAY: u64 = 86_400_000;
        let store = Arc::new(LocalRecordStore::in_memory());
        for ts in [DAY + 1, 5, 2 * DAY, DAY + 2] {
            store.insert(Record::new(Timestamp::from_millis(ts))).await.unwrap();
        }
        store.commit().await.unwrap();

        let query = RecordQuery::sorted_by(vec![SortDescriptor::ascending(SortKey::Timestamp)]);
        let config = ObserverConfig {
            sectioning: Sectioning::Day,
            ..config()
        };
        let mut observer = ChangeObserver::new(store, query, config).unwrap();
        observer.refresh().await;
        let snapshot = observer.snapshots().get();
        let keys: Vec<RecordSection> = snapshot.section_keys().copied().collect();
        assert_eq!(
            keys,
            vec![RecordSection::Day(0), RecordSection::Day(1), RecordSection::Day(2)]
        );
        assert_eq!(snapshot.items_in(&RecordSection::Day(1)).map(<[_]>::len), Some(2));
    }

    #[tokio::test]
    async fn test_unrelated_commits_publish_nothing() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let query = RecordQuery::by_timestamp().with_filter(RecordFilter {
            label_contains: Some("keep".into()),
            ..RecordFilter::all()
        });
        let observer = ChangeObserver::new(store.clone(), query, config()).unwrap();
        let handle = observer.start().await;
        let mut sub = handle.subscribe();

        store.insert(Record::new(Timestamp::from_millis(1))).await.unwrap();
        store.commit().await.unwrap();
        let kept = Record::new(Timestamp::from_millis(2)).labelled("keep");
        store.insert(kept.clone()).await.unwrap();
        store.commit().await.unwrap();

        let snapshot = sub.changed().await.unwrap();
        assert_eq!(items(&snapshot), vec![kept.id]);
        assert_eq!(snapshot.generation(), Some(2));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_updated_record_is_marked_reloaded() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let record = Record::new(Timestamp::from_millis(1));
        store.insert(record.clone()).await.unwrap();
        store.commit().await.unwrap();

        let observer =
            ChangeObserver::new(store.clone(), RecordQuery::by_timestamp(), config()).unwrap();
        let handle = observer.start().await;
        let mut sub = handle.subscribe();

        store.update(record.clone().labelled("edited")).await.unwrap();
        store.commit().await.unwrap();
        let snapshot = sub.changed().await.unwrap();
        assert!(snapshot.is_reloaded(&record.id));
        assert_eq!(
            handle.index().get(&record.id).and_then(|r| r.label),
            Some("edited".to_string())
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_snapshot_cell() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let observer = ChangeObserver::new(store, RecordQuery::by_timestamp(), config()).unwrap();
        let handle = observer.start().await;
        let cell = handle.snapshots();
        let mut sub = handle.subscribe();
        handle.shutdown().await;
        assert!(cell.is_closed());
        assert!(sub.changed().await.is_none());
    }
}
