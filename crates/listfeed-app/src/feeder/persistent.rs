//! Persistence-backed list feeder

use std::sync::Arc;

use listfeed_core::config::FeedConfig;
use listfeed_core::reactive::{Dynamic, Subscription};
use listfeed_core::{Clock, RecordId, Result};
use listfeed_store::{Record, RecordQuery, RecordStore};
use tracing::{info, warn};

use crate::command::CreateItemCommand;
use crate::index::RecordIndex;
use crate::observer::{ChangeObserver, ObserverHandle, RecordSection, RecordSnapshot};
use crate::presentation::RecordCellPresenter;
use crate::reconciler::{ApplyReport, ListReconciler};
use crate::view::ListView;

/// Keeps a list in step with a store query.
///
/// The feeder owns the reconciler and is meant to live on the task that owns
/// the view. The change observer runs on its own task; snapshots reach the
/// feeder through [`sync`](Self::sync) or [`next_update`](Self::next_update).
pub struct PersistentListFeeder<V> {
    reconciler: ListReconciler<RecordSection, RecordId, V>,
    updates: Subscription<RecordSnapshot>,
    index: RecordIndex,
    observer: ObserverHandle,
    command: CreateItemCommand,
    animate: bool,
}

impl<V: ListView<RecordSection, RecordId>> PersistentListFeeder<V> {
    /// Show every record, oldest first, and start following the store.
    pub async fn start(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        view: V,
        config: &FeedConfig,
    ) -> Result<Self> {
        Self::with_query(store, clock, view, RecordQuery::by_timestamp(), config).await
    }

    /// Show the result of `query` and start following the store.
    ///
    /// The initial result is rendered without animation before returning.
    ///
    /// # Errors
    ///
    /// [`listfeed_core::FeedError::InvalidQuery`] when `query` is malformed.
    pub async fn with_query(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        view: V,
        query: RecordQuery,
        config: &FeedConfig,
    ) -> Result<Self> {
        let observer = ChangeObserver::new(store.clone(), query, config.observer.clone())?;
        let index = observer.index();
        let presenter = RecordCellPresenter::new(index.clone());
        let reconciler = ListReconciler::new(view, presenter);
        let updates = observer.subscribe();
        let observer = observer.start().await;

        let mut feeder = Self {
            reconciler,
            updates,
            index,
            observer,
            command: CreateItemCommand::new(store, clock),
            animate: config.view.animate,
        };
        if let Some(snapshot) = feeder.updates.poll() {
            let report = feeder.reconciler.apply(snapshot, false)?;
            feeder.release(&report);
            info!(items = feeder.reconciler.rendered().item_count(), presented = report.presented, "initial list loaded");
        }
        Ok(feeder)
    }

    /// Apply the newest snapshot if one arrived since the last call.
    pub fn sync(&mut self) -> Option<Result<ApplyReport>> {
        let snapshot = self.updates.poll()?;
        Some(self.apply(snapshot))
    }

    /// Wait for the next snapshot and apply it.
    ///
    /// Returns `None` once the observer has stopped.
    pub async fn next_update(&mut self) -> Option<Result<ApplyReport>> {
        let snapshot = self.updates.changed().await?;
        Some(self.apply(snapshot))
    }

    fn apply(&mut self, snapshot: RecordSnapshot) -> Result<ApplyReport> {
        let result = self.reconciler.apply(snapshot, self.animate);
        match &result {
            Ok(report) => self.release(report),
            Err(e) => warn!(error = %e, category = %e.category(), "snapshot not applied"),
        }
        result
    }

    /// Records retired up to the rendered generation are no longer shown.
    fn release(&self, report: &ApplyReport) {
        if let Some(generation) = report.generation {
            self.index.release_through(generation);
        }
    }

    /// Append a record stamped with the current time.
    pub async fn create_item(&self) -> Result<Record> {
        self.command.execute().await
    }

    /// Append a labelled record stamped with the current time.
    pub async fn create_labelled(&self, label: impl Into<String>) -> Result<Record> {
        self.command.execute_labelled(label).await
    }

    /// Snapshot currently shown.
    pub fn rendered(&self) -> &RecordSnapshot {
        self.reconciler.rendered()
    }

    /// Cell holding the newest published snapshot, applied or not.
    pub fn snapshots(&self) -> Dynamic<RecordSnapshot> {
        self.observer.snapshots()
    }

    /// Snapshots published but never applied because a newer one replaced them.
    pub fn skipped(&self) -> u64 {
        self.updates.skipped()
    }

    /// The driven view.
    pub fn view(&self) -> &V {
        self.reconciler.view()
    }

    /// Stop the observer and give up the view.
    pub async fn shutdown(self) -> V {
        self.observer.shutdown().await;
        self.reconciler.into_view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::MemoryListView;
    use listfeed_core::{ManualClock, Timestamp};
    use listfeed_store::LocalRecordStore;

    fn config() -> FeedConfig {
        let mut config = FeedConfig::default();
        config.observer.batch_window_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_existing_records_render_on_start() {
        let store = Arc::new(LocalRecordStore::in_memory());
        store.insert(Record::new(Timestamp::from_millis(0))).await.unwrap();
        store.commit().await.unwrap();

        let feeder = PersistentListFeeder::start(
            store,
            Arc::new(ManualClock::new(0)),
            MemoryListView::new(),
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(feeder.view().render_lines(), vec!["1970-01-01 00:00:00.000"]);
        feeder.shutdown().await;
    }

    #[tokio::test]
    async fn test_created_item_appears_after_next_update() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let mut feeder = PersistentListFeeder::start(
            store,
            Arc::new(ManualClock::with_tick(5_000, 1_000)),
            MemoryListView::new(),
            &config(),
        )
        .await
        .unwrap();
        assert!(feeder.rendered().is_empty());

        let record = feeder.create_item().await.unwrap();
        let report = feeder.next_update().await.unwrap().unwrap();
        assert_eq!(report.counts.inserts, 1);
        assert_eq!(report.presented, 1);
        assert!(report.animated);
        assert_eq!(feeder.rendered().item_ids().copied().collect::<Vec<_>>(), vec![record.id]);

        let view = feeder.shutdown().await;
        assert_eq!(view.render_lines(), vec!["1970-01-01 00:00:05.000"]);
    }

    #[tokio::test]
    async fn test_applied_deletion_releases_retired_record() {
        let store = Arc::new(LocalRecordStore::in_memory());
        let record = Record::new(Timestamp::from_millis(0));
        store.insert(record.clone()).await.unwrap();
        store.commit().await.unwrap();
        let mut feeder = PersistentListFeeder::start(
            store.clone(),
            Arc::new(ManualClock::new(0)),
            MemoryListView::new(),
            &config(),
        )
        .await
        .unwrap();

        store.delete(record.id).await.unwrap();
        store.commit().await.unwrap();
        let report = feeder.next_update().await.unwrap().unwrap();
        assert_eq!(report.counts.removes, 1);
        assert_eq!(feeder.index.retired(), 0);
        assert!(feeder.index.get(&record.id).is_none());
        feeder.shutdown().await;
    }
}
