//! Shared id → record lookup
//!
//! The change observer publishes every fetched result set here before the
//! matching snapshot; presenters read from it while building cells.
//!
//! A consumer may still be applying an older snapshot when a newer fetch
//! lands. Records that dropped out of the result are therefore retired, not
//! removed: they stay readable until the consumer reports, through
//! [`RecordIndex::release_through`], that it rendered a generation without
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use listfeed_core::RecordId;
use listfeed_store::Record;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct IndexState {
    live: HashMap<RecordId, Record>,
    /// Records gone from the result, with the generation that dropped them
    retired: HashMap<RecordId, (u64, Record)>,
}

/// Records of the latest fetched result set, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    state: Arc<RwLock<IndexState>>,
}

impl RecordIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the result set fetched for `generation`.
    ///
    /// Records missing from it are retired at `generation`.
    pub fn publish(&self, generation: u64, records: impl IntoIterator<Item = Record>) {
        let fresh: HashMap<_, _> = records.into_iter().map(|r| (r.id, r)).collect();
        let mut state = self.state.write();
        let previous = std::mem::replace(&mut state.live, fresh);
        for (id, record) in previous {
            if !state.live.contains_key(&id) {
                state.retired.entry(id).or_insert((generation, record));
            }
        }
        let IndexState { live, retired } = &mut *state;
        retired.retain(|id, _| !live.contains_key(id));
    }

    /// Replace everything, dropping retired records too.
    pub fn replace(&self, records: impl IntoIterator<Item = Record>) {
        let mut state = self.state.write();
        state.live = records.into_iter().map(|r| (r.id, r)).collect();
        state.retired.clear();
    }

    /// Forget records retired at or before `generation`.
    ///
    /// Called once a snapshot of `generation` is rendered.
    pub fn release_through(&self, generation: u64) {
        self.state
            .write()
            .retired
            .retain(|_, (retired_at, _)| *retired_at > generation);
    }

    /// Look up a record, live or retired.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        let state = self.state.read();
        state
            .live
            .get(id)
            .or_else(|| state.retired.get(id).map(|(_, record)| record))
            .cloned()
    }

    /// Number of records in the latest result set.
    pub fn len(&self) -> usize {
        self.state.read().live.len()
    }

    /// Whether the latest result set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of retired records still readable.
    pub fn retired(&self) -> usize {
        self.state.read().retired.len()
    }
}
