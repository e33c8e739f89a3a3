//! Property test strategies for snapshots and records
//!
//! Snapshot strategies draw section keys from a small fixed alphabet and
//! items from a small integer range, so that two independently generated
//! snapshots share plenty of keys and the diff has moves to find.

use proptest::prelude::*;

pub use proptest;

use listfeed_core::{RecordId, Snapshot, Timestamp};
use listfeed_store::Record;

/// Section keys used by [`arb_snapshot`].
pub const SECTION_KEYS: [&str; 4] = ["a", "b", "c", "d"];

/// Snapshot with up to four sections and up to `max_items` unique items.
///
/// Every generated snapshot is valid: no section and no item repeats.
pub fn arb_snapshot(max_items: usize) -> impl Strategy<Value = Snapshot<&'static str, u32>> {
    let universe = u32::try_from(max_items.saturating_mul(2).max(1)).unwrap_or(u32::MAX);
    (
        proptest::sample::subsequence(SECTION_KEYS.to_vec(), 0..=SECTION_KEYS.len()).prop_shuffle(),
        proptest::collection::hash_set(0u32..universe, 0..=max_items)
            .prop_map(|items| items.into_iter().collect::<Vec<_>>())
            .prop_shuffle(),
        proptest::collection::vec(0usize..SECTION_KEYS.len(), max_items),
        proptest::collection::vec(proptest::bool::weighted(0.2), max_items),
    )
        .prop_map(|(sections, items, picks, reloads)| {
            let mut builder = Snapshot::builder();
            for key in &sections {
                builder = builder.section(*key);
            }
            if sections.is_empty() {
                return builder.build();
            }
            let mut reloaded = Vec::new();
            for ((item, pick), reload) in items.into_iter().zip(picks).zip(reloads) {
                builder = builder.items_in(sections[pick % sections.len()], [item]);
                if reload {
                    reloaded.push(item);
                }
            }
            builder.reload(reloaded).build()
        })
}

/// Sequence of snapshots to apply one after another.
pub fn arb_snapshot_sequence(
    max_items: usize,
    len: usize,
) -> impl Strategy<Value = Vec<Snapshot<&'static str, u32>>> {
    proptest::collection::vec(arb_snapshot(max_items), 1..=len)
}

/// Records with distinct ids and timestamps in `0..span_ms`.
pub fn arb_records(max: usize, span_ms: u64) -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::vec((any::<[u8; 16]>(), 0..span_ms.max(1)), 0..=max).prop_map(|raw| {
        let mut seen = std::collections::HashSet::new();
        raw.into_iter()
            .filter(|(bytes, _)| seen.insert(*bytes))
            .map(|(bytes, ts)| {
                Record::with_id(RecordId::from_bytes(bytes), Timestamp::from_millis(ts))
            })
            .collect()
    })
}
