//! Reconciler behaviour against an in-memory view

use std::sync::Arc;

use assert_matches::assert_matches;
use listfeed_app::{
    apply_queue, IntegerCellPresenter, ListReconciler, MemoryListView, StaticListFeeder, ViewEvent,
};
use listfeed_core::config::StaticFeedConfig;
use listfeed_core::{FeedError, MainSection, Snapshot};
use listfeed_testkit::strategies::{arb_snapshot, arb_snapshot_sequence};
use listfeed_testkit::{item_ids, CountingPresenter, DebugPresenter};
use proptest::prelude::*;

type Letters = Snapshot<&'static str, u32>;

fn snap(items: &[u32]) -> Snapshot<MainSection, u32> {
    Snapshot::single(MainSection::Main, items.iter().copied())
}

fn letters_reconciler(
    presenter: Arc<CountingPresenter<u32>>,
) -> ListReconciler<&'static str, u32, MemoryListView<&'static str, u32>> {
    ListReconciler::new(MemoryListView::new(), presenter)
}

#[test]
fn test_rendered_state_tracks_each_snapshot() {
    let presenter = CountingPresenter::new(IntegerCellPresenter);
    let mut reconciler = ListReconciler::new(MemoryListView::new(), presenter.clone());

    let steps: [&[u32]; 5] = [&[], &[1, 2, 3], &[3, 1], &[3, 1, 4], &[]];
    for items in steps {
        reconciler.apply(snap(items), true).unwrap();
        assert_eq!(reconciler.rendered(), &snap(items));
        assert!(reconciler.view().rows().matches(&snap(items)));
    }
    // 1, 2, 3 once each, then 4 once
    assert_eq!(presenter.total_calls(), 4);
}

#[test]
fn test_rotation_moves_one_item() {
    let mut reconciler = ListReconciler::new(MemoryListView::new(), IntegerCellPresenter);
    reconciler.apply(snap(&[1, 2, 3, 4]), true).unwrap();
    let report = reconciler.apply(snap(&[2, 3, 4, 1]), true).unwrap();
    assert_eq!(report.counts.moves, 1);
    assert_eq!(report.counts.total(), 1);
    assert_eq!(report.presented, 0);
}

#[test]
fn test_cross_section_move_is_not_remove_and_insert() {
    let presenter = CountingPresenter::new(DebugPresenter);
    let mut reconciler = letters_reconciler(presenter.clone());
    let before: Letters = Snapshot::builder().items_in("a", [1, 2]).items_in("b", [3]).build();
    let after: Letters = Snapshot::builder().items_in("a", [1]).items_in("b", [2, 3]).build();

    reconciler.apply(before, true).unwrap();
    presenter.reset();
    let report = reconciler.apply(after.clone(), true).unwrap();
    assert_eq!(report.counts.moves, 1);
    assert_eq!(report.counts.inserts, 0);
    assert_eq!(report.counts.removes, 0);
    assert_eq!(presenter.total_calls(), 0);
    assert!(reconciler.view().rows().matches(&after));
}

#[test]
fn test_duplicate_section_is_a_config_error() {
    let mut reconciler = letters_reconciler(CountingPresenter::new(DebugPresenter));
    let dup: Letters = Snapshot::builder().section("a").section("a").build();
    let err = reconciler.apply(dup, true).unwrap_err();
    assert_matches!(err, FeedError::DuplicateSection { .. });
    assert!(err.category().is_caller_correctable());
    assert!(reconciler.view().events().is_empty());
}

#[test]
fn test_static_feeder_renders_default_sequence() {
    let mut feeder = StaticListFeeder::new(MemoryListView::new(), &StaticFeedConfig::default());
    feeder.load().unwrap();
    let expected: Vec<u32> = (0..94).collect();
    assert_eq!(feeder.view().items(), expected);
    assert_eq!(item_ids(feeder.snapshot()), expected);
    assert_matches!(feeder.view().events(), [ViewEvent::Redraw { rows: 94, .. }]);
}

#[tokio::test]
async fn test_apply_queue_serves_concurrent_senders_in_order() {
    let mut reconciler = ListReconciler::new(MemoryListView::new(), IntegerCellPresenter);
    let (sender, queue) = apply_queue();

    let producers = (1..=5u32).map(|n| {
        let sender = sender.clone();
        async move {
            let items: Vec<u32> = (0..n).collect();
            sender
                .apply(snap(&items).with_generation(u64::from(n)), true)
                .await
        }
    }).collect::<Vec<_>>();
    let submit = async move {
        let results = futures::future::join_all(producers).await;
        drop(sender);
        results
    };
    let (results, ()) = tokio::join!(submit, queue.run(&mut reconciler));

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(reconciler.view().items(), vec![0, 1, 2, 3, 4]);
    assert_eq!(reconciler.rendered_generation(), Some(5));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After any sequence of applies the view shows exactly the last snapshot
    #[test]
    fn view_matches_last_applied_snapshot(snapshots in arb_snapshot_sequence(20, 6)) {
        let presenter = CountingPresenter::new(DebugPresenter);
        let mut reconciler = letters_reconciler(presenter);
        for snapshot in &snapshots {
            reconciler.apply(snapshot.clone(), true).unwrap();
            prop_assert!(reconciler.view().rows().matches(snapshot));
            prop_assert_eq!(reconciler.rendered(), snapshot);
        }
    }

    /// The presenter runs exactly once per inserted or reloaded identifier
    #[test]
    fn presenter_runs_once_per_new_cell(old in arb_snapshot(20), new in arb_snapshot(20)) {
        let presenter = CountingPresenter::new(DebugPresenter);
        let mut reconciler = letters_reconciler(presenter.clone());
        reconciler.apply(old, false).unwrap();
        presenter.reset();

        let report = reconciler.apply(new.clone(), true).unwrap();
        prop_assert_eq!(presenter.total_calls(), report.counts.inserts + report.counts.updates);
        for item in new.item_ids() {
            prop_assert!(presenter.calls_for(item) <= 1);
        }
    }

    /// Re-applying what is rendered never touches the view
    #[test]
    fn reapply_is_silent(snapshot in arb_snapshot(20)) {
        let mut reconciler = letters_reconciler(CountingPresenter::new(DebugPresenter));
        reconciler.apply(snapshot.clone(), true).unwrap();
        let events = reconciler.view().events().len();
        let report = reconciler.apply(snapshot, true).unwrap();
        prop_assert!(report.is_noop());
        prop_assert_eq!(reconciler.view().events().len(), events);
    }
}
