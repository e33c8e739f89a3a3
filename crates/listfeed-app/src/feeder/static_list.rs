//! Static list feeder

use listfeed_core::config::StaticFeedConfig;
use listfeed_core::{MainSection, Result, Snapshot};

use crate::presentation::IntegerCellPresenter;
use crate::reconciler::{ApplyReport, ListReconciler};
use crate::view::ListView;

/// Populates a list with `0..count` and never changes it afterwards.
pub struct StaticListFeeder<V> {
    snapshot: Snapshot<MainSection, u32>,
    reconciler: ListReconciler<MainSection, u32, V>,
}

impl<V: ListView<MainSection, u32>> StaticListFeeder<V> {
    /// Feeder showing `config.count` integers in `view`.
    pub fn new(view: V, config: &StaticFeedConfig) -> Self {
        Self {
            snapshot: Snapshot::single(MainSection::Main, 0..config.count),
            reconciler: ListReconciler::new(view, IntegerCellPresenter),
        }
    }

    /// The fixed snapshot.
    pub fn snapshot(&self) -> &Snapshot<MainSection, u32> {
        &self.snapshot
    }

    /// Show the sequence. Loading again leaves the view alone.
    pub fn load(&mut self) -> Result<ApplyReport> {
        self.reconciler.apply(self.snapshot.clone(), false)
    }

    /// The driven view.
    pub fn view(&self) -> &V {
        self.reconciler.view()
    }

    /// Give up the view.
    pub fn into_view(self) -> V {
        self.reconciler.into_view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::MemoryListView;

    #[test]
    fn test_default_feed_shows_94_integers_once() {
        let mut feeder = StaticListFeeder::new(MemoryListView::new(), &StaticFeedConfig::default());
        let report = feeder.load().unwrap();
        assert_eq!(report.presented, 94);
        assert!(!report.animated);

        let lines = feeder.view().render_lines();
        assert_eq!(lines.len(), 94);
        assert_eq!(lines.first().map(String::as_str), Some("0"));
        assert_eq!(lines.last().map(String::as_str), Some("93"));

        assert!(feeder.load().unwrap().is_noop());
        assert_eq!(feeder.view().events().len(), 1);
    }

    #[test]
    fn test_zero_count_shows_nothing() {
        let mut feeder =
            StaticListFeeder::new(MemoryListView::new(), &StaticFeedConfig { count: 0 });
        let report = feeder.load().unwrap();
        assert_eq!(report.presented, 0);
        assert_eq!(report.counts.section_ops, 1);
        assert!(feeder.into_view().items().is_empty());
    }
}
