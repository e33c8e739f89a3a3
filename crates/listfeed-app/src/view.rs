//! Headless list view
//!
//! [`ListView`] is what the reconciler drives. A real toolkit binding would
//! translate each call into its own table or collection view API;
//! [`MemoryListView`] keeps rows and cells in memory, logs every call and
//! renders itself to text.

use std::collections::HashMap;

use listfeed_core::{
    Changeset, FeedError, ItemKey, ListOp, Result, SectionKey, SectionedRows, Snapshot,
};

use crate::presentation::CellContent;

/// Cells produced for one apply, keyed by identifier.
pub type CellMap<I> = HashMap<I, CellContent>;

/// A list widget the reconciler can drive.
pub trait ListView<S, I>: Send {
    /// Register a reusable cell kind. Called once per reconciler.
    fn register_cell_kind(&mut self, kind: &'static str);

    /// Replay `changeset` in order, installing `cells` for inserted and
    /// updated rows.
    fn perform_batch(&mut self, changeset: &Changeset<S, I>, cells: &CellMap<I>) -> Result<()>;

    /// Show `snapshot` without animation, refreshing only the rows in `cells`.
    fn redraw(&mut self, snapshot: &Snapshot<S, I>, cells: &CellMap<I>) -> Result<()>;
}

impl<S, I, V: ListView<S, I> + ?Sized> ListView<S, I> for Box<V> {
    fn register_cell_kind(&mut self, kind: &'static str) {
        (**self).register_cell_kind(kind)
    }

    fn perform_batch(&mut self, changeset: &Changeset<S, I>, cells: &CellMap<I>) -> Result<()> {
        (**self).perform_batch(changeset, cells)
    }

    fn redraw(&mut self, snapshot: &Snapshot<S, I>, cells: &CellMap<I>) -> Result<()> {
        (**self).redraw(snapshot, cells)
    }
}

/// One call received by a [`MemoryListView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent<S, I> {
    /// Animated batch
    Batch {
        /// Operations replayed
        ops: Vec<ListOp<S, I>>,
        /// Cells installed
        cells: usize,
    },
    /// Non-animated redraw
    Redraw {
        /// Rows shown afterwards
        rows: usize,
        /// Cells refreshed
        cells: usize,
    },
}

/// In-memory list view with an event log.
#[derive(Debug, Clone)]
pub struct MemoryListView<S, I> {
    rows: SectionedRows<S, I>,
    cells: HashMap<I, CellContent>,
    cell_kinds: Vec<&'static str>,
    events: Vec<ViewEvent<S, I>>,
}

impl<S: SectionKey, I: ItemKey> Default for MemoryListView<S, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SectionKey, I: ItemKey> MemoryListView<S, I> {
    /// Empty view.
    pub fn new() -> Self {
        Self {
            rows: SectionedRows::new(),
            cells: HashMap::new(),
            cell_kinds: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Rows currently shown.
    pub fn rows(&self) -> &SectionedRows<S, I> {
        &self.rows
    }

    /// Identifiers currently shown, top to bottom.
    pub fn items(&self) -> Vec<I> {
        self.rows.rows().cloned().collect()
    }

    /// Cell installed for `item`.
    pub fn cell(&self, item: &I) -> Option<&CellContent> {
        self.cells.get(item)
    }

    /// Registered cell kinds.
    pub fn cell_kinds(&self) -> &[&'static str] {
        &self.cell_kinds
    }

    /// Every call received so far.
    pub fn events(&self) -> &[ViewEvent<S, I>] {
        &self.events
    }

    /// Total list operations replayed through animated batches.
    pub fn op_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| match e {
                ViewEvent::Batch { ops, .. } => ops.len(),
                ViewEvent::Redraw { .. } => 0,
            })
            .sum()
    }

    /// Forget logged events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// One line per section header and per row.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let many = self.rows.sections().len() > 1;
        for (key, items) in self.rows.sections() {
            if many {
                lines.push(format!("[{key:?}]"));
            }
            for item in items {
                let text = self
                    .cells
                    .get(item)
                    .map_or_else(|| format!("{item:?}"), ToString::to_string);
                lines.push(text);
            }
        }
        lines
    }

    fn prune_cells(&mut self) {
        let shown: std::collections::HashSet<&I> = self.rows.rows().collect();
        self.cells.retain(|item, _| shown.contains(item));
    }
}

impl<S: SectionKey, I: ItemKey> ListView<S, I> for MemoryListView<S, I> {
    fn register_cell_kind(&mut self, kind: &'static str) {
        if !self.cell_kinds.contains(&kind) {
            self.cell_kinds.push(kind);
        }
    }

    fn perform_batch(&mut self, changeset: &Changeset<S, I>, cells: &CellMap<I>) -> Result<()> {
        let mut rows = self.rows.clone();
        rows.apply(changeset)
            .map_err(|e| FeedError::internal(format!("view rejected batch: {e}")))?;
        self.rows = rows;
        self.cells
            .extend(cells.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.prune_cells();
        self.events.push(ViewEvent::Batch {
            ops: changeset.ops().to_vec(),
            cells: cells.len(),
        });
        Ok(())
    }

    fn redraw(&mut self, snapshot: &Snapshot<S, I>, cells: &CellMap<I>) -> Result<()> {
        self.rows = SectionedRows::from_snapshot(snapshot);
        self.cells
            .extend(cells.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.prune_cells();
        self.events.push(ViewEvent::Redraw {
            rows: snapshot.item_count(),
            cells: cells.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listfeed_core::{diff, ItemPath, MainSection};

    fn cells(items: &[u32]) -> CellMap<u32> {
        items
            .iter()
            .map(|i| (*i, CellContent::text(format!("#{i}"))))
            .collect()
    }

    #[test]
    fn test_batch_replays_changeset() {
        let mut view = MemoryListView::new();
        let target = Snapshot::single(MainSection::Main, [1u32, 2]);
        let changes = diff(&Snapshot::empty(), &target);
        view.perform_batch(&changes, &cells(&[1, 2])).unwrap();

        assert_eq!(view.items(), vec![1, 2]);
        assert_eq!(view.render_lines(), vec!["#1", "#2"]);
        assert!(view.rows().matches(&target));
        assert_eq!(view.op_count(), changes.len());
    }

    #[test]
    fn test_bad_batch_leaves_rows_untouched() {
        let mut view: MemoryListView<MainSection, u32> = MemoryListView::new();
        let bogus = Changeset::from_ops(vec![ListOp::Remove {
            item: 9,
            at: ItemPath::new(0, 0),
        }]);
        assert!(view.perform_batch(&bogus, &CellMap::new()).is_err());
        assert!(view.items().is_empty());
        assert!(view.events().is_empty());
    }

    #[test]
    fn test_redraw_prunes_vanished_cells() {
        let mut view = MemoryListView::new();
        view.redraw(&Snapshot::single(MainSection::Main, [1u32, 2]), &cells(&[1, 2]))
            .unwrap();
        view.redraw(&Snapshot::single(MainSection::Main, [2u32]), &CellMap::new())
            .unwrap();
        assert!(view.cell(&1).is_none());
        assert_eq!(view.render_lines(), vec!["#2"]);
        assert_eq!(view.op_count(), 0);
    }

    #[test]
    fn test_section_headers_render_when_sectioned() {
        let mut view = MemoryListView::new();
        let snap = Snapshot::builder()
            .items_in("a", [1u32])
            .items_in("b", [2u32])
            .build();
        view.redraw(&snap, &cells(&[1, 2])).unwrap();
        assert_eq!(view.render_lines(), vec!["[\"a\"]", "#1", "[\"b\"]", "#2"]);

        view.register_cell_kind("integer");
        view.register_cell_kind("integer");
        assert_eq!(view.cell_kinds(), &["integer"]);
    }
}
