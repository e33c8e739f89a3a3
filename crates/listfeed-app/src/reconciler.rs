//! List reconciler
//!
//! Owns the rendered state of one list and the view that shows it. Each
//! [`ListReconciler::apply`] diffs the rendered snapshot against a new one,
//! asks the presenter for the cells that need content, and hands the batch
//! to the view. Rendered state changes only when all of that succeeds.
//!
//! `apply` takes `&mut self`, so calls on one reconciler are serialized by
//! ownership. Callers on other tasks go through [`crate::queue::ApplyQueue`].

use std::sync::Arc;

use listfeed_core::{diff, ChangeCounts, FeedError, ItemKey, Result, SectionKey, Snapshot};
use tracing::{debug, trace, warn};

use crate::presentation::{CellContent, CellPresenter};
use crate::view::{CellMap, ListView};

/// What one `apply` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Operations handed to the view, by kind
    pub counts: ChangeCounts,
    /// Presenter calls made
    pub presented: usize,
    /// Cells replaced by a placeholder
    pub placeholders: usize,
    /// Whether the view animated the batch
    pub animated: bool,
    /// Generation of the snapshot now rendered
    pub generation: Option<u64>,
}

impl ApplyReport {
    /// Whether the view was left alone.
    pub fn is_noop(&self) -> bool {
        self.counts.total() == 0
    }
}

/// Diffs snapshots into a [`ListView`].
pub struct ListReconciler<S, I, V> {
    view: V,
    presenter: Arc<dyn CellPresenter<I>>,
    rendered: Snapshot<S, I>,
    rendered_generation: Option<u64>,
}

impl<S, I, V> ListReconciler<S, I, V>
where
    S: SectionKey,
    I: ItemKey,
    V: ListView<S, I>,
{
    /// Bind `presenter` to `view` and register its cell kind.
    pub fn new<P: CellPresenter<I> + 'static>(mut view: V, presenter: P) -> Self {
        view.register_cell_kind(presenter.cell_kind());
        Self {
            view,
            presenter: Arc::new(presenter),
            rendered: Snapshot::empty(),
            rendered_generation: None,
        }
    }

    /// Snapshot currently shown.
    pub fn rendered(&self) -> &Snapshot<S, I> {
        &self.rendered
    }

    /// Highest generation applied so far.
    pub fn rendered_generation(&self) -> Option<u64> {
        self.rendered_generation
    }

    /// The driven view.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// The driven view, mutably.
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Give up the view.
    pub fn into_view(self) -> V {
        self.view
    }

    /// Make `snapshot` the rendered state.
    ///
    /// # Errors
    ///
    /// - [`FeedError::DuplicateItem`] / [`FeedError::DuplicateSection`] when
    ///   the snapshot repeats a key
    /// - [`FeedError::StaleSnapshot`] when its generation is older than the
    ///   rendered one
    /// - whatever the view reports when it cannot perform the batch
    ///
    /// In every error case the rendered state and the view are unchanged.
    pub fn apply(&mut self, snapshot: Snapshot<S, I>, animated: bool) -> Result<ApplyReport> {
        if Snapshot::ptr_eq(&snapshot, &self.rendered) {
            trace!("snapshot already rendered");
            return Ok(self.noop_report(animated));
        }
        snapshot.validate()?;
        if let (Some(incoming), Some(rendered)) = (snapshot.generation(), self.rendered_generation)
        {
            if incoming < rendered {
                warn!(incoming, rendered, "rejecting stale snapshot");
                return Err(FeedError::stale_snapshot(incoming, rendered));
            }
        }

        let changeset = diff(&self.rendered, &snapshot);
        let generation = snapshot.generation().or(self.rendered_generation);
        if changeset.is_empty() {
            self.rendered = snapshot;
            self.rendered_generation = generation;
            return Ok(self.noop_report(animated));
        }

        let mut cells = CellMap::new();
        let mut placeholders = 0;
        for item in changeset.inserted_items().chain(changeset.updated_items()) {
            if cells.contains_key(item) {
                continue;
            }
            let cell = match self.presenter.present(item) {
                Ok(cell) => cell,
                Err(e) => {
                    warn!(error = %e, category = %e.category(), "showing placeholder cell");
                    placeholders += 1;
                    CellContent::placeholder()
                }
            };
            cells.insert(item.clone(), cell);
        }

        if animated {
            self.view.perform_batch(&changeset, &cells)?;
        } else {
            self.view.redraw(&snapshot, &cells)?;
        }

        let counts = changeset.counts();
        debug!(
            inserts = counts.inserts,
            removes = counts.removes,
            moves = counts.moves,
            updates = counts.updates,
            section_ops = counts.section_ops,
            animated,
            "applied snapshot"
        );
        self.rendered = snapshot;
        self.rendered_generation = generation;
        Ok(ApplyReport {
            counts,
            presented: cells.len(),
            placeholders,
            animated,
            generation,
        })
    }

    fn noop_report(&self, animated: bool) -> ApplyReport {
        ApplyReport {
            animated,
            generation: self.rendered_generation,
            ..ApplyReport::default()
        }
    }
}
