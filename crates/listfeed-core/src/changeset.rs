//! Changesets: incremental changes to a sectioned list
//!
//! A [`Changeset`] describes how to turn one rendered list into another
//! without a full reload. Operations are applied **in order**, and every
//! index or path refers to the list as it is at the moment that operation is
//! applied. Views can therefore replay a changeset one operation at a time.

use crate::snapshot::{ItemPath, Snapshot};
use crate::identity::{ItemKey, SectionKey};

/// One list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp<S, I> {
    /// Insert an empty section. Sections at and after `index` shift down.
    InsertSection {
        /// Section key
        key: S,
        /// Position to insert at (0-indexed)
        index: usize,
    },

    /// Remove a section together with whatever rows it still holds.
    RemoveSection {
        /// Section key
        key: S,
        /// Position of the section (0-indexed)
        index: usize,
    },

    /// Move a section with its rows.
    MoveSection {
        /// Section key
        key: S,
        /// Current position
        from: usize,
        /// Position after the move
        to: usize,
    },

    /// Insert a row.
    Insert {
        /// Identifier being inserted
        item: I,
        /// Position to insert at
        at: ItemPath,
    },

    /// Remove a row.
    Remove {
        /// Identifier being removed
        item: I,
        /// Current position
        at: ItemPath,
    },

    /// Move a row, within or across sections.
    Move {
        /// Identifier being moved
        item: I,
        /// Current position
        from: ItemPath,
        /// Position after the move, measured once the row has been taken out
        to: ItemPath,
    },

    /// Re-present a row in place.
    Update {
        /// Identifier whose content changed
        item: I,
        /// Current position
        at: ItemPath,
    },
}

impl<S, I> ListOp<S, I> {
    /// Operation name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ListOp::InsertSection { .. } => "insert_section",
            ListOp::RemoveSection { .. } => "remove_section",
            ListOp::MoveSection { .. } => "move_section",
            ListOp::Insert { .. } => "insert",
            ListOp::Remove { .. } => "remove",
            ListOp::Move { .. } => "move",
            ListOp::Update { .. } => "update",
        }
    }
}

/// Per-kind operation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    /// Row inserts
    pub inserts: usize,
    /// Row removes
    pub removes: usize,
    /// Row moves
    pub moves: usize,
    /// Row updates
    pub updates: usize,
    /// Section inserts, removes and moves
    pub section_ops: usize,
}

impl ChangeCounts {
    /// Total number of operations.
    pub fn total(&self) -> usize {
        self.inserts + self.removes + self.moves + self.updates + self.section_ops
    }
}

/// Ordered list of operations between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset<S, I> {
    ops: Vec<ListOp<S, I>>,
}

impl<S, I> Default for Changeset<S, I> {
    fn default() -> Self {
        Self { ops: Vec::new() }
    }
}

impl<S, I> Changeset<S, I> {
    /// Changeset from operations in application order.
    pub fn from_ops(ops: Vec<ListOp<S, I>>) -> Self {
        Self { ops }
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[ListOp<S, I>] {
        &self.ops
    }

    /// Consume into the operation list.
    pub fn into_ops(self) -> Vec<ListOp<S, I>> {
        self.ops
    }

    /// Whether applying this changeset would change nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Count operations by kind.
    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for op in &self.ops {
            match op {
                ListOp::Insert { .. } => counts.inserts += 1,
                ListOp::Remove { .. } => counts.removes += 1,
                ListOp::Move { .. } => counts.moves += 1,
                ListOp::Update { .. } => counts.updates += 1,
                ListOp::InsertSection { .. }
                | ListOp::RemoveSection { .. }
                | ListOp::MoveSection { .. } => counts.section_ops += 1,
            }
        }
        counts
    }

    /// Identifiers that this changeset inserts, in application order.
    pub fn inserted_items(&self) -> impl Iterator<Item = &I> {
        self.ops.iter().filter_map(|op| match op {
            ListOp::Insert { item, .. } => Some(item),
            _ => None,
        })
    }

    /// Identifiers that this changeset updates in place.
    pub fn updated_items(&self) -> impl Iterator<Item = &I> {
        self.ops.iter().filter_map(|op| match op {
            ListOp::Update { item, .. } => Some(item),
            _ => None,
        })
    }
}

/// Mutable sectioned rows that a changeset can be replayed onto.
///
/// Views use this as their row model; tests use it to check that a
/// changeset really turns one snapshot into the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionedRows<S, I> {
    sections: Vec<(S, Vec<I>)>,
}

impl<S, I> Default for SectionedRows<S, I> {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
        }
    }
}

impl<S: SectionKey, I: ItemKey> SectionedRows<S, I> {
    /// No sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows matching a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot<S, I>) -> Self {
        Self {
            sections: snapshot
                .sections()
                .iter()
                .map(|s| (s.key().clone(), s.items().to_vec()))
                .collect(),
        }
    }

    /// Sections with their rows.
    pub fn sections(&self) -> &[(S, Vec<I>)] {
        &self.sections
    }

    /// All rows in display order.
    pub fn rows(&self) -> impl Iterator<Item = &I> {
        self.sections.iter().flat_map(|(_, rows)| rows.iter())
    }

    /// Whether these rows show exactly what the snapshot describes.
    pub fn matches(&self, snapshot: &Snapshot<S, I>) -> bool {
        self.sections.len() == snapshot.section_count()
            && self
                .sections
                .iter()
                .zip(snapshot.sections())
                .all(|((key, rows), section)| key == section.key() && rows == section.items())
    }

    /// Apply every operation of a changeset, stopping at the first bad one.
    ///
    /// # Errors
    ///
    /// Returns [`ChangesetError`] when an operation's index is out of bounds
    /// or names a different identifier than the one at its position. Rows
    /// touched by earlier operations stay modified.
    pub fn apply(&mut self, changeset: &Changeset<S, I>) -> Result<(), ChangesetError> {
        for op in changeset.ops() {
            self.apply_op(op)?;
        }
        Ok(())
    }

    /// Apply one operation.
    pub fn apply_op(&mut self, op: &ListOp<S, I>) -> Result<(), ChangesetError> {
        match op {
            ListOp::InsertSection { key, index } => {
                check_bound(*index, self.sections.len() + 1, op.name())?;
                self.sections.insert(*index, (key.clone(), Vec::new()));
            }
            ListOp::RemoveSection { key, index } => {
                check_bound(*index, self.sections.len(), op.name())?;
                if &self.sections[*index].0 != key {
                    return Err(ChangesetError::Mismatch { operation: op.name() });
                }
                self.sections.remove(*index);
            }
            ListOp::MoveSection { key, from, to } => {
                check_bound(*from, self.sections.len(), op.name())?;
                if &self.sections[*from].0 != key {
                    return Err(ChangesetError::Mismatch { operation: op.name() });
                }
                let section = self.sections.remove(*from);
                check_bound(*to, self.sections.len() + 1, op.name())?;
                self.sections.insert(*to, section);
            }
            ListOp::Insert { item, at } => {
                let rows = self.rows_mut(at.section, op.name())?;
                check_bound(at.row, rows.len() + 1, op.name())?;
                rows.insert(at.row, item.clone());
            }
            ListOp::Remove { item, at } => {
                self.take(item, *at, op.name())?;
            }
            ListOp::Move { item, from, to } => {
                self.check_row(item, *from, op.name())?;
                let dest_len = self.rows_mut(to.section, op.name())?.len();
                let dest_len = if from.section == to.section {
                    dest_len - 1
                } else {
                    dest_len
                };
                check_bound(to.row, dest_len + 1, op.name())?;
                let moved = self.take(item, *from, op.name())?;
                self.rows_mut(to.section, op.name())?.insert(to.row, moved);
            }
            ListOp::Update { item, at } => {
                self.check_row(item, *at, op.name())?;
            }
        }
        Ok(())
    }

    fn rows_mut(
        &mut self,
        section: usize,
        operation: &'static str,
    ) -> Result<&mut Vec<I>, ChangesetError> {
        let len = self.sections.len();
        self.sections
            .get_mut(section)
            .map(|(_, rows)| rows)
            .ok_or(ChangesetError::IndexOutOfBounds {
                index: section,
                len,
                operation,
            })
    }

    fn check_row(
        &mut self,
        item: &I,
        at: ItemPath,
        operation: &'static str,
    ) -> Result<(), ChangesetError> {
        let rows = self.rows_mut(at.section, operation)?;
        check_bound(at.row, rows.len(), operation)?;
        if &rows[at.row] != item {
            return Err(ChangesetError::Mismatch { operation });
        }
        Ok(())
    }

    fn take(&mut self, item: &I, at: ItemPath, operation: &'static str) -> Result<I, ChangesetError> {
        self.check_row(item, at, operation)?;
        let rows = self.rows_mut(at.section, operation)?;
        Ok(rows.remove(at.row))
    }
}

fn check_bound(index: usize, len: usize, operation: &'static str) -> Result<(), ChangesetError> {
    if index < len {
        Ok(())
    } else {
        Err(ChangesetError::IndexOutOfBounds {
            index,
            len,
            operation,
        })
    }
}

/// Error type for changeset replay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangesetError {
    /// Index was out of bounds for the operation.
    #[error("changeset {operation} failed: index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Exclusive upper bound at the time of the operation
        len: usize,
        /// The operation that failed
        operation: &'static str,
    },

    /// The position held a different section or identifier.
    #[error("changeset {operation} failed: position holds a different identifier")]
    Mismatch {
        /// The operation that failed
        operation: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(items: &[u32]) -> SectionedRows<&'static str, u32> {
        SectionedRows::from_snapshot(&Snapshot::single("main", items.iter().copied()))
    }

    fn flat(rows: &SectionedRows<&'static str, u32>) -> Vec<u32> {
        rows.rows().copied().collect()
    }

    #[test]
    fn test_insert_remove_update() {
        let mut r = rows(&[1, 2, 3]);
        let cs = Changeset::from_ops(vec![
            ListOp::Insert { item: 10, at: ItemPath::new(0, 1) },
            ListOp::Remove { item: 3, at: ItemPath::new(0, 3) },
            ListOp::Update { item: 10, at: ItemPath::new(0, 1) },
        ]);
        r.apply(&cs).unwrap();
        assert_eq!(flat(&r), vec![1, 10, 2]);
        let counts = cs.counts();
        assert_eq!((counts.inserts, counts.removes, counts.updates), (1, 1, 1));
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_move_within_section_measures_after_removal() {
        let mut r = rows(&[1, 2, 3, 4]);
        r.apply_op(&ListOp::Move {
            item: 1,
            from: ItemPath::new(0, 0),
            to: ItemPath::new(0, 3),
        })
        .unwrap();
        assert_eq!(flat(&r), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_move_across_sections() {
        let mut r = SectionedRows::from_snapshot(
            &Snapshot::builder()
                .items_in("a", [1u32, 2])
                .items_in("b", [3u32])
                .build(),
        );
        r.apply_op(&ListOp::Move {
            item: 2,
            from: ItemPath::new(0, 1),
            to: ItemPath::new(1, 0),
        })
        .unwrap();
        assert_eq!(r.sections()[0].1, vec![1]);
        assert_eq!(r.sections()[1].1, vec![2, 3]);
    }

    #[test]
    fn test_section_ops() {
        let mut r: SectionedRows<&str, u32> = SectionedRows::new();
        r.apply_op(&ListOp::InsertSection { key: "a", index: 0 }).unwrap();
        r.apply_op(&ListOp::InsertSection { key: "b", index: 1 }).unwrap();
        r.apply_op(&ListOp::MoveSection { key: "b", from: 1, to: 0 }).unwrap();
        assert_eq!(r.sections()[0].0, "b");
        r.apply_op(&ListOp::RemoveSection { key: "a", index: 1 }).unwrap();
        assert_eq!(r.sections().len(), 1);
    }

    #[test]
    fn test_out_of_bounds_insert() {
        let mut r = rows(&[1, 2, 3]);
        let result = r.apply_op(&ListOp::Insert { item: 9, at: ItemPath::new(0, 5) });
        assert!(matches!(
            result,
            Err(ChangesetError::IndexOutOfBounds {
                index: 5,
                len: 4,
                operation: "insert"
            })
        ));
    }

    #[test]
    fn test_remove_of_wrong_identifier_is_rejected() {
        let mut r = rows(&[1, 2, 3]);
        let result = r.apply_op(&ListOp::Remove { item: 9, at: ItemPath::new(0, 0) });
        assert_eq!(result, Err(ChangesetError::Mismatch { operation: "remove" }));
        assert_eq!(flat(&r), vec![1, 2, 3]);
    }

    #[test]
    fn test_changeset_error_display() {
        let err = ChangesetError::IndexOutOfBounds {
            index: 5,
            len: 3,
            operation: "insert",
        };
        let msg = format!("{err}");
        assert!(msg.contains("insert"));
        assert!(msg.contains('5'));
        assert!(msg.contains('3'));
    }
}
