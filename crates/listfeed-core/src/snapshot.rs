//! Immutable snapshots of a sectioned list
//!
//! A [`Snapshot`] is an ordered sequence of sections, each holding an ordered
//! sequence of item identifiers. Snapshots are cheap to clone (the contents
//! sit behind an `Arc`) and never change after construction; every change in
//! the backing data produces a new one.
//!
//! Construction is infallible so that hosts can hand any snapshot to the
//! reconciler; [`Snapshot::validate`] is what rejects duplicate sections and
//! duplicate identifiers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{FeedError, Result};
use crate::identity::{ItemKey, SectionKey};

/// Position of an item: section index and row within that section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemPath {
    /// Section index (0-indexed)
    pub section: usize,
    /// Row within the section (0-indexed)
    pub row: usize,
}

impl ItemPath {
    /// Create a path.
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

/// One section of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<S, I> {
    key: S,
    items: Vec<I>,
}

impl<S, I> Section<S, I> {
    /// Create a section with its items in display order.
    pub fn new(key: S, items: Vec<I>) -> Self {
        Self { key, items }
    }

    /// Section key.
    pub fn key(&self) -> &S {
        &self.key
    }

    /// Items in display order.
    pub fn items(&self) -> &[I] {
        &self.items
    }
}

#[derive(Debug, Clone)]
struct SnapshotInner<S, I> {
    sections: Vec<Section<S, I>>,
    reloaded: HashSet<I>,
    /// Generation at which an item's presented content last changed
    revisions: HashMap<I, u64>,
    generation: Option<u64>,
}

/// Immutable, ordered description of which items are visible and where.
#[derive(Debug, Clone)]
pub struct Snapshot<S, I> {
    inner: Arc<SnapshotInner<S, I>>,
}

impl<S: SectionKey, I: ItemKey> Default for Snapshot<S, I> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: SectionKey, I: ItemKey> Snapshot<S, I> {
    /// Snapshot with no sections.
    pub fn empty() -> Self {
        Self::from_sections(Vec::new())
    }

    /// Snapshot from sections in display order.
    pub fn from_sections(sections: Vec<Section<S, I>>) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                sections,
                reloaded: HashSet::new(),
                revisions: HashMap::new(),
                generation: None,
            }),
        }
    }

    /// Single-section snapshot.
    pub fn single(section: S, items: impl IntoIterator<Item = I>) -> Self {
        Self::from_sections(vec![Section::new(section, items.into_iter().collect())])
    }

    /// Start building a snapshot section by section.
    pub fn builder() -> SnapshotBuilder<S, I> {
        SnapshotBuilder::new()
    }

    /// Same contents, stamped with an emission generation.
    ///
    /// The reconciler refuses a snapshot whose generation is lower than the
    /// one it last rendered.
    pub fn with_generation(&self, generation: u64) -> Self {
        let mut inner = (*self.inner).clone();
        inner.generation = Some(generation);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Emission generation, if stamped.
    pub fn generation(&self) -> Option<u64> {
        self.inner.generation
    }

    /// Whether both handles point at the same snapshot instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Sections in display order.
    pub fn sections(&self) -> &[Section<S, I>] {
        &self.inner.sections
    }

    /// Section keys in display order.
    pub fn section_keys(&self) -> impl Iterator<Item = &S> {
        self.inner.sections.iter().map(Section::key)
    }

    /// Items of one section, if present.
    pub fn items_in(&self, section: &S) -> Option<&[I]> {
        self.inner
            .sections
            .iter()
            .find(|s| &s.key == section)
            .map(Section::items)
    }

    /// All items, section by section, in display order.
    pub fn item_ids(&self) -> impl Iterator<Item = &I> {
        self.inner.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.inner.sections.len()
    }

    /// Number of items across all sections.
    pub fn item_count(&self) -> usize {
        self.inner.sections.iter().map(|s| s.items.len()).sum()
    }

    /// True when there are no items (sections may still exist).
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Whether the identifier is present.
    pub fn contains(&self, item: &I) -> bool {
        self.item_ids().any(|i| i == item)
    }

    /// Path of an identifier, if present.
    pub fn locate(&self, item: &I) -> Option<ItemPath> {
        self.inner
            .sections
            .iter()
            .enumerate()
            .find_map(|(s, section)| {
                section
                    .items
                    .iter()
                    .position(|i| i == item)
                    .map(|row| ItemPath::new(s, row))
            })
    }

    /// Identifiers whose presented content is declared changed.
    pub fn reloaded(&self) -> &HashSet<I> {
        &self.inner.reloaded
    }

    /// Whether the identifier was declared changed.
    pub fn is_reloaded(&self, item: &I) -> bool {
        self.inner.reloaded.contains(item)
    }

    /// Generation at which the item's content last changed, if recorded.
    pub fn revision(&self, item: &I) -> Option<u64> {
        self.inner.revisions.get(item).copied()
    }

    /// Whether `item` must be re-presented when moving here from a snapshot
    /// rendered at `since`.
    ///
    /// True when the item is declared reloaded, or when its revision is newer
    /// than `since`. The second case catches edits made in generations the
    /// consumer never saw.
    pub fn needs_reload(&self, item: &I, since: Option<u64>) -> bool {
        if self.is_reloaded(item) {
            return true;
        }
        match (self.revision(item), since) {
            (Some(revision), Some(since)) => revision > since,
            _ => false,
        }
    }

    /// Whether any item carries reload information.
    pub fn has_reload_markers(&self) -> bool {
        !self.inner.reloaded.is_empty() || !self.inner.revisions.is_empty()
    }

    /// Check that no section and no identifier appears twice.
    pub fn validate(&self) -> Result<()> {
        let mut sections = HashSet::with_capacity(self.section_count());
        let mut items = HashSet::with_capacity(self.item_count());
        for section in &self.inner.sections {
            if !sections.insert(&section.key) {
                return Err(FeedError::duplicate_section(&section.key));
            }
            for item in &section.items {
                if !items.insert(item) {
                    return Err(FeedError::duplicate_item(item));
                }
            }
        }
        Ok(())
    }
}

/// Content equality: same sections, same items, same order.
///
/// Generation, reload markers and revisions are delivery metadata and do not
/// take part.
impl<S: SectionKey, I: ItemKey> PartialEq for Snapshot<S, I> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.sections == other.inner.sections
    }
}

impl<S: SectionKey, I: ItemKey> Eq for Snapshot<S, I> {}

/// Incremental snapshot construction.
///
/// Items are appended to the most recently appended section, mirroring how
/// list hosts usually describe their data.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder<S, I> {
    sections: Vec<Section<S, I>>,
    reloaded: HashSet<I>,
    revisions: HashMap<I, u64>,
    generation: Option<u64>,
}

impl<S: SectionKey, I: ItemKey> Default for SnapshotBuilder<S, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SectionKey, I: ItemKey> SnapshotBuilder<S, I> {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            reloaded: HashSet::new(),
            revisions: HashMap::new(),
            generation: None,
        }
    }

    /// Append an empty section.
    pub fn section(mut self, key: S) -> Self {
        self.sections.push(Section::new(key, Vec::new()));
        self
    }

    /// Append items to the last section, creating `fallback` if there is none.
    pub fn items(mut self, fallback: S, items: impl IntoIterator<Item = I>) -> Self {
        if self.sections.is_empty() {
            self.sections.push(Section::new(fallback, Vec::new()));
        }
        if let Some(last) = self.sections.last_mut() {
            last.items.extend(items);
        }
        self
    }

    /// Append items to a named section, creating it at the end if needed.
    pub fn items_in(mut self, key: S, items: impl IntoIterator<Item = I>) -> Self {
        match self.sections.iter_mut().find(|s| s.key == key) {
            Some(section) => section.items.extend(items),
            None => self
                .sections
                .push(Section::new(key, items.into_iter().collect())),
        }
        self
    }

    /// Declare the presented content of these identifiers changed.
    pub fn reload(mut self, items: impl IntoIterator<Item = I>) -> Self {
        self.reloaded.extend(items);
        self
    }

    /// Record the generation at which each item's content last changed.
    pub fn revisions(mut self, revisions: impl IntoIterator<Item = (I, u64)>) -> Self {
        self.revisions.extend(revisions);
        self
    }

    /// Stamp an emission generation.
    pub fn generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Finish without validation.
    pub fn build(self) -> Snapshot<S, I> {
        Snapshot {
            inner: Arc::new(SnapshotInner {
                sections: self.sections,
                reloaded: self.reloaded,
                revisions: self.revisions,
                generation: self.generation,
            }),
        }
    }

    /// Finish and validate.
    pub fn build_checked(self) -> Result<Snapshot<S, I>> {
        let snapshot = self.build();
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MainSection;

    #[test]
    fn test_empty_snapshot() {
        let snap: Snapshot<MainSection, u32> = Snapshot::empty();
        assert!(snap.is_empty());
        assert_eq!(snap.section_count(), 0);
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_revision_newer_than_rendered_needs_reload() {
        let snap = Snapshot::builder()
            .items(MainSection::Main, [1u32, 2, 3])
            .reload([3])
            .revisions([(1, 4), (2, 6)])
            .generation(6)
            .build();
        assert!(snap.has_reload_markers());
        assert_eq!(snap.revision(&1), Some(4));
        // Rendered at 5: the edit at 6 was never shown, the one at 4 was.
        assert!(!snap.needs_reload(&1, Some(5)));
        assert!(snap.needs_reload(&2, Some(5)));
        assert!(snap.needs_reload(&1, Some(3)));
        assert!(snap.needs_reload(&3, Some(6)));
        assert!(!snap.needs_reload(&2, None));
    }

    #[test]
    fn test_single_section_order_is_preserved() {
        let snap = Snapshot::single(MainSection::Main, [3u32, 1, 2]);
        let items: Vec<_> = snap.item_ids().copied().collect();
        assert_eq!(items, vec![3, 1, 2]);
        assert_eq!(snap.locate(&1), Some(ItemPath::new(0, 1)));
        assert_eq!(snap.locate(&9), None);
    }

    #[test]
    fn test_builder_appends_to_last_section() {
        let snap = Snapshot::builder()
            .section("a")
            .items("a", [1u32, 2])
            .section("b")
            .items("b", [3])
            .items_in("a", [4])
            .build_checked()
            .unwrap();
        assert_eq!(snap.items_in(&"a"), Some(&[1, 2, 4][..]));
        assert_eq!(snap.items_in(&"b"), Some(&[3][..]));
        assert_eq!(snap.locate(&3), Some(ItemPath::new(1, 0)));
    }

    #[test]
    fn test_duplicate_item_across_sections_is_rejected() {
        let snap = Snapshot::builder()
            .items_in("a", [1u32])
            .items_in("b", [1u32])
            .build();
        assert!(matches!(
            snap.validate(),
            Err(FeedError::DuplicateItem { .. })
        ));
    }

    #[test]
    fn test_duplicate_section_is_rejected() {
        let snap = Snapshot::from_sections(vec![
            Section::new("a", vec![1u32]),
            Section::new("a", vec![2u32]),
        ]);
        assert!(matches!(
            snap.validate(),
            Err(FeedError::DuplicateSection { .. })
        ));
    }

    #[test]
    fn test_equality_ignores_generation_and_reloads() {
        let a = Snapshot::single(MainSection::Main, [1u32, 2]);
        let b = Snapshot::builder()
            .items(MainSection::Main, [1u32, 2])
            .reload([2])
            .generation(7)
            .build();
        assert_eq!(a, b);
        assert_eq!(b.generation(), Some(7));
        assert!(b.is_reloaded(&2));
        assert_eq!(a.with_generation(3).generation(), Some(3));
    }
}
