//! Section keys, item identifiers and record ids
//!
//! Sections and items are opaque to the reconciler: any type that is
//! hashable, comparable for equality, cloneable and debuggable can play
//! either role. The blanket impls below make that explicit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// Key grouping items for display. Stable across snapshots.
pub trait SectionKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> SectionKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Identifier of one displayable record. Unique within a snapshot.
pub trait ItemKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> ItemKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// The single section used by both feeders unless sectioning is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MainSection {
    /// Only section
    Main,
}

/// Stable identifier of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random record id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Deterministic id for fixtures.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record-{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_item_key<T: ItemKey>() {}
    fn assert_section_key<T: SectionKey>() {}

    #[test]
    fn test_common_types_are_keys() {
        assert_item_key::<u64>();
        assert_item_key::<String>();
        assert_item_key::<RecordId>();
        assert_section_key::<MainSection>();
        assert_section_key::<&'static str>();
    }

    #[test]
    fn test_record_id_display_is_stable() {
        let id = RecordId::from_bytes([0xab; 16]);
        assert_eq!(id.to_string(), format!("record-{}", "ab".repeat(16)));
        assert_eq!(RecordId::from_uuid(id.uuid()), id);
    }

    #[test]
    fn test_fresh_ids_are_distinct() {
        assert_ne!(RecordId::new_v4(), RecordId::new_v4());
    }
}
