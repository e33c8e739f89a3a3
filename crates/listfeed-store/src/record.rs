//! Stored records

use listfeed_core::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// One durable entity: a timestamped item with an optional label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, never reused
    pub id: RecordId,
    /// Creation time; the default sort key
    pub timestamp: Timestamp,
    /// Free-form text shown next to the timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Record {
    /// New record with a fresh id.
    pub fn new(timestamp: Timestamp) -> Self {
        Self::with_id(RecordId::new_v4(), timestamp)
    }

    /// Record with a caller-chosen id.
    pub fn with_id(id: RecordId, timestamp: Timestamp) -> Self {
        Self {
            id,
            timestamp,
            label: None,
        }
    }

    /// Attach a label.
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One record-level change inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// A record was created
    Inserted(Record),
    /// A record's fields changed
    Updated {
        /// State before the transaction
        before: Record,
        /// State after the transaction
        after: Record,
    },
    /// A record was deleted
    Deleted(Record),
}

impl RecordChange {
    /// Id of the affected record.
    pub fn id(&self) -> RecordId {
        match self {
            RecordChange::Inserted(r) | RecordChange::Deleted(r) => r.id,
            RecordChange::Updated { after, .. } => after.id,
        }
    }

    /// State before the change, if the record existed.
    pub fn before(&self) -> Option<&Record> {
        match self {
            RecordChange::Inserted(_) => None,
            RecordChange::Updated { before, .. } => Some(before),
            RecordChange::Deleted(r) => Some(r),
        }
    }

    /// State after the change, if the record still exists.
    pub fn after(&self) -> Option<&Record> {
        match self {
            RecordChange::Inserted(r) => Some(r),
            RecordChange::Updated { after, .. } => Some(after),
            RecordChange::Deleted(_) => None,
        }
    }
}

/// Notification for one committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// Transaction number, increasing by one per commit that changed something
    pub txn: u64,
    /// Record-level changes in the order they were staged
    pub changes: Vec<RecordChange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = Record::with_id(RecordId::from_bytes([1; 16]), Timestamp::from_millis(42));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], 42);
        assert!(json.get("label").is_none());

        let labelled: Record = serde_json::from_value(serde_json::json!({
            "id": record.id,
            "timestamp": 43,
            "label": "hi",
        }))
        .unwrap();
        assert_eq!(labelled.label.as_deref(), Some("hi"));
    }

    #[test]
    fn test_change_accessors() {
        let before = Record::new(Timestamp::from_millis(1));
        let mut after = before.clone();
        after.timestamp = Timestamp::from_millis(2);
        let change = RecordChange::Updated {
            before: before.clone(),
            after: after.clone(),
        };
        assert_eq!(change.id(), before.id);
        assert_eq!(change.before(), Some(&before));
        assert_eq!(change.after(), Some(&after));
        assert_eq!(RecordChange::Deleted(before.clone()).after(), None);
        assert_eq!(RecordChange::Inserted(before).before(), None);
    }
}
