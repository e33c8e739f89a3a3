//! listfeed store - records, queries and the transactional record store
//!
//! [`RecordStore`] is the seam the change observer and the item creation
//! command talk to. [`LocalRecordStore`] implements it in process, either
//! volatile or backed by a JSON file.

#![forbid(unsafe_code)]

pub mod query;
pub mod record;
pub mod store;

pub use query::{RecordFilter, RecordQuery, SortDescriptor, SortKey};
pub use record::{Record, RecordChange, StoreChange};
pub use store::{CommitSummary, LocalRecordStore, RecordStore, CHANGE_CHANNEL_CAPACITY};
