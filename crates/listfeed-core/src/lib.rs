//! listfeed core - snapshot model for incremental list reconciliation
//!
//! This crate holds the pieces every other listfeed crate agrees on:
//!
//! - [`Snapshot`]: an immutable, sectioned, ordered list of item identifiers
//! - [`Changeset`] and [`diff`]: the minimal insert/remove/move/update
//!   operations between two snapshots
//! - [`reactive::Dynamic`]: the latest-value cell snapshots travel through
//! - [`Clock`]: injectable wall-clock time
//! - [`FeedError`]: the unified error type
//! - [`config::FeedConfig`]: layered host configuration
//!
//! It contains no store and no view; those live in `listfeed-store` and
//! `listfeed-app`.

#![forbid(unsafe_code)]

pub mod changeset;
pub mod config;
pub mod diff;
pub mod errors;
pub mod identity;
pub mod reactive;
pub mod snapshot;
pub mod time;

pub use changeset::{ChangeCounts, Changeset, ChangesetError, ListOp, SectionedRows};
pub use diff::diff;
pub use errors::{ErrorCategory, FeedError, Result};
pub use identity::{ItemKey, MainSection, RecordId, SectionKey};
pub use snapshot::{ItemPath, Section, Snapshot, SnapshotBuilder};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
