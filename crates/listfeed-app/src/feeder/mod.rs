//! The two list feeders
//!
//! - [`StaticListFeeder`] shows a fixed integer sequence once.
//! - [`PersistentListFeeder`] keeps a list in step with a store query.

mod persistent;
mod static_list;

pub use persistent::PersistentListFeeder;
pub use static_list::StaticListFeeder;
