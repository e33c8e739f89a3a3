//! # Reactive primitives
//!
//! - [`Dynamic<T>`]: a latest-value cell that can be observed for changes.
//! - [`Subscription<T>`]: a version-tracking reader of a `Dynamic<T>`.
//!
//! The change observer publishes snapshots through a `Dynamic`; the owner
//! of the list polls (or awaits) its `Subscription`. Because a subscription
//! always jumps to the newest version, a burst of store commits reaches the
//! list as a single snapshot.

mod dynamic;

pub use dynamic::{Dynamic, Subscription};
