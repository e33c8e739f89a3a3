//! listfeed testing infrastructure
//!
//! Shared fixtures for the listfeed crates and the home of the cross-crate
//! integration tests under `tests/`.
//!
//! ```toml
//! [dev-dependencies]
//! listfeed-testkit = { workspace = true }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod strategies;

pub use fixtures::{CountingPresenter, DebugPresenter, FaultyStore};

use std::future::Future;
use std::time::Duration;

use listfeed_core::config::FeedConfig;
use listfeed_core::{ItemKey, SectionKey, Snapshot};

/// Upper bound for anything a test awaits.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration with batching disabled, so every commit is observed
/// without delay.
pub fn test_config() -> FeedConfig {
    let mut config = FeedConfig::default();
    config.observer.batch_window_ms = 0;
    config
}

/// Identifiers of a snapshot, top to bottom.
pub fn item_ids<S: SectionKey, I: ItemKey>(snapshot: &Snapshot<S, I>) -> Vec<I> {
    snapshot.item_ids().cloned().collect()
}

/// Await `future`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("timed out waiting for the list to settle")
}

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
