//! `listfeed timestamps`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use listfeed_app::{MemoryListView, PersistentListFeeder};
use listfeed_core::config::{FeedConfig, Sectioning};
use listfeed_core::{Clock, SystemClock};
use listfeed_store::{LocalRecordStore, RecordStore};
use tracing::info;

use crate::config;

#[derive(Args, Debug, Default)]
pub struct TimestampsArgs {
    /// Records to append before printing
    #[arg(short, long, default_value_t = 0)]
    add: u32,

    /// Label for appended records
    #[arg(short, long)]
    label: Option<String>,

    /// JSON file holding the records; volatile store when omitted
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Section grouping (single or day)
    #[arg(long)]
    sectioning: Option<Sectioning>,

    /// Redraw instead of animating updates
    #[arg(long)]
    no_animate: bool,
}

pub async fn run(config: FeedConfig, args: TimestampsArgs) -> Result<Vec<String>> {
    run_with_clock(config, args, Arc::new(SystemClock)).await
}

async fn run_with_clock(
    mut config: FeedConfig,
    args: TimestampsArgs,
    clock: Arc<dyn Clock>,
) -> Result<Vec<String>> {
    if let Some(path) = args.store {
        config.store.path = Some(path);
    }
    if let Some(sectioning) = args.sectioning {
        config.observer.sectioning = sectioning;
    }
    if args.no_animate {
        config.view.animate = false;
    }
    let config = config::finish(config)?;

    let store: Arc<dyn RecordStore> = match &config.store.path {
        Some(path) => Arc::new(
            LocalRecordStore::open(path)
                .await
                .with_context(|| format!("opening store {}", path.display()))?,
        ),
        None => Arc::new(LocalRecordStore::in_memory()),
    };

    let mut feeder = PersistentListFeeder::start(store, clock, MemoryListView::new(), &config).await?;
    for _ in 0..args.add {
        let record = match &args.label {
            Some(label) => feeder.create_labelled(label.clone()).await?,
            None => feeder.create_item().await?,
        };
        info!(id = %record.id, timestamp = %record.timestamp, "record added");
        if let Some(applied) = feeder.next_update().await {
            applied?;
        }
    }

    let view = feeder.shutdown().await;
    Ok(view.render_lines())
}
