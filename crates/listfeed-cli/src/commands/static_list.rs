//! `listfeed static`

use anyhow::Result;
use clap::Args;
use listfeed_app::{MemoryListView, StaticListFeeder};
use listfeed_core::config::FeedConfig;

use crate::config;

#[derive(Args, Debug, Default)]
pub struct StaticArgs {
    /// Number of integers to show, starting at 0
    #[arg(short = 'n', long)]
    count: Option<u32>,
}

pub fn run(mut config: FeedConfig, args: StaticArgs) -> Result<Vec<String>> {
    if let Some(count) = args.count {
        config.static_feed.count = count;
    }
    let config = config::finish(config)?;

    let mut feeder = StaticListFeeder::new(MemoryListView::new(), &config.static_feed);
    let report = feeder.load()?;
    tracing::debug!(rows = report.presented, "static list loaded");
    Ok(feeder.view().render_lines())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_flag_overrides_config() {
        let lines = run(FeedConfig::default(), StaticArgs { count: Some(3) }).unwrap();
        assert_eq!(lines, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_default_shows_94_rows() {
        let lines = run(FeedConfig::default(), StaticArgs::default()).unwrap();
        assert_eq!(lines.len(), 94);
    }
}
