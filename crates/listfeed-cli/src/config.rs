//! Configuration loading for the binary

use anyhow::{Context, Result};
use listfeed_core::config::FeedConfig;
use std::path::Path;

/// Defaults, then `path` if present, then `LISTFEED_*` variables.
///
/// Validation runs later, after command-line flags are applied.
pub fn load(path: &Path) -> Result<FeedConfig> {
    let mut config = FeedConfig::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config
        .merge_with_env()
        .context("applying LISTFEED_* overrides")?;
    Ok(config)
}

/// Validate the fully merged configuration.
pub fn finish(config: FeedConfig) -> Result<FeedConfig> {
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_values_are_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[static_feed]\ncount = 7").unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.static_feed.count, 7);
        assert!(finish(config).is_ok());
    }

    #[test]
    fn test_invalid_values_fail_at_finish() {
        let mut config = FeedConfig::default();
        config.static_feed.count = 1_000_000;
        let err = finish(config).unwrap_err();
        assert!(format!("{err:#}").contains("static_feed.count"));
    }
}
