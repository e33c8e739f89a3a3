//! Configuration for listfeed hosts
//!
//! Layering, lowest precedence first:
//!
//! 1. [`FeedConfig::default`]
//! 2. a TOML file ([`FeedConfig::load_from_file`])
//! 3. `LISTFEED_*` environment variables ([`FeedConfig::merge_with_env`])
//! 4. command-line flags, applied by the binary
//!
//! [`FeedConfig::validate`] runs after all layers are merged.
//!
//! ```toml
//! [observer]
//! batch_window_ms = 5
//! sectioning = "day"
//!
//! [store]
//! path = "records.json"
//!
//! [static_feed]
//! count = 94
//! ```

pub mod validation;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{FeedError, Result};
use validation::ConfigValidator;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LISTFEED_";

/// Log levels accepted by `log_level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// How the observer groups query results into sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sectioning {
    /// Everything in one section
    #[default]
    Single,
    /// One section per UTC calendar day of the record timestamp
    Day,
}

impl std::str::FromStr for Sectioning {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "day" => Ok(Self::Day),
            other => Err(FeedError::config(format!("unknown sectioning '{other}'"))),
        }
    }
}

/// Change observer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Extra wait after the first change notification before re-fetching
    pub batch_window_ms: u32,
    /// Notifications drained per re-fetch before forcing one
    pub max_batch: u32,
    /// Section grouping
    pub sectioning: Sectioning,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: 5,
            max_batch: 1000,
            sectioning: Sectioning::Single,
        }
    }
}

/// Backing store settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file for durable commits; volatile store when absent
    pub path: Option<PathBuf>,
}

/// Static feeder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFeedConfig {
    /// Number of integers shown, starting at 0
    pub count: u32,
}

impl Default for StaticFeedConfig {
    fn default() -> Self {
        Self { count: 94 }
    }
}

/// List view settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Animate batch updates instead of redrawing
    pub animate: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { animate: true }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Change observer
    pub observer: ObserverConfig,
    /// Backing store
    pub store: StoreConfig,
    /// Static feeder
    pub static_feed: StaticFeedConfig,
    /// List view
    pub view: ViewConfig,
    /// Default tracing filter
    pub log_level: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            observer: ObserverConfig::default(),
            store: StoreConfig::default(),
            static_feed: StaticFeedConfig::default(),
            view: ViewConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl FeedConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FeedError::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            Ok(Self::default())
        }
    }

    /// Merge `LISTFEED_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `LISTFEED_*` variables from any key/value source.
    pub fn merge_with_vars<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) {
                self.set_from_string(&name.to_ascii_lowercase(), value.as_ref())?;
            }
        }
        Ok(())
    }

    /// Set one value by flat key (`batch_window_ms`, `store_path`, ...).
    ///
    /// Unknown keys are ignored so unrelated `LISTFEED_*` variables do not
    /// break startup.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "batch_window_ms" => self.observer.batch_window_ms = parse(key, value)?,
            "max_batch" => self.observer.max_batch = parse(key, value)?,
            "sectioning" => self.observer.sectioning = value.parse()?,
            "store_path" => {
                self.store.path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "static_count" => self.static_feed.count = parse(key, value)?,
            "animate" => self.view.animate = parse(key, value)?,
            "log_level" => self.log_level = value.to_ascii_lowercase(),
            other => {
                tracing::debug!(key = other, "ignoring unknown config override");
            }
        }
        Ok(())
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<()> {
        let mut root = ConfigValidator::new();

        let mut observer = root.for_field("observer");
        observer
            .range("batch_window_ms", self.observer.batch_window_ms, Some(0), Some(10_000))
            .range("max_batch", self.observer.max_batch, Some(1), None);
        root.merge(observer);

        let mut store = root.for_field("store");
        store.check(
            "path",
            &self.store.path,
            |p| p.as_ref().map_or(true, |p| !p.as_os_str().is_empty()),
            "must not be empty",
        );
        root.merge(store);

        let mut feed = root.for_field("static_feed");
        feed.range("count", self.static_feed.count, Some(0), Some(100_000));
        root.merge(feed);

        root.check(
            "log_level",
            &self.log_level.as_str(),
            |l| LOG_LEVELS.contains(l),
            "must be one of trace, debug, info, warn, error",
        );

        root.finish()
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FeedError::config(format!("invalid value '{value}' for {key}")))
}
