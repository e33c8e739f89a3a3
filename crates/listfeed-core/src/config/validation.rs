//! Rules applied to a merged [`super::FeedConfig`]
//!
//! Each rule names its field by dotted path (`observer.batch_window_ms`).
//! Every failing field is collected, so one bad config file reports all of
//! its problems at once.

use std::fmt;

use crate::errors::FeedError;

/// One rejected configuration value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Number outside its inclusive bounds
    #[error("{field} = {actual} is outside {}", Bounds(.min, .max))]
    OutOfRange {
        /// Dotted field path
        field: String,
        /// Lowest accepted value, if bounded below
        min: Option<f64>,
        /// Highest accepted value, if bounded above
        max: Option<f64>,
        /// Value found
        actual: f64,
    },
    /// Value refused by a field-specific rule
    #[error("{field} {reason}")]
    Rejected {
        /// Dotted field path
        field: String,
        /// What the value must satisfy
        reason: String,
    },
}

struct Bounds<'a>(&'a Option<f64>, &'a Option<f64>);

impl fmt::Display for Bounds<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (*self.0, *self.1) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]"),
            (Some(min), None) => write!(f, "[{min}, ..)"),
            (None, Some(max)) => write!(f, "(.., {max}]"),
            (None, None) => write!(f, "(..)"),
        }
    }
}

/// Collects rule failures for one configuration subtree.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    prefix: String,
}

impl ConfigValidator {
    /// Validator for the configuration root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator for a nested table; merge it back with [`Self::merge`].
    pub fn for_field(&self, table: &str) -> Self {
        Self {
            errors: Vec::new(),
            prefix: self.path(table),
        }
    }

    /// `value` must lie within the inclusive bounds given.
    pub fn range<T>(&mut self, field: &str, value: T, min: Option<T>, max: Option<T>) -> &mut Self
    where
        T: PartialOrd + Copy + Into<f64>,
    {
        let below = min.is_some_and(|m| value < m);
        let above = max.is_some_and(|m| value > m);
        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: self.path(field),
                min: min.map(Into::into),
                max: max.map(Into::into),
                actual: value.into(),
            });
        }
        self
    }

    /// `value` must satisfy `accept`; `reason` describes the requirement.
    pub fn check<T, F>(&mut self, field: &str, value: &T, accept: F, reason: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !accept(value) {
            self.errors.push(ValidationError::Rejected {
                field: self.path(field),
                reason: reason.to_string(),
            });
        }
        self
    }

    /// Take over the failures of a nested validator.
    pub fn merge(&mut self, nested: ConfigValidator) {
        self.errors.extend(nested.errors);
    }

    /// Failures collected so far.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// `Ok` when every rule passed, otherwise one config error listing all
    /// failures.
    pub fn finish(self) -> Result<(), FeedError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(FeedError::config(message))
    }

    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_reports_nested_field() {
        let mut root = ConfigValidator::new();
        let mut observer = root.for_field("observer");
        observer.range("batch_window_ms", 20_000u32, Some(0), Some(10_000));
        root.merge(observer);
        assert_eq!(
            root.errors()[0].to_string(),
            "observer.batch_window_ms = 20000 is outside [0, 10000]"
        );
    }

    #[test]
    fn test_every_failure_is_reported() {
        let mut v = ConfigValidator::new();
        v.range("max_batch", 0u32, Some(1), None)
            .check("log_level", &"loud", |l| *l == "info", "must be a known level");
        assert_eq!(v.errors().len(), 2);
        let err = v.finish().unwrap_err().to_string();
        assert!(err.contains("max_batch = 0 is outside [1, ..)"));
        assert!(err.contains("log_level must be a known level"));
    }

    #[test]
    fn test_passing_rules_finish_ok() {
        let mut v = ConfigValidator::new();
        v.range("count", 5u32, Some(0), Some(10))
            .check("path", &"x", |p| !p.is_empty(), "must not be empty");
        assert!(v.finish().is_ok());
    }
}
