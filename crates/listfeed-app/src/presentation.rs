//! Cell presentation: identifier → renderable content
//!
//! Presenters are pure lookups. A presenter that cannot find the data for an
//! identifier returns [`FeedError::MissingRecord`]; the reconciler logs it
//! and shows [`CellContent::placeholder`] instead.

use std::fmt;

use listfeed_core::{FeedError, RecordId, Result};
use serde::{Deserialize, Serialize};

use crate::index::RecordIndex;

/// Static style attributes of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStyle {
    /// Single line of text
    #[default]
    Basic,
    /// Title with a secondary detail line
    Subtitle,
    /// Stand-in for content that could not be produced
    Placeholder,
}

/// Renderable content of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellContent {
    /// Primary text
    pub text: String,
    /// Secondary text, shown by `Subtitle` cells
    pub detail: Option<String>,
    /// Visual style
    pub style: CellStyle,
}

impl CellContent {
    /// Basic one-line cell.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: None,
            style: CellStyle::Basic,
        }
    }

    /// Cell with a detail line.
    pub fn subtitle(text: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: Some(detail.into()),
            style: CellStyle::Subtitle,
        }
    }

    /// Cell shown when an identifier has no backing data.
    pub fn placeholder() -> Self {
        Self {
            text: "(missing)".to_string(),
            detail: None,
            style: CellStyle::Placeholder,
        }
    }

    /// Whether this is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.style == CellStyle::Placeholder
    }
}

impl fmt::Display for CellContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Maps an item identifier to cell content.
pub trait CellPresenter<I>: Send + Sync {
    /// Reuse identifier registered with the view.
    fn cell_kind(&self) -> &'static str;

    /// Produce content for `item`.
    fn present(&self, item: &I) -> Result<CellContent>;
}

impl<I, P: CellPresenter<I> + ?Sized> CellPresenter<I> for std::sync::Arc<P> {
    fn cell_kind(&self) -> &'static str {
        (**self).cell_kind()
    }

    fn present(&self, item: &I) -> Result<CellContent> {
        (**self).present(item)
    }
}

/// Renders an integer as its decimal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCellPresenter;

impl CellPresenter<u32> for IntegerCellPresenter {
    fn cell_kind(&self) -> &'static str {
        "integer"
    }

    fn present(&self, item: &u32) -> Result<CellContent> {
        Ok(CellContent::text(item.to_string()))
    }
}

/// Renders a record's timestamp, and its label when it has one.
#[derive(Debug, Clone)]
pub struct RecordCellPresenter {
    index: RecordIndex,
}

impl RecordCellPresenter {
    /// Presenter reading from `index`.
    pub fn new(index: RecordIndex) -> Self {
        Self { index }
    }
}

impl CellPresenter<RecordId> for RecordCellPresenter {
    fn cell_kind(&self) -> &'static str {
        "record"
    }

    fn present(&self, item: &RecordId) -> Result<CellContent> {
        let record = self
            .index
            .get(item)
            .ok_or_else(|| FeedError::missing_record(item))?;
        Ok(match record.label {
            Some(label) => CellContent::subtitle(record.timestamp.to_string(), label),
            None => CellContent::text(record.timestamp.to_string()),
        })
    }
}
