//! ABOUTME: Operation payload types — the Rust shape of `spec.md` §6
//! ABOUTME: Plain data; validation and preprocessing happen in `store.rs`

use crate::document::Document;
use crate::filters::Filters;

/// One column of a `List` ordering clause.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Everything a `List` call needs: filters, multi-column ordering, and
/// pagination, applied in that order (`spec.md` §4.4).
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filters: Filters,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A partial update. `title`/`body` are applied only when `Some`. Each
/// `dimensions` entry: `Some(None)` clears a hierarchical reference or a
/// `_data.*` key, `Some(Some(v))` sets/validates a value, and a name
/// simply absent from the map is left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub dimensions: Vec<(String, Option<serde_json::Value>)>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.dimensions.push((key.into(), Some(value.into())));
        self
    }

    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.dimensions.push((key.into(), None));
        self
    }
}

/// A document with its Smart ID stamped on for this listing only.
#[derive(Debug, Clone)]
pub struct ListedDocument {
    pub simple_id: String,
    pub document: Document,
}
