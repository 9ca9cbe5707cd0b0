//! ABOUTME: Filter evaluation for `List`/`UpdateByDimension`/`DeleteByDimension`
//! ABOUTME: Filters and free-text search share the coercion rules in `coerce.rs`

use crate::coerce::{coerce_json, format_timestamp};
use crate::config::DimensionConfig;
use crate::document::{Document, DimensionValue};

/// One filter's right-hand side: either an equality match or a
/// set-membership match (`spec.md` §4.4: "a filter value that is a
/// sequence matches if the document's coerced value equals any element").
#[derive(Debug, Clone)]
pub enum FilterValue {
    Scalar(serde_json::Value),
    Set(Vec<serde_json::Value>),
}

impl From<serde_json::Value> for FilterValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => FilterValue::Set(items),
            other => FilterValue::Scalar(other),
        }
    }
}

/// The full filter set for one `List`/bulk-mutation call.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub entries: Vec<(String, FilterValue)>,
    /// Case-insensitive substring match against title or body.
    pub search: Option<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.entries.push((key.into(), FilterValue::from(value.into())));
        self
    }

    pub fn any_of(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<serde_json::Value>>,
    ) -> Self {
        self.entries.push((
            key.into(),
            FilterValue::Set(values.into_iter().map(Into::into).collect()),
        ));
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Evaluates every clause against `doc`; all clauses must match
    /// ("applied in a single pass" per `spec.md` §4.4 — a document is
    /// included only if every filter and the search term all match).
    pub fn matches(&self, doc: &Document, config: &DimensionConfig) -> bool {
        for (key, value) in &self.entries {
            let doc_value = resolve_filter_field(doc, config, key);
            if !value_matches(value, doc_value.as_ref()) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term_lower = term.to_lowercase();
            let hit = doc.title.to_lowercase().contains(&term_lower)
                || doc.body.to_lowercase().contains(&term_lower);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Resolves a filter key against a document, following the precedence in
/// `spec.md` §4.4: `uuid`, `created_at`/`updated_at`, declared dimension
/// name, `_data.<key>` fallback, hierarchical reference field name.
pub fn resolve_filter_field(
    doc: &Document,
    config: &DimensionConfig,
    key: &str,
) -> Option<serde_json::Value> {
    if key == "uuid" {
        return Some(serde_json::Value::String(doc.uuid.to_string()));
    }
    if key == "created_at" {
        return Some(serde_json::Value::String(format_timestamp(&doc.created_at)));
    }
    if key == "updated_at" {
        return Some(serde_json::Value::String(format_timestamp(&doc.updated_at)));
    }
    if let Some(dim) = config.find(key) {
        if !dim.is_hierarchical() {
            return doc.classify(config, key).map(classified_to_json);
        }
    }
    let data_key = format!("_data.{key}");
    if doc.dimensions.contains_key(&data_key) {
        return doc.classify(config, &data_key).map(classified_to_json);
    }
    if config
        .dimensions()
        .iter()
        .any(|d| d.reference_field() == Some(key))
    {
        return doc.classify(config, key).map(classified_to_json);
    }
    doc.classify(config, key).map(classified_to_json)
}

/// Converts a classified dimension value back to the JSON form the
/// filter/order machinery compares against — the inverse of
/// `Document::classify`'s interpretation, so callers that only need "the
/// document's value under this key" don't have to match on
/// `DimensionValue` themselves.
fn classified_to_json(value: DimensionValue<'_>) -> serde_json::Value {
    match value {
        DimensionValue::Enumerated(s) => serde_json::Value::String(s.to_string()),
        DimensionValue::Reference(uuid) => serde_json::Value::String(uuid.to_string()),
        DimensionValue::Data(v) => v.clone(),
    }
}

fn value_matches(filter: &FilterValue, doc_value: Option<&serde_json::Value>) -> bool {
    let doc_coerced = doc_value.map(coerce_json).unwrap_or_default();
    match filter {
        FilterValue::Scalar(v) => coerce_json(v) == doc_coerced,
        FilterValue::Set(values) => values.iter().any(|v| coerce_json(v) == doc_coerced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimension;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn doc_with_priority(priority: &str) -> Document {
        let mut dims = serde_json::Map::new();
        dims.insert("priority".to_string(), json!(priority));
        Document {
            uuid: Uuid::new_v4(),
            title: "hello world".into(),
            body: "lorem ipsum".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            dimensions: dims,
        }
    }

    #[test]
    fn set_membership_matches_any_element() {
        let config = DimensionConfig::new(vec![Dimension::enumerated(
            "priority",
            ["low", "normal", "high"],
        )])
        .unwrap();
        let docs = [
            doc_with_priority("low"),
            doc_with_priority("normal"),
            doc_with_priority("normal"),
            doc_with_priority("high"),
        ];
        let filters = Filters::new().any_of("priority", ["low", "high"]);
        let matched: Vec<_> = docs.iter().filter(|d| filters.matches(d, &config)).collect();
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].uuid, docs[0].uuid);
        assert_eq!(matched[1].uuid, docs[3].uuid);
    }

    #[test]
    fn empty_sequence_matches_nothing() {
        let config = DimensionConfig::new(vec![Dimension::enumerated("priority", ["low"])]).unwrap();
        let doc = doc_with_priority("low");
        let filters = Filters::new().any_of("priority", Vec::<String>::new());
        assert!(!filters.matches(&doc, &config));
    }

    #[test]
    fn search_matches_title_or_body_case_insensitively() {
        let config = DimensionConfig::default();
        let doc = doc_with_priority("low");
        assert!(Filters::new().search("HELLO").matches(&doc, &config));
        assert!(Filters::new().search("IPSUM").matches(&doc, &config));
        assert!(!Filters::new().search("nope").matches(&doc, &config));
    }
}
