//! ABOUTME: The `Document` record and the interpreted view of a dimension value
//! ABOUTME: Storage keeps raw JSON; validation/coercion classify it against config

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Dimension, DimensionConfig, DimensionKind};
use crate::error::{FacetError, FacetResult};

/// The preprocessor-facing input type for a dimension entry, before
/// validation narrows it into a stored, config-checked value.
pub type RawValue = serde_json::Value;

/// A single document. `dimensions` is stored as raw JSON rather than an
/// interpreted enum so that values loaded from disk round-trip verbatim
/// even when they no longer match the current configuration (`spec.md`
/// §6: "unknown dimension values ... are loaded verbatim").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub uuid: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub dimensions: serde_json::Map<String, serde_json::Value>,
}

/// The interpreted meaning of one `dimensions` entry, computed against a
/// `DimensionConfig` at the moment it's needed (validation, filtering,
/// ordering, ID generation). Modeled as a tagged union rather than
/// conditional matching on raw JSON at every call site, per the design
/// note in `spec.md` §9.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionValue<'a> {
    /// A value belonging to an enumerated dimension's declared set.
    Enumerated(&'a str),
    /// A hierarchical reference field's stored UUID (already resolved).
    Reference(Uuid),
    /// A `_data.*` entry, or a dimension value that does not (or no
    /// longer) validate against the current config — carried through
    /// transparently.
    Data(&'a serde_json::Value),
}

const DATA_PREFIX: &str = "_data.";

impl Document {
    /// Every document's `_data.*` entries, key stripped of the prefix.
    pub fn data_entries(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.dimensions
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(DATA_PREFIX).map(|stripped| (stripped, v)))
    }

    /// Look up a document's value under `key`, classified against
    /// `config`. `key` may be a dimension name, a hierarchical reference
    /// field, or a full `_data.<k>` key.
    pub fn classify<'a>(
        &'a self,
        config: &DimensionConfig,
        key: &str,
    ) -> Option<DimensionValue<'a>> {
        if let Some(raw) = self.dimensions.get(key) {
            return Some(classify_raw(config, key, raw));
        }
        None
    }

    /// The hierarchical parent reference, if the config declares a
    /// hierarchical dimension and this document carries a value for it.
    pub fn parent_uuid(&self, config: &DimensionConfig) -> Option<Uuid> {
        let field = config.hierarchical()?.reference_field()?;
        match self.classify(config, field)? {
            DimensionValue::Reference(uuid) => Some(uuid),
            _ => None,
        }
    }

    /// Validates and normalizes a single incoming raw dimension value
    /// against its declared kind. Used by `Add`/`Update`. `_data.*` keys
    /// and unknown-name rejection are handled by the caller (the store),
    /// since "unknown" is store-wide context (dimension vs reference
    /// field vs `_data.*`), not something a single value can decide.
    pub fn validate_enumerated(
        dim: &Dimension,
        raw: &serde_json::Value,
    ) -> FacetResult<serde_json::Value> {
        match &dim.kind {
            DimensionKind::Enumerated(e) => match raw {
                serde_json::Value::String(s) if e.values.iter().any(|v| v == s) => {
                    Ok(serde_json::Value::String(s.clone()))
                }
                serde_json::Value::String(s) => Err(FacetError::InvalidDimensionValue {
                    dimension: dim.name.clone(),
                    message: format!("`{}` is not a declared value of `{}`", s, dim.name),
                }),
                other => Err(FacetError::InvalidDimensionValue {
                    dimension: dim.name.clone(),
                    message: format!("expected a string value, got `{}`", other),
                }),
            },
            DimensionKind::Hierarchical(_) => unreachable!(
                "validate_enumerated is never called for a hierarchical dimension"
            ),
        }
    }
}

fn classify_raw<'a>(
    config: &DimensionConfig,
    key: &str,
    raw: &'a serde_json::Value,
) -> DimensionValue<'a> {
    if let Some(s) = key.strip_prefix(DATA_PREFIX) {
        let _ = s;
        return DimensionValue::Data(raw);
    }
    if let Some(dim) = config.dimensions().iter().find(|d| {
        d.name == key || d.reference_field() == Some(key)
    }) {
        match &dim.kind {
            DimensionKind::Enumerated(e) => {
                if let serde_json::Value::String(s) = raw {
                    if e.values.iter().any(|v| v == s) {
                        return DimensionValue::Enumerated(s.as_str());
                    }
                }
                DimensionValue::Data(raw)
            }
            DimensionKind::Hierarchical(_) => {
                if let serde_json::Value::String(s) = raw {
                    if let Ok(uuid) = Uuid::parse_str(s) {
                        return DimensionValue::Reference(uuid);
                    }
                }
                DimensionValue::Data(raw)
            }
        }
    } else {
        DimensionValue::Data(raw)
    }
}
