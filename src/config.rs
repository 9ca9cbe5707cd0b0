//! ABOUTME: Dimension model and configuration validator
//! ABOUTME: Parses, validates, and exposes the store's declared dimensions

use std::collections::BTreeMap;

use crate::error::{FacetError, FacetResult};

/// One declared classification axis for documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
}

/// A dimension is either a closed, ordered value set (optionally prefixed
/// and defaulted) or a named parent-reference field. Modeled as a tagged
/// union rather than optional fields on one struct so validators and the
/// ID generator can match exhaustively instead of guessing which fields
/// apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionKind {
    Enumerated(EnumeratedDimension),
    Hierarchical(HierarchicalDimension),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedDimension {
    /// Declared values, in declaration order — this order is the tie-break
    /// order used by the canonical view (`spec.md` §4.1).
    pub values: Vec<String>,
    /// value -> prefix. Not every value needs a prefix.
    pub prefixes: BTreeMap<String, String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalDimension {
    /// The document field under which the parent UUID (or, pending
    /// resolution, a Smart ID) is stored.
    pub reference_field: String,
}

impl Dimension {
    pub fn enumerated(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Enumerated(EnumeratedDimension {
                values: values.into_iter().map(Into::into).collect(),
                prefixes: BTreeMap::new(),
                default: None,
            }),
        }
    }

    pub fn hierarchical(name: impl Into<String>, reference_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Hierarchical(HierarchicalDimension {
                reference_field: reference_field.into(),
            }),
        }
    }

    /// Builder-style prefix attachment, only meaningful on enumerated
    /// dimensions; validated (not panicked on) at `DimensionConfig::validate`.
    pub fn with_prefix(mut self, value: impl Into<String>, prefix: impl Into<String>) -> Self {
        if let DimensionKind::Enumerated(e) = &mut self.kind {
            e.prefixes.insert(value.into(), prefix.into());
        }
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        if let DimensionKind::Enumerated(e) = &mut self.kind {
            e.default = Some(value.into());
        }
        self
    }

    pub fn is_hierarchical(&self) -> bool {
        matches!(self.kind, DimensionKind::Hierarchical(_))
    }

    pub fn reference_field(&self) -> Option<&str> {
        match &self.kind {
            DimensionKind::Hierarchical(h) => Some(h.reference_field.as_str()),
            DimensionKind::Enumerated(_) => None,
        }
    }
}

/// The fixed-for-the-lifetime-of-a-store set of declared dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionConfig {
    dimensions: Vec<Dimension>,
}

impl DimensionConfig {
    pub fn new(dimensions: Vec<Dimension>) -> FacetResult<Self> {
        let config = Self { dimensions };
        config.validate()?;
        Ok(config)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn find(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// The single hierarchical dimension, if any (config validation
    /// guarantees there is at most one).
    pub fn hierarchical(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.is_hierarchical())
    }

    /// Runs every invariant in `spec.md` §3 "Configuration invariants".
    fn validate(&self) -> FacetResult<()> {
        let mut seen_names = std::collections::HashSet::new();
        let mut hierarchical_count = 0usize;
        let mut reference_fields = Vec::new();

        for dim in &self.dimensions {
            if dim.name.is_empty() {
                return Err(config_err("dimension name must not be empty"));
            }
            if !seen_names.insert(dim.name.as_str()) {
                return Err(config_err(format!(
                    "dimension name `{}` declared more than once",
                    dim.name
                )));
            }

            match &dim.kind {
                DimensionKind::Enumerated(e) => {
                    if e.values.is_empty() {
                        return Err(config_err(format!(
                            "dimension `{}` declares no values",
                            dim.name
                        )));
                    }
                    let mut seen_values = std::collections::HashSet::new();
                    for v in &e.values {
                        if !seen_values.insert(v.as_str()) {
                            return Err(config_err(format!(
                                "dimension `{}` declares duplicate value `{}`",
                                dim.name, v
                            )));
                        }
                    }

                    let mut seen_prefixes = std::collections::HashSet::new();
                    for (value, prefix) in &e.prefixes {
                        if prefix.is_empty() || prefix.len() > 10 {
                            return Err(config_err(format!(
                                "dimension `{}`: prefix `{}` must be 1-10 characters",
                                dim.name, prefix
                            )));
                        }
                        if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                            return Err(config_err(format!(
                                "dimension `{}`: prefix `{}` must be alphanumeric",
                                dim.name, prefix
                            )));
                        }
                        if !seen_prefixes.insert(prefix.as_str()) {
                            return Err(config_err(format!(
                                "dimension `{}`: prefix `{}` reused for another value",
                                dim.name, prefix
                            )));
                        }
                        if !e.values.contains(value) {
                            return Err(config_err(format!(
                                "dimension `{}`: prefix declared for undeclared value `{}`",
                                dim.name, value
                            )));
                        }
                    }

                    if let Some(default) = &e.default {
                        if !e.values.contains(default) {
                            return Err(config_err(format!(
                                "dimension `{}`: default `{}` is not a declared value",
                                dim.name, default
                            )));
                        }
                    }
                }
                DimensionKind::Hierarchical(h) => {
                    hierarchical_count += 1;
                    if hierarchical_count > 1 {
                        return Err(config_err(
                            "at most one hierarchical dimension is allowed per store",
                        ));
                    }
                    if h.reference_field.is_empty() {
                        return Err(config_err(format!(
                            "dimension `{}`: reference field must not be empty",
                            dim.name
                        )));
                    }
                    reference_fields.push(h.reference_field.clone());
                }
            }
        }

        for field in &reference_fields {
            if seen_names.contains(field.as_str()) {
                return Err(config_err(format!(
                    "reference field `{}` collides with a dimension name",
                    field
                )));
            }
        }

        Ok(())
    }
}

fn config_err(message: impl Into<String>) -> FacetError {
    FacetError::ConfigInvalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_dimension_names() {
        let err = DimensionConfig::new(vec![
            Dimension::enumerated("priority", ["low", "high"]),
            Dimension::enumerated("priority", ["x"]),
        ])
        .unwrap_err();
        assert!(matches!(err, FacetError::ConfigInvalid { .. }));
    }

    #[test]
    fn rejects_empty_enumerated_values() {
        let err = DimensionConfig::new(vec![Dimension::enumerated("status", Vec::<String>::new())])
            .unwrap_err();
        assert!(matches!(err, FacetError::ConfigInvalid { .. }));
    }

    #[test]
    fn rejects_prefix_for_unknown_value() {
        let dim = Dimension::enumerated("priority", ["low", "high"])
            .with_prefix("medium", "m");
        assert!(DimensionConfig::new(vec![dim]).is_err());
    }

    #[test]
    fn rejects_non_alphanumeric_prefix() {
        let dim = Dimension::enumerated("priority", ["low", "high"]).with_prefix("high", "h-1");
        assert!(DimensionConfig::new(vec![dim]).is_err());
    }

    #[test]
    fn rejects_duplicate_prefix_within_dimension() {
        let dim = Dimension::enumerated("priority", ["low", "high"])
            .with_prefix("low", "x")
            .with_prefix("high", "x");
        assert!(DimensionConfig::new(vec![dim]).is_err());
    }

    #[test]
    fn allows_prefix_collisions_across_dimensions() {
        let a = Dimension::enumerated("priority", ["high"]).with_prefix("high", "h");
        let b = Dimension::enumerated("kind", ["human"]).with_prefix("human", "h");
        assert!(DimensionConfig::new(vec![a, b]).is_ok());
    }

    #[test]
    fn rejects_default_not_in_values() {
        let dim = Dimension::enumerated("priority", ["low", "high"]).with_default("medium");
        assert!(DimensionConfig::new(vec![dim]).is_err());
    }

    #[test]
    fn rejects_second_hierarchical_dimension() {
        let a = Dimension::hierarchical("parent", "parent_uuid");
        let b = Dimension::hierarchical("category_parent", "category_uuid");
        assert!(DimensionConfig::new(vec![a, b]).is_err());
    }

    #[test]
    fn rejects_reference_field_colliding_with_dimension_name() {
        let a = Dimension::enumerated("parent_uuid", ["x"]);
        let b = Dimension::hierarchical("parent", "parent_uuid");
        assert!(DimensionConfig::new(vec![a, b]).is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let priority = Dimension::enumerated("priority", ["low", "normal", "high"])
            .with_prefix("high", "h")
            .with_prefix("low", "l")
            .with_default("normal");
        let parent = Dimension::hierarchical("parent", "parent_uuid");
        assert!(DimensionConfig::new(vec![priority, parent]).is_ok());
    }
}
