//! ABOUTME: Rewrites Smart IDs to UUIDs in operation payloads before they reach the store
//! ABOUTME: Never fails on its own — unresolved strings are left as-is for the caller to judge

use crate::config::DimensionConfig;
use crate::filters::{FilterValue, Filters};
use crate::id::IdMap;

/// Attempts to resolve `raw` to a UUID string. Leaves it untouched if it
/// is already a UUID or cannot be resolved — per `spec.md` §4.3, failure
/// here is never fatal; the downstream validator (the store) decides
/// whether a missing reference is an error or a tolerated forward
/// reference.
pub fn rewrite_id(raw: &str, map: &IdMap) -> String {
    if uuid::Uuid::parse_str(raw).is_ok() {
        return raw.to_string();
    }
    match crate::id::resolve(map, raw) {
        Ok(uuid) => uuid.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Rewrites every hierarchical-reference-field entry in an incoming
/// dimensions map. Other entries (enumerated values, `_data.*`) are never
/// ID-bearing and are left alone.
pub fn preprocess_dimensions(
    dimensions: &mut serde_json::Map<String, serde_json::Value>,
    config: &DimensionConfig,
    map: &IdMap,
) {
    let reference_fields: Vec<String> = config
        .dimensions()
        .iter()
        .filter_map(|d| d.reference_field().map(str::to_string))
        .collect();

    for field in reference_fields {
        if let Some(serde_json::Value::String(s)) = dimensions.get_mut(&field) {
            *s = rewrite_id(s, map);
        }
    }
}

/// Rewrites filter values keyed by `uuid` or by the hierarchical
/// reference field, across both scalar and set-membership filters
/// ("recurses ... across sequences" per `spec.md` §4.3).
pub fn preprocess_filters(filters: &mut Filters, config: &DimensionConfig, map: &IdMap) {
    let reference_fields: Vec<String> = config
        .dimensions()
        .iter()
        .filter_map(|d| d.reference_field().map(str::to_string))
        .collect();

    for (key, value) in filters.entries.iter_mut() {
        let is_id_bearing = key == "uuid" || reference_fields.iter().any(|f| f == key);
        if !is_id_bearing {
            continue;
        }
        match value {
            FilterValue::Scalar(serde_json::Value::String(s)) => {
                *s = rewrite_id(s, map);
            }
            FilterValue::Set(items) => {
                for item in items.iter_mut() {
                    if let serde_json::Value::String(s) = item {
                        *s = rewrite_id(s, map);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimension;
    use crate::document::Document;
    use crate::id::generate;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn tolerates_unresolvable_forward_reference() {
        let config = DimensionConfig::new(vec![Dimension::hierarchical("parent", "parent_id")]).unwrap();
        let map = generate(&config, &[]);
        let mut dims = serde_json::Map::new();
        dims.insert("parent_id".to_string(), json!("99"));
        preprocess_dimensions(&mut dims, &config, &map);
        assert_eq!(dims.get("parent_id").unwrap(), "99");
    }

    #[test]
    fn rewrites_resolvable_reference() {
        let config = DimensionConfig::new(vec![Dimension::hierarchical("parent", "parent_id")]).unwrap();
        let root = Document {
            uuid: Uuid::new_v4(),
            title: "root".into(),
            body: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            dimensions: serde_json::Map::new(),
        };
        let map = generate(&config, std::slice::from_ref(&root));
        let root_id = map.id_of(&root.uuid).unwrap().to_string();

        let mut dims = serde_json::Map::new();
        dims.insert("parent_id".to_string(), json!(root_id));
        preprocess_dimensions(&mut dims, &config, &map);
        assert_eq!(dims.get("parent_id").unwrap(), &root.uuid.to_string());
    }

    #[test]
    fn leaves_uuid_untouched() {
        let config = DimensionConfig::default();
        let map = generate(&config, &[]);
        let uuid = Uuid::new_v4().to_string();
        assert_eq!(rewrite_id(&uuid, &map), uuid);
    }
}
