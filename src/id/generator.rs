//! ABOUTME: The Smart-ID engine — assigns and reverse-resolves per-listing IDs
//! ABOUTME: A pure function of (config, documents) under the canonical view

use std::collections::HashMap;

use uuid::Uuid;

use crate::canonical::canonical_order;
use crate::config::{DimensionConfig, DimensionKind};
use crate::document::{Document, DimensionValue};
use crate::error::{FacetError, FacetResult};

/// Bound on hierarchy depth a single `generate` call will resolve.
/// "Sufficient to cover any realistic tree" per `spec.md` §4.2.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// A bijection between Smart IDs and UUIDs, valid for exactly the
/// document set it was generated from. Never persisted, never cached
/// across calls — deleting a document renumbers its later siblings on
/// the very next listing.
#[derive(Debug, Default, Clone)]
pub struct IdMap {
    id_to_uuid: HashMap<String, Uuid>,
    uuid_to_id: HashMap<Uuid, String>,
}

impl IdMap {
    pub fn id_of(&self, uuid: &Uuid) -> Option<&str> {
        self.uuid_to_id.get(uuid).map(String::as_str)
    }

    pub fn uuid_of(&self, id: &str) -> Option<Uuid> {
        self.id_to_uuid.get(id).copied()
    }
}

/// Computes the full Smart-ID bijection for `documents` under `config`.
///
/// Root sweep first (documents whose hierarchical reference is absent,
/// empty, or points at a UUID not present in `documents`), then
/// repeated child sweeps bounded by [`MAX_HIERARCHY_DEPTH`]. Within each
/// sweep, candidates are visited in canonical order so two processes
/// holding the same document set always agree.
pub fn generate(config: &DimensionConfig, documents: &[Document]) -> IdMap {
    let order = canonical_order(config, documents);
    let uuid_index: HashMap<Uuid, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.uuid, i))
        .collect();

    let parent_of: Vec<Option<usize>> = documents
        .iter()
        .map(|d| {
            d.parent_uuid(config)
                .and_then(|parent_uuid| uuid_index.get(&parent_uuid).copied())
        })
        .collect();

    let mut assigned: Vec<Option<String>> = vec![None; documents.len()];
    let mut root_counters: HashMap<String, u32> = HashMap::new();
    let mut child_counters: HashMap<(Uuid, String), u32> = HashMap::new();

    for &idx in &order {
        if parent_of[idx].is_none() {
            let sig = prefix_signature(config, &documents[idx]);
            let counter = root_counters.entry(sig.clone()).or_insert(0);
            *counter += 1;
            assigned[idx] = Some(format!("{sig}{counter}"));
        }
    }

    for _ in 0..MAX_HIERARCHY_DEPTH {
        let mut progressed = false;
        for &idx in &order {
            if assigned[idx].is_some() {
                continue;
            }
            let Some(parent_idx) = parent_of[idx] else {
                continue;
            };
            let Some(parent_id) = assigned[parent_idx].clone() else {
                continue;
            };
            let sig = prefix_signature(config, &documents[idx]);
            let parent_uuid = documents[parent_idx].uuid;
            let counter = child_counters
                .entry((parent_uuid, sig.clone()))
                .or_insert(0);
            *counter += 1;
            assigned[idx] = Some(format!("{parent_id}.{sig}{counter}"));
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    // Anything left (a cycle that slipped past write-time checks, or a
    // tree deeper than MAX_HIERARCHY_DEPTH) is still assigned, as a root
    // counted in its own namespace, so the generator stays total.
    for &idx in &order {
        if assigned[idx].is_none() {
            let sig = prefix_signature(config, &documents[idx]);
            let counter = root_counters.entry(sig.clone()).or_insert(0);
            *counter += 1;
            assigned[idx] = Some(format!("{sig}{counter}"));
        }
    }

    let mut map = IdMap::default();
    for (idx, id) in assigned.into_iter().enumerate() {
        let id = id.expect("every index assigned above");
        let uuid = documents[idx].uuid;
        map.id_to_uuid.insert(id.clone(), uuid);
        map.uuid_to_id.insert(uuid, id);
    }
    map
}

/// Concatenation of the prefixes of every enumerated dimension whose
/// document value has a configured prefix, in declaration order.
fn prefix_signature(config: &DimensionConfig, doc: &Document) -> String {
    let mut sig = String::new();
    for dim in config.dimensions() {
        let DimensionKind::Enumerated(e) = &dim.kind else {
            continue;
        };
        let Some(DimensionValue::Enumerated(value)) = doc.classify(config, &dim.name) else {
            continue;
        };
        if let Some(prefix) = e.prefixes.get(value) {
            sig.push_str(prefix);
        }
    }
    sig
}

/// Resolves a Smart ID (or a pass-through UUID) against a previously
/// generated `IdMap`. Per `spec.md` §4.2/§7: a syntactically well-formed
/// UUID is returned unchanged without consulting the map; an empty
/// string or a structurally malformed ID is rejected before any lookup;
/// anything else that simply isn't present in the map is also
/// `InvalidId` (the map's authority is total for a given snapshot, so
/// "not present" and "malformed" are both just "not a valid id here").
pub fn resolve(map: &IdMap, query: &str) -> FacetResult<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(query) {
        return Ok(uuid);
    }
    if !is_well_formed(query) {
        return Err(FacetError::InvalidId(query.to_string()));
    }
    map.uuid_of(query)
        .ok_or_else(|| FacetError::InvalidId(query.to_string()))
}

/// Structural validity only — doesn't know about the store's actual
/// prefixes, so it accepts any alphanumeric-prefix-then-digits shape per
/// dot-separated segment.
fn is_well_formed(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    id.split('.').all(|segment| {
        !segment.is_empty()
            && segment.chars().all(|c| c.is_ascii_alphanumeric())
            && segment.chars().next_back().is_some_and(|c| c.is_ascii_digit())
    })
}
