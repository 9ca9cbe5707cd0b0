//! ABOUTME: The canonical view — the deterministic order IDs are assigned in
//! ABOUTME: Depends only on stored documents, never on a caller's filters

use crate::config::{DimensionConfig, DimensionKind};
use crate::document::{Document, DimensionValue};

/// Returns indices into `documents`, ordered per `spec.md` §4.1:
/// each enumerated dimension in declaration order (ascending, string
/// compared), then `created_at` ascending as a stability tie-break.
///
/// Two processes holding the same document set must produce the same
/// order, which is why this never consults filters or any other
/// caller-supplied state.
pub fn canonical_order(config: &DimensionConfig, documents: &[Document]) -> Vec<usize> {
    let enumerated_names: Vec<&str> = config
        .dimensions()
        .iter()
        .filter_map(|d| match &d.kind {
            DimensionKind::Enumerated(_) => Some(d.name.as_str()),
            DimensionKind::Hierarchical(_) => None,
        })
        .collect();

    let mut indices: Vec<usize> = (0..documents.len()).collect();
    indices.sort_by(|&a, &b| {
        let doc_a = &documents[a];
        let doc_b = &documents[b];
        for name in &enumerated_names {
            let va = dimension_sort_key(config, doc_a, name);
            let vb = dimension_sort_key(config, doc_b, name);
            let ord = va.cmp(&vb);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        doc_a.created_at.cmp(&doc_b.created_at)
    });
    indices
}

/// The string to sort `name` by: the declared value when it's still
/// valid against `config`, or the raw stored string when it's stale (a
/// value that no longer matches the current declared set still
/// sort-compares as a plain string, per `spec.md` §4.1 — it's only
/// invalid-kind values, e.g. a number, that contribute nothing).
fn dimension_sort_key<'a>(config: &DimensionConfig, doc: &'a Document, name: &str) -> &'a str {
    match doc.classify(config, name) {
        Some(DimensionValue::Enumerated(s)) => s,
        Some(DimensionValue::Data(serde_json::Value::String(s))) => s,
        _ => "",
    }
}
