//! ABOUTME: `Store` — the public facade tying config, ids, filters, and persistence together
//! ABOUTME: Every call reloads from disk under a lock so independent instances stay consistent

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::canonical::canonical_order;
use crate::clock::{Clock, SystemClock};
use crate::coerce::coerce_json;
use crate::config::{Dimension, DimensionConfig, DimensionKind};
use crate::document::{Document, RawValue};
use crate::error::{FacetError, FacetResult};
use crate::filters::{resolve_filter_field, Filters};
use crate::id::{self, IdMap};
use crate::options::{ListOptions, ListedDocument, UpdateRequest};
use crate::persistence::{self, FileLock, LockRetryPolicy};
use crate::preprocess::{preprocess_dimensions, preprocess_filters};

const DATA_PREFIX: &str = "_data.";

/// Everything needed to open a `Store`: where its file lives, what
/// dimensions it classifies by, and how patient its file-lock retries
/// are. The single configuration surface for this crate (`SPEC_FULL.md`
/// §9.3) — no TOML/YAML layer, just a builder.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: PathBuf,
    pub dimensions: DimensionConfig,
    pub lock_retry: LockRetryPolicy,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>, dimensions: DimensionConfig) -> Self {
        Self {
            path: path.into(),
            dimensions,
            lock_retry: LockRetryPolicy::default(),
        }
    }

    pub fn with_lock_retry(mut self, policy: LockRetryPolicy) -> Self {
        self.lock_retry = policy;
        self
    }
}

/// An embedded, single-file JSON document store with a Smart-ID engine.
///
/// A `Store` instance holds no authoritative document set in memory: each
/// public operation acquires the in-process gate, then the cross-process
/// file lock, then reloads from disk before acting. This is what lets
/// several independent `Store` instances opened on the same path observe
/// each other's writes.
pub struct Store {
    path: PathBuf,
    config: DimensionConfig,
    clock: Arc<dyn Clock>,
    lock_retry: LockRetryPolicy,
    gate: RwLock<()>,
}

impl Store {
    /// Opens (or creates, on first write) the store at `path` using the
    /// wall clock.
    pub fn open(path: impl Into<PathBuf>, dimensions: DimensionConfig) -> FacetResult<Self> {
        Self::open_with_options(StoreOptions::new(path, dimensions))
    }

    pub fn open_with_options(options: StoreOptions) -> FacetResult<Self> {
        Self::open_with_clock(options, Arc::new(SystemClock))
    }

    /// Opens with an injected clock, for deterministic tests.
    ///
    /// Eagerly loads the data file once so a pre-existing but unparsable
    /// file fails construction rather than surfacing on the first
    /// `add`/`list`/etc. call (`spec.md` §4.5: "Parse errors fail the
    /// constructor"). The loaded value itself is discarded — every
    /// subsequent operation reloads under its own lock anyway.
    pub fn open_with_clock(options: StoreOptions, clock: Arc<dyn Clock>) -> FacetResult<Self> {
        persistence::load(&options.path, clock.now())?;
        Ok(Self {
            path: options.path,
            config: options.dimensions,
            clock,
            lock_retry: options.lock_retry,
            gate: RwLock::new(()),
        })
    }

    /// Adds a new document, returning its stable UUID. `dimensions` may
    /// contain Smart IDs in hierarchical reference fields; they are
    /// rewritten to UUIDs where resolvable and left untouched otherwise.
    #[tracing::instrument(level = "debug", skip(self, dimensions))]
    pub fn add(
        &self,
        title: &str,
        body: &str,
        dimensions: BTreeMap<String, RawValue>,
    ) -> FacetResult<Uuid> {
        self.with_write(|docs, id_map, clock| {
            let mut raw: serde_json::Map<String, Value> = dimensions.into_iter().collect();
            preprocess_dimensions(&mut raw, &self.config, id_map);
            let validated = self.validate_dimensions(&raw)?;

            let now = clock.now();
            let doc = Document {
                uuid: Uuid::new_v4(),
                title: title.to_string(),
                body: body.to_string(),
                created_at: now,
                updated_at: now,
                dimensions: validated,
            };
            let uuid = doc.uuid;
            docs.push(doc);
            Ok(uuid)
        })
    }

    /// Applies a partial update to the document named by `id` (a Smart ID
    /// or a UUID). Rejects an update that would set the hierarchical
    /// reference field to one of the document's own descendants, which
    /// would otherwise introduce a cycle in the parent chain.
    #[tracing::instrument(level = "debug", skip(self, req))]
    pub fn update(&self, id: &str, req: UpdateRequest) -> FacetResult<()> {
        self.with_write(|docs, id_map, clock| {
            let uuid = id::resolve(id_map, id).map_err(|_| FacetError::NotFound(id.to_string()))?;
            let idx = docs
                .iter()
                .position(|d| d.uuid == uuid)
                .ok_or_else(|| FacetError::NotFound(id.to_string()))?;
            let resolved = preprocess_update(&self.config, id_map, &req);
            reject_cycle(&self.config, docs, uuid, &resolved)?;
            apply_update(&self.config, &mut docs[idx], &req, &resolved, clock)
        })
    }

    /// Deletes the document named by `id`. Without `cascade`, refuses if
    /// any document references it through a hierarchical dimension
    /// (`FacetError::HasChildren`); with `cascade`, removes the whole
    /// descendant subtree.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete(&self, id: &str, cascade: bool) -> FacetResult<()> {
        self.with_write(|docs, id_map, _clock| {
            let uuid = id::resolve(id_map, id).map_err(|_| FacetError::NotFound(id.to_string()))?;
            if !docs.iter().any(|d| d.uuid == uuid) {
                return Err(FacetError::NotFound(id.to_string()));
            }

            let has_children = docs
                .iter()
                .any(|d| d.parent_uuid(&self.config) == Some(uuid));

            if has_children && !cascade {
                return Err(FacetError::HasChildren(id.to_string()));
            }

            let doomed = if cascade {
                descendant_closure(&self.config, docs, uuid)
            } else {
                let mut only = HashSet::new();
                only.insert(uuid);
                only
            };
            docs.retain(|d| !doomed.contains(&d.uuid));
            Ok(())
        })
    }

    /// Lists documents matching `options.filters`, ordered and paginated
    /// per `options`. Smart IDs are generated from the canonical view of
    /// the *full* document set, independent of the filters applied here,
    /// so two differently-filtered listings never disagree about what a
    /// given document's id is.
    #[tracing::instrument(level = "debug", skip(self, options))]
    pub fn list(&self, options: &ListOptions) -> FacetResult<Vec<ListedDocument>> {
        self.with_read(|docs, id_map| {
            let mut filters = options.filters.clone();
            preprocess_filters(&mut filters, &self.config, id_map);

            let mut matched: Vec<&Document> =
                docs.iter().filter(|d| filters.matches(d, &self.config)).collect();

            if options.order_by.is_empty() {
                let order = canonical_order(&self.config, docs);
                let position: std::collections::HashMap<Uuid, usize> = order
                    .iter()
                    .enumerate()
                    .map(|(pos, &idx)| (docs[idx].uuid, pos))
                    .collect();
                matched.sort_by_key(|d| position[&d.uuid]);
            } else {
                matched.sort_by(|a, b| {
                    for column in &options.order_by {
                        let va = resolve_filter_field(a, &self.config, &column.column)
                            .map(|v| coerce_json(&v))
                            .unwrap_or_default();
                        let vb = resolve_filter_field(b, &self.config, &column.column)
                            .map(|v| coerce_json(&v))
                            .unwrap_or_default();
                        let ord = if column.descending {
                            vb.cmp(&va)
                        } else {
                            va.cmp(&vb)
                        };
                        if ord != std::cmp::Ordering::Equal {
                            return ord;
                        }
                    }
                    std::cmp::Ordering::Equal
                });
            }

            let start = options.offset.unwrap_or(0).min(matched.len());
            let end = match options.limit {
                Some(limit) => (start + limit).min(matched.len()),
                None => matched.len(),
            };

            Ok(matched[start..end]
                .iter()
                .map(|d| ListedDocument {
                    simple_id: id_map.id_of(&d.uuid).unwrap_or_default().to_string(),
                    document: (*d).clone(),
                })
                .collect())
        })
    }

    /// Resolves a Smart ID (or a pass-through UUID) to the document's
    /// stable UUID, against the current canonical view.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn resolve_uuid(&self, simple_id: &str) -> FacetResult<Uuid> {
        self.with_read(|_docs, id_map| id::resolve(id_map, simple_id))
    }

    /// Applies `req` to every document matching `filters`. Returns the
    /// count of documents updated. Aborts without persisting if applying
    /// the requested reference-field change would create a cycle for any
    /// matched document (`spec.md` §4.4: "partial failures during
    /// validation abort the whole operation without persisting").
    #[tracing::instrument(level = "debug", skip(self, filters, req))]
    pub fn update_by_dimension(&self, filters: &Filters, req: UpdateRequest) -> FacetResult<usize> {
        self.with_write(|docs, id_map, clock| {
            let mut resolved_filters = filters.clone();
            preprocess_filters(&mut resolved_filters, &self.config, id_map);
            let resolved_update = preprocess_update(&self.config, id_map, &req);

            let config = self.config.clone();
            let matched: HashSet<Uuid> = docs
                .iter()
                .filter(|d| resolved_filters.matches(d, &config))
                .map(|d| d.uuid)
                .collect();

            for &uuid in &matched {
                reject_cycle(&config, docs, uuid, &resolved_update)?;
            }

            let mut updated = 0usize;
            for doc in docs.iter_mut() {
                if matched.contains(&doc.uuid) {
                    apply_update(&config, doc, &req, &resolved_update, clock)?;
                    updated += 1;
                }
            }
            Ok(updated)
        })
    }

    /// Deletes every document matching `filters`, without cascading to
    /// dependents (any child left behind simply becomes a root on the
    /// next listing, since its parent reference no longer resolves).
    /// Returns the count of documents deleted.
    #[tracing::instrument(level = "debug", skip(self, filters))]
    pub fn delete_by_dimension(&self, filters: &Filters) -> FacetResult<usize> {
        self.with_write(|docs, id_map, _clock| {
            let mut resolved = filters.clone();
            preprocess_filters(&mut resolved, &self.config, id_map);

            let config = self.config.clone();
            let before = docs.len();
            docs.retain(|doc| !resolved.matches(doc, &config));
            Ok(before - docs.len())
        })
    }

    /// Releases the store's advisory lock file. The store is consumed;
    /// there is nothing else to flush, since every mutation is already
    /// persisted synchronously.
    pub fn close(self) -> FacetResult<()> {
        persistence::remove_lock_file(&self.path);
        Ok(())
    }

    fn validate_dimensions(
        &self,
        raw: &serde_json::Map<String, Value>,
    ) -> FacetResult<serde_json::Map<String, Value>> {
        let mut validated = serde_json::Map::new();
        for (key, value) in raw {
            if let Some((k, v)) = validate_entry(&self.config, key, value)? {
                validated.insert(k, v);
            }
        }
        apply_defaults(&self.config, &mut validated);
        Ok(validated)
    }

    /// Runs `f` under the exclusive gate/file lock and persists the
    /// result, but only if it actually changed the document set — a
    /// bulk operation that matched nothing must not mutate on-disk state
    /// (`spec.md` §8: `DeleteByDimension` applied twice returns 0 the
    /// second time "and does not mutate state"). A real no-op `Update`
    /// still differs after `f` runs, since `apply_update` always bumps
    /// `updated_at`, so this check never masks that required side effect.
    fn with_write<F, T>(&self, f: F) -> FacetResult<T>
    where
        F: FnOnce(&mut Vec<Document>, &IdMap, &Arc<dyn Clock>) -> FacetResult<T>,
    {
        let _gate = self.gate.write();
        let _file_lock = FileLock::acquire_exclusive(&self.path, &self.lock_retry)?;
        let now = self.clock.now();
        let mut on_disk = persistence::load(&self.path, now)?;
        let id_map = id::generate(&self.config, &on_disk.documents);
        let before = on_disk.documents.clone();

        let result = f(&mut on_disk.documents, &id_map, &self.clock)?;

        if on_disk.documents != before {
            on_disk.metadata.updated_at = self.clock.now();
            persistence::save(&self.path, &on_disk)?;
        }
        Ok(result)
    }

    fn with_read<F, T>(&self, f: F) -> FacetResult<T>
    where
        F: FnOnce(&[Document], &IdMap) -> FacetResult<T>,
    {
        let _gate = self.gate.read();
        let _file_lock = FileLock::acquire_shared(&self.path, &self.lock_retry)?;
        let now = self.clock.now();
        let on_disk = persistence::load(&self.path, now)?;
        let id_map = id::generate(&self.config, &on_disk.documents);
        f(&on_disk.documents, &id_map)
    }
}

/// What a dimension-entry key names, independent of any particular
/// value — shared by `validate_entry` (which also needs the matched
/// `Dimension` to validate a `Some` value) and by `apply_update`'s clear
/// arm (which only needs to know the name is legal at all).
enum NameKind<'a> {
    Data,
    Enumerated(&'a Dimension),
    Reference,
}

/// Classifies a dimension-entry key against `config`, the same
/// precedence `Document::classify` uses to read a stored value back:
/// `_data.*`, a declared enumerated dimension, a hierarchical reference
/// field. Anything else is `UnknownDimension` — the single source of
/// truth both `validate_entry` and `apply_update`'s clearing arm consult,
/// since "is this name legal" must reject the same names whether the
/// caller is setting or clearing it (`spec.md` §7).
fn classify_name<'a>(config: &'a DimensionConfig, key: &str) -> FacetResult<NameKind<'a>> {
    if key.starts_with(DATA_PREFIX) {
        return Ok(NameKind::Data);
    }
    if let Some(dim) = config.find(key) {
        if let DimensionKind::Enumerated(_) = &dim.kind {
            return Ok(NameKind::Enumerated(dim));
        }
    }
    if config
        .dimensions()
        .iter()
        .any(|d| d.reference_field() == Some(key))
    {
        return Ok(NameKind::Reference);
    }
    Err(FacetError::UnknownDimension(key.to_string()))
}

/// Validates one incoming `(key, value)` dimension entry against
/// `config`: `_data.*` passes through unchecked, a declared enumerated
/// dimension is checked against its value set, a hierarchical reference
/// field accepts any string or null (resolution already happened in
/// preprocessing; an unresolved forward reference is tolerated here and
/// becomes an orphan treated as a root until its parent shows up), and
/// anything else is `UnknownDimension`.
fn validate_entry(
    config: &DimensionConfig,
    key: &str,
    value: &Value,
) -> FacetResult<Option<(String, Value)>> {
    match classify_name(config, key)? {
        NameKind::Data => Ok(Some((key.to_string(), value.clone()))),
        NameKind::Enumerated(dim) => {
            let v = Document::validate_enumerated(dim, value)?;
            Ok(Some((key.to_string(), v)))
        }
        NameKind::Reference => match value {
            Value::String(_) | Value::Null => Ok(Some((key.to_string(), value.clone()))),
            other => Err(FacetError::InvalidDimensionValue {
                dimension: key.to_string(),
                message: format!("reference field `{key}` must be a string, got `{other}`"),
            }),
        },
    }
}

/// Fills in the declared default for any enumerated dimension the caller
/// didn't mention, per `spec.md` §3.
fn apply_defaults(config: &DimensionConfig, map: &mut serde_json::Map<String, Value>) {
    for dim in config.dimensions() {
        if let DimensionKind::Enumerated(e) = &dim.kind {
            if !map.contains_key(&dim.name) {
                if let Some(default) = &e.default {
                    map.insert(dim.name.clone(), Value::String(default.clone()));
                }
            }
        }
    }
}

/// Resolves every Smart-ID-bearing `Some` entry in `req.dimensions` to a
/// UUID string where possible. `None` (clearing) entries are not part of
/// the resolved map — they can never introduce a cycle.
fn preprocess_update(
    config: &DimensionConfig,
    id_map: &IdMap,
    req: &UpdateRequest,
) -> serde_json::Map<String, Value> {
    let mut incoming: serde_json::Map<String, Value> = req
        .dimensions
        .iter()
        .filter_map(|(k, v)| v.clone().map(|val| (k.clone(), val)))
        .collect();
    preprocess_dimensions(&mut incoming, config, id_map);
    incoming
}

/// Rejects an update that would set the hierarchical reference field to
/// a value reachable by walking parent references back from `target`
/// itself — i.e. one of `target`'s own descendants, or `target` again.
/// Per `spec.md` §9: "a correct check is a reachability walk from the
/// proposed parent back to the target UUID."
fn reject_cycle(
    config: &DimensionConfig,
    docs: &[Document],
    target: Uuid,
    resolved: &serde_json::Map<String, Value>,
) -> FacetResult<()> {
    let Some(dim) = config.hierarchical() else {
        return Ok(());
    };
    let field = dim
        .reference_field()
        .expect("a hierarchical dimension always carries a reference field");
    let Some(Value::String(s)) = resolved.get(field) else {
        return Ok(());
    };
    let Ok(mut current) = Uuid::parse_str(s) else {
        return Ok(());
    };

    for _ in 0..=crate::id::MAX_HIERARCHY_DEPTH {
        if current == target {
            return Err(FacetError::InvalidDimensionValue {
                dimension: dim.name.clone(),
                message: format!("setting `{field}` to this value would create a cycle"),
            });
        }
        match docs
            .iter()
            .find(|d| d.uuid == current)
            .and_then(|d| d.parent_uuid(config))
        {
            Some(parent) => current = parent,
            None => return Ok(()),
        }
    }
    Ok(())
}

/// Merges an `UpdateRequest` into `doc` in place, using an already
/// Smart-ID-resolved dimensions map (`resolved`, from
/// [`preprocess_update`]): `Some(value)` entries are validated as in
/// `Add`; `None` entries clear a hierarchical reference or a `_data.*`
/// key.
fn apply_update(
    config: &DimensionConfig,
    doc: &mut Document,
    req: &UpdateRequest,
    resolved: &serde_json::Map<String, Value>,
    clock: &Arc<dyn Clock>,
) -> FacetResult<()> {
    for (key, value) in &req.dimensions {
        match value {
            Some(_) => {
                let raw = resolved.get(key).expect("every Some entry was inserted above");
                let (k, v) = validate_entry(config, key, raw)?
                    .ok_or_else(|| FacetError::UnknownDimension(key.clone()))?;
                doc.dimensions.insert(k, v);
            }
            None => {
                classify_name(config, key)?;
                doc.dimensions.remove(key);
            }
        }
    }

    if let Some(title) = &req.title {
        doc.title = title.clone();
    }
    if let Some(body) = &req.body {
        doc.body = body.clone();
    }
    doc.updated_at = clock.now();
    Ok(())
}

/// The full descendant set of `root` (inclusive), following hierarchical
/// reference chains. Guards against cycles the same way the ID generator
/// does: a node is only ever enqueued once.
fn descendant_closure(config: &DimensionConfig, docs: &[Document], root: Uuid) -> HashSet<Uuid> {
    let mut closure = HashSet::new();
    let mut frontier = vec![root];
    while let Some(current) = frontier.pop() {
        if closure.insert(current) {
            for doc in docs {
                if doc.parent_uuid(config) == Some(current) {
                    frontier.push(doc.uuid);
                }
            }
        }
    }
    closure
}
