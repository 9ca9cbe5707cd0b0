//! ABOUTME: facetstore — an embedded, single-file JSON document store with a Smart-ID engine
//! ABOUTME: See `Store` for the public entry point; modules below implement each component

mod canonical;
mod clock;
mod coerce;
mod config;
mod document;
mod error;
mod filters;
mod id;
mod options;
mod persistence;
mod preprocess;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Dimension, DimensionConfig, DimensionKind, EnumeratedDimension, HierarchicalDimension};
pub use document::{Document, DimensionValue, RawValue};
pub use error::{FacetError, FacetResult, PersistenceError};
pub use filters::{FilterValue, Filters};
pub use id::MAX_HIERARCHY_DEPTH;
pub use options::{ListOptions, ListedDocument, OrderBy, UpdateRequest};
pub use persistence::LockRetryPolicy;
pub use store::{Store, StoreOptions};
