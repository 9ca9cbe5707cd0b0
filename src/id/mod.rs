//! ABOUTME: Smart-ID generation and reverse resolution

mod generator;

pub use generator::{generate, resolve, IdMap, MAX_HIERARCHY_DEPTH};
