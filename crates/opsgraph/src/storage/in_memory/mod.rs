//! In-memory storage backend using HashMap and petgraph.
//!
//! All data is held in RAM; persistence is optional via the JSONL snapshot
//! functions in this module. The backend is suitable for the CLI (load
//! snapshot, operate, save snapshot), for tests, and as the reference
//! implementation of [`OpsStore`](crate::storage::OpsStore) semantics.
//!
//! # Architecture
//!
//! - `HashMap<WorkUnitId, WorkUnit>` for O(1) unit lookups, with a
//!   secondary index keyed by source reference for idempotent upserts
//! - `petgraph::DiGraph<WorkUnitId, DependencyKind>` used exclusively to
//!   answer cycle checks on edge writes; analysis passes build their own
//!   [`GraphSnapshot`](crate::graph::GraphSnapshot) from list queries
//! - open risk events indexed by fingerprint so a sweep's upsert/resolve
//!   phase is O(candidates + open events)
//!
//! # Edge direction
//!
//! Edges run **predecessor -> successor**: source must happen before
//! target. Adding `from -> to` is rejected when a path `to -> ... -> from`
//! already exists.
//!
//! # Thread safety
//!
//! State lives in `Arc<tokio::sync::Mutex<StoreInner>>`; every trait method
//! acquires the mutex once, which is what makes `commit_rule_outcome` a
//! single logical unit.

mod graph;
mod inner;
mod jsonl;
mod trait_impl;

use crate::storage::OpsStore;
use inner::StoreInner;
use std::sync::Arc;
use tokio::sync::Mutex;

// Re-export public API
pub use jsonl::{LoadWarning, load_from_jsonl, save_to_jsonl};

/// Thread-safe in-memory store.
pub(crate) type InMemoryStore = Arc<Mutex<StoreInner>>;

/// Create a new empty in-memory store.
pub fn new_in_memory_store() -> Box<dyn OpsStore> {
    Box::new(Arc::new(Mutex::new(StoreInner::new())))
}
