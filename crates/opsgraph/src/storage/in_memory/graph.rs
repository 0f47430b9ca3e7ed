//! Cycle detection for the in-memory store's edge writes.
//!
//! The store's petgraph exists solely to answer "would this edge close a
//! cycle" at write time; all analysis traversals run over a
//! [`GraphSnapshot`](crate::graph::GraphSnapshot) built per pass instead.

use crate::domain::{DependencyKind, WorkUnitId};
use crate::error::{Error, Result};
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Whether adding the edge `from -> to` would close a cycle.
///
/// A cycle appears exactly when a path `to -> ... -> from` already exists.
///
/// # Errors
///
/// Returns [`Error::WorkUnitNotFound`] when either endpoint has no graph
/// node.
pub(super) fn would_create_cycle(
    graph: &DiGraph<WorkUnitId, DependencyKind>,
    node_map: &HashMap<WorkUnitId, NodeIndex>,
    from: &WorkUnitId,
    to: &WorkUnitId,
) -> Result<bool> {
    let from_node = node_map
        .get(from)
        .ok_or_else(|| Error::WorkUnitNotFound(from.clone()))?;
    let to_node = node_map
        .get(to)
        .ok_or_else(|| Error::WorkUnitNotFound(to.clone()))?;

    Ok(algo::has_path_connecting(graph, *to_node, *from_node, None))
}
