//! Opsgraph - predictive operations control core.
//!
//! This crate tracks heterogeneous pieces of work from unrelated business
//! modules as nodes (work units) in a single per-project dependency graph,
//! projects delay impact across that graph, compares resource load against
//! recorded capacity, and periodically evaluates a set of deterministic risk
//! rules that emit deduplicated [`domain::RiskEvent`]s.
//!
//! It provides both a library and a thin CLI binary that exposes the logical
//! operations over a JSONL snapshot file.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod app;
pub mod blueprint;
pub mod capacity;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod id_generation;
pub mod scheduler;
pub mod storage;
pub mod sync;

// Public CLI module (needed by binary)
pub mod cli;
