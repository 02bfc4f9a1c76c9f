//! vsk-reconcile
//!
//! Snapshot reconciliation: decide which volumes need a fresh snapshot and
//! which snapshots have outlived their retention, then apply those decisions
//! through an injected inventory client.
//!
//! Architectural decisions:
//! - freshness and retention verdicts are pure functions with no IO, so the
//!   policy is testable without any backend
//! - the watcher is generic over `InventoryClient`; backends plug in
//! - a failed create suppresses that volume's retention sweep for the cycle,
//!   so a volume is never pruned down to zero snapshots
//! - the retention sweep runs independently of the freshness outcome; an
//!   up-to-date volume still gets its expired snapshots removed
//! - deletes within one volume are paced by a fixed inter-call delay

mod engine;
mod watcher;

pub use engine::{assess_freshness, split_by_retention, FreshnessVerdict};
pub use watcher::{CycleReport, SnapshotWatcher, DEFAULT_DELETE_PACING};
