//! Deterministic in-memory inventory backend.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - created snapshot ids are stable strings derived from inputs:
//!   `"mem:snap:{volume_id}:{seq}"` with a per-backend sequence counter
//! - create appends an `Ok` snapshot stamped with the current wall clock;
//!   remove deletes by snapshot id, unknown ids answer a 404
//! - no randomness; listings rebuild from `BTreeMap` state so iteration
//!   order is stable across calls
//!
//! Doubles as the scenario backend for reconciler tests: per-operation
//! failure injection plus call recording, so tests assert the exact action
//! sequence a pass performed. Calls are recorded before failure injection is
//! applied, so recorded sequences include failed attempts.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use vsk_inventory::{InventoryClient, InventoryError};
use vsk_schemas::{Snapshot, SnapshotIndex, SnapshotState, Volume, VolumeMap};

#[derive(Debug, Default)]
struct MemoryState {
    volumes: BTreeMap<String, Volume>,
    snapshots: BTreeMap<String, Snapshot>,
    created_calls: Vec<String>,
    removed_calls: Vec<String>,
    fail_get_volumes: Option<String>,
    fail_get_snapshots: Option<String>,
    fail_create: Option<String>,
    fail_remove: Option<String>,
    fail_remove_for: BTreeMap<String, String>,
    create_seq: u64,
}

/// Cloneable handle to one shared in-memory inventory.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    // Recover the guard even if a test panicked while holding it.
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- seeding -----------------------------------------------------------

    pub fn seed_volume(&self, volume: Volume) {
        self.lock().volumes.insert(volume.id.clone(), volume);
    }

    pub fn seed_snapshot(&self, snapshot: Snapshot) {
        self.lock().snapshots.insert(snapshot.id.clone(), snapshot);
    }

    // --- failure injection -------------------------------------------------

    /// Make every `get_volumes` call fail with a transport error.
    pub fn fail_get_volumes(&self, message: impl Into<String>) {
        self.lock().fail_get_volumes = Some(message.into());
    }

    /// Make every `get_snapshots` call fail with a transport error.
    pub fn fail_get_snapshots(&self, message: impl Into<String>) {
        self.lock().fail_get_snapshots = Some(message.into());
    }

    /// Make every `create_snapshot` call fail with a transport error.
    pub fn fail_create(&self, message: impl Into<String>) {
        self.lock().fail_create = Some(message.into());
    }

    /// Make every `remove_snapshot` call fail with a transport error.
    pub fn fail_remove(&self, message: impl Into<String>) {
        self.lock().fail_remove = Some(message.into());
    }

    /// Make `remove_snapshot` fail for one specific snapshot id only.
    pub fn fail_remove_for(&self, snapshot_id: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .fail_remove_for
            .insert(snapshot_id.into(), message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_get_volumes = None;
        state.fail_get_snapshots = None;
        state.fail_create = None;
        state.fail_remove = None;
        state.fail_remove_for.clear();
    }

    // --- introspection -----------------------------------------------------

    /// Volume ids `create_snapshot` was called with, in call order.
    pub fn created_calls(&self) -> Vec<String> {
        self.lock().created_calls.clone()
    }

    /// Snapshot ids `remove_snapshot` was called with, in call order.
    pub fn removed_calls(&self) -> Vec<String> {
        self.lock().removed_calls.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.lock();
        state.created_calls.clear();
        state.removed_calls.clear();
    }

    /// Current snapshot state, id order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().snapshots.values().cloned().collect()
    }

    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots.len()
    }
}

#[async_trait]
impl InventoryClient for MemoryInventory {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_volumes(&self) -> Result<VolumeMap, InventoryError> {
        let state = self.lock();
        if let Some(msg) = &state.fail_get_volumes {
            return Err(InventoryError::Transport(msg.clone()));
        }
        Ok(state.volumes.clone())
    }

    async fn get_snapshots(&self) -> Result<SnapshotIndex, InventoryError> {
        let state = self.lock();
        if let Some(msg) = &state.fail_get_snapshots {
            return Err(InventoryError::Transport(msg.clone()));
        }
        Ok(SnapshotIndex::from_snapshots(
            state.snapshots.values().cloned().collect::<Vec<_>>(),
        ))
    }

    async fn create_snapshot(&self, volume: &Volume) -> Result<(), InventoryError> {
        let mut state = self.lock();
        state.created_calls.push(volume.id.clone());

        if let Some(msg) = &state.fail_create {
            return Err(InventoryError::Transport(msg.clone()));
        }

        state.create_seq += 1;
        let id = format!("mem:snap:{}:{}", volume.id, state.create_seq);
        let snapshot = Snapshot::new(id.clone(), volume.id.clone(), Utc::now(), SnapshotState::Ok);
        state.snapshots.insert(id, snapshot);
        Ok(())
    }

    async fn remove_snapshot(&self, snapshot: &Snapshot) -> Result<(), InventoryError> {
        let mut state = self.lock();
        state.removed_calls.push(snapshot.id.clone());

        if let Some(msg) = state.fail_remove_for.get(&snapshot.id) {
            return Err(InventoryError::Transport(msg.clone()));
        }
        if let Some(msg) = &state.fail_remove {
            return Err(InventoryError::Transport(msg.clone()));
        }

        if state.snapshots.remove(&snapshot.id).is_none() {
            return Err(InventoryError::Api {
                status: 404,
                message: format!("snapshot {} not found", snapshot.id),
            });
        }
        Ok(())
    }
}
