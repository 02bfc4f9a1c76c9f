//! Inventory boundary for block-storage backends.
//!
//! This crate defines **only** the client trait and its error type. No
//! concrete transport, no reconciliation logic, and no metrics belong here.
//! The reconciler is generic over [`InventoryClient`], so backends plug in
//! without touching the decision code.

use async_trait::async_trait;
use thiserror::Error;

use vsk_schemas::{Snapshot, SnapshotIndex, Volume, VolumeMap};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an [`InventoryClient`] implementation may return.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with an application-level error.
    #[error("inventory api error status={status}: {message}")]
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// A required configuration value (base URL, token) is missing or invalid.
    #[error("config error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Block-storage inventory contract.
///
/// Listing calls return the full current inventory; implementations handle
/// any backend paging internally. Mutation calls are fire-and-confirm: the
/// caller re-reads inventory on the next cycle rather than patching a local
/// view.
///
/// Implementations must be `Send + Sync` so a client can be shared with the
/// HTTP scrape path while a reconcile pass holds it.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Short name identifying the backend (e.g. `"http"`), used in logs.
    fn name(&self) -> &'static str;

    /// All volumes currently known to the backend, keyed by id.
    async fn get_volumes(&self) -> Result<VolumeMap, InventoryError>;

    /// All snapshots currently known to the backend, grouped per volume and
    /// ordered newest first.
    async fn get_snapshots(&self) -> Result<SnapshotIndex, InventoryError>;

    /// Request a new snapshot of `volume`. Completion is asynchronous on the
    /// backend side; the new snapshot appears in later listings.
    async fn create_snapshot(&self, volume: &Volume) -> Result<(), InventoryError>;

    /// Delete `snapshot` from the backend.
    async fn remove_snapshot(&self, snapshot: &Snapshot) -> Result<(), InventoryError>;
}
