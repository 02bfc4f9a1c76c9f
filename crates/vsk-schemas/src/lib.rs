use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod index;

pub use index::SnapshotIndex;

/// Tag key carrying the Kubernetes PVC name on provisioned volumes.
pub const TAG_PVC_NAME: &str = "kubernetes.io/created-for/pvc/name";
/// Tag key carrying the Kubernetes PVC namespace on provisioned volumes.
pub const TAG_PVC_NAMESPACE: &str = "kubernetes.io/created-for/pvc/namespace";

/// Volumes keyed by volume id. BTreeMap so a reconcile pass walks volumes in
/// a stable order.
pub type VolumeMap = BTreeMap<String, Volume>;

/// A block-storage volume as reported by the inventory backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Volume {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Key volumes by id.
pub fn map_volumes_by_id(volumes: Vec<Volume>) -> VolumeMap {
    volumes.into_iter().map(|v| (v.id.clone(), v)).collect()
}

/// Lifecycle state the backend reports for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Pending,
    Ok,
    Error,
    /// Any state string this build does not know about.
    #[serde(other)]
    Unknown,
}

impl SnapshotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotState::Pending => "pending",
            SnapshotState::Ok => "ok",
            SnapshotState::Error => "error",
            SnapshotState::Unknown => "unknown",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SnapshotState::Error)
    }
}

/// A point-in-time capture of one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: String,
    pub start_time: DateTime<Utc>,
    pub state: SnapshotState,
}

impl Snapshot {
    pub fn new(
        id: impl Into<String>,
        volume_id: impl Into<String>,
        start_time: DateTime<Utc>,
        state: SnapshotState,
    ) -> Self {
        Self {
            id: id.into(),
            volume_id: volume_id.into(),
            start_time,
            state,
        }
    }
}

/// Exact-match selector: a volume qualifies when its tag map carries this key
/// with this value. Other tags on the volume are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, volume: &Volume) -> bool {
        volume.tags.get(&self.key) == Some(&self.value)
    }
}

/// One entry of the rules file: which volumes, how often, how long to keep.
///
/// Field names stay camelCase on disk (`intervalSeconds`,
/// `retentionPeriodHours`) for compatibility with existing rules files.
/// Unknown fields are rejected so a misspelled key fails loading instead of
/// silently changing behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SnapshotRule {
    pub labels: LabelSelector,
    pub interval_seconds: i64,
    /// Overrides the daemon-wide retention period when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period_hours: Option<i64>,
}

impl SnapshotRule {
    /// Maximum age of the latest snapshot before the volume counts as stale.
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.interval_seconds)
    }

    /// Retention window for this rule, falling back to the daemon default.
    pub fn retention_period(&self, default_hours: i64) -> chrono::Duration {
        chrono::Duration::hours(self.retention_period_hours.unwrap_or(default_hours))
    }
}

/// Stable metric identity of a volume. PVC coordinates come from the
/// Kubernetes provisioning tags; volumes without them report empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeIdentity {
    pub pvc_name: String,
    pub pvc_namespace: String,
    pub volume_id: String,
}

impl VolumeIdentity {
    pub fn from_volume(volume: &Volume) -> Self {
        let tag = |key: &str| volume.tags.get(key).cloned().unwrap_or_default();
        Self {
            pvc_name: tag(TAG_PVC_NAME),
            pvc_namespace: tag(TAG_PVC_NAMESPACE),
            volume_id: volume.id.clone(),
        }
    }
}
