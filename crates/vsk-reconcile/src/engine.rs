use chrono::{DateTime, Utc};

use vsk_schemas::Snapshot;

/// Outcome of the freshness check for one volume under one rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreshnessVerdict {
    /// The latest snapshot is recent enough and not errored.
    UpToDate,
    /// The volume has no snapshot at all.
    NoSnapshot,
    /// The latest snapshot started before the acceptable window.
    Stale,
    /// The latest snapshot is in the error state; its age no longer matters.
    LatestErrored,
}

impl FreshnessVerdict {
    /// Whether this verdict obliges the watcher to create a snapshot.
    pub fn needs_snapshot(&self) -> bool {
        !matches!(self, FreshnessVerdict::UpToDate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessVerdict::UpToDate => "up_to_date",
            FreshnessVerdict::NoSnapshot => "no_snapshot",
            FreshnessVerdict::Stale => "stale",
            FreshnessVerdict::LatestErrored => "latest_errored",
        }
    }
}

/// Decide whether `latest` keeps a volume inside its freshness window.
///
/// Up to date iff a latest snapshot exists, it is not in the error state,
/// and it started at or after `acceptable_start_time`. A snapshot that
/// started exactly at the window boundary still counts as fresh. An errored
/// latest forces re-creation even when it is recent.
pub fn assess_freshness(
    latest: Option<&Snapshot>,
    acceptable_start_time: DateTime<Utc>,
) -> FreshnessVerdict {
    match latest {
        None => FreshnessVerdict::NoSnapshot,
        Some(snapshot) if snapshot.state.is_error() => FreshnessVerdict::LatestErrored,
        Some(snapshot) if snapshot.start_time < acceptable_start_time => FreshnessVerdict::Stale,
        Some(_) => FreshnessVerdict::UpToDate,
    }
}

/// Split `snapshots` into `(retained, expired)` against the retention cutoff.
///
/// A snapshot is retained only when it started strictly after
/// `retention_start_date`; one aged exactly the retention period is already
/// expired. Both halves preserve the input order.
pub fn split_by_retention<'a>(
    snapshots: &'a [Snapshot],
    retention_start_date: DateTime<Utc>,
) -> (Vec<&'a Snapshot>, Vec<&'a Snapshot>) {
    let mut retained = Vec::new();
    let mut expired = Vec::new();
    for snapshot in snapshots {
        if snapshot.start_time > retention_start_date {
            retained.push(snapshot);
        } else {
            expired.push(snapshot);
        }
    }
    (retained, expired)
}
