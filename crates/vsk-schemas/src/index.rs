use std::collections::BTreeMap;

use crate::Snapshot;

/// Snapshots grouped per volume, newest first.
///
/// Groups are sorted descending by `start_time` with a stable sort, so
/// snapshots sharing a timestamp keep their backend-reported order. Rebuilt
/// from a fresh listing every reconcile cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotIndex {
    by_volume: BTreeMap<String, Vec<Snapshot>>,
}

impl SnapshotIndex {
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        let mut by_volume: BTreeMap<String, Vec<Snapshot>> = BTreeMap::new();
        for snapshot in snapshots {
            by_volume
                .entry(snapshot.volume_id.clone())
                .or_default()
                .push(snapshot);
        }
        for group in by_volume.values_mut() {
            group.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        }
        Self { by_volume }
    }

    /// All snapshots of a volume, newest first. Empty slice for volumes the
    /// listing never mentioned.
    pub fn volume_snapshots(&self, volume_id: &str) -> &[Snapshot] {
        self.by_volume
            .get(volume_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Most recent snapshot of a volume, if it has any.
    pub fn latest(&self, volume_id: &str) -> Option<&Snapshot> {
        self.volume_snapshots(volume_id).first()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Snapshot])> {
        self.by_volume
            .iter()
            .map(|(id, group)| (id.as_str(), group.as_slice()))
    }

    pub fn volume_count(&self) -> usize {
        self.by_volume.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.by_volume.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_volume.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotState;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    fn snap(id: &str, volume_id: &str, start_time: DateTime<Utc>) -> Snapshot {
        Snapshot::new(id, volume_id, start_time, SnapshotState::Ok)
    }

    #[test]
    fn groups_snapshots_under_their_volume() {
        let index = SnapshotIndex::from_snapshots(vec![
            snap("snap-a1", "vol-a", ts(10, 0)),
            snap("snap-b1", "vol-b", ts(10, 0)),
            snap("snap-a2", "vol-a", ts(11, 0)),
        ]);

        assert_eq!(index.volume_count(), 2);
        assert_eq!(index.snapshot_count(), 3);
        assert_eq!(index.volume_snapshots("vol-a").len(), 2);
        assert_eq!(index.volume_snapshots("vol-b").len(), 1);
        assert!(index
            .volume_snapshots("vol-a")
            .iter()
            .all(|s| s.volume_id == "vol-a"));
    }

    #[test]
    fn orders_each_group_newest_first() {
        let index = SnapshotIndex::from_snapshots(vec![
            snap("oldest", "vol-a", ts(8, 0)),
            snap("newest", "vol-a", ts(12, 0)),
            snap("middle", "vol-a", ts(10, 0)),
        ]);

        let ids: Vec<&str> = index
            .volume_snapshots("vol-a")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
        assert_eq!(index.latest("vol-a").unwrap().id, "newest");
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let index = SnapshotIndex::from_snapshots(vec![
            snap("first", "vol-a", ts(9, 0)),
            snap("second", "vol-a", ts(9, 0)),
            snap("third", "vol-a", ts(9, 0)),
        ]);

        let ids: Vec<&str> = index
            .volume_snapshots("vol-a")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        // Ties break toward the first-listed snapshot.
        assert_eq!(index.latest("vol-a").unwrap().id, "first");
    }

    #[test]
    fn unknown_volume_yields_empty_view() {
        let index = SnapshotIndex::from_snapshots(vec![snap("snap-a1", "vol-a", ts(10, 0))]);

        assert!(index.volume_snapshots("vol-z").is_empty());
        assert!(index.latest("vol-z").is_none());
    }

    #[test]
    fn empty_input_builds_empty_index() {
        let index = SnapshotIndex::from_snapshots(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.volume_count(), 0);
        assert_eq!(index.snapshot_count(), 0);
    }

    #[test]
    fn iter_walks_volumes_in_id_order() {
        let index = SnapshotIndex::from_snapshots(vec![
            snap("snap-c1", "vol-c", ts(10, 0)),
            snap("snap-a1", "vol-a", ts(10, 0)),
            snap("snap-b1", "vol-b", ts(10, 0)),
        ]);

        let volumes: Vec<&str> = index.iter().map(|(id, _)| id).collect();
        assert_eq!(volumes, vec!["vol-a", "vol-b", "vol-c"]);
    }
}
