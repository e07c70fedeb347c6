use crate::models::domain::{ClassifiedEntry, Snapshot, Status};

pub const DEFAULT_SUSPICIOUS_THRESHOLD: u64 = 10;

/// Classifies snapshot entries against a fixed count threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotReducer {
    threshold: u64,
}

impl Default for SnapshotReducer {
    fn default() -> Self {
        SnapshotReducer::new(DEFAULT_SUSPICIOUS_THRESHOLD)
    }
}

impl SnapshotReducer {
    pub fn new(threshold: u64) -> Self {
        SnapshotReducer { threshold }
    }

    /// Strictly above the threshold is suspicious; the threshold itself is normal.
    pub fn status_of(&self, count: u64) -> Status {
        if count > self.threshold {
            Status::Suspicious
        } else {
            Status::Normal
        }
    }

    pub fn classify(&self, snapshot: &Snapshot) -> Vec<ClassifiedEntry> {
        snapshot
            .iter()
            .map(|entry| ClassifiedEntry {
                entry: entry.clone(),
                status: self.status_of(entry.count),
            })
            .collect()
    }
}

pub fn total_of(snapshot: &Snapshot) -> u64 {
    snapshot
        .iter()
        .fold(0u64, |acc, entry| acc.saturating_add(entry.count))
}
