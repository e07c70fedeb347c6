use serde::Serialize;

use crate::models::domain::Sample;

pub const DEFAULT_WINDOW_CAPACITY: usize = 20;

/// Rolling chart history, oldest sample first.
///
/// Eviction is by arrival order only: timestamps are labels and never decide
/// what is dropped, so bursty feeds simply compress the span the chart covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimeSeriesWindow {
    samples: Vec<Sample>,
}

impl TimeSeriesWindow {
    /// Returns the last `capacity - 1` samples followed by `sample`.
    ///
    /// A capacity of 0 always yields an empty window. Configuration rejects 0
    /// before a session starts, so this only matters to direct callers.
    pub fn append(&self, sample: Sample, capacity: usize) -> TimeSeriesWindow {
        if capacity == 0 {
            return TimeSeriesWindow::default();
        }

        let start = self.samples.len().saturating_sub(capacity - 1);
        let mut samples = Vec::with_capacity(self.samples.len() - start + 1);
        samples.extend_from_slice(&self.samples[start..]);
        samples.push(sample);
        TimeSeriesWindow { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.timestamp.clone()).collect()
    }

    pub fn totals(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.total).collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }
}
