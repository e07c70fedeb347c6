pub mod domain {
    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// One `{domain, count}` observation as the backend reports it.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DomainEntry {
        pub domain: String,
        pub count: u64,
    }

    impl DomainEntry {
        pub fn new(domain: impl Into<String>, count: u64) -> Self {
            DomainEntry {
                domain: domain.into(),
                count,
            }
        }
    }

    /// Everything the backend reported at one point in time, in the order it sent it.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Snapshot {
        entries: Vec<DomainEntry>,
    }

    impl Snapshot {
        pub fn entries(&self) -> &[DomainEntry] {
            &self.entries
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }

        pub fn iter(&self) -> std::slice::Iter<'_, DomainEntry> {
            self.entries.iter()
        }
    }

    impl From<Vec<DomainEntry>> for Snapshot {
        fn from(entries: Vec<DomainEntry>) -> Self {
            Snapshot { entries }
        }
    }

    impl FromIterator<DomainEntry> for Snapshot {
        fn from_iter<I: IntoIterator<Item = DomainEntry>>(iter: I) -> Self {
            Snapshot {
                entries: iter.into_iter().collect(),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum Status {
        Suspicious,
        Normal,
    }

    impl Status {
        pub fn as_str(&self) -> &'static str {
            match self {
                Status::Suspicious => "Suspicious",
                Status::Normal => "Normal",
            }
        }
    }

    impl fmt::Display for Status {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct ClassifiedEntry {
        #[serde(flatten)]
        pub entry: DomainEntry,
        pub status: Status,
    }

    /// Total activity of one snapshot, labelled with the local time it arrived.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Sample {
        pub timestamp: String,
        pub total: u64,
    }

    impl Sample {
        pub fn new(timestamp: impl Into<String>, total: u64) -> Self {
            Sample {
                timestamp: timestamp.into(),
                total,
            }
        }
    }
}

pub mod dto {
    use serde::Serialize;

    use super::domain::Status;
    use crate::reducer::SnapshotReducer;
    use crate::state::DashboardState;

    pub const CHART_LABEL: &str = "Live Suspicious Query Activity";
    pub const EMPTY_TABLE_MESSAGE: &str = "No suspicious domains detected ✅";

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct ChartData {
        pub label: String,
        pub labels: Vec<String>,
        pub data: Vec<u64>,
    }

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct TableRow {
        pub domain: String,
        pub count: u64,
        pub status: Status,
    }

    /// What a renderer needs: the chart series and the classified table.
    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct DashboardView {
        pub phase: &'static str,
        pub chart: ChartData,
        pub rows: Vec<TableRow>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub empty_message: Option<String>,
    }

    impl DashboardView {
        pub fn build(state: &DashboardState, reducer: &SnapshotReducer) -> Self {
            let window = state.window();
            let rows: Vec<TableRow> = reducer
                .classify(state.latest_snapshot())
                .into_iter()
                .map(|classified| TableRow {
                    domain: classified.entry.domain,
                    count: classified.entry.count,
                    status: classified.status,
                })
                .collect();

            DashboardView {
                phase: state.phase().as_str(),
                chart: ChartData {
                    label: CHART_LABEL.to_string(),
                    labels: window.labels(),
                    data: window.totals(),
                },
                empty_message: rows.is_empty().then(|| EMPTY_TABLE_MESSAGE.to_string()),
                rows,
            }
        }
    }
}
