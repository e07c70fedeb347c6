use serde::Serialize;

use crate::models::domain::{Sample, Snapshot};
use crate::reducer;
use crate::window::TimeSeriesWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Active,
    TornDown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Active => "active",
            Phase::TornDown => "torn_down",
        }
    }
}

/// Latest snapshot plus the rolling activity window.
///
/// Values are never edited in place: [`DashboardState::apply`] builds the
/// next state, and the session swaps it in and publishes it in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    phase: Phase,
    latest_snapshot: Snapshot,
    window: TimeSeriesWindow,
}

impl DashboardState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn latest_snapshot(&self) -> &Snapshot {
        &self.latest_snapshot
    }

    pub fn window(&self) -> &TimeSeriesWindow {
        &self.window
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == Phase::TornDown
    }

    /// Reduce, append, replace. A torn-down state absorbs the snapshot unchanged.
    pub fn apply(&self, snapshot: Snapshot, timestamp: String, capacity: usize) -> DashboardState {
        if self.is_torn_down() {
            return self.clone();
        }

        let total = reducer::total_of(&snapshot);
        let window = self.window.append(Sample::new(timestamp, total), capacity);
        DashboardState {
            phase: Phase::Active,
            latest_snapshot: snapshot,
            window,
        }
    }

    pub fn torn_down(&self) -> DashboardState {
        DashboardState {
            phase: Phase::TornDown,
            ..self.clone()
        }
    }
}
