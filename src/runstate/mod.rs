//! Application run states.
//!
//! The platform reports per-instance state strings; canopy folds them into a
//! single [`RunState`] per application using a worst-of ordering, so one
//! crashing instance marks the whole application as crashed even while its
//! siblings run.

mod tracker;

pub use tracker::RunStateTracker;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated run state of one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// No instance information, or an unrecognized state string.
    Unknown,
    /// Stopped or never started.
    Inactive,
    Running,
    Debugging,
    Starting,
    Crashed,
    /// Restarting repeatedly without reaching a stable state.
    Flapping,
}

impl RunState {
    /// Severity rank used by the worst-of fold. Higher means worse news
    /// for the operator, with `Unknown` below everything.
    fn severity(self) -> u8 {
        match self {
            RunState::Unknown => 0,
            RunState::Inactive => 1,
            RunState::Running => 2,
            RunState::Debugging => 3,
            RunState::Starting => 4,
            RunState::Crashed => 5,
            RunState::Flapping => 6,
        }
    }

    /// The worse of two states.
    pub fn worst_of(self, other: RunState) -> RunState {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Terminal states end the start-tracking poll loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Running | RunState::Crashed | RunState::Flapping)
    }

    /// Map one platform instance state string. Unknown strings degrade to
    /// [`RunState::Unknown`] rather than failing.
    pub fn from_instance_state(state: &str) -> RunState {
        match state {
            "RUNNING" => RunState::Running,
            "CRASHED" => RunState::Crashed,
            "FLAPPING" => RunState::Flapping,
            "STARTING" => RunState::Starting,
            "DOWN" => RunState::Inactive,
            _ => RunState::Unknown,
        }
    }

    /// Fold instance states into one application state. An empty set of
    /// instances yields `Unknown`.
    pub fn aggregate<I>(states: I) -> RunState
    where
        I: IntoIterator<Item = RunState>,
    {
        states
            .into_iter()
            .fold(RunState::Unknown, RunState::worst_of)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Unknown => "unknown",
            RunState::Inactive => "inactive",
            RunState::Running => "running",
            RunState::Debugging => "debugging",
            RunState::Starting => "starting",
            RunState::Crashed => "crashed",
            RunState::Flapping => "flapping",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_of_prefers_higher_severity() {
        assert_eq!(RunState::Running.worst_of(RunState::Crashed), RunState::Crashed);
        assert_eq!(RunState::Crashed.worst_of(RunState::Running), RunState::Crashed);
        assert_eq!(RunState::Flapping.worst_of(RunState::Crashed), RunState::Flapping);
        assert_eq!(RunState::Unknown.worst_of(RunState::Inactive), RunState::Inactive);
    }

    #[test]
    fn starting_outranks_running() {
        // One instance still starting means the app as a whole is starting.
        assert_eq!(
            RunState::aggregate([RunState::Running, RunState::Starting]),
            RunState::Starting
        );
    }

    #[test]
    fn aggregate_of_nothing_is_unknown() {
        assert_eq!(RunState::aggregate([]), RunState::Unknown);
    }

    #[test]
    fn instance_state_mapping() {
        assert_eq!(RunState::from_instance_state("RUNNING"), RunState::Running);
        assert_eq!(RunState::from_instance_state("CRASHED"), RunState::Crashed);
        assert_eq!(RunState::from_instance_state("FLAPPING"), RunState::Flapping);
        assert_eq!(RunState::from_instance_state("STARTING"), RunState::Starting);
        assert_eq!(RunState::from_instance_state("DOWN"), RunState::Inactive);
        assert_eq!(RunState::from_instance_state("WAT"), RunState::Unknown);
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Running.is_terminal());
        assert!(RunState::Crashed.is_terminal());
        assert!(RunState::Flapping.is_terminal());
        assert!(!RunState::Starting.is_terminal());
        assert!(!RunState::Inactive.is_terminal());
        assert!(!RunState::Unknown.is_terminal());
    }
}
