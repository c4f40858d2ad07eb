use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Shutdown phase of a coordinator.
///
/// Phases only move forward: `Running → Draining → Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Running = 0,
    /// New mutating requests are refused; the in-flight one may finish.
    Draining = 1,
    /// The engine has been released.
    Closed = 2,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Lock-free shutdown state machine.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Move to `Draining`. Returns `true` if this call made the transition.
    pub fn begin_drain(&self) -> bool {
        self.advance(Phase::Draining)
    }

    /// Move to `Closed`. Returns `true` if this call made the transition.
    pub fn mark_closed(&self) -> bool {
        self.advance(Phase::Closed)
    }

    fn advance(&self, to: Phase) -> bool {
        let previous = self.phase.fetch_max(to as u8, Ordering::AcqRel);
        previous < to as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let lc = Lifecycle::new();
        assert_eq!(lc.phase(), Phase::Running);
        assert!(lc.is_running());
    }

    #[test]
    fn transitions_are_monotonic() {
        let lc = Lifecycle::new();
        assert!(lc.begin_drain());
        assert!(!lc.begin_drain());
        assert_eq!(lc.phase(), Phase::Draining);
        assert!(lc.mark_closed());
        assert!(!lc.begin_drain());
        assert!(!lc.mark_closed());
        assert_eq!(lc.phase(), Phase::Closed);
    }

    #[test]
    fn close_skips_draining() {
        let lc = Lifecycle::new();
        assert!(lc.mark_closed());
        assert_eq!(lc.phase(), Phase::Closed);
    }

    #[test]
    fn phase_display_and_serde() {
        assert_eq!(Phase::Draining.to_string(), "draining");
        assert_eq!(serde_json::to_string(&Phase::Closed).unwrap(), "\"closed\"");
    }
}
