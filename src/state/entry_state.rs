/// Frontier entry states
///
/// Every URL the crawler knows about is in exactly one of these states.
use std::fmt;

/// Represents where a URL is in its crawl lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Admitted and waiting in the frontier queue
    Pending,

    /// Taken by a task that has not completed yet
    InFlight,

    /// Task completed; the outcome is in the ledger
    Visited,
}

impl EntryState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Visited)
    }

    /// Returns true if the URL still awaits completion
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InFlight)
    }

    /// Returns true for the only legal transitions: Pending → InFlight → Visited
    pub fn can_transition_to(&self, next: EntryState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight) | (Self::InFlight, Self::Visited)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Visited => "visited",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
