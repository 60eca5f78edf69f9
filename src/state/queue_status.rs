/// Queue status definitions for frontier requests
///
/// A queue item moves `Pending -> Dispatched -> Complete` exactly once.
use std::fmt;

/// Represents the current state of a queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Request is waiting to be handed to the dispatcher
    Pending,

    /// Request has been handed to the dispatcher and has not finished
    Dispatched,

    /// A response (or a scope rejection, or a failure) has been recorded
    Complete,
}

impl QueueStatus {
    /// Returns true if the request still needs work
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Pending | Self::Dispatched)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// `Dispatched -> Pending` is allowed so an interrupted run can be resumed.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Dispatched, Self::Complete)
                | (Self::Pending, Self::Complete)
                | (Self::Dispatched, Self::Pending)
        )
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Complete => "complete",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "dispatched" => Some(Self::Dispatched),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Returns all possible queue statuses
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Dispatched, Self::Complete]
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
