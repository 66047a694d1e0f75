//! Meeting status lifecycle.
//!
//! Statuses move `Upcoming → Active → Processing → Completed`, with
//! `Cancelled` reachable only from `Upcoming`. Status changes are driven by
//! platform lifecycle events, the transcript post-processor, or an explicit
//! user cancel — never by client-declared state. An illegal transition is a
//! named no-op, not an error.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Upcoming,
    Active,
    Processing,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => anyhow::bail!("Invalid meeting status: {}", s),
        }
    }

    /// Whether `self → to` is a legal lifecycle transition.
    pub fn can_transition(&self, to: MeetingStatus) -> bool {
        matches!(
            (self, to),
            (Self::Upcoming, MeetingStatus::Active)
                | (Self::Upcoming, MeetingStatus::Cancelled)
                | (Self::Active, MeetingStatus::Processing)
                | (Self::Processing, MeetingStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a guarded status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The stored status did not match the expected precondition; nothing
    /// was written.
    Rejected,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str_round_trip() {
        for status in [
            MeetingStatus::Upcoming,
            MeetingStatus::Active,
            MeetingStatus::Processing,
            MeetingStatus::Completed,
            MeetingStatus::Cancelled,
        ] {
            assert_eq!(MeetingStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(MeetingStatus::parse("paused").is_err());
        assert!(MeetingStatus::parse("").is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&MeetingStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");

        let parsed: MeetingStatus = serde_json::from_str("\"upcoming\"").unwrap();
        assert_eq!(parsed, MeetingStatus::Upcoming);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(MeetingStatus::Upcoming.can_transition(MeetingStatus::Active));
        assert!(MeetingStatus::Upcoming.can_transition(MeetingStatus::Cancelled));
        assert!(MeetingStatus::Active.can_transition(MeetingStatus::Processing));
        assert!(MeetingStatus::Processing.can_transition(MeetingStatus::Completed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!MeetingStatus::Active.can_transition(MeetingStatus::Upcoming));
        assert!(!MeetingStatus::Active.can_transition(MeetingStatus::Cancelled));
        assert!(!MeetingStatus::Processing.can_transition(MeetingStatus::Active));
        assert!(!MeetingStatus::Completed.can_transition(MeetingStatus::Processing));
        assert!(!MeetingStatus::Cancelled.can_transition(MeetingStatus::Active));
        assert!(!MeetingStatus::Upcoming.can_transition(MeetingStatus::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MeetingStatus::Completed.is_terminal());
        assert!(MeetingStatus::Cancelled.is_terminal());
        assert!(!MeetingStatus::Active.is_terminal());
    }
}
