//! Sessions and their lifecycle status.

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observed run of the instrumented system.
///
/// Sessions are identified by name only; in practice the name is the decimal
/// session number handed out by the instrumented system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(String);

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Session {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Session {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<u64> for Session {
    fn from(number: u64) -> Self {
        Self(number.to_string())
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Running,
    Completed,
}

impl SessionStatus {
    /// Whether a session currently in `from` (or never seen, `None`) may move
    /// to `to`.
    ///
    /// Transitions are monotonic: nothing leaves `Completed`, and repeating
    /// the current state is not a transition.
    pub fn can_transition(from: Option<SessionStatus>, to: SessionStatus) -> bool {
        matches!(
            (from, to),
            (None, _) | (Some(SessionStatus::Running), SessionStatus::Completed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => f.write_str("RUNNING"),
            SessionStatus::Completed => f.write_str("COMPLETED"),
        }
    }
}

/// A status change announced on the status broadcast channel.
///
/// On the wire this is a `"{session}-start"` or `"{session}-stop"` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub session: Session,
    pub status: SessionStatus,
}

impl StatusUpdate {
    pub fn new(session: impl Into<Session>, status: SessionStatus) -> Self {
        Self {
            session: session.into(),
            status,
        }
    }
}

impl FromStr for StatusUpdate {
    type Err = ScopeError;

    fn from_str(token: &str) -> Result<Self> {
        let malformed = || ScopeError::Serialization {
            format: "status token".to_string(),
            message: format!("unparsable status token '{}'", token),
        };

        let (session, event) = token.rsplit_once('-').ok_or_else(malformed)?;
        if session.is_empty() {
            return Err(malformed());
        }

        let status = match event {
            "start" => SessionStatus::Running,
            "stop" => SessionStatus::Completed,
            _ => return Err(malformed()),
        };

        Ok(StatusUpdate::new(session, status))
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            SessionStatus::Running => write!(f, "{}-start", self.session),
            SessionStatus::Completed => write!(f, "{}-stop", self.session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_monotonic() {
        use SessionStatus::*;

        assert!(SessionStatus::can_transition(None, Running));
        assert!(SessionStatus::can_transition(None, Completed));
        assert!(SessionStatus::can_transition(Some(Running), Completed));

        assert!(!SessionStatus::can_transition(Some(Running), Running));
        assert!(!SessionStatus::can_transition(Some(Completed), Completed));
        assert!(!SessionStatus::can_transition(Some(Completed), Running));
    }

    #[test]
    fn test_parse_status_tokens() {
        assert_eq!(
            "7-start".parse::<StatusUpdate>().unwrap(),
            StatusUpdate::new("7", SessionStatus::Running)
        );
        assert_eq!(
            "7-stop".parse::<StatusUpdate>().unwrap(),
            StatusUpdate::new("7", SessionStatus::Completed)
        );
        assert_eq!(
            "night-run-stop".parse::<StatusUpdate>().unwrap(),
            StatusUpdate::new("night-run", SessionStatus::Completed)
        );
    }

    #[test]
    fn test_reject_malformed_status_tokens() {
        for bad in ["garbage", "-start", "7-", "7-pause", "7start", ""] {
            assert!(bad.parse::<StatusUpdate>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_status_update_display_round_trips_token() {
        let update = StatusUpdate::new("12", SessionStatus::Completed);
        assert_eq!(update.to_string(), "12-stop");
    }
}
