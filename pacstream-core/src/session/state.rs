//! Session lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking,
//! so a handler bug surfaces as a session error rather than a silently
//! skipped step.

use std::time::{Duration, Instant};

use crate::error::SessionError;

/// Where one client's session is in its lifecycle.
///
/// ```text
///  Connected ──► Authenticating ──► Playing ──► Finished
///                      │
///                      ▼
///                  Rejected
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Socket accepted, nothing exchanged yet.
    #[default]
    Connected,

    /// Credential request sent, waiting for or checking the reply.
    Authenticating,

    /// Authenticated and in the command loop.
    Playing {
        /// Set once on acceptance, never changed afterwards.
        player: String,
        since: Instant,
    },

    /// Game over and result delivered.
    Finished { player: String },

    /// Credentials refused. Terminal.
    Rejected,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Playing { .. } => write!(f, "Playing"),
            Self::Finished { .. } => write!(f, "Finished"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

impl SessionPhase {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Rejected)
    }

    /// The authenticated player, once there is one.
    pub fn player(&self) -> Option<&str> {
        match self {
            Self::Playing { player, .. } | Self::Finished { player } => Some(player),
            _ => None,
        }
    }

    /// Time spent in `Playing`. `None` in any other phase.
    pub fn playing_for(&self) -> Option<Duration> {
        match self {
            Self::Playing { since, .. } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Connected`.
    pub fn begin_auth(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Connected => {
                *self = Self::Authenticating;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot authenticate: not in Connected state",
            )),
        }
    }

    /// Valid from: `Authenticating`.
    pub fn accept(&mut self, player: impl Into<String>) -> Result<(), SessionError> {
        match self {
            Self::Authenticating => {
                *self = Self::Playing {
                    player: player.into(),
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot start playing: not in Authenticating state",
            )),
        }
    }

    /// Valid from: `Authenticating`.
    pub fn reject(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Authenticating => {
                *self = Self::Rejected;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot reject: not in Authenticating state",
            )),
        }
    }

    /// Valid from: `Playing`.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        match std::mem::take(self) {
            Self::Playing { player, .. } => {
                *self = Self::Finished { player };
                Ok(())
            }
            other => {
                *self = other;
                Err(SessionError::InvalidTransition(
                    "cannot finish: not in Playing state",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut phase = SessionPhase::default();
        assert_eq!(phase, SessionPhase::Connected);

        phase.begin_auth().unwrap();
        assert_eq!(phase.player(), None);

        phase.accept("ana").unwrap();
        assert!(phase.is_playing());
        assert_eq!(phase.player(), Some("ana"));
        assert!(phase.playing_for().is_some());

        phase.finish().unwrap();
        assert!(phase.is_terminal());
        assert_eq!(phase.player(), Some("ana"));
        assert_eq!(phase.to_string(), "Finished");
    }

    #[test]
    fn rejection_only_from_authenticating() {
        let mut phase = SessionPhase::Connected;
        assert!(phase.reject().is_err());

        phase.begin_auth().unwrap();
        phase.reject().unwrap();
        assert_eq!(phase, SessionPhase::Rejected);
        assert!(phase.is_terminal());
        assert!(phase.accept("late").is_err());
    }

    #[test]
    fn player_is_fixed_once_playing() {
        let mut phase = SessionPhase::Authenticating;
        phase.accept("first").unwrap();
        assert!(phase.accept("second").is_err());
        assert_eq!(phase.player(), Some("first"));
    }

    #[test]
    fn failed_finish_keeps_phase() {
        let mut phase = SessionPhase::Authenticating;
        assert!(matches!(
            phase.finish(),
            Err(SessionError::InvalidTransition(_))
        ));
        assert_eq!(phase, SessionPhase::Authenticating);
    }
}
