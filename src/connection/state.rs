//! Connection readiness state machine

use crate::{Error, Result};

/// Readiness of the driver-owned connection handle
///
/// The numeric codes match the driver's readiness indicator:
/// 0 = disconnected, 1 = connected, 2 = connecting, 3 = disconnecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Fully closed
    #[default]
    Disconnected,

    /// Open and usable
    Connected,

    /// Opening in progress
    Connecting,

    /// Closing in progress
    Disconnecting,
}

impl ReadyState {
    /// Decode a driver readiness code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Disconnected),
            1 => Ok(Self::Connected),
            2 => Ok(Self::Connecting),
            3 => Ok(Self::Disconnecting),
            other => Err(Error::InvalidState {
                expected: "readiness code 0..=3".into(),
                actual: other.to_string(),
            }),
        }
    }

    /// Driver readiness code
    pub fn code(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connected => 1,
            Self::Connecting => 2,
            Self::Disconnecting => 3,
        }
    }

    /// Lowercase state name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnecting => "disconnecting",
        }
    }

    /// True only when the connection is fully closed.
    ///
    /// Every other state blocks a new connection attempt.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ReadyState) -> bool {
        use ReadyState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Connected, Disconnected)
                | (Disconnected, Connected)
                | (Disconnecting, Disconnected)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ReadyState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for code in 0..=3u8 {
            assert_eq!(ReadyState::from_code(code).unwrap().code(), code);
        }
        assert!(ReadyState::from_code(4).is_err());
        assert_eq!(ReadyState::default(), ReadyState::Disconnected);
    }

    #[test]
    fn test_only_disconnected_is_closed() {
        assert!(ReadyState::Disconnected.is_closed());
        assert!(!ReadyState::Connecting.is_closed());
        assert!(!ReadyState::Connected.is_closed());
        assert!(!ReadyState::Disconnecting.is_closed());
    }

    #[test]
    fn test_valid_transitions() {
        let mut state = ReadyState::Disconnected;
        assert!(state.transition(ReadyState::Connecting).is_ok());
        assert!(state.transition(ReadyState::Connected).is_ok());
        assert!(state.transition(ReadyState::Disconnecting).is_ok());
        assert!(state.transition(ReadyState::Disconnected).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ReadyState::Disconnected;
        assert!(state.transition(ReadyState::Disconnecting).is_err());
        assert_eq!(state, ReadyState::Disconnected);
    }

    #[test]
    fn test_failed_open_returns_to_disconnected() {
        let mut state = ReadyState::Connecting;
        assert!(state.transition(ReadyState::Disconnected).is_ok());
    }

    #[test]
    fn test_driver_reconnect_from_disconnected() {
        // Drivers reconnect on their own after a dropped connection
        let mut state = ReadyState::Connected;
        assert!(state.transition(ReadyState::Disconnected).is_ok());
        assert!(state.transition(ReadyState::Connected).is_ok());
    }
}
