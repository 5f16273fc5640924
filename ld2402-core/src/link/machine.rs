//! Link state machine definition.
//!
//! Module lifecycle is a function of the current state and an event.
//! Timeouts and pending-operation bookkeeping live in the supervisor; the
//! machine itself is pure.

use super::events::Event;

/// Link states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Driver constructed, module not yet contacted
    Uninitialized,
    /// Waiting for the first well-formed frame from the module
    AwaitingHandshake,
    /// Unsolicited reports flowing
    Normal,
    /// Module in configuration mode; commands honored
    ConfigurationMode,
    /// Threshold calibration running on the module
    CalibratingGates,
    /// Unrecoverable transport failure; reset required
    Error,
}

impl State {
    /// Check if commands are honored in this state
    pub fn commands_allowed(&self) -> bool {
        matches!(self, State::ConfigurationMode | State::CalibratingGates)
    }

    /// Check if unsolicited reports are expected
    pub fn reports_expected(&self) -> bool {
        matches!(self, State::AwaitingHandshake | State::Normal)
    }

    /// Check if this is the error state
    pub fn is_error(&self) -> bool {
        matches!(self, State::Error)
    }

    /// Operating-mode text published to the mode observer
    pub fn label(&self) -> &'static str {
        match self {
            State::Uninitialized => "Uninitialized",
            State::AwaitingHandshake => "Handshake",
            State::Normal => "Normal",
            State::ConfigurationMode => "Configuration",
            State::CalibratingGates => "Calibration",
            State::Error => "Error",
        }
    }

    /// Process an event and return the next state.
    ///
    /// This is the core transition logic.
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use State::*;

        match (self, event) {
            (Uninitialized, Started) => AwaitingHandshake,

            (AwaitingHandshake, FrameReceived) => Normal,

            // Config-mode entry completes only on the module's ack; the
            // entry timeout is enforced by the supervisor
            (Normal, ConfigAcked) => ConfigurationMode,

            (ConfigurationMode, CalibrationStarted) => CalibratingGates,
            (ConfigurationMode, ConfigExited) => Normal,

            // Completion leaves config mode behind; abort falls back to
            // configuration for another attempt
            (CalibratingGates, CalibrationFinished) => Normal,
            (CalibratingGates, CalibrationAborted) => ConfigurationMode,

            (_, TransportFailed) => Error,
            (_, Reset) => AwaitingHandshake,

            // Default: stay in current state
            _ => self,
        }
    }
}
