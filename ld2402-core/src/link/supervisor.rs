//! Link supervisor: pending operations and deadlines.
//!
//! Wraps the pure state machine with the timing the protocol needs:
//! the config-entry handshake timeout, the calibration progress poll
//! cadence, and the calibration stall watchdog. Time is caller-supplied
//! monotonic milliseconds, sampled once per tick; nothing here blocks.

use super::events::Event;
use super::machine::State;
use crate::config::LinkConfig;

/// Recoverable protocol-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Configuration-mode entry was not acknowledged in time
    ConfigTimeout,
    /// Calibration aborted or stopped reporting progress
    CalibrationAborted,
}

/// Outcome of a supervisor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickEffect {
    /// A pending operation failed; the state has already reverted
    Failed(LinkError),
    /// Send a calibration progress query now
    PollCalibration,
}

/// Result of a calibration progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStep {
    /// Progress advanced; calibration continues
    Updated,
    /// Calibration reached 100%; link is back in normal operation
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Idle,
    /// Enable-config sent, ack outstanding
    ConfigEntry { deadline_ms: u64 },
    /// Calibration running on the module
    Calibration {
        next_poll_ms: u64,
        stall_deadline_ms: u64,
    },
}

/// Link state plus the deadlines attached to it
#[derive(Debug, Clone)]
pub struct LinkSupervisor {
    state: State,
    pending: Pending,
    timing: LinkConfig,
    progress: u8,
}

impl LinkSupervisor {
    /// Create a supervisor in the uninitialized state
    pub fn new(timing: LinkConfig) -> Self {
        Self {
            state: State::Uninitialized,
            pending: Pending::Idle,
            timing,
            progress: 0,
        }
    }

    /// Current link state
    pub fn state(&self) -> State {
        self.state
    }

    /// Last reported calibration progress (0-100)
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Apply an event to the state machine; returns true on state change
    fn apply(&mut self, event: Event) -> bool {
        let next = self.state.transition(event);
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Driver started polling
    pub fn start(&mut self) -> bool {
        self.apply(Event::Started)
    }

    /// A well-formed frame arrived
    pub fn frame_received(&mut self) -> bool {
        self.apply(Event::FrameReceived)
    }

    /// Enable-config command went out; arm the handshake timeout
    pub fn config_entry_sent(&mut self, now_ms: u64) {
        if self.state == State::Normal {
            self.pending = Pending::ConfigEntry {
                deadline_ms: now_ms + u64::from(self.timing.response_timeout_ms),
            };
        }
    }

    /// Module acknowledged configuration-mode entry.
    ///
    /// A late ack arriving after the handshake already timed out is
    /// ignored; the driver has reverted to normal operation.
    pub fn config_acked(&mut self) -> bool {
        if !matches!(self.pending, Pending::ConfigEntry { .. }) {
            return false;
        }
        self.pending = Pending::Idle;
        self.apply(Event::ConfigAcked)
    }

    /// Module left configuration mode
    pub fn config_exited(&mut self) -> bool {
        self.pending = Pending::Idle;
        self.apply(Event::ConfigExited)
    }

    /// Calibration-start command acknowledged; arm poll and stall timers
    pub fn calibration_started(&mut self, now_ms: u64) -> bool {
        let changed = self.apply(Event::CalibrationStarted);
        if changed {
            self.progress = 0;
            self.pending = Pending::Calibration {
                next_poll_ms: now_ms + u64::from(self.timing.calibration_poll_ms),
                stall_deadline_ms: now_ms + u64::from(self.timing.calibration_stall_ms),
            };
        }
        changed
    }

    /// Record a calibration progress report
    pub fn calibration_progress(&mut self, percent: u8, now_ms: u64) -> CalibrationStep {
        self.progress = percent.min(100);
        if self.progress >= 100 {
            self.pending = Pending::Idle;
            self.apply(Event::CalibrationFinished);
            return CalibrationStep::Completed;
        }
        if let Pending::Calibration { next_poll_ms, .. } = self.pending {
            self.pending = Pending::Calibration {
                next_poll_ms,
                stall_deadline_ms: now_ms + u64::from(self.timing.calibration_stall_ms),
            };
        }
        CalibrationStep::Updated
    }

    /// Cooperative calibration abort
    pub fn abort_calibration(&mut self) -> Option<LinkError> {
        if self.state != State::CalibratingGates {
            return None;
        }
        self.pending = Pending::Idle;
        self.apply(Event::CalibrationAborted);
        Some(LinkError::CalibrationAborted)
    }

    /// Unrecoverable transport failure
    pub fn transport_failed(&mut self) -> bool {
        self.pending = Pending::Idle;
        self.apply(Event::TransportFailed)
    }

    /// Explicit reset back to the handshake
    pub fn reset(&mut self) -> bool {
        self.pending = Pending::Idle;
        self.progress = 0;
        self.apply(Event::Reset)
    }

    /// Check deadlines against the tick's monotonic timestamp.
    ///
    /// An expired config-entry handshake reverts to normal operation and
    /// reports [`LinkError::ConfigTimeout`] exactly once; a stalled
    /// calibration reverts to configuration mode with
    /// [`LinkError::CalibrationAborted`].
    pub fn tick(&mut self, now_ms: u64) -> Option<TickEffect> {
        match self.pending {
            Pending::Idle => None,
            Pending::ConfigEntry { deadline_ms } => {
                if now_ms >= deadline_ms {
                    self.pending = Pending::Idle;
                    return Some(TickEffect::Failed(LinkError::ConfigTimeout));
                }
                None
            }
            Pending::Calibration {
                next_poll_ms,
                stall_deadline_ms,
            } => {
                if now_ms >= stall_deadline_ms {
                    self.pending = Pending::Idle;
                    self.apply(Event::CalibrationAborted);
                    return Some(TickEffect::Failed(LinkError::CalibrationAborted));
                }
                if now_ms >= next_poll_ms {
                    self.pending = Pending::Calibration {
                        next_poll_ms: now_ms + u64::from(self.timing.calibration_poll_ms),
                        stall_deadline_ms,
                    };
                    return Some(TickEffect::PollCalibration);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal_supervisor() -> LinkSupervisor {
        let mut sup = LinkSupervisor::new(LinkConfig::default());
        sup.start();
        sup.frame_received();
        assert_eq!(sup.state(), State::Normal);
        sup
    }

    fn calibrating_supervisor(now_ms: u64) -> LinkSupervisor {
        let mut sup = normal_supervisor();
        sup.config_entry_sent(now_ms);
        sup.config_acked();
        sup.calibration_started(now_ms);
        assert_eq!(sup.state(), State::CalibratingGates);
        sup
    }

    #[test]
    fn test_config_entry_ack() {
        let mut sup = normal_supervisor();
        sup.config_entry_sent(1_000);
        assert_eq!(sup.state(), State::Normal);

        assert!(sup.config_acked());
        assert_eq!(sup.state(), State::ConfigurationMode);
    }

    #[test]
    fn test_config_timeout_signalled_once() {
        let mut sup = normal_supervisor();
        sup.config_entry_sent(1_000);

        // Inside the window: nothing
        assert_eq!(sup.tick(5_999), None);

        // Expired: exactly one ConfigTimeout, state still Normal
        assert_eq!(
            sup.tick(6_000),
            Some(TickEffect::Failed(LinkError::ConfigTimeout))
        );
        assert_eq!(sup.state(), State::Normal);
        assert_eq!(sup.tick(7_000), None);
        assert_eq!(sup.tick(60_000), None);
    }

    #[test]
    fn test_late_ack_after_timeout_ignored() {
        let mut sup = normal_supervisor();
        sup.config_entry_sent(0);
        sup.tick(5_000);

        assert!(!sup.config_acked());
        assert_eq!(sup.state(), State::Normal);
    }

    #[test]
    fn test_calibration_poll_cadence() {
        let mut sup = calibrating_supervisor(0);

        assert_eq!(sup.tick(4_999), None);
        assert_eq!(sup.tick(5_000), Some(TickEffect::PollCalibration));
        // Rearmed relative to the poll
        assert_eq!(sup.tick(5_001), None);
        assert_eq!(sup.tick(10_000), Some(TickEffect::PollCalibration));
    }

    #[test]
    fn test_calibration_progress_and_completion() {
        let mut sup = calibrating_supervisor(0);

        assert_eq!(sup.calibration_progress(40, 6_000), CalibrationStep::Updated);
        assert_eq!(sup.progress(), 40);
        assert_eq!(sup.state(), State::CalibratingGates);

        assert_eq!(
            sup.calibration_progress(100, 12_000),
            CalibrationStep::Completed
        );
        assert_eq!(sup.state(), State::Normal);
        assert_eq!(sup.tick(60_000), None);
    }

    #[test]
    fn test_calibration_stall_aborts() {
        let mut sup = calibrating_supervisor(0);

        // Progress at 10s pushes the stall deadline out
        sup.tick(5_000);
        assert_eq!(sup.calibration_progress(20, 10_000), CalibrationStep::Updated);

        // No progress for the full stall window
        assert_eq!(
            sup.tick(40_000),
            Some(TickEffect::Failed(LinkError::CalibrationAborted))
        );
        assert_eq!(sup.state(), State::ConfigurationMode);
        assert_eq!(sup.tick(80_000), None);
    }

    #[test]
    fn test_explicit_abort() {
        let mut sup = calibrating_supervisor(0);
        assert_eq!(sup.abort_calibration(), Some(LinkError::CalibrationAborted));
        assert_eq!(sup.state(), State::ConfigurationMode);

        // Not calibrating: no-op
        assert_eq!(sup.abort_calibration(), None);
    }

    #[test]
    fn test_transport_failure_and_reset() {
        let mut sup = calibrating_supervisor(0);
        assert!(sup.transport_failed());
        assert_eq!(sup.state(), State::Error);
        assert_eq!(sup.tick(100_000), None);

        assert!(sup.reset());
        assert_eq!(sup.state(), State::AwaitingHandshake);
        assert_eq!(sup.progress(), 0);
    }
}
