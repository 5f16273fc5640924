//! Link events fed to the state machine.

/// Events driving link state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Driver started polling
    Started,
    /// A well-formed frame arrived (handshake evidence)
    FrameReceived,
    /// Module acknowledged configuration-mode entry
    ConfigAcked,
    /// Module left configuration mode
    ConfigExited,
    /// Calibration-start command acknowledged
    CalibrationStarted,
    /// Calibration reported 100%
    CalibrationFinished,
    /// Calibration aborted or stalled
    CalibrationAborted,
    /// Unrecoverable transport failure
    TransportFailed,
    /// Explicit driver reset
    Reset,
}
