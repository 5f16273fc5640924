//! The LD2402 driver facade.
//!
//! Owns the serial transport and the codec stream state. The host calls
//! [`Ld2402::poll`] from its scheduling loop with a monotonic millisecond
//! timestamp; each poll drains whatever bytes are available, routes
//! completed frames, and checks link deadlines. Nothing blocks: command
//! operations enqueue a single frame on the transport and return, state
//! advances when the module's acknowledgement arrives on a later poll.

use heapless::String;

use ld2402_core::config::{
    check_distance, check_threshold_db, CalibrationCoefficients, ConfigError, DeviceConfig,
    LinkConfig, DEFAULT_MAX_DISTANCE_M, DEFAULT_TIMEOUT_S,
};
use ld2402_core::link::{CalibrationStep, LinkError, LinkSupervisor, State, TickEffect};
use ld2402_core::observer::{GateKind, Observer, ObserverSlots, Reading, SensorRole};
use ld2402_core::transport::Transport;
use ld2402_protocol::command::{cmd, mode, param, Ack, Command, PowerInterference};
use ld2402_protocol::command::db_to_threshold;
use ld2402_protocol::frame::{Frame, FrameError, FrameParser};
use ld2402_protocol::report::{Report, TargetStatus, GATE_COUNT};

use crate::throttle::DistanceThrottle;

/// Abandon a partial frame after this much line silence
const FRAME_GAP_MS: u64 = 200;

/// Read chunk per drain iteration
const READ_CHUNK: usize = 64;

/// Facade-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// Serial transport failure; the link is in the error state
    Transport(E),
    /// Configuration bound violated
    Config(ConfigError),
    /// Frame encoding failure
    Protocol(FrameError),
    /// Operation not valid in the current link state
    InvalidState,
}

impl<E> From<ConfigError> for DriverError<E> {
    fn from(err: ConfigError) -> Self {
        DriverError::Config(err)
    }
}

impl<E> From<FrameError> for DriverError<E> {
    fn from(err: FrameError) -> Self {
        DriverError::Protocol(err)
    }
}

/// HLK-LD2402 driver
pub struct Ld2402<'o, T: Transport> {
    transport: T,
    parser: FrameParser,
    supervisor: LinkSupervisor,
    config: DeviceConfig,
    slots: ObserverSlots<'o>,
    throttle: DistanceThrottle,
    /// Engineering reporting selected (per-gate energies)
    engineering: bool,
    /// Mode requested by an outstanding SetMode command
    pending_mode: Option<u32>,
    last_mode_label: Option<&'static str>,
    last_rx_ms: Option<u64>,
}

impl<'o, T: Transport> Ld2402<'o, T> {
    /// Create a driver around a transport
    pub fn new(transport: T, config: DeviceConfig, link: LinkConfig) -> Self {
        Self {
            transport,
            parser: FrameParser::new(),
            supervisor: LinkSupervisor::new(link),
            config,
            slots: ObserverSlots::new(),
            throttle: DistanceThrottle::default(),
            engineering: false,
            pending_mode: None,
            last_mode_label: None,
            last_rx_ms: None,
        }
    }

    /// Current link state
    pub fn state(&self) -> State {
        self.supervisor.state()
    }

    /// Current device configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Bind an observer to a slot; last write wins
    pub fn bind(&mut self, role: SensorRole, observer: &'o dyn Observer) -> Result<(), ConfigError> {
        self.slots.bind(role, observer)
    }

    /// Set the distance notification window
    pub fn set_distance_throttle(&mut self, window_ms: u32) {
        self.throttle.set_window(window_ms);
    }

    /// Set the minimum distance change that overrides the window
    pub fn set_distance_min_delta(&mut self, meters: f32) {
        self.throttle.set_min_delta(meters);
    }

    /// One scheduling tick: drain the line, route frames, check deadlines.
    ///
    /// Returns a recoverable link failure if one fired this tick. The
    /// driver keeps running after any of them; only a transport error is
    /// fatal to the link (and cleared by [`Ld2402::reset`]).
    pub fn poll(&mut self, now_ms: u64) -> Result<Option<LinkError>, DriverError<T::Error>> {
        if self.state() == State::Uninitialized {
            self.supervisor.start();
            self.publish_mode();
        }

        self.drain(now_ms)?;

        // A frame the stream stopped delivering is dropped, not kept
        // half-parsed forever
        if self.parser.in_frame() {
            if let Some(last_rx) = self.last_rx_ms {
                if now_ms.saturating_sub(last_rx) > FRAME_GAP_MS {
                    if self.parser.interrupt().is_err() {
                        #[cfg(feature = "defmt")]
                        defmt::debug!("dropped truncated frame after line silence");
                    }
                }
            }
        }

        match self.supervisor.tick(now_ms) {
            Some(TickEffect::Failed(err)) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("link operation failed: {}", err);
                self.publish_mode();
                Ok(Some(err))
            }
            Some(TickEffect::PollCalibration) => {
                self.send(Command::QueryCalibration)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Clear the error state and renegotiate the handshake
    pub fn reset(&mut self) {
        self.parser.reset();
        self.pending_mode = None;
        self.supervisor.reset();
        self.publish_mode();
    }

    /// Set the maximum detection distance in meters (0.7-10.0).
    ///
    /// Sends the parameter immediately; the module honors it in
    /// configuration mode and persists it on [`Ld2402::save_config`].
    pub fn set_max_distance(&mut self, meters: f32) -> Result<(), DriverError<T::Error>> {
        check_distance(meters)?;
        self.config.max_distance_m = meters;
        let value = self.config.max_distance_dm();
        self.send(Command::SetParam {
            id: param::MAX_DISTANCE,
            value,
        })
    }

    /// Set the target disappearance delay in seconds
    pub fn set_timeout(&mut self, seconds: u16) -> Result<(), DriverError<T::Error>> {
        self.config.timeout_s = seconds;
        self.send(Command::SetParam {
            id: param::TIMEOUT,
            value: u32::from(seconds),
        })
    }

    /// Request configuration mode; completion arrives as an ack.
    ///
    /// If no acknowledgement arrives within the configured timeout, a
    /// later poll reports [`LinkError::ConfigTimeout`] and the link stays
    /// in normal operation.
    pub fn enter_config_mode(&mut self, now_ms: u64) -> Result<(), DriverError<T::Error>> {
        if self.state() != State::Normal {
            return Err(DriverError::InvalidState);
        }
        self.send(Command::EnableConfig)?;
        self.supervisor.config_entry_sent(now_ms);
        Ok(())
    }

    /// Leave configuration mode
    pub fn exit_config_mode(&mut self) -> Result<(), DriverError<T::Error>> {
        self.send(Command::DisableConfig)
    }

    /// Start threshold calibration. Only valid in configuration mode.
    pub fn start_calibration(
        &mut self,
        coefficients: CalibrationCoefficients,
    ) -> Result<(), DriverError<T::Error>> {
        coefficients.validate()?;
        if self.state() != State::ConfigurationMode {
            return Err(DriverError::InvalidState);
        }
        let (trigger_x10, hold_x10, micromotion_x10) = coefficients.to_x10();
        self.send(Command::StartCalibration {
            trigger_x10,
            hold_x10,
            micromotion_x10,
        })
    }

    /// Cooperatively abort a running calibration.
    ///
    /// Returns the [`LinkError::CalibrationAborted`] signal when a
    /// calibration was actually cancelled.
    pub fn abort_calibration(&mut self) -> Option<LinkError> {
        let signal = self.supervisor.abort_calibration();
        if signal.is_some() {
            self.publish_mode();
        }
        signal
    }

    /// Request the firmware version string
    pub fn request_firmware_version(&mut self) -> Result<(), DriverError<T::Error>> {
        self.send(Command::ReadVersion)
    }

    /// Query the mains power interference status
    pub fn check_power_interference(&mut self) -> Result<(), DriverError<T::Error>> {
        self.send(Command::ReadParam {
            id: param::POWER_INTERFERENCE,
        })
    }

    /// Set the motion trigger threshold for one gate, in decibels (0-95)
    pub fn set_motion_threshold(
        &mut self,
        gate: u8,
        db: f32,
    ) -> Result<(), DriverError<T::Error>> {
        self.set_threshold(param::MOTION_THRESHOLD_BASE, gate, db)
    }

    /// Set the micromotion threshold for one gate, in decibels (0-95)
    pub fn set_micromotion_threshold(
        &mut self,
        gate: u8,
        db: f32,
    ) -> Result<(), DriverError<T::Error>> {
        self.set_threshold(param::MICROMOTION_THRESHOLD_BASE, gate, db)
    }

    /// Read back all motion trigger thresholds; each ack notifies its
    /// threshold slot
    pub fn read_motion_thresholds(&mut self) -> Result<(), DriverError<T::Error>> {
        self.read_thresholds(param::MOTION_THRESHOLD_BASE)
    }

    /// Read back all micromotion thresholds
    pub fn read_micromotion_thresholds(&mut self) -> Result<(), DriverError<T::Error>> {
        self.read_thresholds(param::MICROMOTION_THRESHOLD_BASE)
    }

    /// Switch the module to engineering reporting (per-gate energies)
    pub fn set_engineering_mode(&mut self) -> Result<(), DriverError<T::Error>> {
        self.set_mode(mode::ENGINEERING)
    }

    /// Switch the module back to normal reporting
    pub fn set_normal_mode(&mut self) -> Result<(), DriverError<T::Error>> {
        self.set_mode(mode::NORMAL)
    }

    /// Persist current parameters to module flash
    pub fn save_config(&mut self) -> Result<(), DriverError<T::Error>> {
        self.send(Command::SaveParams)
    }

    /// Start automatic gain adjustment
    pub fn enable_auto_gain(&mut self) -> Result<(), DriverError<T::Error>> {
        self.send(Command::AutoGain)
    }

    /// Restore factory defaults and recalibrate.
    ///
    /// Writes the default distance and timeout, then starts a calibration
    /// with default coefficients. Only valid in configuration mode.
    pub fn factory_reset(&mut self) -> Result<(), DriverError<T::Error>> {
        if self.state() != State::ConfigurationMode {
            return Err(DriverError::InvalidState);
        }
        self.config = DeviceConfig::default();
        self.set_max_distance(DEFAULT_MAX_DISTANCE_M)?;
        self.set_timeout(DEFAULT_TIMEOUT_S)?;
        self.start_calibration(CalibrationCoefficients::default())
    }

    fn set_threshold(
        &mut self,
        base: u16,
        gate: u8,
        db: f32,
    ) -> Result<(), DriverError<T::Error>> {
        if usize::from(gate) >= GATE_COUNT {
            return Err(DriverError::Config(ConfigError::GateOutOfRange));
        }
        check_threshold_db(db)?;
        self.send(Command::SetParam {
            id: base + u16::from(gate),
            value: db_to_threshold(db),
        })
    }

    fn read_thresholds(&mut self, base: u16) -> Result<(), DriverError<T::Error>> {
        for gate in 0..GATE_COUNT as u16 {
            self.send(Command::ReadParam { id: base + gate })?;
        }
        Ok(())
    }

    fn set_mode(&mut self, value: u32) -> Result<(), DriverError<T::Error>> {
        if !self.state().commands_allowed() {
            return Err(DriverError::InvalidState);
        }
        self.send(Command::SetMode { mode: value })?;
        self.pending_mode = Some(value);
        Ok(())
    }

    /// Encode and write one command frame
    fn send(&mut self, command: Command) -> Result<(), DriverError<T::Error>> {
        let frame = command.encode()?;
        if let Err(err) = self.transport.write(&frame) {
            self.supervisor.transport_failed();
            self.publish_mode();
            return Err(DriverError::Transport(err));
        }
        Ok(())
    }

    /// Drain available bytes into the parser
    fn drain(&mut self, now_ms: u64) -> Result<(), DriverError<T::Error>> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = match self.transport.read_available(&mut buf) {
                Ok(n) => n,
                Err(err) => {
                    self.supervisor.transport_failed();
                    self.publish_mode();
                    return Err(DriverError::Transport(err));
                }
            };
            if n == 0 {
                return Ok(());
            }
            self.last_rx_ms = Some(now_ms);

            for &byte in &buf[..n] {
                match self.parser.feed(byte) {
                    Ok(Some(frame)) => self.handle_frame(frame, now_ms),
                    Ok(None) => {}
                    Err(_err) => {
                        // Codec already resynchronized; the corrupt bytes
                        // are gone
                        #[cfg(feature = "defmt")]
                        defmt::debug!("frame error, resyncing: {}", _err);
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, now_ms: u64) {
        if self.state() == State::AwaitingHandshake && self.supervisor.frame_received() {
            self.publish_mode();
        }

        match frame {
            Frame::Response(response) => match Ack::parse(&response) {
                Ok(ack) => self.handle_ack(ack, now_ms),
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("unparseable response frame: {}", _err);
                }
            },
            Frame::Report(report) => match Report::decode(&report) {
                Ok(decoded) => self.dispatch_report(decoded, now_ms),
                Err(_err) => {
                    // Drop the single frame and continue
                    #[cfg(feature = "defmt")]
                    defmt::debug!("undecodable report type {}: {}", report.report_type, _err);
                }
            },
        }
    }

    fn handle_ack(&mut self, ack: Ack<'_>, now_ms: u64) {
        if !ack.success {
            #[cfg(feature = "defmt")]
            defmt::warn!("command {} rejected by module", ack.command);
            return;
        }

        match ack.command {
            cmd::ENABLE_CONFIG => {
                if self.supervisor.config_acked() {
                    self.publish_mode();
                }
            }
            cmd::DISABLE_CONFIG => {
                if self.supervisor.config_exited() {
                    self.publish_mode();
                }
            }
            cmd::START_CALIBRATION => {
                if self.supervisor.calibration_started(now_ms) {
                    self.publish_mode();
                    self.notify_slot(SensorRole::CalibrationProgress, Reading::Value(0.0));
                }
            }
            cmd::QUERY_CALIBRATION => match ack.calibration_progress() {
                Ok(percent) => self.handle_calibration_progress(percent, now_ms),
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("short calibration status: {}", _err);
                }
            },
            cmd::READ_VERSION => {
                if let Ok(bytes) = ack.version() {
                    let text = printable(bytes);
                    self.notify_slot(SensorRole::FirmwareVersion, Reading::Text(text.as_str()));
                }
            }
            cmd::READ_PARAM => {
                if let Ok((id, value)) = ack.param() {
                    self.handle_param(id, value);
                }
            }
            cmd::SET_MODE => {
                if let Some(requested) = self.pending_mode.take() {
                    self.engineering = requested == mode::ENGINEERING;
                    self.publish_mode();
                }
            }
            _ => {
                #[cfg(feature = "defmt")]
                defmt::debug!("ack for command {}", ack.command);
            }
        }
    }

    fn handle_calibration_progress(&mut self, percent: u8, now_ms: u64) {
        if self.state() != State::CalibratingGates {
            return;
        }
        self.notify_slot(
            SensorRole::CalibrationProgress,
            Reading::Value(f32::from(percent.min(100))),
        );
        if self.supervisor.calibration_progress(percent, now_ms) == CalibrationStep::Completed {
            // Persist the learned thresholds and leave config mode; the
            // module answers with a threshold report carrying the final
            // per-gate values
            let _ = self.send(Command::SaveParams);
            let _ = self.send(Command::DisableConfig);
            self.publish_mode();
        }
    }

    fn handle_param(&mut self, id: u16, value: u32) {
        match id {
            param::POWER_INTERFERENCE => {
                let detected = PowerInterference::from_raw(value).is_detected();
                self.notify_slot(SensorRole::PowerInterference, Reading::Flag(detected));
            }
            id if threshold_gate(id, param::MOTION_THRESHOLD_BASE).is_some() => {
                let index = threshold_gate(id, param::MOTION_THRESHOLD_BASE).unwrap_or(0);
                self.notify_slot(
                    SensorRole::Threshold {
                        index,
                        kind: GateKind::Motion,
                    },
                    Reading::Value(value as f32),
                );
            }
            id if threshold_gate(id, param::MICROMOTION_THRESHOLD_BASE).is_some() => {
                let index = threshold_gate(id, param::MICROMOTION_THRESHOLD_BASE).unwrap_or(0);
                self.notify_slot(
                    SensorRole::Threshold {
                        index,
                        kind: GateKind::Still,
                    },
                    Reading::Value(value as f32),
                );
            }
            _ => {}
        }
    }

    fn dispatch_report(&mut self, report: Report, now_ms: u64) {
        match report {
            Report::Basic(basic) => {
                self.update_target(basic.status, basic.distance_cm, now_ms);
            }
            Report::Telemetry(telemetry) => {
                self.update_target(telemetry.status, telemetry.distance_cm, now_ms);
                self.notify_gates(GateKind::Motion, &telemetry.motion_energy, false);
                self.notify_gates(GateKind::Still, &telemetry.still_energy, false);
            }
            Report::Thresholds(thresholds) => {
                self.notify_gates(GateKind::Motion, &thresholds.motion, true);
                self.notify_gates(GateKind::Still, &thresholds.still, true);
            }
        }
    }

    fn update_target(&mut self, status: TargetStatus, distance_cm: Option<u16>, now_ms: u64) {
        self.notify_slot(SensorRole::Presence, Reading::Flag(status.is_present()));
        self.notify_slot(
            SensorRole::Micromovement,
            Reading::Flag(status.is_micromotion()),
        );

        let meters = match distance_cm {
            Some(cm) => f32::from(cm) / 100.0,
            None => 0.0,
        };
        if self.throttle.admit(meters, now_ms) {
            self.notify_slot(SensorRole::Distance, Reading::Value(meters));
        }
    }

    fn notify_gates(&self, kind: GateKind, values: &[u32; GATE_COUNT], threshold: bool) {
        for (i, &value) in values.iter().enumerate() {
            let index = i as u8;
            let role = if threshold {
                SensorRole::Threshold { index, kind }
            } else {
                SensorRole::EnergyGate { index, kind }
            };
            // Raw wire values, verbatim
            self.notify_slot(role, Reading::Value(value as f32));
        }
    }

    fn publish_mode(&mut self) {
        let label = if self.state() == State::Normal && self.engineering {
            "Engineering"
        } else {
            self.state().label()
        };
        if self.last_mode_label != Some(label) {
            self.last_mode_label = Some(label);
            self.notify_slot(SensorRole::OperatingMode, Reading::Text(label));
        }
    }

    /// Notify one slot; failures are logged and never propagate
    fn notify_slot(&self, role: SensorRole, reading: Reading<'_>) {
        if let Some(observer) = self.slots.slot(role) {
            if observer.notify(reading).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("observer notification failed for {}", role);
            }
        }
    }
}

/// Map a parameter id to its gate index under a threshold base
fn threshold_gate(id: u16, base: u16) -> Option<u8> {
    let offset = id.checked_sub(base)?;
    if usize::from(offset) < GATE_COUNT {
        Some(offset as u8)
    } else {
        None
    }
}

/// Render raw version bytes as printable text
fn printable(bytes: &[u8]) -> String<32> {
    let mut text = String::new();
    for &byte in bytes.iter().take(32) {
        let c = if (0x20..0x7F).contains(&byte) {
            byte as char
        } else {
            '?'
        };
        let _ = text.push(c);
    }
    text
}
