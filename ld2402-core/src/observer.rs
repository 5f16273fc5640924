//! Observer roles and slots.
//!
//! Hosts bind observers (sensors, UI elements, automations) to named
//! slots; the driver notifies them as telemetry decodes. Slots hold plain
//! capability references: the driver never owns observer lifetime and
//! never inspects an observer beyond `notify`.

use ld2402_protocol::report::GATE_COUNT;

use crate::config::ConfigError;

/// Which energy class a gate slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GateKind {
    Motion,
    Still,
}

/// The fixed set of observer slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorRole {
    /// Target distance in meters
    Distance,
    /// Calibration progress percentage (0-100)
    CalibrationProgress,
    /// Firmware version text
    FirmwareVersion,
    /// Operating mode text
    OperatingMode,
    /// Target present
    Presence,
    /// Stationary target (micromotion only)
    Micromovement,
    /// Mains interference detected
    PowerInterference,
    /// Raw energy for one gate (index 0-15)
    EnergyGate { index: u8, kind: GateKind },
    /// Raw threshold for one gate (index 0-15)
    Threshold { index: u8, kind: GateKind },
}

/// A value delivered to an observer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading<'a> {
    /// Numeric measurement
    Value(f32),
    /// Binary state
    Flag(bool),
    /// Text state
    Text(&'a str),
}

/// Notification failure. Failures are logged by the driver and isolated
/// per slot; they never abort processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotifyError;

/// Observer capability.
///
/// `notify` takes `&self`; implementations that record state use interior
/// mutability. The same observer may be bound to several slots.
pub trait Observer {
    fn notify(&self, reading: Reading<'_>) -> Result<(), NotifyError>;
}

/// One optional observer reference per slot; binding is idempotent and
/// last-write-wins.
pub struct ObserverSlots<'o> {
    distance: Option<&'o dyn Observer>,
    calibration_progress: Option<&'o dyn Observer>,
    firmware_version: Option<&'o dyn Observer>,
    operating_mode: Option<&'o dyn Observer>,
    presence: Option<&'o dyn Observer>,
    micromovement: Option<&'o dyn Observer>,
    power_interference: Option<&'o dyn Observer>,
    motion_energy: [Option<&'o dyn Observer>; GATE_COUNT],
    still_energy: [Option<&'o dyn Observer>; GATE_COUNT],
    motion_threshold: [Option<&'o dyn Observer>; GATE_COUNT],
    still_threshold: [Option<&'o dyn Observer>; GATE_COUNT],
}

impl<'o> Default for ObserverSlots<'o> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'o> ObserverSlots<'o> {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self {
            distance: None,
            calibration_progress: None,
            firmware_version: None,
            operating_mode: None,
            presence: None,
            micromovement: None,
            power_interference: None,
            motion_energy: [None; GATE_COUNT],
            still_energy: [None; GATE_COUNT],
            motion_threshold: [None; GATE_COUNT],
            still_threshold: [None; GATE_COUNT],
        }
    }

    /// Bind an observer to a slot, replacing any previous binding.
    ///
    /// Gate indices are validated here, at the boundary.
    pub fn bind(
        &mut self,
        role: SensorRole,
        observer: &'o dyn Observer,
    ) -> Result<(), ConfigError> {
        match role {
            SensorRole::Distance => self.distance = Some(observer),
            SensorRole::CalibrationProgress => self.calibration_progress = Some(observer),
            SensorRole::FirmwareVersion => self.firmware_version = Some(observer),
            SensorRole::OperatingMode => self.operating_mode = Some(observer),
            SensorRole::Presence => self.presence = Some(observer),
            SensorRole::Micromovement => self.micromovement = Some(observer),
            SensorRole::PowerInterference => self.power_interference = Some(observer),
            SensorRole::EnergyGate { index, kind } => {
                let slot = self
                    .gate_array_mut(kind, false)
                    .get_mut(usize::from(index))
                    .ok_or(ConfigError::GateOutOfRange)?;
                *slot = Some(observer);
            }
            SensorRole::Threshold { index, kind } => {
                let slot = self
                    .gate_array_mut(kind, true)
                    .get_mut(usize::from(index))
                    .ok_or(ConfigError::GateOutOfRange)?;
                *slot = Some(observer);
            }
        }
        Ok(())
    }

    /// Look up the observer bound to a slot
    pub fn slot(&self, role: SensorRole) -> Option<&'o dyn Observer> {
        match role {
            SensorRole::Distance => self.distance,
            SensorRole::CalibrationProgress => self.calibration_progress,
            SensorRole::FirmwareVersion => self.firmware_version,
            SensorRole::OperatingMode => self.operating_mode,
            SensorRole::Presence => self.presence,
            SensorRole::Micromovement => self.micromovement,
            SensorRole::PowerInterference => self.power_interference,
            SensorRole::EnergyGate { index, kind } => self
                .gate_array(kind, false)
                .get(usize::from(index))
                .copied()
                .flatten(),
            SensorRole::Threshold { index, kind } => self
                .gate_array(kind, true)
                .get(usize::from(index))
                .copied()
                .flatten(),
        }
    }

    /// True if any gate energy slot is bound (engineering reports are only
    /// worth requesting then)
    pub fn wants_engineering_data(&self) -> bool {
        self.motion_energy.iter().any(Option::is_some)
            || self.still_energy.iter().any(Option::is_some)
    }

    fn gate_array(&self, kind: GateKind, threshold: bool) -> &[Option<&'o dyn Observer>] {
        match (kind, threshold) {
            (GateKind::Motion, false) => &self.motion_energy,
            (GateKind::Still, false) => &self.still_energy,
            (GateKind::Motion, true) => &self.motion_threshold,
            (GateKind::Still, true) => &self.still_threshold,
        }
    }

    fn gate_array_mut(
        &mut self,
        kind: GateKind,
        threshold: bool,
    ) -> &mut [Option<&'o dyn Observer>] {
        match (kind, threshold) {
            (GateKind::Motion, false) => &mut self.motion_energy,
            (GateKind::Still, false) => &mut self.still_energy,
            (GateKind::Motion, true) => &mut self.motion_threshold,
            (GateKind::Still, true) => &mut self.still_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct CountingObserver {
        count: Cell<u32>,
    }

    impl CountingObserver {
        fn new() -> Self {
            Self {
                count: Cell::new(0),
            }
        }
    }

    impl Observer for CountingObserver {
        fn notify(&self, _reading: Reading<'_>) -> Result<(), NotifyError> {
            self.count.set(self.count.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_bind_and_lookup() {
        let observer = CountingObserver::new();
        let mut slots = ObserverSlots::new();

        slots.bind(SensorRole::Distance, &observer).unwrap();
        let bound = slots.slot(SensorRole::Distance).unwrap();
        bound.notify(Reading::Value(2.31)).unwrap();
        assert_eq!(observer.count.get(), 1);

        assert!(slots.slot(SensorRole::Presence).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let first = CountingObserver::new();
        let second = CountingObserver::new();
        let mut slots = ObserverSlots::new();

        slots.bind(SensorRole::Presence, &first).unwrap();
        slots.bind(SensorRole::Presence, &second).unwrap();

        slots
            .slot(SensorRole::Presence)
            .unwrap()
            .notify(Reading::Flag(true))
            .unwrap();
        assert_eq!(first.count.get(), 0);
        assert_eq!(second.count.get(), 1);
    }

    #[test]
    fn test_gate_slots() {
        let observer = CountingObserver::new();
        let mut slots = ObserverSlots::new();

        for index in [0u8, 15] {
            for kind in [GateKind::Motion, GateKind::Still] {
                slots
                    .bind(SensorRole::EnergyGate { index, kind }, &observer)
                    .unwrap();
                slots
                    .bind(SensorRole::Threshold { index, kind }, &observer)
                    .unwrap();
            }
        }

        assert!(slots
            .slot(SensorRole::EnergyGate {
                index: 15,
                kind: GateKind::Still,
            })
            .is_some());
        assert!(slots
            .slot(SensorRole::EnergyGate {
                index: 3,
                kind: GateKind::Motion,
            })
            .is_none());
    }

    #[test]
    fn test_gate_index_validated() {
        let observer = CountingObserver::new();
        let mut slots = ObserverSlots::new();

        let result = slots.bind(
            SensorRole::EnergyGate {
                index: 16,
                kind: GateKind::Motion,
            },
            &observer,
        );
        assert_eq!(result, Err(ConfigError::GateOutOfRange));
    }

    #[test]
    fn test_wants_engineering_data() {
        let observer = CountingObserver::new();
        let mut slots = ObserverSlots::new();
        assert!(!slots.wants_engineering_data());

        slots.bind(SensorRole::Distance, &observer).unwrap();
        assert!(!slots.wants_engineering_data());

        slots
            .bind(
                SensorRole::EnergyGate {
                    index: 4,
                    kind: GateKind::Still,
                },
                &observer,
            )
            .unwrap();
        assert!(slots.wants_engineering_data());
    }
}
