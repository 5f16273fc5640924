//! Transport-agnostic logic for the HLK-LD2402 presence radar driver
//!
//! This crate contains everything between the wire protocol and the
//! host-owned serial port:
//!
//! - Link state machine and supervisor (handshake, configuration mode,
//!   calibration sequencing, timeouts)
//! - Device and link configuration types with boundary validation
//! - Observer roles and slots
//! - The serial transport trait the host implements

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod link;
pub mod observer;
pub mod transport;

pub use config::{CalibrationCoefficients, ConfigError, DeviceConfig, LinkConfig};
pub use link::{CalibrationStep, LinkError, LinkSupervisor, State, TickEffect};
pub use observer::{GateKind, NotifyError, Observer, ObserverSlots, Reading, SensorRole};
pub use transport::Transport;
