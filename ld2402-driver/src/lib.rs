//! Polling driver facade for the HLK-LD2402 presence radar
//!
//! The facade owns the host-supplied serial transport and the codec
//! stream state. Hosts bind observers to sensor slots, then call
//! [`Ld2402::poll`] from their scheduling loop with a monotonic
//! millisecond timestamp; decoded telemetry and link-state changes are
//! delivered synchronously to the bound observers. No call blocks.
//!
//! ```ignore
//! let mut driver = Ld2402::new(transport, DeviceConfig::default(), LinkConfig::default());
//! driver.bind(SensorRole::Distance, &distance_sensor)?;
//! loop {
//!     if let Some(err) = driver.poll(clock.now_ms())? {
//!         // ConfigTimeout / CalibrationAborted: recoverable, keep polling
//!     }
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod driver;
pub mod io;
pub mod throttle;

pub use driver::{DriverError, Ld2402};
pub use io::IoTransport;
pub use throttle::DistanceThrottle;

// The building blocks hosts need alongside the facade
pub use ld2402_core::config::{CalibrationCoefficients, ConfigError, DeviceConfig, LinkConfig};
pub use ld2402_core::link::{LinkError, State};
pub use ld2402_core::observer::{GateKind, NotifyError, Observer, Reading, SensorRole};
pub use ld2402_core::transport::Transport;
pub use ld2402_protocol::report::{Report, TargetStatus, TelemetryReport, GATE_COUNT};
