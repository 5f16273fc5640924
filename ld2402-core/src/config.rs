//! Device and link configuration types.
//!
//! Bounds are enforced here, at the boundary; the driver assumes values it
//! receives are already valid. Device parameters are persisted module-side
//! via command frames, never locally.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum configurable detection distance (one range gate)
pub const MIN_DISTANCE_M: f32 = 0.7;

/// Maximum configurable detection distance
pub const MAX_DISTANCE_M: f32 = 10.0;

/// Factory default detection distance
pub const DEFAULT_MAX_DISTANCE_M: f32 = 5.0;

/// Factory default target disappearance delay
pub const DEFAULT_TIMEOUT_S: u16 = 5;

/// Calibration coefficient bounds (×1.0 scale)
pub const MIN_COEFFICIENT: f32 = 1.0;
pub const MAX_COEFFICIENT: f32 = 20.0;
pub const DEFAULT_COEFFICIENT: f32 = 3.0;

/// Configuration boundary violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Max distance outside 0.7-10.0 m
    DistanceOutOfRange,
    /// Gate index outside 0-15
    GateOutOfRange,
    /// Calibration coefficient outside 1.0-20.0
    CoefficientOutOfRange,
    /// Threshold outside 0-95 dB
    ThresholdOutOfRange,
}

/// Module-side detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceConfig {
    /// Maximum detection distance in meters (0.7-10.0)
    pub max_distance_m: f32,
    /// Target disappearance delay in seconds
    pub timeout_s: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
            timeout_s: DEFAULT_TIMEOUT_S,
        }
    }
}

impl DeviceConfig {
    /// Validate the distance bound
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_distance(self.max_distance_m)
    }

    /// Max distance in the module's wire unit (decimeters)
    pub fn max_distance_dm(&self) -> u32 {
        (self.max_distance_m * 10.0 + 0.5) as u32
    }
}

/// Validate a detection distance in meters
pub fn check_distance(meters: f32) -> Result<(), ConfigError> {
    if !(MIN_DISTANCE_M..=MAX_DISTANCE_M).contains(&meters) {
        return Err(ConfigError::DistanceOutOfRange);
    }
    Ok(())
}

/// Validate a threshold level in decibels
pub fn check_threshold_db(db: f32) -> Result<(), ConfigError> {
    if !(0.0..=95.0).contains(&db) {
        return Err(ConfigError::ThresholdOutOfRange);
    }
    Ok(())
}

/// Calibration coefficients, one per threshold class
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationCoefficients {
    pub trigger: f32,
    pub hold: f32,
    pub micromotion: f32,
}

impl Default for CalibrationCoefficients {
    fn default() -> Self {
        Self {
            trigger: DEFAULT_COEFFICIENT,
            hold: DEFAULT_COEFFICIENT,
            micromotion: DEFAULT_COEFFICIENT,
        }
    }
}

impl CalibrationCoefficients {
    /// Validate all coefficients against the module's accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.trigger, self.hold, self.micromotion] {
            if !(MIN_COEFFICIENT..=MAX_COEFFICIENT).contains(&value) {
                return Err(ConfigError::CoefficientOutOfRange);
            }
        }
        Ok(())
    }

    /// Wire encoding: ×10 fixed point
    pub fn to_x10(&self) -> (u16, u16, u16) {
        (x10(self.trigger), x10(self.hold), x10(self.micromotion))
    }
}

fn x10(value: f32) -> u16 {
    (value * 10.0 + 0.5) as u16
}

/// Host-side link timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Config-mode entry handshake timeout in milliseconds
    pub response_timeout_ms: u32,
    /// Calibration progress poll interval in milliseconds
    pub calibration_poll_ms: u32,
    /// Abort calibration when no progress arrives for this long
    pub calibration_stall_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5_000,
            calibration_poll_ms: 5_000,
            calibration_stall_ms: 30_000,
        }
    }
}
