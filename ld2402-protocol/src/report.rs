//! Report frame decoding.
//!
//! The module emits unsolicited report frames carrying current telemetry.
//! Three subtypes exist: the basic report (target status + distance), the
//! engineering report (status + distance + per-gate energies), and the
//! threshold report (per-gate thresholds after calibration).

use crate::frame::ReportFrame;

/// Number of range gates reported per energy class
pub const GATE_COUNT: usize = 16;

/// Distance covered by one range gate, in meters
pub const GATE_SIZE_M: f32 = 0.7;

/// Report type discriminants
pub mod report_type {
    /// Target status and distance only
    pub const BASIC: u8 = 0x83;
    /// Status, distance, and per-gate motion/still energies
    pub const ENGINEERING: u8 = 0x84;
    /// Per-gate motion/still thresholds
    pub const THRESHOLD: u8 = 0x85;
}

/// Errors from report decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame shorter than its fixed layout
    ShortReport,
    /// Unknown type discriminant
    UnknownType,
}

/// Target detection status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetStatus {
    /// No target in range
    Absent,
    /// Moving target
    Moving,
    /// Stationary target (micromotion only)
    Stationary,
}

impl TargetStatus {
    fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(TargetStatus::Absent),
            1 => Ok(TargetStatus::Moving),
            2 => Ok(TargetStatus::Stationary),
            _ => Err(DecodeError::UnknownType),
        }
    }

    /// True for any detected target
    pub fn is_present(&self) -> bool {
        !matches!(self, TargetStatus::Absent)
    }

    /// True when only micromotion is detected
    pub fn is_micromotion(&self) -> bool {
        matches!(self, TargetStatus::Stationary)
    }
}

/// A basic report: status and distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BasicReport {
    pub status: TargetStatus,
    /// Target distance in centimeters; `None` when no target
    pub distance_cm: Option<u16>,
}

/// An engineering report: status, distance, and raw per-gate energies.
///
/// Energy values are passed through verbatim from the wire; no scaling is
/// applied at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryReport {
    pub status: TargetStatus,
    /// Target distance in centimeters; `None` when no target
    pub distance_cm: Option<u16>,
    /// Raw motion energy per gate
    pub motion_energy: [u32; GATE_COUNT],
    /// Raw still energy per gate
    pub still_energy: [u32; GATE_COUNT],
}

/// A threshold report: raw per-gate trigger levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThresholdReport {
    /// Raw motion trigger threshold per gate
    pub motion: [u32; GATE_COUNT],
    /// Raw still (micromotion) threshold per gate
    pub still: [u32; GATE_COUNT],
}

/// A decoded report of any subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    Basic(BasicReport),
    Telemetry(TelemetryReport),
    Thresholds(ThresholdReport),
}

impl Report {
    /// Decode a report frame into its typed form.
    ///
    /// A frame shorter than its fixed layout is a hard decode error, not
    /// zero-filled; an unknown discriminant drops the frame.
    pub fn decode(frame: &ReportFrame) -> Result<Self, DecodeError> {
        match frame.report_type {
            report_type::BASIC => decode_basic(&frame.payload).map(Report::Basic),
            report_type::ENGINEERING => {
                decode_telemetry(&frame.payload).map(Report::Telemetry)
            }
            report_type::THRESHOLD => {
                decode_thresholds(&frame.payload).map(Report::Thresholds)
            }
            _ => Err(DecodeError::UnknownType),
        }
    }
}

fn decode_status_distance(payload: &[u8]) -> Result<(TargetStatus, Option<u16>), DecodeError> {
    if payload.len() < 3 {
        return Err(DecodeError::ShortReport);
    }
    let status = TargetStatus::from_byte(payload[0])?;
    let raw = u16::from_le_bytes([payload[1], payload[2]]);
    // Status 0 is the absent-target sentinel; the distance bytes are
    // meaningless then and are not surfaced.
    let distance_cm = match status {
        TargetStatus::Absent => None,
        _ => Some(raw),
    };
    Ok((status, distance_cm))
}

fn decode_basic(payload: &[u8]) -> Result<BasicReport, DecodeError> {
    let (status, distance_cm) = decode_status_distance(payload)?;
    Ok(BasicReport {
        status,
        distance_cm,
    })
}

fn decode_gates(payload: &[u8]) -> Result<[u32; GATE_COUNT], DecodeError> {
    if payload.len() < GATE_COUNT * 4 {
        return Err(DecodeError::ShortReport);
    }
    let mut gates = [0u32; GATE_COUNT];
    for (i, gate) in gates.iter_mut().enumerate() {
        let offset = i * 4;
        *gate = u32::from_le_bytes([
            payload[offset],
            payload[offset + 1],
            payload[offset + 2],
            payload[offset + 3],
        ]);
    }
    Ok(gates)
}

fn decode_telemetry(payload: &[u8]) -> Result<TelemetryReport, DecodeError> {
    let (status, distance_cm) = decode_status_distance(payload)?;
    // status + distance, then 16 motion gates, then 16 still gates
    let motion_energy = decode_gates(&payload[3..])?;
    let still_energy = decode_gates(&payload[3 + GATE_COUNT * 4..])?;
    Ok(TelemetryReport {
        status,
        distance_cm,
        motion_energy,
        still_energy,
    })
}

fn decode_thresholds(payload: &[u8]) -> Result<ThresholdReport, DecodeError> {
    let motion = decode_gates(payload)?;
    let still = decode_gates(&payload[GATE_COUNT * 4..])?;
    Ok(ThresholdReport { motion, still })
}
