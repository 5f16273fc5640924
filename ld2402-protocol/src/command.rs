//! Command encoding and acknowledgement parsing for the configuration link.
//!
//! Commands only have effect while the module is in configuration mode
//! (bracketed by [`Command::EnableConfig`] / [`Command::DisableConfig`]).
//! The module acknowledges every command with a response frame whose
//! payload echoes the command word with bit 8 set, followed by a 2-byte
//! ack status and command-specific data.

use heapless::Vec;

use crate::frame::{encode_command_frame, FrameError, ResponseFrame, MAX_FRAME_SIZE};
use crate::report::DecodeError;

/// Command words
pub mod cmd {
    /// Read firmware version
    pub const READ_VERSION: u16 = 0x0000;
    /// Write one parameter
    pub const SET_PARAM: u16 = 0x0007;
    /// Read one parameter
    pub const READ_PARAM: u16 = 0x0008;
    /// Start automatic threshold calibration
    pub const START_CALIBRATION: u16 = 0x0009;
    /// Query calibration progress
    pub const QUERY_CALIBRATION: u16 = 0x000A;
    /// Select data output mode
    pub const SET_MODE: u16 = 0x0012;
    /// Start automatic gain adjustment
    pub const AUTO_GAIN: u16 = 0x00EE;
    /// Unsolicited auto-gain completion notification
    pub const AUTO_GAIN_COMPLETE: u16 = 0x00F0;
    /// Persist parameters to module flash
    pub const SAVE_PARAMS: u16 = 0x00FD;
    /// Leave configuration mode
    pub const DISABLE_CONFIG: u16 = 0x00FE;
    /// Enter configuration mode
    pub const ENABLE_CONFIG: u16 = 0x00FF;
}

/// Parameter ids for [`cmd::SET_PARAM`] / [`cmd::READ_PARAM`]
pub mod param {
    /// Maximum detection distance, in decimeters
    pub const MAX_DISTANCE: u16 = 0x0001;
    /// Target disappearance delay, in seconds
    pub const TIMEOUT: u16 = 0x0004;
    /// Power interference status (read-only)
    pub const POWER_INTERFERENCE: u16 = 0x0005;
    /// Motion trigger threshold for gate 0; add the gate index (0-15)
    pub const MOTION_THRESHOLD_BASE: u16 = 0x0010;
    /// Micromotion (still) threshold for gate 0; add the gate index (0-15)
    pub const MICROMOTION_THRESHOLD_BASE: u16 = 0x0030;
}

/// Work mode values for [`cmd::SET_MODE`]
pub mod mode {
    /// Normal production reporting
    pub const NORMAL: u32 = 0x0000_0064;
    /// Configuration mode
    pub const CONFIG: u32 = 0x0000_0001;
    /// Engineering mode (per-gate energy reports)
    pub const ENGINEERING: u32 = 0x0000_0004;
}

/// Bit set in the echoed command word of every acknowledgement
pub const ACK_FLAG: u16 = 0x0100;

/// Power interference readings from [`param::POWER_INTERFERENCE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerInterference {
    /// Check has not run yet
    NotPerformed,
    /// Mains interference not detected
    Clear,
    /// Mains interference detected
    Detected,
}

impl PowerInterference {
    /// Interpret the raw parameter value
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => PowerInterference::NotPerformed,
            1 => PowerInterference::Clear,
            // Anything else is reported as interference
            _ => PowerInterference::Detected,
        }
    }

    /// True if the module flagged interference
    pub fn is_detected(&self) -> bool {
        matches!(self, PowerInterference::Detected)
    }
}

/// A host command ready to be framed
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Enter configuration mode
    EnableConfig,
    /// Leave configuration mode
    DisableConfig,
    /// Read the firmware version string
    ReadVersion,
    /// Read one parameter
    ReadParam { id: u16 },
    /// Write one parameter
    SetParam { id: u16, value: u32 },
    /// Select the data output mode
    SetMode { mode: u32 },
    /// Start threshold calibration with ×10 fixed-point coefficients
    StartCalibration {
        trigger_x10: u16,
        hold_x10: u16,
        micromotion_x10: u16,
    },
    /// Query calibration progress
    QueryCalibration,
    /// Persist parameters to module flash
    SaveParams,
    /// Start automatic gain adjustment
    AutoGain,
}

impl Command {
    /// The wire command word
    pub fn word(&self) -> u16 {
        match self {
            Command::EnableConfig => cmd::ENABLE_CONFIG,
            Command::DisableConfig => cmd::DISABLE_CONFIG,
            Command::ReadVersion => cmd::READ_VERSION,
            Command::ReadParam { .. } => cmd::READ_PARAM,
            Command::SetParam { .. } => cmd::SET_PARAM,
            Command::SetMode { .. } => cmd::SET_MODE,
            Command::StartCalibration { .. } => cmd::START_CALIBRATION,
            Command::QueryCalibration => cmd::QUERY_CALIBRATION,
            Command::SaveParams => cmd::SAVE_PARAMS,
            Command::AutoGain => cmd::AUTO_GAIN,
        }
    }

    /// Encode this command into a complete wire frame
    pub fn encode(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut data = Vec::<u8, 8>::new();
        match self {
            Command::EnableConfig
            | Command::DisableConfig
            | Command::ReadVersion
            | Command::QueryCalibration
            | Command::SaveParams
            | Command::AutoGain => {}
            Command::ReadParam { id } => {
                data.extend_from_slice(&id.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
            }
            Command::SetParam { id, value } => {
                data.extend_from_slice(&id.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
                data.extend_from_slice(&value.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
            }
            Command::SetMode { mode } => {
                data.extend_from_slice(&[0x00, 0x00])
                    .map_err(|_| FrameError::Oversize)?;
                data.extend_from_slice(&mode.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
            }
            Command::StartCalibration {
                trigger_x10,
                hold_x10,
                micromotion_x10,
            } => {
                data.extend_from_slice(&trigger_x10.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
                data.extend_from_slice(&hold_x10.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
                data.extend_from_slice(&micromotion_x10.to_le_bytes())
                    .map_err(|_| FrameError::Oversize)?;
            }
        }
        encode_command_frame(self.word(), &data)
    }
}

/// A parsed command acknowledgement, borrowing the response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack<'a> {
    /// Acknowledged command word (with [`ACK_FLAG`] cleared)
    pub command: u16,
    /// True when the 2-byte ack status is `00 00`
    pub success: bool,
    /// Command-specific data following the ack status
    pub data: &'a [u8],
}

impl<'a> Ack<'a> {
    /// Parse an acknowledgement from a response frame.
    ///
    /// Returns `UnknownType` for response frames that are not
    /// acknowledgements (the echoed word lacks [`ACK_FLAG`]).
    pub fn parse(frame: &'a ResponseFrame) -> Result<Self, DecodeError> {
        if frame.payload.len() < 4 {
            return Err(DecodeError::ShortReport);
        }
        let word = u16::from_le_bytes([frame.payload[0], frame.payload[1]]);
        if word & ACK_FLAG == 0 {
            return Err(DecodeError::UnknownType);
        }
        let status = u16::from_le_bytes([frame.payload[2], frame.payload[3]]);
        Ok(Self {
            command: word & !ACK_FLAG,
            success: status == 0,
            data: &frame.payload[4..],
        })
    }

    /// Firmware version bytes from a [`cmd::READ_VERSION`] ack.
    ///
    /// The payload is a little-endian length followed by that many raw
    /// bytes; callers render them as text.
    pub fn version(&self) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < 2 {
            return Err(DecodeError::ShortReport);
        }
        let len = u16::from_le_bytes([self.data[0], self.data[1]]) as usize;
        if self.data.len() < 2 + len {
            return Err(DecodeError::ShortReport);
        }
        Ok(&self.data[2..2 + len])
    }

    /// Parameter id and value from a [`cmd::READ_PARAM`] ack
    pub fn param(&self) -> Result<(u16, u32), DecodeError> {
        if self.data.len() < 6 {
            return Err(DecodeError::ShortReport);
        }
        let id = u16::from_le_bytes([self.data[0], self.data[1]]);
        let value = u32::from_le_bytes([self.data[2], self.data[3], self.data[4], self.data[5]]);
        Ok((id, value))
    }

    /// Calibration progress percentage from a [`cmd::QUERY_CALIBRATION`]
    /// ack, capped to 100
    pub fn calibration_progress(&self) -> Result<u8, DecodeError> {
        if self.data.len() < 2 {
            return Err(DecodeError::ShortReport);
        }
        let raw = u16::from_le_bytes([self.data[0], self.data[1]]);
        Ok(raw.min(100) as u8)
    }
}

/// Convert a threshold in decibels to the raw register value.
///
/// The module stores thresholds as `10^(dB/10)`; the usable range is
/// 0-95 dB and inputs are clamped to it.
pub fn db_to_threshold(db: f32) -> u32 {
    let db = db.clamp(0.0, 95.0);
    libm::roundf(libm::powf(10.0, db / 10.0)) as u32
}

/// Convert a raw threshold register value to decibels
pub fn threshold_to_db(threshold: u32) -> f32 {
    if threshold == 0 {
        return 0.0;
    }
    10.0 * libm::log10f(threshold as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameParser};

    fn parse_wire(bytes: &[u8]) -> ResponseFrame {
        let mut parser = FrameParser::new();
        match parser.feed_bytes(bytes).unwrap().unwrap() {
            Frame::Response(resp) => resp,
            Frame::Report(_) => panic!("expected response frame"),
        }
    }

    #[test]
    fn test_enable_config_encoding() {
        let encoded = Command::EnableConfig.encode().unwrap();
        assert_eq!(
            encoded.as_slice(),
            &[0xFD, 0xFC, 0xFB, 0xFA, 0x02, 0x00, 0xFF, 0x00, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_set_param_encoding() {
        let encoded = Command::SetParam {
            id: param::MAX_DISTANCE,
            value: 50,
        }
        .encode()
        .unwrap();

        // length = command word + id + value
        assert_eq!(&encoded[4..6], &[0x08, 0x00]);
        assert_eq!(&encoded[6..8], &[0x07, 0x00]);
        assert_eq!(&encoded[8..10], &[0x01, 0x00]);
        assert_eq!(&encoded[10..14], &[0x32, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_set_mode_encoding() {
        let encoded = Command::SetMode { mode: mode::NORMAL }.encode().unwrap();
        assert_eq!(&encoded[6..8], &[0x12, 0x00]);
        assert_eq!(&encoded[8..14], &[0x00, 0x00, 0x64, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_start_calibration_encoding() {
        let encoded = Command::StartCalibration {
            trigger_x10: 30,
            hold_x10: 30,
            micromotion_x10: 30,
        }
        .encode()
        .unwrap();
        assert_eq!(&encoded[8..14], &[30, 0, 30, 0, 30, 0]);
    }

    #[test]
    fn test_ack_parse_success() {
        let wire =
            encode_command_frame(cmd::ENABLE_CONFIG | ACK_FLAG, &[0x00, 0x00]).unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();

        assert_eq!(ack.command, cmd::ENABLE_CONFIG);
        assert!(ack.success);
        assert!(ack.data.is_empty());
    }

    #[test]
    fn test_ack_parse_failure_status() {
        let wire = encode_command_frame(cmd::SET_PARAM | ACK_FLAG, &[0x01, 0x00]).unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();
        assert!(!ack.success);
    }

    #[test]
    fn test_non_ack_rejected() {
        let wire = encode_command_frame(cmd::READ_PARAM, &[0x01, 0x00]).unwrap();
        let frame = parse_wire(&wire);
        assert_eq!(Ack::parse(&frame), Err(DecodeError::UnknownType));
    }

    #[test]
    fn test_version_ack() {
        // length-prefixed "v3.3.2"
        let wire = encode_command_frame(
            cmd::READ_VERSION | ACK_FLAG,
            &[0x00, 0x00, 0x06, 0x00, b'v', b'3', b'.', b'3', b'.', b'2'],
        )
        .unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();
        assert_eq!(ack.version().unwrap(), b"v3.3.2");
    }

    #[test]
    fn test_version_ack_short() {
        let wire =
            encode_command_frame(cmd::READ_VERSION | ACK_FLAG, &[0x00, 0x00, 0x08, 0x00, b'v'])
                .unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();
        assert_eq!(ack.version(), Err(DecodeError::ShortReport));
    }

    #[test]
    fn test_param_ack() {
        let wire = encode_command_frame(
            cmd::READ_PARAM | ACK_FLAG,
            &[0x00, 0x00, 0x05, 0x00, 0x02, 0x00, 0x00, 0x00],
        )
        .unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();

        let (id, value) = ack.param().unwrap();
        assert_eq!(id, param::POWER_INTERFERENCE);
        assert_eq!(value, 2);
        assert!(PowerInterference::from_raw(value).is_detected());
    }

    #[test]
    fn test_calibration_progress_ack() {
        let wire = encode_command_frame(
            cmd::QUERY_CALIBRATION | ACK_FLAG,
            &[0x00, 0x00, 0x46, 0x00],
        )
        .unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();
        assert_eq!(ack.calibration_progress().unwrap(), 70);

        // Values above 100 are capped
        let wire = encode_command_frame(
            cmd::QUERY_CALIBRATION | ACK_FLAG,
            &[0x00, 0x00, 0xFF, 0x00],
        )
        .unwrap();
        let frame = parse_wire(&wire);
        let ack = Ack::parse(&frame).unwrap();
        assert_eq!(ack.calibration_progress().unwrap(), 100);
    }

    #[test]
    fn test_power_interference_values() {
        assert_eq!(
            PowerInterference::from_raw(0),
            PowerInterference::NotPerformed
        );
        assert_eq!(PowerInterference::from_raw(1), PowerInterference::Clear);
        assert_eq!(PowerInterference::from_raw(2), PowerInterference::Detected);
        assert!(PowerInterference::from_raw(7).is_detected());
    }

    #[test]
    fn test_threshold_db_conversion() {
        assert_eq!(db_to_threshold(0.0), 1);
        assert_eq!(db_to_threshold(30.0), 1000);
        // Out-of-range inputs clamp
        assert_eq!(db_to_threshold(-5.0), 1);
        assert_eq!(db_to_threshold(200.0), db_to_threshold(95.0));

        let db = threshold_to_db(1000);
        assert!((db - 30.0).abs() < 0.01);
        assert_eq!(threshold_to_db(0), 0.0);
    }
}
