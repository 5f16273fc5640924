//! HLK-LD2402 wire protocol
//!
//! This crate implements the UART wire format of the HLK-LD2402 24GHz
//! presence radar: framing for the command/response and report families,
//! the configuration command set, and decoding of telemetry reports.
//!
//! The protocol runs at 115200 baud, 8N1. Commands are only honored in
//! configuration mode; report frames arrive unsolicited in normal and
//! engineering modes.

#![no_std]
#![deny(unsafe_code)]

pub mod command;
pub mod frame;
pub mod report;

pub use command::{db_to_threshold, threshold_to_db, Ack, Command, PowerInterference};
pub use frame::{
    encode_command_frame, Frame, FrameError, FrameParser, ReportFrame, ResponseFrame,
    MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
};
pub use report::{
    BasicReport, DecodeError, Report, TargetStatus, TelemetryReport, ThresholdReport, GATE_COUNT,
};
