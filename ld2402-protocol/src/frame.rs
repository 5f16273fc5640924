//! Frame encoding and decoding for the LD2402 UART link.
//!
//! Two frame families share the serial line:
//!
//! Command/response frames (host -> module and acknowledgements back):
//! ```text
//! ┌──────────────┬────────┬──────────┬─────────┬──────────────┐
//! │ FD FC FB FA  │ LENGTH │ COMMAND  │ PAYLOAD │ 04 03 02 01  │
//! │ 4B           │ 2B LE  │ 2B LE    │ 0-254B  │ 4B           │
//! └──────────────┴────────┴──────────┴─────────┴──────────────┘
//! ```
//! LENGTH counts the command word plus the payload.
//!
//! Report frames (unsolicited telemetry from the module):
//! ```text
//! ┌──────────────┬──────┬────────┬─────────┬──────────────┐
//! │ F4 F3 F2 F1  │ TYPE │ LENGTH │ PAYLOAD │ F8 F7 F6 F5  │
//! │ 4B           │ 1B   │ 2B LE  │ 0-256B  │ 4B           │
//! └──────────────┴──────┴────────┴─────────┴──────────────┘
//! ```

use heapless::Vec;

/// Command/response frame delimiters
pub const CMD_FRAME_HEADER: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];
pub const CMD_FRAME_FOOTER: [u8; 4] = [0x04, 0x03, 0x02, 0x01];

/// Report frame delimiters
pub const REPORT_FRAME_HEADER: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];
pub const REPORT_FRAME_FOOTER: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];

/// Defensive cap on the declared payload length.
///
/// The largest real frame is the engineering report (131 payload bytes); a
/// declared length above the cap is treated as stream corruption rather
/// than grounds for a bigger buffer.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Maximum complete frame size (header + type + length + payload + footer)
pub const MAX_FRAME_SIZE: usize = 4 + 1 + 2 + MAX_PAYLOAD_SIZE + 4;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Frame is incomplete; more bytes are needed. Routine, not corruption.
    Truncated,
    /// Footer mismatch after the declared payload length
    Malformed,
    /// Declared payload length exceeds [`MAX_PAYLOAD_SIZE`]
    Oversize,
}

/// A command/response frame body: command word echo plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseFrame {
    /// LENGTH bytes: command word (little-endian) followed by data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

/// A report frame body
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportFrame {
    /// Report type discriminant
    pub report_type: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

/// A completed frame from either family
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// Command acknowledgement (FD FC FB FA family)
    Response(ResponseFrame),
    /// Unsolicited telemetry (F4 F3 F2 F1 family)
    Report(ReportFrame),
}

/// Encode a command-family frame around `word` and `data`.
///
/// The same encoder serves both directions: a host command uses the plain
/// command word, a simulated module acknowledgement uses `word | 0x0100`.
pub fn encode_command_frame(
    word: u16,
    data: &[u8],
) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    if 2 + data.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::Oversize);
    }

    let mut out = Vec::new();
    let len = (2 + data.len()) as u16;
    out.extend_from_slice(&CMD_FRAME_HEADER)
        .map_err(|_| FrameError::Oversize)?;
    out.extend_from_slice(&len.to_le_bytes())
        .map_err(|_| FrameError::Oversize)?;
    out.extend_from_slice(&word.to_le_bytes())
        .map_err(|_| FrameError::Oversize)?;
    out.extend_from_slice(data).map_err(|_| FrameError::Oversize)?;
    out.extend_from_slice(&CMD_FRAME_FOOTER)
        .map_err(|_| FrameError::Oversize)?;
    Ok(out)
}

impl ReportFrame {
    /// Create a report frame with the given type and payload
    pub fn new(report_type: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::Oversize)?;
        Ok(Self {
            report_type,
            payload: payload_vec,
        })
    }

    /// Encode this report frame into wire bytes (for testing or simulation)
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut out = Vec::new();
        let len = self.payload.len() as u16;
        out.extend_from_slice(&REPORT_FRAME_HEADER)
            .map_err(|_| FrameError::Oversize)?;
        out.push(self.report_type).map_err(|_| FrameError::Oversize)?;
        out.extend_from_slice(&len.to_le_bytes())
            .map_err(|_| FrameError::Oversize)?;
        out.extend_from_slice(&self.payload)
            .map_err(|_| FrameError::Oversize)?;
        out.extend_from_slice(&REPORT_FRAME_FOOTER)
            .map_err(|_| FrameError::Oversize)?;
        Ok(out)
    }
}

/// Which frame family the parser is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Command,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning the stream for either header magic
    Seeking,
    /// Got the report header, waiting for the type discriminant
    ReportType,
    /// Waiting for the low length byte
    LengthLow,
    /// Waiting for the high length byte
    LengthHigh,
    /// Reading payload bytes
    Payload,
    /// Matching the footer magic
    Footer,
}

/// Incremental parser for the incoming byte stream.
///
/// Feed one byte at a time; parser state persists across calls. On footer
/// mismatch or an oversize declared length the buffered bytes are discarded
/// and the parser resynchronizes by scanning for the next header magic.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    family: Family,
    cmd_sync: u8,
    report_sync: u8,
    report_type: u8,
    length_low: u8,
    expected_len: usize,
    footer_pos: u8,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::Seeking,
            family: Family::Command,
            cmd_sync: 0,
            report_sync: 0,
            report_type: 0,
            length_low: 0,
            expected_len: 0,
            footer_pos: 0,
            buffer: Vec::new(),
        }
    }

    /// Reset the parser to the header scan
    pub fn reset(&mut self) {
        self.state = ParseState::Seeking;
        self.cmd_sync = 0;
        self.report_sync = 0;
        self.report_type = 0;
        self.length_low = 0;
        self.expected_len = 0;
        self.footer_pos = 0;
        self.buffer.clear();
    }

    /// True if the parser is mid-frame
    pub fn in_frame(&self) -> bool {
        self.state != ParseState::Seeking
    }

    /// Abandon a frame the stream stopped delivering.
    ///
    /// Called when the inter-byte gap exceeds the link's frame timeout.
    /// Returns `Err(Truncated)` if a partial frame was discarded.
    pub fn interrupt(&mut self) -> Result<(), FrameError> {
        if self.in_frame() {
            self.reset();
            return Err(FrameError::Truncated);
        }
        Ok(())
    }

    /// Feed a single byte to the parser.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on corruption
    /// (after which the parser has already resynchronized to the scan).
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::Seeking => {
                self.advance_sync(byte);
                Ok(None)
            }
            ParseState::ReportType => {
                self.report_type = byte;
                self.state = ParseState::LengthLow;
                Ok(None)
            }
            ParseState::LengthLow => {
                self.length_low = byte;
                self.state = ParseState::LengthHigh;
                Ok(None)
            }
            ParseState::LengthHigh => {
                let declared = u16::from_le_bytes([self.length_low, byte]) as usize;
                if declared > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::Oversize);
                }
                // Command frames carry at least the 2-byte command word
                if self.family == Family::Command && declared < 2 {
                    self.reset();
                    return Err(FrameError::Malformed);
                }
                self.expected_len = declared;
                self.buffer.clear();
                self.state = if declared == 0 {
                    ParseState::Footer
                } else {
                    ParseState::Payload
                };
                Ok(None)
            }
            ParseState::Payload => {
                // Cannot overflow: expected_len is capped above
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_len {
                    self.state = ParseState::Footer;
                }
                Ok(None)
            }
            ParseState::Footer => {
                let footer = match self.family {
                    Family::Command => &CMD_FRAME_FOOTER,
                    Family::Report => &REPORT_FRAME_FOOTER,
                };
                if byte != footer[self.footer_pos as usize] {
                    self.reset();
                    return Err(FrameError::Malformed);
                }
                self.footer_pos += 1;
                if usize::from(self.footer_pos) < footer.len() {
                    return Ok(None);
                }

                let frame = match self.family {
                    Family::Command => Frame::Response(ResponseFrame {
                        payload: self.buffer.clone(),
                    }),
                    Family::Report => Frame::Report(ReportFrame {
                        report_type: self.report_type,
                        payload: self.buffer.clone(),
                    }),
                };
                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser.
    ///
    /// Returns the first complete frame found, if any. Remaining bytes
    /// after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Track progressive matches against both header magics
    fn advance_sync(&mut self, byte: u8) {
        self.cmd_sync = Self::sync_step(self.cmd_sync, byte, &CMD_FRAME_HEADER);
        self.report_sync = Self::sync_step(self.report_sync, byte, &REPORT_FRAME_HEADER);

        if self.cmd_sync == 4 {
            self.family = Family::Command;
            self.cmd_sync = 0;
            self.report_sync = 0;
            self.state = ParseState::LengthLow;
        } else if self.report_sync == 4 {
            self.family = Family::Report;
            self.cmd_sync = 0;
            self.report_sync = 0;
            self.state = ParseState::ReportType;
        }
    }

    fn sync_step(matched: u8, byte: u8, magic: &[u8; 4]) -> u8 {
        if byte == magic[matched as usize] {
            matched + 1
        } else if byte == magic[0] {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_no_payload() {
        // Enable-config: word 0x00FF, no data
        let encoded = encode_command_frame(0x00FF, &[]).unwrap();
        assert_eq!(
            encoded.as_slice(),
            &[0xFD, 0xFC, 0xFB, 0xFA, 0x02, 0x00, 0xFF, 0x00, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_encode_command_with_payload() {
        // Set-param max distance (id 0x0001) to 50 decimeters
        let encoded =
            encode_command_frame(0x0007, &[0x01, 0x00, 0x32, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(&encoded[..4], &CMD_FRAME_HEADER);
        assert_eq!(&encoded[4..6], &[0x08, 0x00]); // 2 + 6 bytes
        assert_eq!(&encoded[6..8], &[0x07, 0x00]);
        assert_eq!(&encoded[encoded.len() - 4..], &CMD_FRAME_FOOTER);
    }

    #[test]
    fn test_command_roundtrip() {
        let encoded = encode_command_frame(0x0012, &[0x00, 0x00, 0x64, 0x00, 0x00, 0x00]).unwrap();
        let mut parser = FrameParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();

        match frame {
            Frame::Response(resp) => {
                assert_eq!(&resp.payload[..2], &[0x12, 0x00]);
                assert_eq!(&resp.payload[2..], &[0x00, 0x00, 0x64, 0x00, 0x00, 0x00]);
            }
            Frame::Report(_) => panic!("wrong family"),
        }
    }

    #[test]
    fn test_report_roundtrip() {
        let report = ReportFrame::new(0x83, &[0x01, 0xE7, 0x00]).unwrap();
        let encoded = report.encode_to_vec().unwrap();

        let mut parser = FrameParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();

        match frame {
            Frame::Report(parsed) => {
                assert_eq!(parsed.report_type, 0x83);
                assert_eq!(parsed.payload, report.payload);
            }
            Frame::Response(_) => panic!("wrong family"),
        }
    }

    #[test]
    fn test_empty_report_payload() {
        let report = ReportFrame::new(0x84, &[]).unwrap();
        let encoded = report.encode_to_vec().unwrap();

        let mut parser = FrameParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();
        assert!(matches!(frame, Frame::Report(r) if r.payload.is_empty()));
    }

    #[test]
    fn test_resync_after_garbage() {
        let encoded = encode_command_frame(0x00FE, &[]).unwrap();

        let mut data = Vec::<u8, 32>::new();
        data.extend_from_slice(&[0x00, 0x37, 0x12, 0x55]).unwrap();
        data.extend_from_slice(&encoded).unwrap();

        let mut parser = FrameParser::new();
        let frame = parser.feed_bytes(&data).unwrap().unwrap();
        assert!(matches!(frame, Frame::Response(_)));
    }

    #[test]
    fn test_resync_after_corrupt_footer() {
        let mut corrupted = encode_command_frame(0x00FF, &[]).unwrap();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        let valid = ReportFrame::new(0x83, &[0x00, 0x00, 0x00])
            .unwrap()
            .encode_to_vec()
            .unwrap();

        let mut parser = FrameParser::new();
        let mut errors = 0;
        let mut found = None;
        for &byte in corrupted.iter().chain(valid.iter()) {
            match parser.feed(byte) {
                Ok(Some(frame)) => found = Some(frame),
                Ok(None) => {}
                Err(e) => {
                    assert_eq!(e, FrameError::Malformed);
                    errors += 1;
                }
            }
        }

        assert_eq!(errors, 1);
        assert!(matches!(found, Some(Frame::Report(r)) if r.report_type == 0x83));
    }

    #[test]
    fn test_oversize_length_rejected() {
        let mut parser = FrameParser::new();
        parser.feed_bytes(&REPORT_FRAME_HEADER).unwrap();
        parser.feed(0x84).unwrap();
        parser.feed(0xFF).unwrap();
        // Declared length 0x2FF = 767 > cap
        assert_eq!(parser.feed(0x02), Err(FrameError::Oversize));
        assert!(!parser.in_frame());
    }

    #[test]
    fn test_undersize_command_length_rejected() {
        let mut parser = FrameParser::new();
        parser.feed_bytes(&CMD_FRAME_HEADER).unwrap();
        parser.feed(0x01).unwrap();
        assert_eq!(parser.feed(0x00), Err(FrameError::Malformed));
    }

    #[test]
    fn test_interrupt_mid_frame() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.interrupt(), Ok(()));

        parser.feed_bytes(&CMD_FRAME_HEADER).unwrap();
        parser.feed(0x04).unwrap();
        assert_eq!(parser.interrupt(), Err(FrameError::Truncated));
        assert!(!parser.in_frame());

        // A fresh frame parses normally afterwards
        let encoded = encode_command_frame(0x0000, &[]).unwrap();
        assert!(parser.feed_bytes(&encoded).unwrap().is_some());
    }

    #[test]
    fn test_interleaved_families() {
        let report = ReportFrame::new(0x84, &[0u8; 8]).unwrap().encode_to_vec().unwrap();
        let response = encode_command_frame(0x01FF, &[0x00, 0x00]).unwrap();

        let mut parser = FrameParser::new();
        let first = parser.feed_bytes(&report).unwrap().unwrap();
        let second = parser.feed_bytes(&response).unwrap().unwrap();

        assert!(matches!(first, Frame::Report(_)));
        assert!(matches!(second, Frame::Response(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_command_roundtrip(
                word in any::<u16>(),
                data in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let encoded = encode_command_frame(word, &data).unwrap();
                let mut parser = FrameParser::new();

                let mut frames = 0;
                for (i, &byte) in encoded.iter().enumerate() {
                    if let Some(Frame::Response(resp)) = parser.feed(byte).unwrap() {
                        prop_assert_eq!(i, encoded.len() - 1);
                        prop_assert_eq!(&resp.payload[..2], &word.to_le_bytes());
                        prop_assert_eq!(&resp.payload[2..], data.as_slice());
                        frames += 1;
                    }
                }
                prop_assert_eq!(frames, 1);
            }

            #[test]
            fn prop_report_roundtrip(
                report_type in any::<u8>(),
                data in proptest::collection::vec(any::<u8>(), 0..160),
            ) {
                let encoded = ReportFrame::new(report_type, &data)
                    .unwrap()
                    .encode_to_vec()
                    .unwrap();
                let mut parser = FrameParser::new();
                let frame = parser.feed_bytes(&encoded).unwrap().unwrap();

                match frame {
                    Frame::Report(parsed) => {
                        prop_assert_eq!(parsed.report_type, report_type);
                        prop_assert_eq!(parsed.payload.as_slice(), data.as_slice());
                    }
                    Frame::Response(_) => prop_assert!(false, "wrong family"),
                }
            }

            #[test]
            fn prop_recovers_after_corrupt_footer(
                data in proptest::collection::vec(any::<u8>(), 0..32),
                corrupt in 1u8..=0xFF,
            ) {
                let mut bad = ReportFrame::new(0x84, &data).unwrap().encode_to_vec().unwrap();
                let last = bad.len() - 1;
                bad[last] ^= corrupt;

                let good = encode_command_frame(0x0108, &[0x00, 0x00]).unwrap();

                let mut parser = FrameParser::new();
                let mut recovered = false;
                for &byte in bad.iter().chain(good.iter()) {
                    if let Ok(Some(Frame::Response(_))) = parser.feed(byte) {
                        recovered = true;
                    }
                }
                prop_assert!(recovered);
            }
        }
    }
}
