//! HID report framing for the SNAPI protocol
//!
//! Every message to or from a SNAPI scanner is one HID report of at most 64
//! bytes, with the command ID in byte 0. The inbound layouts are fixed:
//!
//! ```text
//! 0x21 status   [1]=cmdId  [2]=status (low nibble)  [3]=param (low nibble)
//! 0x22 scan     [1]=count  [2]=index  [3]=dataLen  [4..6]=codeType LE  [6..]=data
//! 0x26 scan     [1..3]=count BE  [3..5]=index BE  [5]=dataLen  [6..8]=codeType LE  [8..]=data
//! 0x24 notify   accepted and ignored
//! ```
//!
//! The endianness asymmetry in the 0x26 layout (big-endian count/index,
//! little-endian codeType) matches what the hardware actually sends and is
//! preserved verbatim.

use thiserror::Error;
use tracing::warn;

/// Largest HID report a SNAPI scanner exchanges.
pub const MAX_REPORT_SIZE: usize = 64;

/// Inbound command IDs (byte 0 of a device-to-host report).
pub const IN_MSG_STATUS: u8 = 0x21;
pub const IN_MSG_SCAN: u8 = 0x22;
pub const IN_MSG_NOTIFY: u8 = 0x24;
pub const IN_MSG_SCAN_LARGE: u8 = 0x26;

/// Outbound command IDs (byte 0 of a host-to-device report). Only
/// [`OUT_MSG_STATUS`] is emitted today; the rest are part of the wire
/// contract and reserved for future command support.
pub const OUT_MSG_STATUS: u8 = 0x01;
pub const OUT_MSG_AIM: u8 = 0x02;
pub const OUT_MSG_MODE: u8 = 0x03;
pub const OUT_MSG_BEEP: u8 = 0x04;
pub const OUT_MSG_LIGHTS: u8 = 0x10;

/// Status codes carried in the low nibble of status reports.
pub const STATUS_SUCCESS: u8 = 0x1;
pub const STATUS_ERROR: u8 = 0x2;
pub const STATUS_UNSUPPORTED: u8 = 0x3;
pub const STATUS_BAD_STATE: u8 = 0x4;
pub const STATUS_TIMEOUT: u8 = 0xD;

/// One parsed scan fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPacket {
    /// Total number of fragments in the scan (1-65535).
    pub packet_count: u16,
    /// Zero-based position of this fragment.
    pub packet_index: u16,
    /// 16-bit symbology ID shared by every fragment of the scan.
    pub code_type: u16,
    /// Fragment payload, 0-58 bytes.
    pub data: Vec<u8>,
}

/// An inbound status report (command 0x21).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Command ID this status refers to.
    pub cmd_id: u8,
    /// Status code, low nibble only.
    pub status: u8,
    /// Status parameter, low nibble only.
    pub param: u8,
}

/// A parsed inbound report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundReport {
    /// Status/ack report (0x21).
    Status(StatusReport),
    /// Scan fragment (0x22 or 0x26). `cmd_id` is echoed in the ack.
    Scan { cmd_id: u8, packet: ScanPacket },
    /// Notify report (0x24).
    Notify,
}

/// Reports that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// Zero-length report. The device sends these occasionally.
    #[error("empty report")]
    Empty,

    /// Command ID not part of the SNAPI inbound set.
    #[error("unrecognized command id {0:#04x}")]
    UnknownCommand(u8),

    /// Report shorter than the fixed header of its command.
    #[error("report too short for command {cmd_id:#04x}: {len} bytes")]
    Truncated { cmd_id: u8, len: usize },
}

/// Parse one inbound HID report.
///
/// A scan fragment whose declared data length overruns the report body is
/// truncated to the available bytes rather than rejected.
pub fn parse_report(report: &[u8]) -> Result<InboundReport, ReportError> {
    if report.is_empty() {
        return Err(ReportError::Empty);
    }

    let cmd_id = report[0];
    match cmd_id {
        IN_MSG_STATUS => {
            if report.len() < 4 {
                return Err(ReportError::Truncated {
                    cmd_id,
                    len: report.len(),
                });
            }
            Ok(InboundReport::Status(StatusReport {
                cmd_id: report[1],
                status: report[2] & 0x0f,
                param: report[3] & 0x0f,
            }))
        }

        IN_MSG_SCAN => {
            if report.len() < 6 {
                return Err(ReportError::Truncated {
                    cmd_id,
                    len: report.len(),
                });
            }
            Ok(InboundReport::Scan {
                cmd_id,
                packet: ScanPacket {
                    packet_count: u16::from(report[1]),
                    packet_index: u16::from(report[2]),
                    code_type: u16::from_le_bytes([report[4], report[5]]),
                    data: fragment_data(report, 6, report[3]),
                },
            })
        }

        IN_MSG_SCAN_LARGE => {
            if report.len() < 8 {
                return Err(ReportError::Truncated {
                    cmd_id,
                    len: report.len(),
                });
            }
            Ok(InboundReport::Scan {
                cmd_id,
                packet: ScanPacket {
                    packet_count: u16::from_be_bytes([report[1], report[2]]),
                    packet_index: u16::from_be_bytes([report[3], report[4]]),
                    code_type: u16::from_le_bytes([report[6], report[7]]),
                    data: fragment_data(report, 8, report[5]),
                },
            })
        }

        IN_MSG_NOTIFY => Ok(InboundReport::Notify),

        other => Err(ReportError::UnknownCommand(other)),
    }
}

/// Extract fragment payload, truncating to the report body on overrun.
fn fragment_data(report: &[u8], offset: usize, declared_len: u8) -> Vec<u8> {
    let declared_end = offset + usize::from(declared_len);
    let end = declared_end.min(report.len());
    if declared_end > report.len() {
        warn!(
            declared = declared_len,
            available = report.len() - offset,
            "scan fragment data length overruns report body, truncating"
        );
    }
    report[offset..end].to_vec()
}

/// Build the 4-byte outbound status frame acknowledging `cmd_id`.
pub fn status_frame(cmd_id: u8, status: u8) -> [u8; 4] {
    [OUT_MSG_STATUS, cmd_id, status & 0x0f, 0x00]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_small_scan_layout() {
        // S1 from the wire contract: UPC-A, 14 payload bytes.
        let mut report = vec![0x22, 0x01, 0x00, 0x0e, 0x08, 0x00];
        report.extend_from_slice(b"012345678901AB");

        let parsed = parse_report(&report).unwrap();
        match parsed {
            InboundReport::Scan { cmd_id, packet } => {
                assert_eq!(cmd_id, IN_MSG_SCAN);
                assert_eq!(packet.packet_count, 1);
                assert_eq!(packet.packet_index, 0);
                assert_eq!(packet.code_type, 8);
                assert_eq!(packet.data, b"012345678901AB");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn parses_large_scan_endianness() {
        // count/index are big-endian in 0x26, codeType stays little-endian.
        let report = vec![0x26, 0x01, 0x02, 0x00, 0x03, 0x04, 0x1c, 0x00, b'Q', b'R', b'A', b'B'];

        let parsed = parse_report(&report).unwrap();
        match parsed {
            InboundReport::Scan { cmd_id, packet } => {
                assert_eq!(cmd_id, IN_MSG_SCAN_LARGE);
                assert_eq!(packet.packet_count, 0x0102);
                assert_eq!(packet.packet_index, 0x0003);
                assert_eq!(packet.code_type, 0x001c);
                assert_eq!(packet.data, b"QRAB");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn truncates_overrunning_data_length() {
        // dataLen claims 10 bytes but only 4 are present.
        let report = vec![0x22, 0x01, 0x00, 0x0a, 0x08, 0x00, b'a', b'b', b'c', b'd'];

        match parse_report(&report).unwrap() {
            InboundReport::Scan { packet, .. } => assert_eq!(packet.data, b"abcd"),
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn zero_length_fragment_is_valid() {
        let report = vec![0x22, 0x02, 0x00, 0x00, 0x08, 0x00];
        match parse_report(&report).unwrap() {
            InboundReport::Scan { packet, .. } => assert!(packet.data.is_empty()),
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn parses_status_nibbles() {
        let report = vec![0x21, 0x22, 0xf1, 0xf7];
        match parse_report(&report).unwrap() {
            InboundReport::Status(status) => {
                assert_eq!(status.cmd_id, 0x22);
                assert_eq!(status.status, 0x1);
                assert_eq!(status.param, 0x7);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn notify_is_accepted() {
        assert_eq!(parse_report(&[0x24, 0xff]).unwrap(), InboundReport::Notify);
    }

    #[test]
    fn empty_report_is_rejected() {
        assert_eq!(parse_report(&[]), Err(ReportError::Empty));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert_eq!(parse_report(&[0x99, 0x00]), Err(ReportError::UnknownCommand(0x99)));
    }

    #[test]
    fn short_header_is_rejected() {
        assert_eq!(
            parse_report(&[0x22, 0x01, 0x00]),
            Err(ReportError::Truncated { cmd_id: 0x22, len: 3 })
        );
        assert_eq!(
            parse_report(&[0x26, 0x00, 0x01, 0x00, 0x00]),
            Err(ReportError::Truncated { cmd_id: 0x26, len: 5 })
        );
        assert_eq!(
            parse_report(&[0x21, 0x22]),
            Err(ReportError::Truncated { cmd_id: 0x21, len: 2 })
        );
    }

    #[test]
    fn status_frame_masks_high_nibble() {
        assert_eq!(status_frame(0x22, STATUS_SUCCESS), [0x01, 0x22, 0x01, 0x00]);
        assert_eq!(status_frame(0x26, 0xf1), [0x01, 0x26, 0x01, 0x00]);
    }
}
