//! Scan fragment reassembly and completion splitting
//!
//! A scan arrives as 1..n fragments sharing a codeType and a packet count.
//! [`ReassemblyBuffer`] accumulates them in index order; any fragment that
//! contradicts the in-progress scan discards the whole buffer. There is no
//! partial recovery: the next fragment after a discard starts a fresh scan.

use tracing::{debug, warn};

use crate::codetypes::{self, CodeType, UNKNOWN_PRIMARY};
use crate::event::ScanEvent;
use crate::report::ScanPacket;

/// State for the scan currently being assembled. One per engine, touched
/// only by the reader thread.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    in_progress: Option<InProgress>,
}

#[derive(Debug)]
struct InProgress {
    expected_count: u16,
    next_index: u16,
    code_type: u16,
    payload: Vec<u8>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment. Returns the completed scan once the final fragment
    /// lands; a mismatched fragment resets the buffer to idle and returns
    /// nothing.
    pub fn push(&mut self, packet: ScanPacket) -> Option<ScanEvent> {
        if self.in_progress.is_none() {
            debug!(
                count = packet.packet_count,
                code_type = packet.code_type,
                "starting new scan"
            );
            self.in_progress = Some(InProgress {
                expected_count: packet.packet_count,
                next_index: 0,
                code_type: packet.code_type,
                payload: Vec::with_capacity(usize::from(packet.packet_count) * packet.data.len()),
            });
        }
        let scan = self.in_progress.as_mut()?;

        if packet.packet_count != scan.expected_count
            || packet.packet_index != scan.next_index
            || packet.code_type != scan.code_type
        {
            warn!(
                expect_count = scan.expected_count,
                expect_index = scan.next_index,
                expect_code_type = scan.code_type,
                actual_count = packet.packet_count,
                actual_index = packet.packet_index,
                actual_code_type = packet.code_type,
                "unexpected scan fragment, resetting scan"
            );
            self.in_progress = None;
            return None;
        }

        scan.payload.extend_from_slice(&packet.data);
        scan.next_index += 1;

        if scan.next_index >= scan.expected_count {
            let scan = self.in_progress.take()?;
            return Some(complete_scan(scan.code_type, scan.payload));
        }
        None
    }
}

/// Resolve the symbology and split the payload into primary + supplemental
/// parts for fixed-length symbologies.
fn complete_scan(code_type: u16, payload: Vec<u8>) -> ScanEvent {
    let resolved = codetypes::lookup(code_type).unwrap_or_else(|| {
        warn!(code_type, "scan with unknown codeType");
        CodeType {
            primary: UNKNOWN_PRIMARY,
            supplemental: "",
        }
    });

    let mut primary_data = payload;
    let mut supplemental_data = Vec::new();
    match codetypes::primary_length(resolved.primary) {
        Some(len) if len <= primary_data.len() => {
            supplemental_data = primary_data.split_off(len);
        }
        Some(len) => {
            // The device sent fewer bytes than the symbology's fixed length.
            warn!(
                primary = resolved.primary,
                expected = len,
                actual = primary_data.len(),
                "payload shorter than fixed primary length, not splitting"
            );
        }
        None => {}
    }

    ScanEvent {
        primary_type: resolved.primary,
        primary_data,
        supplemental_type: resolved.supplemental,
        supplemental_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(count: u16, index: u16, code_type: u16, data: &[u8]) -> ScanPacket {
        ScanPacket {
            packet_count: count,
            packet_index: index,
            code_type,
            data: data.to_vec(),
        }
    }

    #[test]
    fn single_fragment_completes_immediately() {
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 28, b"HELLO")).unwrap();
        assert_eq!(event.primary_type, "qr");
        assert_eq!(event.primary_data, b"HELLO");
        assert_eq!(event.supplemental_type, "");
        assert!(event.supplemental_data.is_empty());
    }

    #[test]
    fn fragments_accumulate_in_order() {
        let mut buffer = ReassemblyBuffer::new();
        assert!(buffer.push(packet(3, 0, 28, b"AA")).is_none());
        assert!(buffer.push(packet(3, 1, 28, b"BB")).is_none());
        let event = buffer.push(packet(3, 2, 28, b"CC")).unwrap();
        assert_eq!(event.primary_data, b"AABBCC");
    }

    #[test]
    fn out_of_order_index_resets() {
        let mut buffer = ReassemblyBuffer::new();
        assert!(buffer.push(packet(2, 0, 28, b"AA")).is_none());
        assert!(buffer.push(packet(2, 3, 28, b"BB")).is_none());
        // Buffer is idle again: a fresh single-fragment scan goes through.
        let event = buffer.push(packet(1, 0, 28, b"CC")).unwrap();
        assert_eq!(event.primary_data, b"CC");
    }

    #[test]
    fn count_mismatch_resets() {
        let mut buffer = ReassemblyBuffer::new();
        assert!(buffer.push(packet(3, 0, 28, b"AA")).is_none());
        assert!(buffer.push(packet(2, 1, 28, b"BB")).is_none());
        assert!(buffer.push(packet(3, 1, 28, b"BB")).is_none());
        // The post-reset fragment above had index 1, which mismatches the
        // fresh buffer's expected index 0 and resets it again.
        let event = buffer.push(packet(1, 0, 28, b"DD")).unwrap();
        assert_eq!(event.primary_data, b"DD");
    }

    #[test]
    fn code_type_mismatch_resets() {
        let mut buffer = ReassemblyBuffer::new();
        assert!(buffer.push(packet(2, 0, 28, b"AA")).is_none());
        assert!(buffer.push(packet(2, 1, 27, b"BB")).is_none());
        let event = buffer.push(packet(1, 0, 27, b"CC")).unwrap();
        assert_eq!(event.primary_type, "datamatrix");
    }

    #[test]
    fn fixed_length_primary_splits_supplemental() {
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 8, b"012345678901AB")).unwrap();
        assert_eq!(event.primary_type, "upc-a");
        assert_eq!(event.primary_data, b"012345678901");
        assert_eq!(event.supplemental_type, "");
        assert_eq!(event.supplemental_data, b"AB");
    }

    #[test]
    fn supplemental_code_type_keeps_its_tag() {
        // ID 72 is upc-a+sup2; the split is still driven by the primary
        // length table.
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 72, b"01234567890112")).unwrap();
        assert_eq!(event.primary_type, "upc-a");
        assert_eq!(event.supplemental_type, "sup2");
        assert_eq!(event.primary_data, b"012345678901");
        assert_eq!(event.supplemental_data, b"12");
    }

    #[test]
    fn exact_length_payload_yields_empty_supplemental() {
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 10, b"12345678")).unwrap();
        assert_eq!(event.primary_type, "ean-8");
        assert_eq!(event.primary_data, b"12345678");
        assert!(event.supplemental_data.is_empty());
    }

    #[test]
    fn unknown_code_type_is_not_split() {
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 41, b"HELLO")).unwrap();
        assert_eq!(event.primary_type, UNKNOWN_PRIMARY);
        assert_eq!(event.primary_data, b"HELLO");
        assert_eq!(event.supplemental_type, "");
        assert!(event.supplemental_data.is_empty());
    }

    #[test]
    fn short_fixed_length_payload_does_not_panic() {
        let mut buffer = ReassemblyBuffer::new();
        let event = buffer.push(packet(1, 0, 8, b"0123")).unwrap();
        assert_eq!(event.primary_type, "upc-a");
        assert_eq!(event.primary_data, b"0123");
        assert!(event.supplemental_data.is_empty());
    }

    #[test]
    fn split_preserves_total_length() {
        let mut buffer = ReassemblyBuffer::new();
        let payload = b"9781234567897AB123";
        let event = buffer.push(packet(1, 0, 11, payload)).unwrap();
        assert_eq!(
            event.primary_data.len() + event.supplemental_data.len(),
            payload.len()
        );
    }
}
