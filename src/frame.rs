use log::{debug, warn};
use thiserror::Error;

/// Start-of-frame marker.
pub const SOF: u8 = 0x02;
/// End-of-frame marker sequence.
pub const EOF: [u8; 2] = [0x03, 0xFF];
/// Smallest valid frame: SOF, six payload bytes, checksum, parity, EOF.
pub const MIN_FRAME_LEN: usize = 13;

/// A structurally invalid frame.
///
/// Every failed check is collected, so a single log line shows everything
/// wrong with the frame along with its raw bytes.
#[derive(Debug, Error)]
#[error("invalid frame: {}; frame: {}", .problems.join("; "), hex_spaced(.raw))]
pub struct FrameError {
    pub problems: Vec<String>,
    pub raw: Vec<u8>,
}

/// Uppercase hex bytes separated by single spaces.
fn hex_spaced(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase ASCII-hex encoding of a single byte value.
fn hex_pair(value: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [
        DIGITS[(value >> 4) as usize],
        DIGITS[(value & 0x0F) as usize],
    ]
}

/// Frame checksum: sum of payload bytes mod 256, as uppercase ASCII hex.
pub fn checksum(payload: &[u8]) -> [u8; 2] {
    let sum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    hex_pair(sum)
}

/// Frame parity: XOR of payload bytes, as uppercase ASCII hex.
pub fn parity(payload: &[u8]) -> [u8; 2] {
    let xor = payload.iter().fold(0u8, |acc, &b| acc ^ b);
    hex_pair(xor)
}

/// Payload bytes are restricted to NUL padding, digits and uppercase letters.
fn payload_byte_ok(b: u8) -> bool {
    b == 0x00 || b.is_ascii_digit() || b.is_ascii_uppercase()
}

/// Check every frame invariant, reporting all failures at once.
pub fn validate(frame: &[u8]) -> Result<(), FrameError> {
    let mut problems = Vec::new();

    if frame.len() < MIN_FRAME_LEN {
        problems.push(format!(
            "invalid length: {}, expected >= {MIN_FRAME_LEN}",
            frame.len()
        ));
    }

    match frame.first() {
        Some(&SOF) => {}
        Some(&b) => problems.push(format!("invalid start of frame marker: {b:02X}")),
        None => problems.push("missing start of frame marker".to_string()),
    }

    if frame.len() < 2 || frame[frame.len() - 2..] != EOF {
        problems.push("invalid end of frame marker".to_string());
    }

    // The payload region and trailer only exist on frames of minimum length.
    if frame.len() >= MIN_FRAME_LEN {
        let payload = &frame[1..frame.len() - 6];
        for &b in payload {
            if b == SOF {
                problems.push("start of frame marker inside payload".to_string());
            } else if b == EOF[0] {
                problems.push("end of frame marker inside payload".to_string());
            } else if !payload_byte_ok(b) {
                problems.push(format!("invalid payload byte: {b:02X}"));
            }
        }

        if frame[frame.len() - 6..frame.len() - 4] != checksum(payload) {
            problems.push("checksum mismatch".to_string());
        }
        if frame[frame.len() - 4..frame.len() - 2] != parity(payload) {
            problems.push("parity mismatch".to_string());
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(FrameError {
            problems,
            raw: frame.to_vec(),
        })
    }
}

/// Validate a frame and return its payload region.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    validate(frame)?;
    Ok(frame[1..frame.len() - 6].to_vec())
}

/// Wrap a payload in the on-wire envelope.
///
/// The produced frame is re-validated before being returned, so the encoder
/// never emits bytes it would itself reject; a failure here means the caller
/// handed over a payload outside the allowed byte set.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::with_capacity(payload.len() + 7);
    frame.push(SOF);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum(payload));
    frame.extend_from_slice(&parity(payload));
    frame.extend_from_slice(&EOF);
    validate(&frame)?;
    Ok(frame)
}

/// Incremental frame extraction from a raw receive stream.
///
/// The bus is lossy: chunks may start mid-frame, carry line noise, or split a
/// frame across reads. The scanner buffers bytes and hands out one closed
/// frame at a time, skipping garbage and malformed frames without giving up
/// on the rest of the stream.
#[derive(Default)]
pub struct FrameScanner {
    buf: Vec<u8>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next closed frame's payload.
    ///
    /// Returns `None` when no closed frame remains buffered: anything before
    /// the first start marker is discarded (and reported), a partial frame is
    /// retained for the next call, and a buffer without a start marker is
    /// dropped entirely. A closed-but-malformed frame is consumed and
    /// surfaced as `Err` so the caller can log it and keep scanning.
    pub fn next_payload(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        let start = match self.buf.iter().position(|&b| b == SOF) {
            Some(n) => n,
            None => {
                if !self.buf.is_empty() {
                    debug!(
                        "no start of frame marker in {} buffered byte(s), discarding",
                        self.buf.len()
                    );
                    self.buf.clear();
                }
                return None;
            }
        };
        if start > 0 {
            warn!(
                "{} unexpected byte(s) before start of frame marker: {}",
                start,
                hex_spaced(&self.buf[..start])
            );
            self.buf.drain(..start);
        }

        let end = self
            .buf
            .windows(2)
            .position(|w| w == EOF.as_slice())?;
        let frame_len = end + EOF.len();
        let result = decode(&self.buf[..frame_len]);
        self.buf.drain(..frame_len);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Payload "800111" followed by eighteen ASCII zeros.
    fn sample_payload() -> Vec<u8> {
        let mut payload = b"800111".to_vec();
        payload.extend_from_slice(&[b'0'; 18]);
        payload
    }

    #[test]
    fn test_checksum_and_parity() {
        assert_eq!(checksum(&sample_payload()), *b"8B");
        assert_eq!(parity(&sample_payload()), *b"09");
        assert_eq!(checksum(b""), *b"00");
        assert_eq!(parity(b""), *b"00");
    }

    #[test]
    fn test_encode_envelope() {
        let payload = sample_payload();
        let frame = encode(&payload).unwrap();
        assert_eq!(frame[0], SOF);
        assert_eq!(frame[frame.len() - 2..], EOF);
        assert_eq!(frame[1..frame.len() - 6], payload);
        assert_eq!(frame[frame.len() - 6..frame.len() - 4], *b"8B");
        assert_eq!(frame[frame.len() - 4..frame.len() - 2], *b"09");
    }

    #[test]
    fn test_decode_roundtrip() {
        let payload = sample_payload();
        let frame = encode(&payload).unwrap();
        assert_eq!(decode(&frame).unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut frame = encode(&sample_payload()).unwrap();
        let n = frame.len();
        frame[n - 6] = b'F';
        let err = decode(&frame).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("checksum")));
        assert!(!err.problems.iter().any(|p| p.contains("parity")));
    }

    #[test]
    fn test_decode_reports_every_problem() {
        // Wrong SOF, wrong EOF, forbidden payload byte, and a trailer that
        // matches neither checksum nor parity.
        let frame = [
            0xFF, b'8', b'0', 0x7F, b'1', b'1', b'1', b'0', b'0', b'0', b'0', 0x00, 0x00,
        ];
        let err = validate(&frame).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("start of frame")));
        assert!(err.problems.iter().any(|p| p.contains("end of frame")));
        assert!(err.problems.iter().any(|p| p.contains("payload byte")));
        assert!(err.problems.iter().any(|p| p.contains("checksum")));
        assert!(err.problems.iter().any(|p| p.contains("parity")));
        assert!(err.to_string().contains("FF 38"));
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let err = validate(&[SOF, b'0', 0x03, 0xFF]).unwrap_err();
        assert!(err.problems.iter().any(|p| p.contains("length")));
    }

    #[test]
    fn test_encode_rejects_forbidden_payload() {
        // Lowercase hex is outside the payload byte set.
        assert!(encode(b"80011a000000").is_err());
    }

    #[test]
    fn test_scanner_extracts_frame_after_garbage() {
        let mut scanner = FrameScanner::new();
        scanner.extend(&[0xAA, 0x55]);
        scanner.extend(&encode(&sample_payload()).unwrap());
        let payload = scanner.next_payload().unwrap().unwrap();
        assert_eq!(payload, sample_payload());
        assert!(scanner.next_payload().is_none());
    }

    #[test]
    fn test_scanner_retains_partial_frame() {
        let frame = encode(&sample_payload()).unwrap();
        let mut scanner = FrameScanner::new();
        scanner.extend(&frame[..8]);
        assert!(scanner.next_payload().is_none());
        scanner.extend(&frame[8..]);
        assert_eq!(scanner.next_payload().unwrap().unwrap(), sample_payload());
    }

    #[test]
    fn test_scanner_discards_buffer_without_sof() {
        let mut scanner = FrameScanner::new();
        scanner.extend(&[0xAA, 0xBB, 0xCC]);
        assert!(scanner.next_payload().is_none());
        // The garbage is gone; a following frame is still found.
        scanner.extend(&encode(&sample_payload()).unwrap());
        assert_eq!(scanner.next_payload().unwrap().unwrap(), sample_payload());
    }

    #[test]
    fn test_scanner_skips_malformed_frame() {
        let mut corrupted = encode(&sample_payload()).unwrap();
        let n = corrupted.len();
        corrupted[n - 6] = b'F';
        let mut scanner = FrameScanner::new();
        scanner.extend(&corrupted);
        scanner.extend(&encode(&sample_payload()).unwrap());
        assert!(scanner.next_payload().unwrap().is_err());
        assert_eq!(scanner.next_payload().unwrap().unwrap(), sample_payload());
    }
}
