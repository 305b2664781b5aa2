use crate::error::{HomelineError, Result};

/// Charger address right after boot, before registration.
pub const ADDR_NEW: u8 = 0x00;
/// Address handed to the charger during registration.
pub const ADDR_CHARGER: u8 = 0x01;
/// The ChargePoint controller, the role this program plays.
pub const ADDR_CP: u8 = 0x80;
/// SmartGrid module, observed on the bus but never driven.
pub const ADDR_SMARTGRID: u8 = 0xA0;
/// All bus listeners.
pub const ADDR_BROADCAST: u8 = 0xBC;
/// Multi-socket charge station controller.
pub const ADDR_CHARGESTATION: u8 = 0xFD;

/// The semantic message inside a frame.
///
/// The frame payload is ASCII text: three hex-encoded header bytes (`dst`,
/// `src`, `cmd`) followed by the opaque `dat` region, an even-length run of
/// uppercase hex digits possibly carrying NUL padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub dst: u8,
    pub src: u8,
    pub cmd: u8,
    pub dat: String,
}

impl Packet {
    pub fn new(dst: u8, src: u8, cmd: u8, dat: impl Into<String>) -> Self {
        Self {
            dst,
            src,
            cmd,
            dat: dat.into(),
        }
    }

    /// Parse a frame payload.
    ///
    /// Only the header is interpreted here; per-command schema checks live in
    /// the message dictionary and never reject a packet.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < 6 {
            return Err(HomelineError::ShortPayload(payload.len()));
        }
        if !payload.is_ascii() {
            return Err(HomelineError::NonAsciiPayload);
        }
        let text = std::str::from_utf8(payload).map_err(|_| HomelineError::NonAsciiPayload)?;
        Ok(Self {
            dst: hex_byte(&text[0..2])?,
            src: hex_byte(&text[2..4])?,
            cmd: hex_byte(&text[4..6])?,
            dat: text[6..].to_string(),
        })
    }

    /// Serialize back into a frame payload.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = format!("{:02X}{:02X}{:02X}", self.dst, self.src, self.cmd);
        payload.push_str(&self.dat);
        payload.into_bytes()
    }
}

fn hex_byte(text: &str) -> Result<u8> {
    u8::from_str_radix(text, 16).map_err(|_| HomelineError::HeaderHex(text.to_string()))
}

/// Resolve a bus address to a name for logging.
pub fn addr_name(addr: u8) -> &'static str {
    match addr {
        ADDR_NEW => "new",
        ADDR_CHARGER => "charger",
        ADDR_CP => "CP",
        ADDR_SMARTGRID => "SmartGrid",
        ADDR_BROADCAST => "broadcast",
        ADDR_CHARGESTATION => "ChargeStation",
        0x70 => "unknown 70",
        _ => "unknown address",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload() {
        let p = Packet::from_payload(b"8000111234567ABCD0003").unwrap();
        assert_eq!(p.dst, ADDR_CP);
        assert_eq!(p.src, ADDR_NEW);
        assert_eq!(p.cmd, 0x11);
        assert_eq!(p.dat, "1234567ABCD0003");
    }

    #[test]
    fn test_from_payload_empty_dat() {
        let p = Packet::from_payload(b"800121").unwrap();
        assert_eq!(p.cmd, 0x21);
        assert_eq!(p.dat, "");
    }

    #[test]
    fn test_to_payload() {
        let p = Packet::new(ADDR_NEW, ADDR_CP, 0x11, "12345670103");
        assert_eq!(p.to_payload(), b"00801112345670103".to_vec());
    }

    #[test]
    fn test_roundtrip_preserves_nul_padding() {
        let mut payload = b"800126".to_vec();
        payload.extend_from_slice(&[0x00, 0x00]);
        let p = Packet::from_payload(&payload).unwrap();
        assert_eq!(p.dat, "\u{0}\u{0}");
        assert_eq!(p.to_payload(), payload);
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(matches!(
            Packet::from_payload(b"8001"),
            Err(HomelineError::ShortPayload(4))
        ));
    }

    #[test]
    fn test_non_hex_header_rejected() {
        assert!(matches!(
            Packet::from_payload(b"80XY11"),
            Err(HomelineError::HeaderHex(_))
        ));
    }

    #[test]
    fn test_addr_names() {
        assert_eq!(addr_name(ADDR_CP), "CP");
        assert_eq!(addr_name(ADDR_BROADCAST), "broadcast");
        assert_eq!(addr_name(0x42), "unknown address");
    }
}
