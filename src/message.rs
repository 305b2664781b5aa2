//! Message dictionary for the HomeLine bus protocol.
//!
//! One entry per known command opcode: a name, the side that initiates, and
//! the expected `dat` length for each direction, plus decoders for the named
//! fields. The same table drives packet observation (logging and schema
//! warnings) and the actor's encoders, so the two cannot drift apart.
//!
//! Schema problems never reject a packet; the bus carries firmware variants
//! with slightly different payloads and the actor may still be able to act.

use std::fmt;
use std::ops::Range;

use chrono::TimeZone;

use crate::packet::{addr_name, Packet, ADDR_CP};

/// Command opcodes understood by this ChargePoint.
pub mod cmd {
    /// Charger requests a bus address after boot.
    pub const REGISTER: u8 = 0x11;
    /// Read the charger's energy meter identification.
    pub const GET_METER_INFO: u8 = 0x13;
    /// Ask the charger to enter firmware update mode.
    pub const REQUEST_UPDATE: u8 = 0x18;
    /// Announce backend connection state and heartbeat interval.
    pub const CONNECTION_STATE: u8 = 0x1B;
    /// Switch the LED ring on or off.
    pub const LED_RING_ENABLE: u8 = 0x1C;
    /// Force all chargers to redo the registration handshake.
    pub const RESTART_REGISTRATION: u8 = 0x1E;
    /// Periodic liveness exchange.
    pub const HEARTBEAT: u8 = 0x21;
    /// Card authentication.
    pub const AUTH_REQUEST: u8 = 0x22;
    /// Charging session started, with opening meter reading.
    pub const METERING_START: u8 = 0x23;
    /// Charging session ended, with closing meter reading.
    pub const METERING_END: u8 = 0x24;
    /// Rich periodic telemetry from the charger.
    pub const STATE_UPDATE: u8 = 0x26;
    /// Start a session remotely on behalf of a card.
    pub const REMOTE_START: u8 = 0x31;
    /// Stop a session remotely.
    pub const REMOTE_STOP: u8 = 0x32;
    /// Read the charger configuration block.
    pub const GET_CONFIGURATION: u8 = 0x33;
    /// Write the charger configuration block.
    pub const SET_CONFIGURATION: u8 = 0x34;
    /// Reboot the charger.
    pub const REBOOT: u8 = 0x35;
    /// Write the charger serial number.
    pub const SET_SERIAL_NUMBER: u8 = 0x42;
    /// Read hardware generation and firmware version.
    pub const HARDWARE_INFO: u8 = 0x43;
    /// Set the meter telemetry interval.
    pub const SET_METER_INTERVAL: u8 = 0x65;
    /// Periodic meter telemetry.
    pub const METER_VALUE: u8 = 0x66;
    /// Charging state change, acknowledged by the ChargePoint.
    pub const CHARGING_STATE: u8 = 0x6A;
    /// Set the per-phase current limit.
    pub const SET_CURRENT_LIMIT: u8 = 0x6B;
}

/// `dat` literal acknowledging a request.
pub const ACK: &str = "AA00";
/// `dat` literal rejecting a request.
pub const NACK: &str = "0055";
/// Synthetic card identifier meaning "no card, start automatically".
pub const AUTO_START_CARD: &str = "000000AS";
/// Width of the card number field in authentication responses.
pub const CARD_FIELD_WIDTH: usize = 22;

/// Opcodes seen on real buses whose meaning is unknown.
///
/// These are recognized so they can be logged without an "unknown command"
/// complaint, but no semantics are guessed: the actor ignores them.
pub const KNOWN_UNDOCUMENTED: &[u8] = &[
    0x2A, 0x36, 0x37, 0x38, 0x41, 0x6C, 0xE1, 0xE3, 0xE4, 0xE6, 0xEB, 0xEC, 0xED, 0xF0, 0xF1,
    0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB, 0xFD,
];

pub fn is_known_undocumented(command: u8) -> bool {
    KNOWN_UNDOCUMENTED.contains(&command)
}

/// Which side opens a command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Charger,
    ChargePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => write!(f, "request"),
            Direction::Response => write!(f, "response"),
        }
    }
}

/// Expected `dat` length in hex characters.
#[derive(Debug, Clone, Copy)]
pub enum LenRule {
    Exact(usize),
    OneOf(&'static [usize]),
    AtLeast(usize),
    Any,
    /// The command has no message in this direction at all.
    Undefined,
}

impl LenRule {
    fn check(&self, direction: Direction, len: usize) -> Option<String> {
        match self {
            LenRule::Exact(expected) if len != *expected => Some(format!(
                "invalid {direction} length: {len}, expected: {expected}"
            )),
            LenRule::OneOf(options) if !options.contains(&len) => Some(format!(
                "invalid {direction} length: {len}, expected one of: {options:?}"
            )),
            LenRule::AtLeast(min) if len < *min => Some(format!(
                "invalid {direction} length: {len}, expected: >= {min}"
            )),
            LenRule::Undefined => Some(format!("command has no {direction}")),
            _ => None,
        }
    }
}

/// Dictionary entry for one command opcode.
pub struct MessageSpec {
    pub cmd: u8,
    pub name: &'static str,
    pub initiator: Initiator,
    pub request: LenRule,
    pub response: LenRule,
}

impl MessageSpec {
    /// Infer request vs response from the packet addresses.
    pub fn direction(&self, packet: &Packet) -> Direction {
        let from_initiator = match self.initiator {
            Initiator::Charger => packet.dst == ADDR_CP,
            Initiator::ChargePoint => packet.src == ADDR_CP,
        };
        if from_initiator {
            Direction::Request
        } else {
            Direction::Response
        }
    }

    pub fn len_rule(&self, direction: Direction) -> &LenRule {
        match direction {
            Direction::Request => &self.request,
            Direction::Response => &self.response,
        }
    }
}

pub static MESSAGES: &[MessageSpec] = &[
    MessageSpec {
        cmd: cmd::REGISTER,
        name: "register",
        initiator: Initiator::Charger,
        request: LenRule::Exact(15),
        response: LenRule::Exact(11),
    },
    MessageSpec {
        cmd: cmd::GET_METER_INFO,
        name: "get meter info",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(0),
        response: LenRule::AtLeast(4),
    },
    MessageSpec {
        cmd: cmd::REQUEST_UPDATE,
        name: "request update",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(2),
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::CONNECTION_STATE,
        name: "connection state changed",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(10),
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::LED_RING_ENABLE,
        name: "led ring enable",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(2),
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::RESTART_REGISTRATION,
        name: "restart registration",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(0),
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::HEARTBEAT,
        name: "heartbeat",
        initiator: Initiator::Charger,
        request: LenRule::Exact(0),
        response: LenRule::Exact(0),
    },
    MessageSpec {
        cmd: cmd::AUTH_REQUEST,
        name: "authentication request",
        initiator: Initiator::Charger,
        request: LenRule::Exact(26),
        response: LenRule::Exact(30),
    },
    MessageSpec {
        cmd: cmd::METERING_START,
        name: "metering start",
        initiator: Initiator::Charger,
        request: LenRule::Exact(32),
        response: LenRule::Exact(18),
    },
    MessageSpec {
        cmd: cmd::METERING_END,
        name: "metering end",
        initiator: Initiator::Charger,
        request: LenRule::Exact(50),
        response: LenRule::Exact(2),
    },
    MessageSpec {
        cmd: cmd::STATE_UPDATE,
        name: "charger state update",
        initiator: Initiator::Charger,
        request: LenRule::Exact(132),
        response: LenRule::Exact(16),
    },
    MessageSpec {
        cmd: cmd::REMOTE_START,
        name: "remote start",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(24),
        response: LenRule::Exact(2),
    },
    MessageSpec {
        cmd: cmd::REMOTE_STOP,
        name: "remote stop",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(8),
        response: LenRule::Exact(2),
    },
    MessageSpec {
        cmd: cmd::GET_CONFIGURATION,
        name: "get configuration",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(0),
        // One board variant sends a longer block than the others.
        response: LenRule::OneOf(&[74, 78]),
    },
    MessageSpec {
        cmd: cmd::SET_CONFIGURATION,
        name: "set configuration",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(86),
        response: LenRule::Exact(4),
    },
    MessageSpec {
        cmd: cmd::REBOOT,
        name: "reboot",
        initiator: Initiator::ChargePoint,
        request: LenRule::Any,
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::SET_SERIAL_NUMBER,
        name: "set serial number",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(7),
        response: LenRule::Exact(7),
    },
    MessageSpec {
        cmd: cmd::HARDWARE_INFO,
        name: "hardware info",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(0),
        response: LenRule::Exact(18),
    },
    MessageSpec {
        cmd: cmd::SET_METER_INTERVAL,
        name: "set meter update interval",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(4),
        response: LenRule::Undefined,
    },
    MessageSpec {
        cmd: cmd::METER_VALUE,
        name: "meter value",
        initiator: Initiator::Charger,
        request: LenRule::Exact(44),
        response: LenRule::Exact(0),
    },
    MessageSpec {
        cmd: cmd::CHARGING_STATE,
        name: "charging state",
        initiator: Initiator::Charger,
        request: LenRule::Exact(4),
        response: LenRule::Exact(4),
    },
    MessageSpec {
        cmd: cmd::SET_CURRENT_LIMIT,
        name: "set current limit",
        initiator: Initiator::ChargePoint,
        request: LenRule::Exact(18),
        response: LenRule::Exact(0),
    },
];

pub fn lookup(command: u8) -> Option<&'static MessageSpec> {
    MESSAGES.iter().find(|m| m.cmd == command)
}

/// Charger state reported in state updates (0x26).
///
/// Observed cycle: available, cable connected, ready, charging, ready,
/// finished, available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerState {
    Available,
    Error,
    CableConnected,
    Charging,
    Ready,
    Finished,
}

impl ChargerState {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(Self::Available),
            0x0A => Some(Self::Error),
            0x47 => Some(Self::CableConnected),
            0x48 => Some(Self::Charging),
            0x4A => Some(Self::Ready),
            0x4B => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Error => "error",
            Self::CableConnected => "charging cable connected",
            Self::Charging => "charging",
            Self::Ready => "ready",
            Self::Finished => "finished",
        }
    }
}

/// Charging state reported by the charger (0x6A requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingState {
    Unknown07,
    Unknown20,
    Unplugged,
    Charging,
    Available,
    Ready,
    Finished,
    Failed,
}

impl ChargingState {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x07 => Some(Self::Unknown07),
            0x20 => Some(Self::Unknown20),
            0x80 => Some(Self::Unplugged),
            0x81 => Some(Self::Charging),
            0xA0 => Some(Self::Available),
            0xA7 => Some(Self::Ready),
            0xC1 => Some(Self::Finished),
            0xE7 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown07 => "unknown 07",
            Self::Unknown20 => "unknown 20",
            Self::Unplugged => "unplugged",
            Self::Charging => "charging",
            Self::Available => "available",
            Self::Ready => "ready",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }
}

/// Status byte in authentication messages (0x22).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Request,
    Granted,
    NoBackend,
    Denied,
    InvalidCard,
}

impl AuthStatus {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Granted),
            0x03 => Some(Self::NoBackend),
            0x12 => Some(Self::Denied),
            0x1D => Some(Self::InvalidCard),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Request => 0x00,
            Self::Granted => 0x01,
            Self::NoBackend => 0x03,
            Self::Denied => 0x12,
            Self::InvalidCard => 0x1D,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Request => "authentication request",
            Self::Granted => "access granted",
            Self::NoBackend => "not connected to backend",
            Self::Denied => "access denied",
            Self::InvalidCard => "invalid card number",
        }
    }
}

/// Status byte in remote start/stop responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Success,
    Failed,
}

impl RemoteStatus {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Success),
            0x23 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Fields of a register request (0x11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub serial: String,
    pub firmware_version: String,
    pub hardware_generation: String,
}

pub fn register_request(dat: &str) -> Option<RegisterRequest> {
    Some(RegisterRequest {
        serial: dat.get(0..7)?.to_string(),
        firmware_version: text_field(dat, 7..11).to_string(),
        hardware_generation: text_field(dat, 13..15).to_string(),
    })
}

/// Card number carried by an authentication request (0x22).
pub fn auth_card_number(dat: &str) -> Option<String> {
    let card_len = field_u64(dat, 2..4)? as usize;
    Some(dat.get(4..4 + card_len)?.to_string())
}

/// Raw state byte of a charging state request (0x6A), with its decoded form.
pub fn charging_state(dat: &str) -> Option<(u8, Option<ChargingState>)> {
    let raw = field_u8(dat, 0)?;
    Some((raw, ChargingState::from_byte(raw)))
}

/// Build the `dat` of a set-current-limit request (0x6B).
///
/// All currents are in 0.1 A units, one minimum plus one limit per phase.
pub fn current_limit_dat(min_da: u16, l1_da: u16, l2_da: u16, l3_da: u16) -> String {
    format!("01{min_da:04X}{l1_da:04X}{l2_da:04X}{l3_da:04X}")
}

/// Everything the observation layer extracted from one packet.
///
/// The caller decides how to surface it; this crate's loops log the record
/// via `log::info!` and each problem via `log::warn!`.
pub struct Observation {
    pub dst: u8,
    pub src: u8,
    pub cmd: u8,
    pub name: &'static str,
    pub direction: Option<Direction>,
    pub dat: String,
    pub summary: String,
    pub problems: Vec<String>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} ({}) -> {:02X} ({}), cmd {:02X} ({})",
            self.src,
            addr_name(self.src),
            self.dst,
            addr_name(self.dst),
            self.cmd,
            self.name
        )?;
        if let Some(direction) = self.direction {
            write!(f, ", {direction}")?;
        }
        if !self.dat.is_empty() {
            write!(f, ", dat: {}", spaced(&self.dat))?;
            if !self.summary.is_empty() {
                write!(f, " ({})", self.summary)?;
            }
            write!(f, ", length: {}", self.dat.len())?;
        }
        Ok(())
    }
}

/// Decode a packet against the dictionary.
///
/// Never fails: unknown commands and schema violations are reported through
/// `Observation::problems` while decoding carries on best-effort.
pub fn observe(packet: &Packet) -> Observation {
    let mut problems = Vec::new();
    let (name, direction, summary) = match lookup(packet.cmd) {
        Some(spec) => {
            let direction = spec.direction(packet);
            if let Some(problem) = spec.len_rule(direction).check(direction, packet.dat.len()) {
                problems.push(problem);
            }
            let summary = summarize(spec.cmd, direction, &packet.dat, &mut problems);
            (spec.name, Some(direction), summary)
        }
        None if is_known_undocumented(packet.cmd) => ("unknown", None, String::new()),
        None => {
            problems.push("unknown command".to_string());
            ("unknown", None, String::new())
        }
    };
    Observation {
        dst: packet.dst,
        src: packet.src,
        cmd: packet.cmd,
        name,
        direction,
        dat: packet.dat.clone(),
        summary,
        problems,
    }
}

/// Insert a space every four characters for readability.
pub fn spaced(dat: &str) -> String {
    dat.as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_field(dat: &str, range: Range<usize>) -> &str {
    dat.get(range).unwrap_or("")
}

fn field_u64(dat: &str, range: Range<usize>) -> Option<u64> {
    u64::from_str_radix(dat.get(range)?, 16).ok()
}

fn field_u8(dat: &str, at: usize) -> Option<u8> {
    u8::from_str_radix(dat.get(at..at + 2)?, 16).ok()
}

fn num(dat: &str, range: Range<usize>) -> u64 {
    field_u64(dat, range).unwrap_or(0)
}

fn scaled(dat: &str, range: Range<usize>, divisor: f64) -> f64 {
    num(dat, range) as f64 / divisor
}

fn led_colour_name(value: u64) -> String {
    match value {
        0 => "off".to_string(),
        1 => "green".to_string(),
        2 => "red".to_string(),
        3 => "yellow".to_string(),
        4 => "blue".to_string(),
        other => format!("unknown {other:02X}"),
    }
}

fn meter_type_name(value: u64) -> &'static str {
    match value {
        0 => "pulse",
        1 => "serial",
        _ => "invalid",
    }
}

/// Render a charger timestamp (seconds since 2000-01-01 00:00:00).
fn charger_time(secs: u64) -> String {
    let base = chrono::Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single();
    match base.and_then(|b| b.checked_add_signed(chrono::Duration::seconds(secs as i64))) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{secs}s since 2000-01-01"),
    }
}

/// Named-field summary of one message, mirroring the documented schemas.
fn summarize(
    command: u8,
    direction: Direction,
    dat: &str,
    problems: &mut Vec<String>,
) -> String {
    use Direction::{Request, Response};

    match (command, direction) {
        (cmd::REGISTER, Request) => format!(
            "serial number: {}, firmware version: {}, hardware generation: {}",
            text_field(dat, 0..7),
            text_field(dat, 7..11),
            text_field(dat, 13..15)
        ),
        (cmd::REGISTER, Response) => format!(
            "serial number: {}, address: {}, gen: {}",
            text_field(dat, 0..7),
            text_field(dat, 7..9),
            text_field(dat, 9..11)
        ),

        (cmd::GET_METER_INFO, Response) => match dat.get(0..4) {
            Some(ACK) => {
                if dat.len() != 64 {
                    problems.push(format!(
                        "invalid response length: {}, expected: 64",
                        dat.len()
                    ));
                }
                let version_len = num(dat, 4..6) as usize;
                let model_len = num(dat, 22..24) as usize;
                format!(
                    "version number: {}, model name: {}, serial number: {}, mains frequency: {}Hz",
                    text_field(dat, 6..6 + version_len),
                    text_field(dat, 24..24 + model_len),
                    text_field(dat, 40..56),
                    scaled(dat, 56..60, 100.0)
                )
            }
            Some(NACK) => {
                if dat.len() != 4 {
                    problems.push(format!(
                        "invalid response length: {}, expected: 4",
                        dat.len()
                    ));
                }
                "meter not found".to_string()
            }
            _ => {
                problems.push(format!("invalid state: {}", text_field(dat, 0..4)));
                String::new()
            }
        },

        (cmd::REQUEST_UPDATE, Request) => {
            format!("update type: {}", num(dat, 0..2))
        }

        (cmd::CONNECTION_STATE, Request) => format!(
            "heartbeat interval: {}s, led enable: {}",
            num(dat, 0..8),
            num(dat, 8..10)
        ),

        (cmd::LED_RING_ENABLE, Request) => {
            let state = num(dat, 0..2);
            let state_name = match state {
                0 => "disable".to_string(),
                1 => "enable".to_string(),
                other => format!("invalid: {other:02X}"),
            };
            format!("state: {state_name}")
        }

        (cmd::AUTH_REQUEST, _) => {
            let mut summary = match field_u8(dat, 0) {
                Some(byte) => match AuthStatus::from_byte(byte) {
                    Some(status) => format!("state: {}", status.name()),
                    None => {
                        problems.push(format!("invalid state: {byte:02X}"));
                        format!("state: invalid: {byte:02X}")
                    }
                },
                None => String::new(),
            };
            let card_len = num(dat, 2..4) as usize;
            if card_len > 0 {
                let card = text_field(dat, 4..4 + card_len);
                if card == AUTO_START_CARD {
                    summary.push_str(", auto start");
                } else {
                    summary.push_str(&format!(", card number: {card}"));
                }
            }
            summary
        }

        (cmd::METERING_START, Request) => {
            let card_len = num(dat, 0..2) as usize;
            format!(
                "card number: {}, meter value: {}kWh",
                text_field(dat, 2..2 + card_len),
                scaled(dat, 24..32, 1000.0)
            )
        }
        (cmd::METERING_START, Response) => format!(
            "session: {}, timestamp: {}",
            num(dat, 2..10),
            charger_time(num(dat, 10..18))
        ),

        (cmd::METERING_END, Request) => {
            let card_len = num(dat, 0..2) as usize;
            format!(
                "card number: {}, meter value: {}kWh, session: {}, timestamp: {}",
                text_field(dat, 2..2 + card_len),
                scaled(dat, 24..32, 1000.0),
                num(dat, 32..40),
                charger_time(num(dat, 42..50))
            )
        }

        (cmd::STATE_UPDATE, Request) => {
            let state_name = match field_u8(dat, 0) {
                Some(byte) => match ChargerState::from_byte(byte) {
                    Some(state) => state.name().to_string(),
                    None => {
                        problems.push(format!("invalid state: {byte:02X}"));
                        format!("invalid: {byte:02X}")
                    }
                },
                None => String::new(),
            };
            format!(
                "state: {state_name}, is charging: {}, led colour: {}, is locked: {}, \
                 cable current: {}A, meter value: {}kWh, temperature: {}/{}C, session: {}, \
                 voltage: {}/{}/{}V, current: {}/{}/{}A, power factor: {}/{}/{}, \
                 current limit: {}A, frequency: {}Hz",
                num(dat, 6..8),
                led_colour_name(num(dat, 8..10)),
                num(dat, 10..12),
                num(dat, 12..14),
                scaled(dat, 18..26, 1000.0),
                scaled(dat, 52..56, 10.0),
                num(dat, 92..96),
                num(dat, 58..66),
                num(dat, 68..72),
                num(dat, 72..76),
                num(dat, 76..80),
                scaled(dat, 80..84, 100.0),
                scaled(dat, 84..88, 100.0),
                scaled(dat, 88..92, 100.0),
                scaled(dat, 96..100, 1000.0),
                scaled(dat, 100..104, 1000.0),
                scaled(dat, 104..108, 1000.0),
                scaled(dat, 124..128, 10.0),
                scaled(dat, 128..132, 100.0)
            )
        }
        (cmd::STATE_UPDATE, Response) => {
            let timestamp = num(dat, 8..16);
            if timestamp == 0 {
                "not connected to backend".to_string()
            } else {
                format!(
                    "session: {}, timestamp: {}",
                    num(dat, 0..8),
                    charger_time(timestamp)
                )
            }
        }

        (cmd::REMOTE_START, Request) => {
            let card_len = num(dat, 0..2) as usize;
            format!("card number: {}", text_field(dat, 2..2 + card_len))
        }
        (cmd::REMOTE_START | cmd::REMOTE_STOP, Response) => {
            let state_name = match field_u8(dat, 0) {
                Some(byte) => match RemoteStatus::from_byte(byte) {
                    Some(status) => status.name().to_string(),
                    None => {
                        problems.push(format!("invalid state: {byte:02X}"));
                        format!("invalid: {byte:02X}")
                    }
                },
                None => String::new(),
            };
            format!("state: {state_name}")
        }
        (cmd::REMOTE_STOP, Request) => format!("session: {}", num(dat, 0..8)),

        (cmd::GET_CONFIGURATION, Response) => format!(
            "led brightness: {}%, meter update interval: {}s, meter type: {}, \
             auto start: {}, remote start: {}",
            num(dat, 36..38),
            num(dat, 20..24),
            meter_type_name(num(dat, 30..32)),
            num(dat, 54..56),
            num(dat, 66..68)
        ),

        (cmd::SET_CONFIGURATION, Request) => format!(
            "led brightness: {}%, meter update interval: {}s, meter type: {}, \
             auto start: {}, remote start: {}",
            num(dat, 8..10),
            num(dat, 58..66),
            meter_type_name(num(dat, 16..18)),
            num(dat, 38..40),
            num(dat, 74..76)
        ),

        (cmd::SET_SERIAL_NUMBER, _) => {
            format!("serial number: {}", text_field(dat, 0..7))
        }

        (cmd::HARDWARE_INFO, Response) => format!(
            "hardware generation: {}, firmware version: {}",
            text_field(dat, 0..2),
            text_field(dat, 2..6)
        ),

        (cmd::SET_METER_INTERVAL, Request) => {
            let interval = num(dat, 0..4);
            if interval == 0 {
                "interval: off".to_string()
            } else {
                format!("interval: {interval}s")
            }
        }

        (cmd::METER_VALUE, Request) => format!(
            "voltage: {}/{}/{}V, current: {}/{}/{}A, power factor: {}/{}/{}, \
             meter value: {}kWh",
            num(dat, 0..4),
            num(dat, 4..8),
            num(dat, 8..12),
            scaled(dat, 12..16, 100.0),
            scaled(dat, 16..20, 100.0),
            scaled(dat, 20..24, 100.0),
            scaled(dat, 24..28, 1000.0),
            scaled(dat, 28..32, 1000.0),
            scaled(dat, 32..36, 1000.0),
            scaled(dat, 36..44, 1000.0)
        ),

        (cmd::CHARGING_STATE, Request) => {
            let state_name = match field_u8(dat, 0) {
                Some(byte) => match ChargingState::from_byte(byte) {
                    Some(state) => state.name().to_string(),
                    None => {
                        problems.push(format!("invalid state: {byte:02X}"));
                        format!("invalid: {byte:02X}")
                    }
                },
                None => String::new(),
            };
            format!("state: {state_name}")
        }
        (cmd::CHARGING_STATE, Response) => match dat.get(0..4) {
            Some(ACK) => "ack".to_string(),
            _ => {
                problems.push(format!("invalid state: {}", text_field(dat, 0..4)));
                String::new()
            }
        },

        (cmd::SET_CURRENT_LIMIT, Request) => format!(
            "current min: {}A, current limit: {}/{}/{}A",
            scaled(dat, 2..6, 10.0),
            scaled(dat, 6..10, 10.0),
            scaled(dat, 10..14, 10.0),
            scaled(dat, 14..18, 10.0)
        ),

        _ => String::new(),
    }
}
