//! The ChargePoint role: react to charger messages, drive configuration.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::message::{self, cmd, AuthStatus, ChargingState};
use crate::packet::{Packet, ADDR_BROADCAST, ADDR_CHARGER, ADDR_CP};

/// Session identifier in metering replies. Sessions are not tracked.
const SESSION: u32 = 0;

/// Heartbeat interval pushed to the charger during configuration.
const HEARTBEAT_INTERVAL_SECS: u32 = 60;

/// Configuration block written in phase 2: write mask FFFFFFFF, LED
/// brightness 30%, serial meter, auto start on, meter update every 60 s,
/// remote start off.
const CONFIGURATION_TEMPLATE: &str = concat!(
    "FFFFFFFF",
    "1E",
    "030000",
    "01",
    "01000100000000000000",
    "01",
    "000000003C",
    "00000384",
    "0000003C",
    "01000000",
    "00",
    "03E8010000",
);

/// Progress of the post-registration configuration walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Idle,
    Phase1,
    Phase2,
    Phase3,
}

/// Timing tunables for the actor.
#[derive(Debug, Clone)]
pub struct CpConfig {
    /// How long to wait for a response before retransmitting.
    pub retry_interval: Duration,
    /// Settle time between actor-initiated configuration sends.
    pub configure_delay: Duration,
    /// Retransmission cap; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(2),
            configure_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

/// Emulated ChargePoint controller.
///
/// A single-threaded reactive state machine: `respond` consumes one inbound
/// packet, `tick` handles retransmission and the configuration walk, and the
/// I/O loop drains the outbox between the two.
pub struct ChargePoint {
    // Drained front-to-back by the I/O loop while handlers also push at the
    // front, so a handler that queues several packets puts the newest on the
    // wire first. Odd as that looks, it matches the observed bus traffic;
    // see the charging-state handler tests which pin the order.
    outbox: VecDeque<Packet>,
    last_sent: Packet,
    last_sent_at: Instant,
    awaiting_response: bool,
    retries: u32,
    charger_lost: bool,
    init_phase: InitPhase,
    allowed_cards: HashSet<String>,
    config: CpConfig,
    clock: Arc<dyn Clock>,
}

impl ChargePoint {
    pub fn new(allowed_cards: HashSet<String>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(allowed_cards, clock, CpConfig::default())
    }

    pub fn with_config(
        allowed_cards: HashSet<String>,
        clock: Arc<dyn Clock>,
        config: CpConfig,
    ) -> Self {
        // Kick any already-running charger back into registration so the
        // handshake is observed from the start.
        let restart = Packet::new(ADDR_BROADCAST, ADDR_CP, cmd::RESTART_REGISTRATION, "");
        let now = clock.now();
        let mut cp = Self {
            outbox: VecDeque::new(),
            last_sent: restart.clone(),
            last_sent_at: now,
            awaiting_response: false,
            retries: 0,
            charger_lost: false,
            init_phase: InitPhase::Idle,
            allowed_cards,
            config,
            clock,
        };
        cp.push(restart, false);
        cp
    }

    /// Next packet to put on the wire, if any.
    pub fn next_outgoing(&mut self) -> Option<Packet> {
        self.outbox.pop_front()
    }

    pub fn init_phase(&self) -> InitPhase {
        self.init_phase
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Set once the retry cap is exhausted without an answer.
    pub fn charger_lost(&self) -> bool {
        self.charger_lost
    }

    /// React to one inbound packet.
    pub fn respond(&mut self, message: &Packet) {
        if message.dst != ADDR_BROADCAST && message.dst != ADDR_CP {
            debug!("message for {:02X} is not meant for us", message.dst);
            return;
        }

        match message.cmd {
            cmd::REGISTER => self.handle_register(message),

            // Chain into a configuration read; the charger's answer is
            // overridden later by the phase-2 write.
            cmd::GET_METER_INFO => {
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::GET_CONFIGURATION, ""),
                    false,
                );
            }

            cmd::HEARTBEAT => {
                self.push(Packet::new(message.src, ADDR_CP, cmd::HEARTBEAT, ""), false);
            }

            cmd::AUTH_REQUEST => self.handle_auth(message),

            cmd::METERING_START => {
                let dat = format!("01{SESSION:08X}{}", self.timestamp());
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::METERING_START, dat),
                    false,
                );
                // The protocol describes a second response; chargers are
                // happy without it.
            }

            cmd::METERING_END => {
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::METERING_END, "01"),
                    false,
                );
            }

            cmd::STATE_UPDATE => {
                let dat = format!("{SESSION:08X}{}", self.timestamp());
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::STATE_UPDATE, dat),
                    false,
                );
            }

            cmd::REMOTE_START
            | cmd::REMOTE_STOP
            | cmd::GET_CONFIGURATION
            | cmd::SET_CONFIGURATION
            | cmd::SET_CURRENT_LIMIT => self.response_received(),

            cmd::METER_VALUE => {
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::METER_VALUE, ""),
                    false,
                );
            }

            cmd::CHARGING_STATE => self.handle_charging_state(message),

            other if message::lookup(other).is_some() || message::is_known_undocumented(other) => {}

            other => warn!("no handler for command {other:02X}"),
        }
    }

    /// Handle time-driven work: retransmission and the configuration walk.
    pub fn tick(&mut self) {
        self.check_retransmit();
        if self.init_phase != InitPhase::Idle {
            self.configure_charger();
        }
    }

    fn handle_register(&mut self, message: &Packet) {
        let Some(request) = message::register_request(&message.dat) else {
            warn!("malformed register request: {:?}", message.dat);
            return;
        };
        // Serial echoed back, newly assigned address, hardware generation.
        let dat = format!("{}{ADDR_CHARGER:02X}03", request.serial);
        self.push(Packet::new(message.src, ADDR_CP, cmd::REGISTER, dat), false);
        info!(
            "charger {} registered at address {ADDR_CHARGER:02X}",
            request.serial
        );
        self.init_phase = InitPhase::Phase1;
    }

    fn handle_auth(&mut self, message: &Packet) {
        let Some(card) = message::auth_card_number(&message.dat) else {
            warn!("malformed authentication request: {:?}", message.dat);
            return;
        };
        let granted =
            card == message::AUTO_START_CARD || self.allowed_cards.contains(&card);
        let status = if granted {
            AuthStatus::Granted
        } else {
            AuthStatus::Denied
        };
        info!("card {card}: {}", status.name());
        let dat = format!(
            "{:02X}{:02X}{card:0<width$}FFFF",
            status.to_byte(),
            card.len(),
            width = message::CARD_FIELD_WIDTH
        );
        self.push(
            Packet::new(message.src, ADDR_CP, cmd::AUTH_REQUEST, dat),
            false,
        );
    }

    fn handle_charging_state(&mut self, message: &Packet) {
        self.push(
            Packet::new(message.src, ADDR_CP, cmd::CHARGING_STATE, message::ACK),
            false,
        );
        let Some((_, state)) = message::charging_state(&message.dat) else {
            return;
        };
        match state {
            Some(ChargingState::Ready) => {
                // 6.0 A on all phases while the vehicle negotiates.
                let dat = message::current_limit_dat(60, 60, 60, 60);
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::SET_CURRENT_LIMIT, dat),
                    true,
                );
            }
            Some(ChargingState::Charging) => {
                // Full 16.0 A once charging has started.
                let dat = message::current_limit_dat(60, 160, 160, 160);
                self.push(
                    Packet::new(message.src, ADDR_CP, cmd::SET_CURRENT_LIMIT, dat),
                    true,
                );
            }
            _ => {}
        }
    }

    fn check_retransmit(&mut self) {
        if !self.awaiting_response {
            return;
        }
        if self.clock.now().duration_since(self.last_sent_at) < self.config.retry_interval {
            return;
        }
        if let Some(cap) = self.config.max_retries
            && self.retries >= cap
        {
            warn!(
                "no response to command {:02X} after {} attempt(s), giving up",
                self.last_sent.cmd,
                self.retries + 1
            );
            self.awaiting_response = false;
            self.charger_lost = true;
            return;
        }
        self.retries += 1;
        debug!(
            "response to command {:02X} overdue, retransmitting",
            self.last_sent.cmd
        );
        let packet = self.last_sent.clone();
        self.push(packet, true);
    }

    fn configure_charger(&mut self) {
        // Let the charger settle between configuration writes.
        if self.clock.now().duration_since(self.last_sent_at) < self.config.configure_delay {
            return;
        }
        match self.init_phase {
            InitPhase::Idle => {}
            InitPhase::Phase1 => {
                // Heartbeat every 60 s, LED ring off. 0x1B has no response,
                // so nothing to track.
                let dat = format!("{HEARTBEAT_INTERVAL_SECS:08X}00");
                self.push(
                    Packet::new(ADDR_CHARGER, ADDR_CP, cmd::CONNECTION_STATE, dat),
                    false,
                );
                self.init_phase = InitPhase::Phase2;
            }
            InitPhase::Phase2 => {
                self.push(
                    Packet::new(
                        ADDR_CHARGER,
                        ADDR_CP,
                        cmd::SET_CONFIGURATION,
                        CONFIGURATION_TEMPLATE,
                    ),
                    true,
                );
                self.init_phase = InitPhase::Phase3;
            }
            InitPhase::Phase3 => {
                // A remote start could be issued here; chargers start fine
                // without one.
                self.init_phase = InitPhase::Idle;
            }
        }
    }

    /// A response to our last tracked request arrived.
    fn response_received(&mut self) {
        self.awaiting_response = false;
        self.retries = 0;
    }

    /// Queue a packet, optionally arming the retransmission check.
    fn push(&mut self, packet: Packet, track_response: bool) {
        if track_response {
            self.awaiting_response = true;
            self.last_sent = packet.clone();
        }
        self.last_sent_at = self.clock.now();
        self.outbox.push_front(packet);
    }

    /// Current time as 8 uppercase hex chars of seconds since 2000-01-01.
    fn timestamp(&self) -> String {
        format!("{:08X}", self.clock.epoch_seconds() & 0xFFFF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn make_cp() -> (ChargePoint, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cp = ChargePoint::new(HashSet::new(), clock.clone());
        (cp, clock)
    }

    #[test]
    fn test_construction_broadcasts_restart_registration() {
        let (mut cp, _clock) = make_cp();
        let packet = cp.next_outgoing().unwrap();
        assert_eq!(packet.dst, ADDR_BROADCAST);
        assert_eq!(packet.src, ADDR_CP);
        assert_eq!(packet.cmd, cmd::RESTART_REGISTRATION);
        assert_eq!(packet.dat, "");
        assert!(cp.next_outgoing().is_none());
        assert!(!cp.awaiting_response());
    }

    #[test]
    fn test_configuration_template_shape() {
        assert_eq!(CONFIGURATION_TEMPLATE.len(), 86);
        assert!(CONFIGURATION_TEMPLATE.starts_with("FFFFFFFF1E"));
    }

    #[test]
    fn test_timestamp_format() {
        let clock = Arc::new(ManualClock::new());
        clock.set_epoch_seconds(0x1234_5678);
        let cp = ChargePoint::new(HashSet::new(), clock);
        assert_eq!(cp.timestamp(), "12345678");
    }

    #[test]
    fn test_heartbeat_echo() {
        let (mut cp, _clock) = make_cp();
        cp.next_outgoing();
        cp.respond(&Packet::new(ADDR_CP, ADDR_CHARGER, cmd::HEARTBEAT, ""));
        let reply = cp.next_outgoing().unwrap();
        assert_eq!(reply.dst, ADDR_CHARGER);
        assert_eq!(reply.src, ADDR_CP);
        assert_eq!(reply.cmd, cmd::HEARTBEAT);
        assert_eq!(reply.dat, "");
    }

    #[test]
    fn test_meter_info_chains_configuration_read() {
        let (mut cp, _clock) = make_cp();
        cp.next_outgoing();
        cp.respond(&Packet::new(ADDR_CP, ADDR_CHARGER, cmd::GET_METER_INFO, ""));
        let reply = cp.next_outgoing().unwrap();
        assert_eq!(reply.cmd, cmd::GET_CONFIGURATION);
        assert_eq!(reply.dat, "");
    }

    #[test]
    fn test_meter_value_gets_empty_reply() {
        let (mut cp, _clock) = make_cp();
        cp.next_outgoing();
        let dat = "0".repeat(44);
        cp.respond(&Packet::new(ADDR_CP, ADDR_CHARGER, cmd::METER_VALUE, dat));
        let reply = cp.next_outgoing().unwrap();
        assert_eq!(reply.cmd, cmd::METER_VALUE);
        assert_eq!(reply.dat, "");
    }

    #[test]
    fn test_undocumented_command_is_ignored() {
        let (mut cp, _clock) = make_cp();
        cp.next_outgoing();
        cp.respond(&Packet::new(ADDR_CP, ADDR_CHARGER, 0xF3, "00"));
        assert!(cp.next_outgoing().is_none());
    }
}
