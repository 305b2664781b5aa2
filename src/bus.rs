//! The cooperative I/O loop tying the serial port, the frame scanner, the
//! observer and the ChargePoint actor together.
//!
//! One thread owns everything. Each iteration drains the receive queue,
//! scans for frames, lets the actor respond, and flushes the outbox; then it
//! sleeps briefly, runs the actor's timers, and flushes again. The only
//! suspension points are the poll sleep and the pre-send bus-idle delay.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, trace, warn};

use crate::capture::{self, CaptureWriter, Record};
use crate::chargepoint::ChargePoint;
use crate::clock::SystemClock;
use crate::error::Result;
use crate::frame::{self, FrameScanner};
use crate::message;
use crate::packet::Packet;

/// Serial settings for the charger bus.
const BAUD_RATE: u32 = 38_400;
/// Delay between polls of the receive queue.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// The half-duplex bus must be idle at least this long before we transmit.
const BUS_IDLE: Duration = Duration::from_millis(100);

pub struct BusConfig {
    /// Serial device connected to the bus.
    pub device: String,
    /// Observe only; the actor is never constructed and nothing is sent.
    pub monitor: bool,
    /// Record raw traffic to this file.
    pub capture: Option<PathBuf>,
    /// Cards accepted by the authentication handler.
    pub allowed_cards: HashSet<String>,
}

/// Open the bus serial device: 8N1, no flow control.
pub fn open_port(device: &str) -> Result<Box<dyn serialport::SerialPort>> {
    let port = serialport::new(device, BAUD_RATE)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(10))
        .open()?;
    info!("opened {device} at {BAUD_RATE} baud");
    Ok(port)
}

/// Run against the live bus until the process is stopped or I/O fails.
pub fn run(config: &BusConfig) -> Result<()> {
    let mut port = open_port(&config.device)?;
    let mut capture = match &config.capture {
        Some(path) => Some(CaptureWriter::append(path)?),
        None => None,
    };
    let mut actor = if config.monitor {
        info!("monitoring bus, nothing will be sent");
        None
    } else {
        Some(ChargePoint::new(
            config.allowed_cards.clone(),
            Arc::new(SystemClock),
        ))
    };
    let mut scanner = FrameScanner::new();

    info!("reading from {}; press ^C to stop", config.device);
    loop {
        let waiting = port.bytes_to_read()? as usize;
        if waiting > 0 {
            let mut chunk = vec![0u8; waiting];
            let n = match port.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
                Err(e) => return Err(e.into()),
            };
            chunk.truncate(n);
            if n > 0 {
                trace!("received {n} byte(s): {}", capture::hex_line(&chunk));
                if let Some(c) = capture.as_mut() {
                    c.record("received", &chunk)?;
                }
                scanner.extend(&chunk);
                process_frames(&mut scanner, actor.as_mut(), port.as_mut(), &mut capture)?;
            }
        }

        thread::sleep(POLL_INTERVAL);

        if let Some(cp) = actor.as_mut() {
            cp.tick();
            drain_outbox(cp, port.as_mut(), &mut capture)?;
        }
    }
}

/// Replay a capture file through the scanner and observer, offline.
pub fn replay(path: &Path) -> Result<()> {
    info!("replaying captured data from {}", path.display());
    let mut scanner = FrameScanner::new();
    capture::replay(path, |record| match record {
        Record::Comment(comment) => info!("capture: {comment}"),
        Record::Bytes(bytes) => {
            scanner.extend(&bytes);
            while let Some(scanned) = scanner.next_payload() {
                match scanned {
                    Ok(payload) => {
                        decode_and_observe(&payload);
                    }
                    Err(e) => warn!("{e}"),
                }
            }
        }
    })
}

/// Pull every closed frame out of the scanner and feed it to the actor.
///
/// All packets queued by one `respond` are flushed before the next inbound
/// packet is processed.
fn process_frames(
    scanner: &mut FrameScanner,
    mut actor: Option<&mut ChargePoint>,
    port: &mut dyn serialport::SerialPort,
    capture: &mut Option<CaptureWriter>,
) -> Result<()> {
    while let Some(scanned) = scanner.next_payload() {
        let payload = match scanned {
            Ok(payload) => payload,
            Err(e) => {
                // Malformed frame: log, skip, keep scanning.
                warn!("{e}");
                continue;
            }
        };
        let Some(packet) = decode_and_observe(&payload) else {
            continue;
        };
        if let Some(cp) = actor.as_deref_mut() {
            cp.respond(&packet);
            drain_outbox(cp, port, capture)?;
        }
    }
    Ok(())
}

/// Decode and log one frame payload. Schema problems are logged, not fatal.
fn decode_and_observe(payload: &[u8]) -> Option<Packet> {
    match Packet::from_payload(payload) {
        Ok(packet) => {
            let observation = message::observe(&packet);
            info!("{observation}");
            for problem in &observation.problems {
                warn!("command {:02X}: {problem}", packet.cmd);
            }
            Some(packet)
        }
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

/// Write out everything the actor queued, oldest-queued last.
fn drain_outbox(
    cp: &mut ChargePoint,
    port: &mut dyn serialport::SerialPort,
    capture: &mut Option<CaptureWriter>,
) -> Result<()> {
    while let Some(packet) = cp.next_outgoing() {
        // Half-duplex: the bus must be quiet before we transmit.
        thread::sleep(BUS_IDLE);
        let data = frame::encode(&packet.to_payload())?;
        info!("sending {}", message::observe(&packet));
        port.write_all(&data)?;
        port.flush()?;
        if let Some(c) = capture.as_mut() {
            c.record("sending", &data)?;
        }
    }
    Ok(())
}
