use std::collections::HashSet;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use homeline::bus::{self, BusConfig};

/// Stand-alone ChargePoint controller for EVBox HomeLine chargers.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Monitor bus traffic only, do not send any messages.
    #[arg(long)]
    monitor: bool,

    /// Capture bus traffic to a file.
    #[arg(long, value_name = "FILE")]
    capture: Option<PathBuf>,

    /// Replay captured data from a file instead of the live bus.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Serial device connected to the charger bus.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Card number allowed to charge (14 hex digits, repeatable).
    #[arg(long = "card", value_name = "NUMBER")]
    cards: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut allowed_cards = HashSet::new();
    for card in &cli.cards {
        let card = card.to_ascii_uppercase();
        if card.len() != 14 || !card.bytes().all(|b| b.is_ascii_hexdigit()) {
            eprintln!("Invalid card number: {card} (expected 14 hex digits)");
            process::exit(1);
        }
        allowed_cards.insert(card);
    }

    let result = match cli.replay {
        Some(path) => bus::replay(&path),
        None => bus::run(&BusConfig {
            device: cli.device,
            monitor: cli.monitor,
            capture: cli.capture,
            allowed_cards,
        }),
    };

    if let Err(e) = result {
        eprintln!("Fatal: {e}");
        process::exit(1);
    }
}
