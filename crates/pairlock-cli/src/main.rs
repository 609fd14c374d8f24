//! Pairlock command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Generate an identity, a signed pre-key and the publishable bundle
//! pairlock keygen --key-id 1
//!
//! # Run a deterministic two-party exchange with shuffled delivery
//! pairlock simulate --messages 500 --seed 7 --reorder
//!
//! # Same, with ratchet settings from a JSON file
//! pairlock simulate --config ratchet.json --rotation-interval 25
//! ```

mod simulation;

use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::PathBuf,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::{Args, Parser, Subcommand};
use pairlock_crypto::{
    RatchetConfig, SystemEntropy, build_bundle, create_identity, create_pre_key,
    identity_verifying_key,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::simulation::{Simulation, SimulationConfig};

/// Pairlock session layer tool
#[derive(Parser, Debug)]
#[command(name = "pairlock")]
#[command(about = "Pairlock key generation and session simulation")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an identity and signed pre-key, print them as JSON
    Keygen {
        /// Identifier stored in the signed pre-key
        #[arg(long)]
        key_id: Option<u32>,
    },
    /// Run a local two-party conversation and print a summary
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Messages each party sends
    #[arg(short, long, default_value = "200")]
    messages: u32,

    /// Seed for key generation, nonces and delivery order
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Deliver packets in random order
    #[arg(long)]
    reorder: bool,

    /// JSON file with ratchet settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root key rotation interval (0 disables rotation)
    #[arg(long)]
    rotation_interval: Option<u32>,

    /// Age past which skipped keys are evicted
    #[arg(long)]
    max_skipped_age: Option<u32>,

    /// Largest forward jump accepted per packet
    #[arg(long)]
    max_skip: Option<u32>,
}

impl SimulateArgs {
    fn ratchet_config(&self) -> Result<RatchetConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => RatchetConfig::default(),
        };

        if let Some(interval) = self.rotation_interval {
            config.rotation_interval = interval;
        }
        if let Some(age) = self.max_skipped_age {
            config.max_skipped_age = age;
        }
        if let Some(max_skip) = self.max_skip {
            config.max_skip = max_skip;
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let output = match cli.command {
        Command::Keygen { key_id } => keygen(key_id),
        Command::Simulate(args) => {
            let config = SimulationConfig {
                messages: args.messages,
                seed: args.seed,
                reorder: args.reorder,
                ratchet: args.ratchet_config()?,
            };
            tracing::info!(?config, "starting simulation");

            let report = Simulation::new(config)?.run()?;
            serde_json::to_value(report)?
        },
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn keygen(key_id: Option<u32>) -> serde_json::Value {
    let identity = create_identity(&SystemEntropy);
    let pre_key = create_pre_key(&SystemEntropy);
    let bundle = build_bundle(&identity, &pre_key, key_id);

    tracing::info!(fingerprint = %identity.public_key().fingerprint(), "generated identity");

    serde_json::json!({
        "identity": {
            "publicKey": identity.public_key().to_base64(),
            "privateKey": STANDARD.encode(identity.private_key().as_bytes()),
        },
        "preKey": {
            "publicKey": pre_key.public_key().to_base64(),
            "privateKey": STANDARD.encode(pre_key.private_key().as_bytes()),
        },
        "verifyingKey": STANDARD.encode(identity_verifying_key(&identity).to_bytes()),
        "bundle": bundle,
    })
}
