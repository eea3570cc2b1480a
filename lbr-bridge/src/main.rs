//! lbr-bridge - LBR sensor telemetry daemon
//!
//! Streams joint positions and measured torques to a remote consumer,
//! reconnecting automatically whenever the link drops.
//!
//! ```bash
//! lbr-bridge --config /etc/lbr-bridge.toml
//! lbr-bridge --host 172.31.1.10 --port 30007 --transport udp
//! ```

use clap::Parser;
use crossbeam_channel::bounded;
use lbr_bridge::{Bridge, Config, ConnectionType, Error, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lbr-bridge", version, about = "LBR sensor telemetry bridge")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override remote consumer host
    #[arg(long)]
    host: Option<String>,

    /// Override remote consumer port
    #[arg(long)]
    port: Option<u16>,

    /// Override transport kind
    #[arg(long, value_enum)]
    transport: Option<ConnectionType>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(kind) = self.transport {
            config.network.connection_type = kind;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("lbr-bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => log::info!("Using config: {}", path.display()),
        None => log::info!("Using built-in defaults"),
    }
    log::info!(
        "Remote consumer: {} ({})",
        config.network.address(),
        config.network.connection_type
    );

    let bridge = Bridge::from_config(&config)?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("lbr-bridge running. Press Ctrl-C to stop.");
    let _ = signal_rx.recv();
    log::info!("Received shutdown signal");

    bridge.close();
    log::info!("lbr-bridge stopped");
    Ok(())
}
