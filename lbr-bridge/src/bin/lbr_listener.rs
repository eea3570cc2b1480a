//! lbr-listener - receive and inspect LBR sensor frames
//!
//! Plays the remote-consumer role for bench testing the bridge: binds a TCP
//! or UDP port, parses every received line and logs it.
//!
//! ```bash
//! lbr-listener --bind 0.0.0.0:30007
//! RUST_LOG=debug lbr-listener --bind 0.0.0.0:30007 --transport udp
//! ```

use clap::Parser;
use lbr_bridge::streaming::{FrameListener, ListenerEvent};
use lbr_bridge::{ConnectionType, Error, Result, ShutdownFlag};

#[derive(Parser, Debug)]
#[command(name = "lbr-listener", version, about = "Receive LBR sensor frames")]
struct Args {
    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0:30007")]
    bind: String,

    /// Transport kind
    #[arg(short, long, value_enum, default_value_t = ConnectionType::Tcp)]
    transport: ConnectionType,

    /// Log every Nth frame at info level (0 = never)
    #[arg(long, default_value_t = 100)]
    every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let listener = FrameListener::bind(&args.bind, args.transport)?;
    log::info!(
        "Listening for sensor frames on {} ({})",
        listener.local_addr()?,
        args.transport
    );

    let shutdown = ShutdownFlag::new();
    let stop = shutdown.clone();
    ctrlc::set_handler(move || {
        stop.request();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut count = 0u64;
    listener.run(&shutdown, |event| match event {
        ListenerEvent::PeerConnected(addr) => log::info!("Bridge connected: {}", addr),
        ListenerEvent::PeerDisconnected(addr) => log::info!("Bridge disconnected: {}", addr),
        ListenerEvent::Frame(snapshot) => {
            count += 1;
            if args.every > 0 && count % args.every == 0 {
                log::info!(
                    "#{} t={}ns q={:?} tau={:?}",
                    count,
                    snapshot.timestamp_ns(),
                    snapshot.positions(),
                    snapshot.torques()
                );
            } else {
                log::debug!("#{} t={}ns", count, snapshot.timestamp_ns());
            }
        }
        ListenerEvent::Malformed { line, error } => {
            log::warn!("Malformed line ({}): {}", error, line)
        }
    })?;

    Ok(())
}
