//! Relay server binary.
//!
//! Accepts TCP clients, pairs them two at a time in strict arrival order,
//! announces a role to each peer, and relays opaque messages between the
//! paired peers until either side disconnects.

use clap::Parser;
use relay_session::{
    listen_tcp, run_pairing, run_reaper, SessionConfig, SessionEvent, SessionRegistry,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::RelayConfig;

/// Two-party pairing and relay server
#[derive(Parser, Debug)]
#[command(
    name = "matchwire",
    version,
    about = "Pairs TCP clients and relays opaque messages between them"
)]
struct Args {
    /// Listen address, e.g. 0.0.0.0:8080 (overrides the config file port)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Relay discipline: unordered or turn-based (overrides the config file)
    #[arg(long)]
    mode: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(long, default_value = "relay.yaml")]
    config: PathBuf,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("matchwire={}", args.log_level).parse()?)
        .add_directive(format!("relay_session={}", args.log_level).parse()?)
        .add_directive(format!("relay_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("Starting matchwire relay v{}", env!("CARGO_PKG_VERSION"));

    let mut relay_config = RelayConfig::load_from_file(&args.config)?;
    if let Some(mode) = args.mode {
        relay_config.mode = mode.parse().map_err(anyhow::Error::msg)?;
    }
    let listen_addr = args.listen.unwrap_or_else(|| {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), relay_config.listen_port)
    });

    let listener = listen_tcp(listen_addr, relay_config.backlog)?;
    info!(
        "Listening on {} (mode: {}, backlog: {})",
        listener.local_addr()?,
        relay_config.mode,
        relay_config.backlog
    );

    // One registry + one reaper for the whole process; sessions are handed
    // to the reaper as they are spawned and reclaimed as they exit.
    let registry = Arc::new(SessionRegistry::new());
    let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_reaper(Arc::clone(&registry), reaper_rx));

    // Observability sink: the core emits events, this binary logs them.
    let (event_tx, mut event_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Relayed {
                    session,
                    from,
                    bytes,
                } => debug!(%session, "relayed {bytes} bytes from {from}"),
                other => debug!("{other:?}"),
            }
        }
    });

    let session_config = SessionConfig {
        mode: relay_config.mode,
        read_buffer_bytes: relay_config.read_buffer_bytes,
    };
    run_pairing(listener, session_config, registry, reaper_tx, event_tx).await;

    Ok(())
}
