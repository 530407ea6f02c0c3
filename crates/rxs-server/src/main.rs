//! RXS server binary.
//!
//! # Usage
//!
//! ```bash
//! rxs-server --addr_rxs=0.0.0.0 --port_rxs=1500 --file_users=/etc/rxs/users
//! ```

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use rxs_core::Policy;
use rxs_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// RXS remote file-exchange protocol server
#[derive(Parser, Debug)]
#[command(name = "rxs-server")]
#[command(about = "RXS remote file-exchange server")]
#[command(version)]
struct Args {
    /// Address to bind the control-channel listener to.
    #[arg(long, default_value = "0.0.0.0")]
    addr_rxs: IpAddr,

    /// Port to bind the control-channel listener to.
    #[arg(long, default_value = "1500")]
    port_rxs: u16,

    /// Comma-separated list of permitted client addresses or dotted
    /// prefixes. Empty permits every address.
    #[arg(long, default_value = "")]
    addr_allowed: String,

    /// `daemon` to fork twice and `setsid` before serving.
    #[arg(long)]
    mode: Option<String>,

    /// Path to the user database.
    #[arg(long)]
    file_users: String,

    /// Process id to `SIGUSR1` once the listener is ready.
    #[arg(long)]
    pid: Option<i32>,

    /// Reject `authorization` requests that don't request encoder mode.
    #[arg(long)]
    encoder: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.mode.as_deref() == Some("daemon") {
        rxs_server::daemon::daemonize()?;
    }

    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run(args))
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("rxs-server starting");

    let policy = Policy {
        allow_list: Policy::parse_addr_list(&args.addr_allowed),
        deny_list: Vec::new(),
        user_db_path: args.file_users.into(),
        require_encoder: args.encoder,
    };

    let config =
        ServerRuntimeConfig { bind_address: SocketAddr::new(args.addr_rxs, args.port_rxs), policy };

    let server = Server::bind(config).await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    if let Some(pid) = args.pid {
        rxs_server::daemon::notify_ready(pid)?;
    }

    server.run().await?;

    Ok(())
}
