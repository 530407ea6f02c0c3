//! RXS client binary.
//!
//! # Usage
//!
//! ```bash
//! rxs-client put alice:secret@host:1500 ./local.bin remote.bin
//! rxs-client get_e alice:secret@host:1500 ./local.bin remote.bin
//! rxs-client cli alice:secret@host:1500
//! ```

// This binary's entire purpose is talking to a human on a terminal.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::Write as _;
use std::net::SocketAddr;

use clap::Parser;
use rxs_client::{Client, stream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// RXS remote file-exchange protocol client
#[derive(Parser, Debug)]
#[command(name = "rxs-client")]
#[command(about = "RXS remote file-exchange client")]
#[command(version)]
struct Args {
    /// `put | get | cli` or their encoder variants `put_e | get_e | cli_e`.
    verb: String,

    /// `user:pass@host:port [local_file] [remote_file]`, or the six
    /// positional arguments of the legacy form
    /// (`user pass host port local_file remote_file`).
    rest: Vec<String>,
}

struct Target {
    user: String,
    pass: String,
    addr: SocketAddr,
    local_file: Option<String>,
    remote_file: Option<String>,
}

fn parse_target(rest: &[String]) -> Result<Target, String> {
    let Some(first) = rest.first() else {
        return Err("missing connection target".to_string());
    };

    if let Some(at) = first.find('@') {
        let (userpass, hostport) = first.split_at(at);
        let hostport = &hostport[1..];
        let mut up = userpass.splitn(2, ':');
        let user = up.next().ok_or("expected `user:pass@host:port`")?.to_string();
        let pass = up.next().ok_or("expected `user:pass@host:port`")?.to_string();
        let mut hp = hostport.rsplitn(2, ':');
        let port: u16 = hp.next().ok_or("missing port")?.parse().map_err(|_| "invalid port")?;
        let host = hp.next().ok_or("missing host")?;
        let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| format!("invalid address: {e}"))?;
        Ok(Target { user, pass, addr, local_file: rest.get(1).cloned(), remote_file: rest.get(2).cloned() })
    } else if rest.len() == 6 {
        let port: u16 = rest[3].parse().map_err(|_| "invalid port")?;
        let addr: SocketAddr =
            format!("{}:{port}", rest[2]).parse().map_err(|e| format!("invalid address: {e}"))?;
        Ok(Target {
            user: rest[0].clone(),
            pass: rest[1].clone(),
            addr,
            local_file: Some(rest[4].clone()),
            remote_file: Some(rest[5].clone()),
        })
    } else {
        Err("expected `user:pass@host:port [local] [remote]` or six legacy arguments".to_string())
    }
}

async fn put(client: &mut Client, local_file: &str, remote_file: &str) -> Result<(), rxs_client::ClientError> {
    let data = tokio::fs::read(local_file).await.map_err(rxs_core::RxsError::Transport)?;
    let stream_id = client.fopen(remote_file, "w").await?;
    stream::open_data_channel(client, stream_id).await?;
    stream::fwrite(client, stream_id, &data).await?;
    client.fclose(stream_id).await?;
    Ok(())
}

async fn get(client: &mut Client, remote_file: &str, local_file: &str) -> Result<(), rxs_client::ClientError> {
    let size = client.filesize(remote_file).await?;
    #[allow(clippy::cast_sign_loss)]
    let size = size.max(0) as u32;
    let stream_id = client.fopen(remote_file, "r").await?;
    let data = if size == 0 {
        Vec::new()
    } else {
        stream::open_data_channel(client, stream_id).await?;
        stream::fread(client, stream_id, size).await?
    };
    client.fclose(stream_id).await?;
    tokio::fs::write(local_file, &data).await.map_err(rxs_core::RxsError::Transport)?;
    Ok(())
}

async fn repl(client: &mut Client) -> u32 {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("rxs> ");
        let _ = std::io::stdout().flush();

        let Ok(Some(line)) = stdin.next_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match client.ls(line).await {
            Ok(local_path) => match tokio::fs::read_to_string(&local_path).await {
                Ok(contents) => print!("{contents}"),
                Err(e) => println!("rxs-client: failed to read downloaded output: {e}"),
            },
            Err(e) => println!("rxs-client: {} ({})", e, e.code()),
        }
    }
    client.last_error()
}

async fn run() -> u32 {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let encoder = args.verb.ends_with("_e");
    let verb = args.verb.trim_end_matches("_e");

    let target = match parse_target(&args.rest) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("rxs-client: {e}");
            return 1;
        },
    };

    let mut client = match Client::connect(target.addr, encoder).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("rxs-client: connect failed: {e}");
            return e.code();
        },
    };

    if let Err(e) = client.authorization(&target.user, &target.pass).await {
        eprintln!("rxs-client: authorization failed: {e}");
        return e.code();
    }

    let result = match verb {
        "put" => match (&target.local_file, &target.remote_file) {
            (Some(local), Some(remote)) => put(&mut client, local, remote).await,
            _ => {
                eprintln!("rxs-client: put requires local and remote file arguments");
                return 1;
            },
        },
        "get" => match (&target.remote_file, &target.local_file) {
            (Some(remote), Some(local)) => get(&mut client, remote, local).await,
            _ => {
                eprintln!("rxs-client: get requires local and remote file arguments");
                return 1;
            },
        },
        "cli" => return repl(&mut client).await,
        other => {
            eprintln!("rxs-client: unrecognized verb {other:?} (expected put|get|cli[_e])");
            return 1;
        },
    };

    if let Err(e) = result {
        eprintln!("rxs-client: {e}");
        return e.code();
    }

    0
}

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code as i32);
}
