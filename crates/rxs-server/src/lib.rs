//! RXS server.
//!
//! # Architecture
//!
//! One [`tokio::net::TcpListener`] accept loop, one spawned task per
//! accepted connection. Each task owns a private [`Session`] — there is no
//! shared mutable state between sessions, matching the isolation contract
//! the original multi-process server gave by forking (see `DESIGN.md`).
//!
//! # Components
//!
//! - [`Server`]: binds the listener and runs the accept loop.
//! - [`handlers::dispatch`]: routes one decoded request to its OS action.
//! - [`Session`]: per-connection protocol + I/O state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod daemon;
mod error;
pub mod handlers;
pub mod session;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub use error::ServerError;
use rxs_core::{ControlChannel, Errno, Policy};
use rxs_proto::{Operation, Packet, PacketType};
pub use session::Session;
use tokio::net::{TcpListener, TcpStream};

/// Runtime configuration for the accept loop.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind the control-channel listener to.
    pub bind_address: SocketAddr,
    /// Address allow/deny lists and the user database path.
    pub policy: Policy,
}

/// The bound RXS server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    policy: Arc<Policy>,
}

impl Server {
    /// Bind a listener at `config.bind_address` with `SO_REUSEADDR` applied
    /// by the OS default for `TcpListener::bind`.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_address).await?;
        Ok(Self { listener, policy: Arc::new(config.policy) })
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, spawning one task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "rxs-server listening");

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    let policy = Arc::clone(&self.policy);
                    tokio::spawn(async move {
                        handle_connection(socket, peer, policy).await;
                    });
                },
                Err(e) => tracing::warn!("accept failed: {e}"),
            }
        }
    }
}

/// Run one connection's full session lifecycle: policy check, then the
/// `recv_frame -> dispatch -> send_frame` loop until the channel closes.
async fn handle_connection(socket: TcpStream, peer: SocketAddr, policy: Arc<Policy>) {
    if let Err(e) = socket.set_nodelay(true) {
        tracing::debug!(%peer, "failed to set TCP_NODELAY: {e}");
    }

    let IpAddr::V4(peer_ip) = peer.ip() else {
        tracing::info!(%peer, "rejecting non-IPv4 peer");
        return;
    };

    if !policy.permits(peer_ip) {
        tracing::info!(%peer, "address rejected by policy, closing before any read");
        return;
    }

    let mut channel = ControlChannel::new(socket);
    let mut session = Session::new(peer);

    loop {
        let packet = match channel.recv_frame().await {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(%peer, "control channel closed: {e}");
                break;
            },
        };

        let operation = packet.header.operation_enum().unwrap_or(Operation::Undef);
        let uid = packet.header.uid();

        let outcome =
            handlers::dispatch(&mut session, &policy, &mut channel, uid, operation, &packet.payload).await;

        let (response, deny_after_reply) = match outcome {
            Ok(handlers::DispatchOutcome::Reply(slot)) => {
                (Some(Packet::new(PacketType::Ok, uid, operation, slot.encode())), false)
            },
            Ok(handlers::DispatchOutcome::AlreadyHandled) => (None, false),
            Err(errno) => {
                let deny = errno == Errno::Eacces && !session.core.authenticated;
                (Some(Packet::fail(uid, operation, errno.to_raw())), deny)
            },
        };

        if let Some(response) = response {
            if channel.send_frame(&response).await.is_err() {
                break;
            }
        }

        if deny_after_reply {
            tracing::info!(%peer, "closing connection after policy/auth failure");
            break;
        }
    }

    session.close_all();
}
