//! Server-side per-connection session: the protocol-level state from
//! `rxs-core` plus the I/O resources (data sockets, encoder-mode key) that
//! only make sense once a real `TcpStream` is involved.

use std::collections::HashMap;
use std::net::SocketAddr;

use rxs_core::ServerSession;
use rxs_crypto::SessionKey;
use tokio::net::TcpStream;

/// One accepted connection's full server-side state.
pub struct Session {
    /// Protocol-level state (auth flag, home dir, open files).
    pub core: ServerSession,
    /// Data-channel sockets, keyed by stream id. Populated by the `port`
    /// operation, consumed by `fread`/`fwrite`, removed on `fclose`.
    pub data_sockets: HashMap<u32, TcpStream>,
    /// Encoder-mode session key, present only once `authorization` has
    /// negotiated `encoder_mode == true`.
    pub crypto_key: Option<SessionKey>,
    next_key_info: u64,
}

impl Session {
    /// A fresh, unauthenticated session for a newly accepted connection.
    #[must_use]
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            core: ServerSession::new(client_addr),
            data_sockets: HashMap::new(),
            crypto_key: None,
            next_key_info: 0,
        }
    }

    /// Allocate the next per-frame `key_info` value for the encoder-mode
    /// envelope. Monotonic within the session, which is sufficient to keep
    /// every frame's derived nonce unique.
    pub fn next_key_info(&mut self) -> [u8; 8] {
        let id = self.next_key_info;
        self.next_key_info = self.next_key_info.wrapping_add(1);
        id.to_be_bytes()
    }

    /// Tear down every open file and data socket. Called when the session
    /// loop exits for any reason.
    pub fn close_all(&mut self) {
        self.core.close_all();
        self.data_sockets.clear();
    }
}
