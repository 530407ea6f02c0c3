//! Spin up a real `rxs-server` on `127.0.0.1:0` and drive it from a test
//! instead of mocking the protocol.
//!
//! [`TestServer::spawn`] binds a server with a freshly written user
//! database and a private home directory, so every integration test gets
//! an isolated, disposable filesystem tree instead of touching the real
//! one.

#![deny(unsafe_code)]
#![deny(missing_docs)]

use std::net::SocketAddr;

use rxs_core::Policy;
use rxs_server::{Server, ServerRuntimeConfig};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// One RXS login: the credentials a client authenticates with, plus the
/// home directory its session resolves relative paths against.
#[derive(Debug, Clone)]
pub struct TestUser {
    /// Login name.
    pub name: String,
    /// Plaintext password.
    pub pass: String,
    /// Absolute path to the user's home directory (already created).
    pub home_dir: std::path::PathBuf,
}

/// A live server bound to an ephemeral port, plus the disposable state
/// backing it. Dropping this stops the accept loop and deletes the temp
/// directories.
pub struct TestServer {
    /// The bound control-channel address.
    pub addr: SocketAddr,
    /// The lone test user's credentials and home directory.
    pub user: TestUser,
    root: TempDir,
    accept_loop: JoinHandle<()>,
}

impl TestServer {
    /// Bind a server with one registered user (`"alice"` / `"secret"`),
    /// `require_encoder` fixed by the caller, and no address restrictions.
    pub async fn spawn(require_encoder: bool) -> Self {
        Self::spawn_with_policy(require_encoder, Vec::new(), Vec::new()).await
    }

    /// Bind a server with one registered user and an explicit allow/deny
    /// list, for scenarios that exercise address-based connection policy.
    pub async fn spawn_with_policy(
        require_encoder: bool,
        allow_list: Vec<rxs_core::AddrPattern>,
        deny_list: Vec<rxs_core::AddrPattern>,
    ) -> Self {
        let root = TempDir::new().expect("tempdir");
        let home_dir = root.path().join("home").join("alice");
        std::fs::create_dir_all(&home_dir).expect("create home dir");

        let user_db_path = root.path().join("users.db");
        std::fs::write(&user_db_path, format!("alice secret staff {}\n", home_dir.display()))
            .expect("write user db");

        let policy = Policy { allow_list, deny_list, user_db_path, require_encoder };
        let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".parse().unwrap(), policy };

        let server = Server::bind(config).await.expect("bind");
        let addr = server.local_addr().expect("local_addr");
        let accept_loop = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            user: TestUser { name: "alice".to_string(), pass: "secret".to_string(), home_dir },
            root,
            accept_loop,
        }
    }

    /// Connect and authenticate as the test user.
    pub async fn connect(&self, encoder_mode: bool) -> rxs_client::Client {
        let mut client = rxs_client::Client::connect(self.addr, encoder_mode).await.expect("connect");
        client.authorization(&self.user.name, &self.user.pass).await.expect("authorization");
        client
    }

    /// A path inside the test user's home directory, for scenarios that
    /// need an absolute path without touching the real filesystem.
    #[must_use]
    pub fn home_path(&self, relative: &str) -> std::path::PathBuf {
        self.user.home_dir.join(relative)
    }

    /// The harness's private scratch root (outside the user's home dir),
    /// for files the server should treat as ordinary absolute paths.
    #[must_use]
    pub fn scratch_path(&self, relative: &str) -> std::path::PathBuf {
        self.root.path().join(relative)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}
