//! Server error types.

use thiserror::Error;

/// Errors that can occur in the server binary or its accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid CLI configuration (bad bind address, unreadable user db, etc.).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Daemonization failed (`fork`/`setsid`/`chdir`).
    #[error("daemonization failed: {0}")]
    Daemonize(String),
}
