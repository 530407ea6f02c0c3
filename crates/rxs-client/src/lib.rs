//! RXS client.
//!
//! The RPC layer for the RXS remote file-exchange protocol: connect, then
//! drive the file/directory/shell operations exposed by a running
//! `rxs-server` over its control channel, with a streaming engine for
//! `fread`/`fwrite`'s dual-channel bulk transfer.
//!
//! # Components
//!
//! - [`Client`]: the connected session — control channel, dual-namespace
//!   error state, and any data sockets opened by `port`.
//! - [`stream`]: the streaming engine backing `fread`/`fwrite`.
//! - [`ClientError`]: errors surfaced to an RPC caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
pub mod stream;

pub use client::Client;
pub use error::ClientError;
