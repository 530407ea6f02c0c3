//! Client error types and the dual-namespace last-error mapping.

use rxs_core::{Errno, RxsError};
use thiserror::Error;

/// Errors surfaced to an RPC caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Protocol, transport, or timeout failure on the control channel.
    /// Maps to `< 200` in the dual-namespace last-error convention.
    #[error(transparent)]
    Channel(#[from] RxsError),

    /// The server reported an OS errno via `SC_B1`. Maps to `200 + errno`.
    #[error("server error: {}", .0.describe())]
    Remote(Errno),

    /// A response carried a different slot shape or operation code than the
    /// call expected.
    #[error("unexpected response from server")]
    Protocol,
}

impl ClientError {
    /// The dual-namespace last-error code: `< 200` is
    /// client-local, `>= 200` is `200 + errno` as reported by the server.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::Channel(e) => e.last_error_code(),
            Self::Remote(errno) => 200 + errno.to_raw(),
            Self::Protocol => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_land_in_the_two_hundred_namespace() {
        let err = ClientError::Remote(Errno::from_raw(2));
        assert_eq!(err.code(), 202);
    }

    #[test]
    fn channel_errors_stay_under_two_hundred() {
        let err = ClientError::Channel(RxsError::ChannelClosed);
        assert!(err.code() < 200);
    }

    #[test]
    fn protocol_errors_use_a_fixed_local_code() {
        assert_eq!(ClientError::Protocol.code(), 7);
    }
}
