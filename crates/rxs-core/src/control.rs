//! The control channel: reliable, timed, retried packet exchange over any
//! async duplex stream. Generic over the stream type so the same logic
//! drives both a real `TcpStream` and an in-memory duplex pipe in tests.

use std::time::Duration;

use rxs_proto::{CarryOverBuffer, Packet};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::RxsError;

/// Per-operation poll timeout.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum consecutive zero-byte-write retries before giving up.
pub const RETRY_COUNT: u32 = 10;

/// Spacing between zero-byte-write retries.
pub const RETRY_SPACING: Duration = Duration::from_millis(500);

/// Size of the read buffer backing each `recv_frame` poll.
pub const READ_BUFFER_SIZE: usize = 128 * 1024;

/// A framed packet channel: `send_frame`/`recv_frame` over a raw byte
/// stream, with the carry-over buffer hiding TCP's byte-stream nature.
pub struct ControlChannel<S> {
    stream: S,
    carry: CarryOverBuffer,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ControlChannel<S> {
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream, carry: CarryOverBuffer::new() }
    }

    /// Consume the channel, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Serialize and send one packet, retrying zero-byte writes and
    /// applying a 60-second timeout to each write attempt.
    pub async fn send_frame(&mut self, packet: &Packet) -> Result<(), RxsError> {
        let bytes = packet.encode();
        let mut written = 0usize;
        let mut retries = 0u32;

        while written < bytes.len() {
            let result = timeout(POLL_TIMEOUT, self.stream.write(&bytes[written..]))
                .await
                .map_err(|_| RxsError::Timeout(POLL_TIMEOUT))?
                .map_err(RxsError::Transport)?;

            if result == 0 {
                retries += 1;
                if retries > RETRY_COUNT {
                    return Err(RxsError::ChannelClosed);
                }
                tokio::time::sleep(RETRY_SPACING).await;
                continue;
            }

            retries = 0;
            written += result;
        }

        self.stream.flush().await.map_err(RxsError::Transport)
    }

    /// Read and decode the next complete packet, pulling the carry-over
    /// buffer before issuing further socket reads.
    pub async fn recv_frame(&mut self) -> Result<Packet, RxsError> {
        loop {
            if let Some(packet) = self.carry.try_take_packet()? {
                return Ok(packet);
            }

            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            let n = timeout(POLL_TIMEOUT, self.stream.read(&mut buf))
                .await
                .map_err(|_| RxsError::Timeout(POLL_TIMEOUT))?
                .map_err(RxsError::Transport)?;

            if n == 0 {
                return Err(RxsError::ChannelClosed);
            }

            self.carry.extend(&buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use rxs_proto::{Operation, PacketType};
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn send_then_recv_round_trips_one_packet() {
        let (client_io, server_io) = duplex(4096);
        let mut client = ControlChannel::new(client_io);
        let mut server = ControlChannel::new(server_io);

        let packet = Packet::new(PacketType::Request, 1, Operation::Mkdir, vec![1, 2, 3]);
        client.send_frame(&packet).await.unwrap();

        let received = server.recv_frame().await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn recv_across_two_packets_written_separately() {
        let (client_io, server_io) = duplex(4096);
        let mut client = ControlChannel::new(client_io);
        let mut server = ControlChannel::new(server_io);

        let p1 = Packet::new(PacketType::Request, 1, Operation::Mkdir, vec![1]);
        let p2 = Packet::new(PacketType::Request, 2, Operation::Rmdir, vec![2]);

        client.send_frame(&p1).await.unwrap();
        client.send_frame(&p2).await.unwrap();

        assert_eq!(server.recv_frame().await.unwrap(), p1);
        assert_eq!(server.recv_frame().await.unwrap(), p2);
    }

    #[tokio::test]
    async fn recv_reports_channel_closed_on_peer_drop() {
        let (client_io, server_io) = duplex(4096);
        drop(client_io);
        let mut server = ControlChannel::new(server_io);
        let err = server.recv_frame().await.unwrap_err();
        assert!(matches!(err, RxsError::ChannelClosed));
    }
}
