//! The streaming engine: opening a data channel and pumping `fread`/`fwrite`
//! frames.
//!
//! This takes a single-threaded, sequential design over a concurrent
//! reimplementation latitude explicitly grants over the source's
//! worker-task model: since the server only emits its final control-channel
//! acknowledgment after every data frame for that call has already been
//! written to the data socket, the client can simply await that
//! acknowledgment first (learning the exact byte count to expect) and then
//! read the data socket synchronously, rather than racing a background
//! receiver task against the control channel.

use rxs_core::control::POLL_TIMEOUT;
use rxs_crypto::{decrypt_frame, encrypt_frame};
use rxs_proto::data::{CRYPT_PACKET_SIZE, Envelope, MAX_PORTION_DATA_BYTES};
use rxs_proto::{Operation, Packet, PacketType, RXS_EOF, Slot, SlotShape};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::client::Client;
use crate::error::ClientError;

/// Read a full data-channel frame, timing out a stalled peer after
/// `POLL_TIMEOUT` just like the control channel does.
async fn timed_read_exact(socket: &mut TcpStream, buf: &mut [u8]) -> Result<(), ClientError> {
    tokio::time::timeout(POLL_TIMEOUT, socket.read_exact(buf))
        .await
        .map_err(|_| ClientError::Channel(rxs_core::RxsError::Timeout(POLL_TIMEOUT)))?
        .map_err(rxs_core::RxsError::Transport)?;
    Ok(())
}

/// Write a full data-channel frame, timing out a stalled peer after
/// `POLL_TIMEOUT` just like the control channel does.
async fn timed_write_all(socket: &mut TcpStream, buf: &[u8]) -> Result<(), ClientError> {
    tokio::time::timeout(POLL_TIMEOUT, socket.write_all(buf))
        .await
        .map_err(|_| ClientError::Channel(rxs_core::RxsError::Timeout(POLL_TIMEOUT)))?
        .map_err(rxs_core::RxsError::Transport)?;
    Ok(())
}

/// Open the data channel for `stream_id`: bind a fresh ephemeral listener,
/// advertise it to the server via `port`, and accept the server's
/// connect-back.
pub async fn open_data_channel(client: &mut Client, stream_id: u32) -> Result<(), ClientError> {
    let listener = TcpListener::bind("0.0.0.0:0").await.map_err(rxs_core::RxsError::Transport)?;
    let port = listener.local_addr().map_err(rxs_core::RxsError::Transport)?.port();

    let uid = client.session.next_uid();
    let request = Packet::new(PacketType::Request, uid, Operation::Port, Slot::S5 { stream_id, port }.encode());
    client.channel.send_frame(&request).await?;
    let response = client.channel.recv_frame().await?;

    if response.header.kind() != Some(PacketType::Ok) {
        let Slot::S0 { val } = Slot::decode_as(SlotShape::S0, &response.payload).map_err(|_| ClientError::Protocol)?
        else {
            unreachable!("S0 is the only failure slot shape")
        };
        let errno = rxs_core::Errno::from_raw(val);
        client.session.set_remote_error(errno);
        return Err(ClientError::Remote(errno));
    }

    let (socket, _) = listener.accept().await.map_err(rxs_core::RxsError::Transport)?;
    socket.set_nodelay(true).map_err(rxs_core::RxsError::Transport)?;
    // TCP_MAXSEG for encoder mode is not reachable through safe Tokio APIs;
    // the envelope's fixed 998-byte frame size keeps this a throughput-only
    // simplification, not a protocol one.

    client.data_sockets.insert(stream_id, socket);
    client.session.clear_error();
    Ok(())
}

/// Pull `requested_bytes` from `stream_id`, already opened via
/// [`open_data_channel`].
pub async fn fread(client: &mut Client, stream_id: u32, requested_bytes: u32) -> Result<Vec<u8>, ClientError> {
    let uid = client.session.next_uid();
    let request = Packet::new(
        PacketType::Request,
        uid,
        Operation::Fread,
        Slot::S4 { stream_id, data_size: requested_bytes, eof: 0 }.encode(),
    );
    client.channel.send_frame(&request).await?;

    let ack = client.channel.recv_frame().await?;
    if ack.header.kind() != Some(PacketType::Ok) {
        let Slot::S0 { val } = Slot::decode_as(SlotShape::S0, &ack.payload).map_err(|_| ClientError::Protocol)? else {
            unreachable!("S0 is the only failure slot shape")
        };
        let errno = rxs_core::Errno::from_raw(val);
        client.session.set_remote_error(errno);
        return Err(ClientError::Remote(errno));
    }

    let Slot::S4 { data_size: total_sent, eof, .. } =
        Slot::decode_as(SlotShape::S4, &ack.payload).map_err(|_| ClientError::Protocol)?
    else {
        unreachable!("S4 is Fread's acknowledgment shape")
    };

    let socket = client.data_sockets.get_mut(&stream_id).ok_or(ClientError::Protocol)?;
    let mut received = Vec::with_capacity(total_sent as usize);
    let mut remaining = total_sent;

    while remaining > 0 {
        if let Some(key) = client.crypto_key.as_ref() {
            let mut buf = [0u8; CRYPT_PACKET_SIZE];
            timed_read_exact(socket, &mut buf).await?;
            let envelope = Envelope::from_bytes(&buf).map_err(|_| ClientError::Protocol)?;
            let plaintext = decrypt_frame(key, &envelope).map_err(|_| ClientError::Protocol)?;
            #[allow(clippy::cast_possible_truncation)]
            let n = plaintext.len() as u32;
            remaining = remaining.saturating_sub(n);
            received.extend_from_slice(&plaintext);
        } else {
            let want = remaining.min(MAX_PORTION_DATA_BYTES as u32) as usize;
            let mut buf = vec![0u8; want];
            timed_read_exact(socket, &mut buf).await?;
            remaining -= want as u32;
            received.extend_from_slice(&buf);
        }
    }

    let ack_uid = client.session.next_uid();
    #[allow(clippy::cast_possible_truncation)]
    let received_len = received.len() as u32;
    let client_ack = Packet::new(
        PacketType::Request,
        ack_uid,
        Operation::Fread,
        Slot::S4 { stream_id, data_size: received_len, eof: 0 }.encode(),
    );
    client.channel.send_frame(&client_ack).await?;

    if eof == RXS_EOF {
        client.session.clear_error();
    }
    Ok(received)
}

/// Push `data` to `stream_id`, already opened via [`open_data_channel`].
pub async fn fwrite(client: &mut Client, stream_id: u32, data: &[u8]) -> Result<u32, ClientError> {
    let uid = client.session.next_uid();
    #[allow(clippy::cast_possible_truncation)]
    let total_bytes = data.len() as u32;
    let request = Packet::new(
        PacketType::Request,
        uid,
        Operation::Fwrite,
        Slot::S4 { stream_id, data_size: total_bytes, eof: 0 }.encode(),
    );
    client.channel.send_frame(&request).await?;

    let mut offset = 0usize;
    while offset < data.len() {
        let want = (data.len() - offset).min(MAX_PORTION_DATA_BYTES);
        let chunk = &data[offset..offset + want];

        if client.crypto_key.is_some() {
            let key_info = client.next_key_info();
            let key = client.crypto_key.as_ref().ok_or(ClientError::Protocol)?;
            let envelope = encrypt_frame(key, key_info, chunk).map_err(|_| ClientError::Protocol)?;
            let socket = client.data_sockets.get_mut(&stream_id).ok_or(ClientError::Protocol)?;
            timed_write_all(socket, &envelope.to_bytes()).await?;
        } else {
            let socket = client.data_sockets.get_mut(&stream_id).ok_or(ClientError::Protocol)?;
            timed_write_all(socket, chunk).await?;
        }

        offset += want;
    }

    let response = client.channel.recv_frame().await?;
    if response.header.kind() != Some(PacketType::Ok) {
        let Slot::S0 { val } =
            Slot::decode_as(SlotShape::S0, &response.payload).map_err(|_| ClientError::Protocol)?
        else {
            unreachable!("S0 is the only failure slot shape")
        };
        let errno = rxs_core::Errno::from_raw(val);
        client.session.set_remote_error(errno);
        return Err(ClientError::Remote(errno));
    }

    let Slot::S4 { data_size: total_written, .. } =
        Slot::decode_as(SlotShape::S4, &response.payload).map_err(|_| ClientError::Protocol)?
    else {
        unreachable!("S4 is Fwrite's response shape")
    };
    client.session.clear_error();
    Ok(total_written)
}

#[cfg(test)]
mod tests {
    use rxs_core::ControlChannel;
    use rxs_proto::{Packet, PacketType};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::client::Client;

    async fn accept_control(listener: TcpListener) -> (ControlChannel<TcpStream>, TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        (ControlChannel::new(stream), listener)
    }

    /// Answer one `port` request, connecting back to the port the client
    /// advertised, and hand back the resulting data socket.
    async fn handshake_data_channel(channel: &mut ControlChannel<TcpStream>) -> TcpStream {
        let request = channel.recv_frame().await.unwrap();
        assert_eq!(request.header.operation_enum(), Some(Operation::Port));
        let Slot::S5 { port, .. } = Slot::decode_as(SlotShape::S5, &request.payload).unwrap() else {
            unreachable!()
        };
        let reply = Packet::new(PacketType::Ok, request.header.uid(), Operation::Port, Slot::s0(0).encode());
        channel.send_frame(&reply).await.unwrap();

        TcpStream::connect(("127.0.0.1", port)).await.unwrap()
    }

    #[tokio::test]
    async fn fwrite_then_fread_round_trip_in_plain_mode() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut channel, listener) = accept_control(listener).await;
            drop(listener);
            let mut data_socket = handshake_data_channel(&mut channel).await;

            // fwrite: the client sends its request, then streams frames; the
            // fake server drains exactly as many bytes as announced before
            // acknowledging.
            let request = channel.recv_frame().await.unwrap();
            assert_eq!(request.header.operation_enum(), Some(Operation::Fwrite));
            let Slot::S4 { data_size: total, .. } = Slot::decode_as(SlotShape::S4, &request.payload).unwrap() else {
                unreachable!()
            };
            let mut received = vec![0u8; total as usize];
            data_socket.read_exact(&mut received).await.unwrap();
            let reply = Packet::new(
                PacketType::Ok,
                request.header.uid(),
                Operation::Fwrite,
                Slot::S4 { stream_id: 1, data_size: total, eof: 0 }.encode(),
            );
            channel.send_frame(&reply).await.unwrap();

            // fread: hand the same bytes back, ack first per the documented
            // sequencing, then drain the client's own trailing ack.
            let request = channel.recv_frame().await.unwrap();
            assert_eq!(request.header.operation_enum(), Some(Operation::Fread));
            data_socket.write_all(&received).await.unwrap();
            let reply = Packet::new(
                PacketType::Ok,
                request.header.uid(),
                Operation::Fread,
                Slot::S4 { stream_id: 1, data_size: received.len() as u32, eof: RXS_EOF }.encode(),
            );
            channel.send_frame(&reply).await.unwrap();
            channel.recv_frame().await.unwrap();

            received
        });

        let mut client = Client::connect(addr, false).await.unwrap();
        open_data_channel(&mut client, 1).await.unwrap();

        let payload = vec![0x42u8; MAX_PORTION_DATA_BYTES * 2 + 17];
        let written = fwrite(&mut client, 1, &payload).await.unwrap();
        assert_eq!(written as usize, payload.len());

        let read_back = fread(&mut client, 1, payload.len() as u32).await.unwrap();
        assert_eq!(read_back, payload);

        let server_saw = server.await.unwrap();
        assert_eq!(server_saw, payload);
    }

    #[tokio::test]
    async fn port_failure_reports_a_remote_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut channel = ControlChannel::new(stream);
            let request = channel.recv_frame().await.unwrap();
            let reply = Packet::fail(request.header.uid(), Operation::Port, 24);
            channel.send_frame(&reply).await.unwrap();
        });

        let mut client = Client::connect(addr, false).await.unwrap();
        let err = open_data_channel(&mut client, 1).await.unwrap_err();

        assert!(matches!(err, ClientError::Remote(_)));
        assert!(!client.data_sockets.contains_key(&1));
        server.await.unwrap();
    }
}
