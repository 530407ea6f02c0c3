//! Operation handlers: one function per row of the operation/handler table.
//!
//! Handlers for the plain request/response operations return a
//! [`DispatchOutcome::Reply`] slot that the session loop frames as the
//! ordinary `SC_B0` response. `fread` manages its own extra control-channel
//! round trip (the mid-stream `eof` acknowledgment) and returns
//! [`DispatchOutcome::AlreadyHandled`] so the session loop does not send a
//! second response for the same request.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::Local;
use rxs_core::{ControlChannel, Errno, Policy};
use rxs_crypto::{decrypt_frame, encrypt_frame};
use rxs_proto::data::{CRYPT_PACKET_SIZE, Envelope, MAX_PORTION_DATA_BYTES};
use rxs_proto::{Operation, Packet, PacketType, RXS_EOF, Slot, SlotShape};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::session::Session;

/// What the session loop should do after a handler returns.
pub enum DispatchOutcome {
    /// Frame `slot` as the operation's `SC_B0` response.
    Reply(Slot),
    /// The handler already drove the control channel to completion; send
    /// nothing more for this request.
    AlreadyHandled,
}

fn io_errno(err: &std::io::Error) -> Errno {
    Errno::from_io_kind(err.kind())
}

/// Write a full data-channel frame, timing out a stalled peer after
/// `POLL_TIMEOUT` just like the control channel does.
async fn timed_write_all(socket: &mut TcpStream, buf: &[u8]) -> Result<(), Errno> {
    tokio::time::timeout(rxs_core::control::POLL_TIMEOUT, socket.write_all(buf))
        .await
        .map_err(|_| Errno::Eio)?
        .map_err(|e| io_errno(&e))
}

/// Read a full data-channel frame, timing out a stalled peer after
/// `POLL_TIMEOUT` just like the control channel does.
async fn timed_read_exact(socket: &mut TcpStream, buf: &mut [u8]) -> Result<(), Errno> {
    tokio::time::timeout(rxs_core::control::POLL_TIMEOUT, socket.read_exact(buf))
        .await
        .map_err(|_| Errno::Eio)?
        .map_err(|e| io_errno(&e))
}

/// Resolve a client-supplied path against the session's home directory.
/// Absolute paths pass through unchanged; relative paths are joined onto
/// `home_dir`, standing in for the real `chdir(2)` the original server
/// performs (every session here is a task in one process, so a literal
/// process-wide working directory per session isn't available).
fn resolve(session: &Session, raw: &[u8]) -> PathBuf {
    let raw = String::from_utf8_lossy(raw);
    let path = Path::new(raw.as_ref());
    if path.is_absolute() { path.to_path_buf() } else { session.core.home_dir.join(path) }
}

fn decode(shape: SlotShape, payload: &[u8]) -> Result<Slot, Errno> {
    Slot::decode_as(shape, payload).map_err(|_| Errno::Einval)
}

/// Dispatch one request to its handler. `channel` is only driven directly by
/// `fread`, which owns an extra control-channel round trip mid-operation.
pub async fn dispatch(
    session: &mut Session,
    policy: &Policy,
    channel: &mut ControlChannel<TcpStream>,
    uid: u32,
    op: Operation,
    payload: &[u8],
) -> Result<DispatchOutcome, Errno> {
    if !session.core.authenticated && op != Operation::Authorization {
        return Err(Errno::Eacces);
    }

    match op {
        Operation::Authorization => handle_authorization(session, policy, payload),
        Operation::Ls => handle_ls(session, payload).await,
        Operation::Mkdir => handle_mkdir(session, payload, false).await,
        Operation::MkdirEx => handle_mkdir(session, payload, true).await,
        Operation::Rmdir => handle_rmdir(session, payload).await,
        Operation::Getcwd => handle_getcwd(session, payload),
        Operation::Chdir => handle_chdir(session, payload).await,
        Operation::Unlink => handle_unlink(session, payload).await,
        Operation::Rename => handle_rename(session, payload).await,
        Operation::Filesize => handle_filesize(session, payload).await,
        Operation::FileExist => handle_file_exist(session, payload).await,
        Operation::DirExist => handle_dir_exist(session, payload).await,
        Operation::Fopen => handle_fopen(session, payload).await,
        Operation::Port => handle_port(session, payload).await,
        Operation::Fread => handle_fread(session, channel, uid, payload).await,
        Operation::Fwrite => handle_fwrite(session, payload).await,
        Operation::Fflush => handle_fflush(session, payload),
        Operation::Fclose => handle_fclose(session, payload),
        Operation::Fseek | Operation::Ftell | Operation::Rewind => Err(Errno::Enosys),
        Operation::PointCreate | Operation::PointClose => Ok(DispatchOutcome::Reply(Slot::s0(0))),
        Operation::Undef => Err(Errno::Einval),
    }
}

fn handle_authorization(
    session: &mut Session,
    policy: &Policy,
    payload: &[u8],
) -> Result<DispatchOutcome, Errno> {
    let Slot::S2 { first, second, encoder } = decode(SlotShape::S2, payload)? else { unreachable!() };
    let name = String::from_utf8_lossy(&first);
    let pass = String::from_utf8_lossy(&second);

    if policy.require_encoder && !encoder {
        return Err(Errno::Eacces);
    }

    let records = rxs_core::userdb::load(&policy.user_db_path).map_err(|e| io_errno(&e))?;
    let record = rxs_core::userdb::authenticate(&records, &name, &pass).ok_or(Errno::Eacces)?;

    session.core.home_dir = PathBuf::from(&record.home_dir);
    session.core.encoder_mode = encoder;
    session.core.authenticated = true;

    if encoder {
        session.crypto_key =
            Some(rxs_crypto::SessionKey::derive(record.pass.as_bytes(), record.name.as_bytes()));
    }

    let tmp_dir = session.core.home_dir.join("tmp");
    std::fs::create_dir_all(&tmp_dir).map_err(|e| io_errno(&e))?;

    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_ls(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data: command } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let command = String::from_utf8_lossy(&command).into_owned();

    let output = tokio::process::Command::new("bash")
        .arg("-c")
        .arg(&command)
        .output()
        .await
        .map_err(|e| io_errno(&e))?;

    let tmp_dir = session.core.home_dir.join("tmp");
    tokio::fs::create_dir_all(&tmp_dir).await.map_err(|e| io_errno(&e))?;

    let name = format!("{}_output.dat", Local::now().format("%Y%m%d_%I%M%S%p"));
    let out_path = tmp_dir.join(name);

    tokio::fs::write(&out_path, &output.stdout).await.map_err(|e| io_errno(&e))?;

    if session.core.encoder_mode {
        reencode_file_in_place(session, &out_path).await?;
    }

    Ok(DispatchOutcome::Reply(Slot::s1(out_path.to_string_lossy().into_owned())))
}

async fn reencode_file_in_place(session: &mut Session, path: &Path) -> Result<(), Errno> {
    let raw = tokio::fs::read(path).await.map_err(|e| io_errno(&e))?;
    let chunks: Vec<&[u8]> = raw.chunks(MAX_PORTION_DATA_BYTES).collect();
    let key_infos: Vec<[u8; 8]> = chunks.iter().map(|_| session.next_key_info()).collect();

    let key = session.crypto_key.as_ref().ok_or(Errno::Einval)?;
    let mut wrapped = Vec::with_capacity(raw.len());
    for (chunk, key_info) in chunks.into_iter().zip(key_infos) {
        let envelope = encrypt_frame(key, key_info, chunk).map_err(|_| Errno::Einval)?;
        wrapped.extend_from_slice(&envelope.to_bytes());
    }

    tokio::fs::write(path, wrapped).await.map_err(|e| io_errno(&e))
}

async fn handle_mkdir(
    session: &mut Session,
    payload: &[u8],
    recursive: bool,
) -> Result<DispatchOutcome, Errno> {
    let Slot::S3 { data, val } = decode(SlotShape::S3, payload)? else { unreachable!() };
    let path = resolve(session, &data);

    if recursive {
        tokio::fs::create_dir_all(&path).await.map_err(|e| io_errno(&e))?;
    } else {
        tokio::fs::create_dir(&path).await.map_err(|e| io_errno(&e))?;
    }
    tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(val))
        .await
        .map_err(|e| io_errno(&e))?;

    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_rmdir(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    tokio::fs::remove_dir(&path).await.map_err(|e| io_errno(&e))?;
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

fn handle_getcwd(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S0 { val: buffer_size } = decode(SlotShape::S0, payload)? else { unreachable!() };
    let cwd = session.core.home_dir.to_string_lossy().into_owned();
    let truncated: Vec<u8> = cwd.into_bytes().into_iter().take(buffer_size as usize).collect();
    Ok(DispatchOutcome::Reply(Slot::s1(truncated)))
}

async fn handle_chdir(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    let metadata = tokio::fs::metadata(&path).await.map_err(|e| io_errno(&e))?;
    if !metadata.is_dir() {
        return Err(Errno::Enotdir);
    }
    session.core.home_dir = path;
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_unlink(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    tokio::fs::remove_file(&path).await.map_err(|e| io_errno(&e))?;
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_rename(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S2 { first, second, .. } = decode(SlotShape::S2, payload)? else { unreachable!() };
    let from = resolve(session, &first);
    let to = resolve(session, &second);
    tokio::fs::rename(&from, &to).await.map_err(|e| io_errno(&e))?;
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_filesize(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    let metadata = tokio::fs::metadata(&path).await.map_err(|e| io_errno(&e))?;
    #[allow(clippy::cast_possible_truncation)]
    let size = metadata.len() as u32;
    Ok(DispatchOutcome::Reply(Slot::s0(size)))
}

async fn handle_file_exist(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    let exists = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file());
    Ok(DispatchOutcome::Reply(Slot::s0(u32::from(exists))))
}

async fn handle_dir_exist(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S1 { data } = decode(SlotShape::S1, payload)? else { unreachable!() };
    let path = resolve(session, &data);
    let exists = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir());
    Ok(DispatchOutcome::Reply(Slot::s0(u32::from(exists))))
}

fn parse_open_options(mode: &[u8]) -> Option<std::fs::OpenOptions> {
    let mut options = std::fs::OpenOptions::new();
    match mode {
        b"r" => options.read(true),
        b"w" => options.write(true).create(true).truncate(true),
        b"a" => options.append(true).create(true),
        b"r+" => options.read(true).write(true),
        b"w+" => options.read(true).write(true).create(true).truncate(true),
        b"a+" => options.read(true).append(true).create(true),
        _ => return None,
    };
    Some(options)
}

async fn handle_fopen(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S2 { first, second, .. } = decode(SlotShape::S2, payload)? else { unreachable!() };
    let path = resolve(session, &first);
    let options = parse_open_options(&second).ok_or(Errno::Einval)?;
    let file = options.open(&path).map_err(|e| io_errno(&e))?;
    let stream_id = session.core.insert_file(file);
    Ok(DispatchOutcome::Reply(Slot::s0(stream_id)))
}

async fn handle_port(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S5 { stream_id, port } = decode(SlotShape::S5, payload)? else { unreachable!() };
    let addr = std::net::SocketAddr::new(session.core.client_addr.ip(), port);
    let socket = TcpStream::connect(addr).await.map_err(|e| io_errno(&e))?;
    socket.set_nodelay(true).map_err(|e| io_errno(&e))?;
    session.data_sockets.insert(stream_id, socket);
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

async fn handle_fread(
    session: &mut Session,
    channel: &mut ControlChannel<TcpStream>,
    uid: u32,
    payload: &[u8],
) -> Result<DispatchOutcome, Errno> {
    let Slot::S4 { stream_id, data_size: requested_bytes, .. } = decode(SlotShape::S4, payload)?
    else {
        unreachable!()
    };

    let mut total_sent: u32 = 0;
    let mut hit_eof = false;

    while total_sent < requested_bytes {
        let want = (requested_bytes - total_sent).min(MAX_PORTION_DATA_BYTES as u32) as usize;
        let mut chunk = vec![0u8; want];
        {
            let file = session.core.file_mut(stream_id).ok_or(Errno::Ebadf)?;
            let n = std::io::Read::read(file, &mut chunk).map_err(|e| io_errno(&e))?;
            if n == 0 {
                hit_eof = true;
                break;
            }
            chunk.truncate(n);
        }

        let wire_bytes: Vec<u8> = if session.core.encoder_mode {
            let key_info = session.next_key_info();
            let key = session.crypto_key.as_ref().ok_or(Errno::Einval)?;
            let envelope = encrypt_frame(key, key_info, &chunk).map_err(|_| Errno::Einval)?;
            envelope.to_bytes().to_vec()
        } else {
            chunk.clone()
        };

        #[allow(clippy::cast_possible_truncation)]
        let sent_now = chunk.len() as u32;

        let socket = session.data_sockets.get_mut(&stream_id).ok_or(Errno::Ebadf)?;
        timed_write_all(socket, &wire_bytes).await?;

        total_sent += sent_now;
    }

    let ack = Packet::new(
        PacketType::Ok,
        uid,
        Operation::Fread,
        Slot::S4 { stream_id, data_size: total_sent, eof: if hit_eof { RXS_EOF } else { 0 } }.encode(),
    );
    channel.send_frame(&ack).await.map_err(|_| Errno::Eio)?;
    channel.recv_frame().await.map_err(|_| Errno::Eio)?;

    Ok(DispatchOutcome::AlreadyHandled)
}

async fn handle_fwrite(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S4 { stream_id, data_size: total_bytes, .. } = decode(SlotShape::S4, payload)? else {
        unreachable!()
    };

    let mut total_written: u32 = 0;
    while total_written < total_bytes {
        let socket = session.data_sockets.get_mut(&stream_id).ok_or(Errno::Ebadf)?;

        let plaintext = if session.core.encoder_mode {
            let mut buf = [0u8; CRYPT_PACKET_SIZE];
            timed_read_exact(socket, &mut buf).await?;
            let envelope = Envelope::from_bytes(&buf).map_err(|_| Errno::Einval)?;
            let key = session.crypto_key.as_ref().ok_or(Errno::Einval)?;
            decrypt_frame(key, &envelope).map_err(|_| Errno::Einval)?
        } else {
            let want = (total_bytes - total_written).min(MAX_PORTION_DATA_BYTES as u32) as usize;
            let mut buf = vec![0u8; want];
            timed_read_exact(socket, &mut buf).await?;
            buf
        };

        let file = session.core.file_mut(stream_id).ok_or(Errno::Ebadf)?;
        std::io::Write::write_all(file, &plaintext).map_err(|e| io_errno(&e))?;

        #[allow(clippy::cast_possible_truncation)]
        let written_now = plaintext.len() as u32;
        total_written += written_now;
    }

    Ok(DispatchOutcome::Reply(Slot::S4 { stream_id, data_size: total_written, eof: 0 }))
}

fn handle_fflush(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S0 { val: stream_id } = decode(SlotShape::S0, payload)? else { unreachable!() };
    let file = session.core.file_mut(stream_id).ok_or(Errno::Ebadf)?;
    std::io::Write::flush(file).map_err(|e| io_errno(&e))?;
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

fn handle_fclose(session: &mut Session, payload: &[u8]) -> Result<DispatchOutcome, Errno> {
    let Slot::S0 { val: stream_id } = decode(SlotShape::S0, payload)? else { unreachable!() };
    session.core.take_file(stream_id).ok_or(Errno::Ebadf)?;
    session.data_sockets.remove(&stream_id);
    Ok(DispatchOutcome::Reply(Slot::s0(0)))
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;

    fn test_session(home: &std::path::Path) -> Session {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        let mut session = Session::new(addr);
        session.core.authenticated = true;
        session.core.home_dir = home.to_path_buf();
        session
    }

    fn test_policy() -> Policy {
        Policy::default()
    }

    #[tokio::test]
    async fn mkdir_then_dir_exist() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::S3 { data: Bytes::from("sub"), val: 0o755 }.encode();
        let outcome = handle_mkdir(&mut session, &payload, false).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Reply(Slot::S0 { val: 0 })));

        let payload = Slot::s1("sub").encode();
        let outcome = handle_dir_exist(&mut session, &payload).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Reply(Slot::S0 { val: 1 })));
    }

    #[tokio::test]
    async fn mkdir_ex_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::S3 { data: Bytes::from("a/b/c"), val: 0o755 }.encode();
        handle_mkdir(&mut session, &payload, true).await.unwrap();

        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn rmdir_and_unlink_remove_entries() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("file.txt"), b"hi").unwrap();

        let payload = Slot::s1("empty").encode();
        handle_rmdir(&mut session, &payload).await.unwrap();
        assert!(!dir.path().join("empty").exists());

        let payload = Slot::s1("file.txt").encode();
        handle_unlink(&mut session, &payload).await.unwrap();
        assert!(!dir.path().join("file.txt").exists());
    }

    #[tokio::test]
    async fn rename_moves_a_file() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());
        std::fs::write(dir.path().join("old.txt"), b"hi").unwrap();

        let payload =
            Slot::S2 { first: Bytes::from("old.txt"), second: Bytes::from("new.txt"), encoder: false }
                .encode();
        handle_rename(&mut session, &payload).await.unwrap();

        assert!(!dir.path().join("old.txt").exists());
        assert!(dir.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn rename_missing_source_reports_enoent() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload =
            Slot::S2 { first: Bytes::from("missing.txt"), second: Bytes::from("new.txt"), encoder: false }
                .encode();
        let err = handle_rename(&mut session, &payload).await.unwrap_err();
        assert_eq!(err, Errno::Enoent);
    }

    #[tokio::test]
    async fn filesize_reports_exact_byte_count() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());
        std::fs::write(dir.path().join("data.bin"), vec![0u8; 12]).unwrap();

        let payload = Slot::s1("data.bin").encode();
        let outcome = handle_filesize(&mut session, &payload).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Reply(Slot::S0 { val: 12 })));
    }

    #[tokio::test]
    async fn file_exist_distinguishes_files_from_directories() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());
        std::fs::write(dir.path().join("f"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();

        let file_payload = Slot::s1("f").encode();
        let dir_payload = Slot::s1("d").encode();

        assert!(matches!(
            handle_file_exist(&mut session, &file_payload).await.unwrap(),
            DispatchOutcome::Reply(Slot::S0 { val: 1 })
        ));
        assert!(matches!(
            handle_file_exist(&mut session, &dir_payload).await.unwrap(),
            DispatchOutcome::Reply(Slot::S0 { val: 0 })
        ));
    }

    #[tokio::test]
    async fn fopen_write_then_fclose_round_trips_a_stream_id() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let open_payload =
            Slot::S2 { first: Bytes::from("out.txt"), second: Bytes::from("w"), encoder: false }
                .encode();
        let outcome = handle_fopen(&mut session, &open_payload).await.unwrap();
        let DispatchOutcome::Reply(Slot::S0 { val: stream_id }) = outcome else { panic!("expected S0") };
        assert_eq!(session.core.file_handles.len(), 1);

        let close_payload = Slot::s0(stream_id).encode();
        handle_fclose(&mut session, &close_payload).unwrap();
        assert!(session.core.file_handles.is_empty());
    }

    #[tokio::test]
    async fn fopen_rejects_unrecognized_mode() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload =
            Slot::S2 { first: Bytes::from("out.txt"), second: Bytes::from("bogus"), encoder: false }
                .encode();
        let err = handle_fopen(&mut session, &payload).await.unwrap_err();
        assert_eq!(err, Errno::Einval);
    }

    #[tokio::test]
    async fn chdir_rejects_a_path_that_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());
        std::fs::write(dir.path().join("plain.txt"), b"x").unwrap();

        let payload = Slot::s1("plain.txt").encode();
        let err = handle_chdir(&mut session, &payload).await.unwrap_err();
        assert_eq!(err, Errno::Enotdir);
    }

    #[tokio::test]
    async fn chdir_updates_home_dir_for_later_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::s1("nested").encode();
        handle_chdir(&mut session, &payload).await.unwrap();
        assert_eq!(session.core.home_dir, dir.path().join("nested"));
    }

    #[tokio::test]
    async fn getcwd_truncates_to_the_requested_buffer_size() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::s0(3).encode();
        let outcome = handle_getcwd(&mut session, &payload).unwrap();
        let DispatchOutcome::Reply(Slot::S1 { data }) = outcome else { panic!("expected S1") };
        assert_eq!(data.len(), 3);
    }

    #[tokio::test]
    async fn authorization_with_bad_credentials_is_rejected() {
        let dir = TempDir::new().unwrap();
        let users_path = dir.path().join("users.txt");
        std::fs::write(&users_path, "alice secret users /home/alice").unwrap();

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        let mut session = Session::new(addr);
        let mut policy = test_policy();
        policy.user_db_path = users_path;

        let payload =
            Slot::S2 { first: Bytes::from("alice"), second: Bytes::from("wrong"), encoder: false }
                .encode();
        let err = handle_authorization(&mut session, &policy, &payload).unwrap_err();
        assert_eq!(err, Errno::Eacces);
        assert!(!session.core.authenticated);
    }

    #[tokio::test]
    async fn authorization_with_good_credentials_sets_home_dir() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home").join("alice");
        std::fs::create_dir_all(&home).unwrap();
        let users_path = dir.path().join("users.txt");
        std::fs::write(&users_path, format!("alice secret users {}", home.display())).unwrap();

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        let mut session = Session::new(addr);
        let mut policy = test_policy();
        policy.user_db_path = users_path;

        let payload =
            Slot::S2 { first: Bytes::from("alice"), second: Bytes::from("secret"), encoder: false }
                .encode();
        handle_authorization(&mut session, &policy, &payload).unwrap();

        assert!(session.core.authenticated);
        assert_eq!(session.core.home_dir, home);
        assert!(home.join("tmp").is_dir());
    }

    #[tokio::test]
    async fn authorization_requiring_encoder_rejects_plain_request() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home").join("alice");
        std::fs::create_dir_all(&home).unwrap();
        let users_path = dir.path().join("users.txt");
        std::fs::write(&users_path, format!("alice secret users {}", home.display())).unwrap();

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        let mut session = Session::new(addr);
        let mut policy = test_policy();
        policy.user_db_path = users_path;
        policy.require_encoder = true;

        let payload =
            Slot::S2 { first: Bytes::from("alice"), second: Bytes::from("secret"), encoder: false }
                .encode();
        let err = handle_authorization(&mut session, &policy, &payload).unwrap_err();
        assert_eq!(err, Errno::Eacces);
    }

    #[tokio::test]
    async fn ls_writes_command_output_to_a_temp_file() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::s1("echo hello").encode();
        let outcome = handle_ls(&mut session, &payload).await.unwrap();
        let DispatchOutcome::Reply(Slot::S1 { data: path }) = outcome else { panic!("expected S1") };
        let path = std::str::from_utf8(&path).unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.trim(), "hello");
        assert!(std::path::Path::new(path).starts_with(dir.path().join("tmp")));
    }

    #[tokio::test]
    async fn fflush_on_unknown_stream_reports_ebadf() {
        let dir = TempDir::new().unwrap();
        let mut session = test_session(dir.path());

        let payload = Slot::s0(999).encode();
        let err = handle_fflush(&mut session, &payload).unwrap_err();
        assert_eq!(err, Errno::Ebadf);
    }
}
