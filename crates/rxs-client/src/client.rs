//! The RPC layer: one call composed per exposed operation.
//!
//! Every call follows the same three-step pattern: compose a request slot,
//! send it on the control channel, decode the one response frame. `fread`
//! and `fwrite` additionally pump the data channel and are implemented in
//! [`crate::stream`].

use std::collections::HashMap;
use std::net::SocketAddr;

use rxs_core::{ClientSession, ControlChannel, Errno};
use rxs_crypto::SessionKey;
use rxs_proto::{Operation, Packet, PacketType, Slot, SlotShape};
use tokio::net::TcpStream;

use crate::error::ClientError;

/// One connected RXS session: the control channel, the session's
/// dual-namespace error state, and the data sockets opened by `port`.
pub struct Client {
    pub(crate) channel: ControlChannel<TcpStream>,
    pub(crate) session: ClientSession,
    pub(crate) data_sockets: HashMap<u32, TcpStream>,
    pub(crate) crypto_key: Option<SessionKey>,
    next_key_info: u64,
}

impl Client {
    /// Connect the control channel to `addr`. Does not authenticate; call
    /// [`Client::authorization`] next.
    pub async fn connect(addr: SocketAddr, encoder_mode: bool) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(rxs_core::RxsError::Transport)?;
        stream.set_nodelay(true).map_err(rxs_core::RxsError::Transport)?;
        Ok(Self {
            channel: ControlChannel::new(stream),
            session: ClientSession::new(encoder_mode),
            data_sockets: HashMap::new(),
            crypto_key: None,
            next_key_info: 0,
        })
    }

    /// The session's dual-namespace last-error value.
    #[must_use]
    pub fn last_error(&self) -> u32 {
        self.session.last_error
    }

    /// Whether encoder mode was negotiated at connect time.
    #[must_use]
    pub fn encoder_mode(&self) -> bool {
        self.session.encoder_mode
    }

    pub(crate) fn next_key_info(&mut self) -> [u8; 8] {
        let id = self.next_key_info;
        self.next_key_info = self.next_key_info.wrapping_add(1);
        id.to_be_bytes()
    }

    /// Send one request and decode its one response frame, updating the
    /// session's last-error on either branch.
    async fn call(&mut self, op: Operation, request: Slot, response_shape: SlotShape) -> Result<Slot, ClientError> {
        let uid = self.session.next_uid();
        let packet = Packet::new(PacketType::Request, uid, op, request.encode());

        self.channel.send_frame(&packet).await.map_err(|e| self.fail_local(e))?;
        let response = self.channel.recv_frame().await.map_err(|e| self.fail_local(e))?;

        if response.header.operation_enum() != Some(op) {
            return Err(self.fail_local(rxs_core::RxsError::OperationMismatch {
                sent: op.to_u16(),
                received: response.header.operation(),
            }));
        }

        match response.header.kind() {
            Some(PacketType::Ok) => {
                let slot = Slot::decode_as(response_shape, &response.payload).map_err(|_| {
                    self.session.set_local_error(7);
                    ClientError::Protocol
                })?;
                self.session.clear_error();
                Ok(slot)
            },
            Some(PacketType::Fail) => {
                let Slot::S0 { val } = Slot::decode_as(SlotShape::S0, &response.payload).map_err(|_| ClientError::Protocol)?
                else {
                    unreachable!("S0 is the only failure slot shape")
                };
                let errno = Errno::from_raw(val);
                self.session.set_remote_error(errno);
                Err(ClientError::Remote(errno))
            },
            _ => Err(self.fail_local(rxs_core::RxsError::ChannelClosed)),
        }
    }

    fn fail_local(&mut self, err: rxs_core::RxsError) -> ClientError {
        self.session.set_local_error(err.last_error_code());
        ClientError::Channel(err)
    }

    /// Authenticate, negotiating `encoder_mode` as fixed at [`Client::connect`].
    pub async fn authorization(&mut self, user: &str, pass: &str) -> Result<(), ClientError> {
        let encoder = self.session.encoder_mode;
        self.call(
            Operation::Authorization,
            Slot::S2 { first: user.as_bytes().to_vec().into(), second: pass.as_bytes().to_vec().into(), encoder },
            SlotShape::S0,
        )
        .await?;

        if encoder {
            self.crypto_key = Some(SessionKey::derive(pass.as_bytes(), user.as_bytes()));
        }
        Ok(())
    }

    /// `mkdir(path, mode)`.
    pub async fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), ClientError> {
        self.call(Operation::Mkdir, Slot::S3 { data: path.as_bytes().to_vec().into(), val: mode }, SlotShape::S0).await?;
        Ok(())
    }

    /// Recursive `mkdir -p`.
    pub async fn mkdir_ex(&mut self, path: &str, mode: u32) -> Result<(), ClientError> {
        self.call(Operation::MkdirEx, Slot::S3 { data: path.as_bytes().to_vec().into(), val: mode }, SlotShape::S0).await?;
        Ok(())
    }

    /// `rmdir(path)`.
    pub async fn rmdir(&mut self, path: &str) -> Result<(), ClientError> {
        self.call(Operation::Rmdir, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?;
        Ok(())
    }

    /// `getcwd` with a caller-requested buffer size.
    pub async fn getcwd(&mut self, buffer_size: u32) -> Result<String, ClientError> {
        let Slot::S1 { data } = self.call(Operation::Getcwd, Slot::s0(buffer_size), SlotShape::S1).await? else {
            unreachable!("S1 is Getcwd's response shape")
        };
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// `chdir(path)`.
    pub async fn chdir(&mut self, path: &str) -> Result<(), ClientError> {
        self.call(Operation::Chdir, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?;
        Ok(())
    }

    /// `unlink(path)`.
    pub async fn unlink(&mut self, path: &str) -> Result<(), ClientError> {
        self.call(Operation::Unlink, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?;
        Ok(())
    }

    /// `rename(old, new)`.
    pub async fn rename(&mut self, old: &str, new: &str) -> Result<(), ClientError> {
        let encoder = self.session.encoder_mode;
        self.call(
            Operation::Rename,
            Slot::S2 { first: old.as_bytes().to_vec().into(), second: new.as_bytes().to_vec().into(), encoder },
            SlotShape::S0,
        )
        .await?;
        Ok(())
    }

    /// `stat().st_size`, returned as a signed file size (`-1` iff error is
    /// handled by the caller via the `Result`, this binds to a non-negative
    /// value on success).
    pub async fn filesize(&mut self, path: &str) -> Result<i64, ClientError> {
        let Slot::S0 { val } = self.call(Operation::Filesize, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?
        else {
            unreachable!("S0 is Filesize's response shape")
        };
        Ok(i64::from(val))
    }

    /// Whether `path` is a regular file.
    pub async fn file_exist(&mut self, path: &str) -> Result<bool, ClientError> {
        let Slot::S0 { val } =
            self.call(Operation::FileExist, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?
        else {
            unreachable!("S0 is FileExist's response shape")
        };
        Ok(val != 0)
    }

    /// Whether `path` is a directory.
    pub async fn dir_exist(&mut self, path: &str) -> Result<bool, ClientError> {
        let Slot::S0 { val } = self.call(Operation::DirExist, Slot::s1(path.as_bytes().to_vec()), SlotShape::S0).await?
        else {
            unreachable!("S0 is DirExist's response shape")
        };
        Ok(val != 0)
    }

    /// Open a remote file, returning its opaque stream id.
    pub async fn fopen(&mut self, name: &str, mode: &str) -> Result<u32, ClientError> {
        let encoder = self.session.encoder_mode;
        let Slot::S0 { val } = self
            .call(
                Operation::Fopen,
                Slot::S2 { first: name.as_bytes().to_vec().into(), second: mode.as_bytes().to_vec().into(), encoder },
                SlotShape::S0,
            )
            .await?
        else {
            unreachable!("S0 is Fopen's response shape")
        };
        Ok(val)
    }

    /// Flush a stream's OS-level buffers.
    pub async fn fflush(&mut self, stream_id: u32) -> Result<(), ClientError> {
        self.call(Operation::Fflush, Slot::s0(stream_id), SlotShape::S0).await?;
        Ok(())
    }

    /// Close a stream and release its handle, including the data socket
    /// opened for it, if any.
    pub async fn fclose(&mut self, stream_id: u32) -> Result<(), ClientError> {
        self.call(Operation::Fclose, Slot::s0(stream_id), SlotShape::S0).await?;
        self.data_sockets.remove(&stream_id);
        Ok(())
    }

    /// Establish a control connection / session (`point_create`).
    pub async fn point_create(&mut self) -> Result<(), ClientError> {
        self.call(Operation::PointCreate, Slot::s0(0), SlotShape::S0).await?;
        Ok(())
    }

    /// Tear down a session (`point_close`).
    pub async fn point_close(&mut self) -> Result<(), ClientError> {
        self.call(Operation::PointClose, Slot::s0(0), SlotShape::S0).await?;
        Ok(())
    }

    /// Run a remote shell command, returning the path to a local temp file
    /// holding its output.
    ///
    /// Implemented as a pipeline of lower-level RPCs: `ls`
    /// returns a server-side dump path, which this then downloads with
    /// `fopen`+`fread` and removes with `unlink`.
    pub async fn ls(&mut self, command: &str) -> Result<std::path::PathBuf, ClientError> {
        let Slot::S1 { data: remote_path } =
            self.call(Operation::Ls, Slot::s1(command.as_bytes().to_vec()), SlotShape::S1).await?
        else {
            unreachable!("S1 is Ls's response shape")
        };
        let remote_path = String::from_utf8_lossy(&remote_path).into_owned();

        let size = self.filesize(&remote_path).await?;
        #[allow(clippy::cast_sign_loss)]
        let size = size.max(0) as u32;

        let stream_id = self.fopen(&remote_path, "r").await?;
        let local_bytes = if size == 0 {
            Vec::new()
        } else {
            crate::stream::open_data_channel(self, stream_id).await?;
            crate::stream::fread(self, stream_id, size).await?
        };
        self.fclose(stream_id).await?;
        self.unlink(&remote_path).await?;

        let local_path = std::env::temp_dir().join(format!("rxs-client-ls-{stream_id}.dat"));
        tokio::fs::write(&local_path, &local_bytes).await.map_err(|e| self.fail_local(rxs_core::RxsError::Transport(e)))?;

        Ok(local_path)
    }
}
