//! The closed operation enumeration carried in every packet header.

use crate::error::ProtocolError;

/// One of the 24 stable operation codes. Numeric values are part of the wire
/// contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Operation {
    /// Reserved, never sent.
    Undef = 0,
    /// Open a file, returns a stream id.
    Fopen = 1,
    /// Pull bytes from an open stream.
    Fread = 2,
    /// Push bytes to an open stream.
    Fwrite = 3,
    /// Flush a stream's OS-level buffers.
    Fflush = 4,
    /// Close a stream and release its handle.
    Fclose = 5,
    /// Seek within a stream. Always answered with `ENOSYS`.
    Fseek = 6,
    /// Report a stream's position. Always answered with `ENOSYS`.
    Ftell = 7,
    /// Rewind a stream to its start. Always answered with `ENOSYS`.
    Rewind = 8,
    /// Establish a control connection / session.
    PointCreate = 9,
    /// Tear down a session.
    PointClose = 10,
    /// Authenticate and establish the session's home directory.
    Authorization = 11,
    /// Run a shell command and capture its output to a temp file.
    Ls = 12,
    /// Create a directory.
    Mkdir = 13,
    /// Recursively create a directory (`mkdir -p`).
    MkdirEx = 14,
    /// Remove a directory.
    Rmdir = 15,
    /// Report the session's current working directory.
    Getcwd = 16,
    /// Change the session's current working directory.
    Chdir = 17,
    /// Remove a file.
    Unlink = 18,
    /// Rename a file or directory.
    Rename = 19,
    /// Report a file's size.
    Filesize = 20,
    /// Test whether a path is a regular file.
    FileExist = 21,
    /// Test whether a path is a directory.
    DirExist = 22,
    /// Advertise the client's data-channel listening port.
    Port = 23,
}

impl Operation {
    /// Highest assigned numeric operation code.
    pub const MAX: u16 = 23;

    /// Numeric wire value.
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Recover an [`Operation`] from its wire value.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::Undef,
            1 => Self::Fopen,
            2 => Self::Fread,
            3 => Self::Fwrite,
            4 => Self::Fflush,
            5 => Self::Fclose,
            6 => Self::Fseek,
            7 => Self::Ftell,
            8 => Self::Rewind,
            9 => Self::PointCreate,
            10 => Self::PointClose,
            11 => Self::Authorization,
            12 => Self::Ls,
            13 => Self::Mkdir,
            14 => Self::MkdirEx,
            15 => Self::Rmdir,
            16 => Self::Getcwd,
            17 => Self::Chdir,
            18 => Self::Unlink,
            19 => Self::Rename,
            20 => Self::Filesize,
            21 => Self::FileExist,
            22 => Self::DirExist,
            23 => Self::Port,
            _ => return None,
        })
    }

    /// Parse a wire value, producing a [`ProtocolError::UnrecognizedOperation`]
    /// on failure.
    pub fn parse(value: u16) -> Result<Self, ProtocolError> {
        Self::from_u16(value).ok_or(ProtocolError::UnrecognizedOperation(value))
    }
}

/// Packet type, carried in the header's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Client-to-server request.
    Request = 1,
    /// Server-to-client success response.
    Ok = 2,
    /// Server-to-client failure response.
    Fail = 3,
}

impl PacketType {
    /// Numeric wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Recover a [`PacketType`] from its wire value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Request,
            2 => Self::Ok,
            3 => Self::Fail,
            _ => return None,
        })
    }
}
