//! The error taxonomy: a POSIX-mirroring `Errno` catalog, and the
//! dual-namespace `RxsError`/client "last error" that distinguishes a local
//! failure from one reported by the peer.
//!
//! Taxonomy: protocol errors and transport errors are fatal for
//! the channel (`RxsError::Protocol`/`RxsError::Transport`); semantic errors
//! (any OS errno from a handler) are recoverable — the channel survives and
//! only the one operation fails (`RxsError::Remote`); policy errors
//! (address denied, bad credentials) are fatal and close the connection
//! after one `EACCES` response.

use std::io;

use rxs_proto::ProtocolError;
use thiserror::Error;

/// A POSIX-errno-mirroring catalog. Numeric values match Linux's `errno.h`
/// so that a server handler can report the OS's own errno unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Errno {
    /// No error.
    None,
    /// Operation not permitted.
    Eperm,
    /// No such file or directory.
    Enoent,
    /// No such process.
    Esrch,
    /// Interrupted system call.
    Eintr,
    /// I/O error.
    Eio,
    /// No such device or address.
    Enxio,
    /// Argument list too long.
    E2big,
    /// Exec format error.
    Enoexec,
    /// Bad file number.
    Ebadf,
    /// No child processes.
    Echild,
    /// Try again.
    Eagain,
    /// Out of memory.
    Enomem,
    /// Permission denied.
    Eacces,
    /// Bad address.
    Efault,
    /// Device or resource busy.
    Ebusy,
    /// File exists.
    Eexist,
    /// Cross-device link.
    Exdev,
    /// No such device.
    Enodev,
    /// Not a directory.
    Enotdir,
    /// Is a directory.
    Eisdir,
    /// Invalid argument.
    Einval,
    /// File table overflow.
    Enfile,
    /// Too many open files.
    Emfile,
    /// Not a typewriter.
    Enotty,
    /// File too large.
    Efbig,
    /// No space left on device.
    Enospc,
    /// Illegal seek.
    Espipe,
    /// Read-only file system.
    Erofs,
    /// Too many links.
    Emlink,
    /// Broken pipe.
    Epipe,
    /// Numerical argument out of domain.
    Edom,
    /// Numerical result out of range.
    Erange,
    /// File name too long.
    Enametoolong,
    /// Directory not empty.
    Enotempty,
    /// Too many symbolic links encountered.
    Eloop,
    /// Function not implemented.
    Enosys,
    /// Connection refused.
    Econnrefused,
    /// Connection reset by peer.
    Econnreset,
    /// Connection timed out.
    Etimedout,
    /// Operation already in progress.
    Ealready,
    /// Operation now in progress.
    Einprogress,
    /// Not a socket.
    Enotsock,
    /// Address already in use.
    Eaddrinuse,
    /// Cannot assign requested address.
    Eaddrnotavail,
    /// Network is unreachable.
    Enetunreach,
    /// Broken connection / no route to host.
    Ehostunreach,
    /// Disk quota exceeded.
    Edquot,
    /// Any errno this catalog doesn't name explicitly, carried as its raw
    /// numeric value so nothing is silently discarded.
    Other(u32),
}

impl Errno {
    /// Numeric value matching Linux `errno.h`.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Eperm => 1,
            Self::Enoent => 2,
            Self::Esrch => 3,
            Self::Eintr => 4,
            Self::Eio => 5,
            Self::Enxio => 6,
            Self::E2big => 7,
            Self::Enoexec => 8,
            Self::Ebadf => 9,
            Self::Echild => 10,
            Self::Eagain => 11,
            Self::Enomem => 12,
            Self::Eacces => 13,
            Self::Efault => 14,
            Self::Ebusy => 16,
            Self::Eexist => 17,
            Self::Exdev => 18,
            Self::Enodev => 19,
            Self::Enotdir => 20,
            Self::Eisdir => 21,
            Self::Einval => 22,
            Self::Enfile => 23,
            Self::Emfile => 24,
            Self::Enotty => 25,
            Self::Efbig => 27,
            Self::Enospc => 28,
            Self::Espipe => 29,
            Self::Erofs => 30,
            Self::Emlink => 31,
            Self::Epipe => 32,
            Self::Edom => 33,
            Self::Erange => 34,
            Self::Enametoolong => 36,
            Self::Enotempty => 39,
            Self::Eloop => 40,
            Self::Enosys => 38,
            Self::Econnrefused => 111,
            Self::Econnreset => 104,
            Self::Etimedout => 110,
            Self::Ealready => 114,
            Self::Einprogress => 115,
            Self::Enotsock => 88,
            Self::Eaddrinuse => 98,
            Self::Eaddrnotavail => 99,
            Self::Enetunreach => 101,
            Self::Ehostunreach => 113,
            Self::Edquot => 122,
            Self::Other(raw) => raw,
        }
    }

    /// Recover an [`Errno`] from a raw numeric value.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Eperm,
            2 => Self::Enoent,
            3 => Self::Esrch,
            4 => Self::Eintr,
            5 => Self::Eio,
            6 => Self::Enxio,
            7 => Self::E2big,
            8 => Self::Enoexec,
            9 => Self::Ebadf,
            10 => Self::Echild,
            11 => Self::Eagain,
            12 => Self::Enomem,
            13 => Self::Eacces,
            14 => Self::Efault,
            16 => Self::Ebusy,
            17 => Self::Eexist,
            18 => Self::Exdev,
            19 => Self::Enodev,
            20 => Self::Enotdir,
            21 => Self::Eisdir,
            22 => Self::Einval,
            23 => Self::Enfile,
            24 => Self::Emfile,
            25 => Self::Enotty,
            27 => Self::Efbig,
            28 => Self::Enospc,
            29 => Self::Espipe,
            30 => Self::Erofs,
            31 => Self::Emlink,
            32 => Self::Epipe,
            33 => Self::Edom,
            34 => Self::Erange,
            36 => Self::Enametoolong,
            38 => Self::Enosys,
            39 => Self::Enotempty,
            40 => Self::Eloop,
            88 => Self::Enotsock,
            98 => Self::Eaddrinuse,
            99 => Self::Eaddrnotavail,
            101 => Self::Enetunreach,
            104 => Self::Econnreset,
            110 => Self::Etimedout,
            111 => Self::Econnrefused,
            113 => Self::Ehostunreach,
            114 => Self::Ealready,
            115 => Self::Einprogress,
            122 => Self::Edquot,
            other => Self::Other(other),
        }
    }

    /// Map an `io::ErrorKind` to the closest `Errno`, for translating
    /// std I/O failures in a handler into a wire-reportable errno.
    #[must_use]
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::Enoent,
            io::ErrorKind::PermissionDenied => Self::Eacces,
            io::ErrorKind::AlreadyExists => Self::Eexist,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Self::Einval,
            io::ErrorKind::TimedOut => Self::Etimedout,
            io::ErrorKind::ConnectionRefused => Self::Econnrefused,
            io::ErrorKind::ConnectionReset => Self::Econnreset,
            io::ErrorKind::AddrInUse => Self::Eaddrinuse,
            io::ErrorKind::AddrNotAvailable => Self::Eaddrnotavail,
            io::ErrorKind::BrokenPipe => Self::Epipe,
            io::ErrorKind::WouldBlock => Self::Eagain,
            io::ErrorKind::DirectoryNotEmpty => Self::Enotempty,
            io::ErrorKind::NotADirectory => Self::Enotdir,
            io::ErrorKind::IsADirectory => Self::Eisdir,
            io::ErrorKind::FilesystemQuotaExceeded => Self::Edquot,
            io::ErrorKind::FileTooLarge => Self::Efbig,
            io::ErrorKind::StorageFull => Self::Enospc,
            _ => Self::Eio,
        }
    }

    /// Textual form, e.g. `"Permission denied"`, matching the conventional
    /// `strerror` wording closely enough for CLI error messages.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::None => "Success",
            Self::Eperm => "Operation not permitted",
            Self::Enoent => "No such file or directory",
            Self::Esrch => "No such process",
            Self::Eintr => "Interrupted system call",
            Self::Eio => "Input/output error",
            Self::Enxio => "No such device or address",
            Self::E2big => "Argument list too long",
            Self::Enoexec => "Exec format error",
            Self::Ebadf => "Bad file descriptor",
            Self::Echild => "No child processes",
            Self::Eagain => "Resource temporarily unavailable",
            Self::Enomem => "Cannot allocate memory",
            Self::Eacces => "Permission denied",
            Self::Efault => "Bad address",
            Self::Ebusy => "Device or resource busy",
            Self::Eexist => "File exists",
            Self::Exdev => "Invalid cross-device link",
            Self::Enodev => "No such device",
            Self::Enotdir => "Not a directory",
            Self::Eisdir => "Is a directory",
            Self::Einval => "Invalid argument",
            Self::Enfile => "Too many open files in system",
            Self::Emfile => "Too many open files",
            Self::Enotty => "Inappropriate ioctl for device",
            Self::Efbig => "File too large",
            Self::Enospc => "No space left on device",
            Self::Espipe => "Illegal seek",
            Self::Erofs => "Read-only file system",
            Self::Emlink => "Too many links",
            Self::Epipe => "Broken pipe",
            Self::Edom => "Numerical argument out of domain",
            Self::Erange => "Numerical result out of range",
            Self::Enametoolong => "File name too long",
            Self::Enotempty => "Directory not empty",
            Self::Eloop => "Too many levels of symbolic links",
            Self::Enosys => "Function not implemented",
            Self::Econnrefused => "Connection refused",
            Self::Econnreset => "Connection reset by peer",
            Self::Etimedout => "Connection timed out",
            Self::Ealready => "Operation already in progress",
            Self::Einprogress => "Operation now in progress",
            Self::Enotsock => "Socket operation on non-socket",
            Self::Eaddrinuse => "Address already in use",
            Self::Eaddrnotavail => "Cannot assign requested address",
            Self::Enetunreach => "Network is unreachable",
            Self::Ehostunreach => "No route to host",
            Self::Edquot => "Disk quota exceeded",
            Self::Other(_) => "Unknown error",
        }
    }
}

/// Errors from the protocol/transport/policy layers — fatal for the channel
/// that raised them, as opposed to [`Errno`], which is a recoverable
/// per-operation result.
#[derive(Debug, Error)]
pub enum RxsError {
    /// Separator miss, CRC mismatch, short frame, unknown operation, or a
    /// response whose operation code didn't match its request.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket connect/read/write failure, or a 60-second poll timeout.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A 60-second control-channel poll elapsed with no frame available.
    #[error("control channel timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The peer closed its end of the control socket.
    #[error("channel closed by peer")]
    ChannelClosed,

    /// A response carried a different operation code than its request.
    #[error("response operation mismatch: sent {sent}, received {received}")]
    OperationMismatch {
        /// Operation code the request carried.
        sent: u16,
        /// Operation code the response carried.
        received: u16,
    },

    /// Client address rejected by the server's allow/deny policy.
    #[error("address rejected by policy")]
    PolicyDenied,

    /// A handler-level OS failure, reported to the peer as `SC_B1` +
    /// `S0{val = errno}`.
    #[error("remote error: {0}")]
    Remote(Errno),
}

impl RxsError {
    /// Map to the client session's dual-namespace "last error" value:
    /// values `< 200` are client-local, `>= 200` is `200 + errno` as
    /// reported by the server.
    #[must_use]
    pub fn last_error_code(&self) -> u32 {
        match self {
            Self::Remote(errno) => 200 + errno.to_raw(),
            Self::Protocol(_) => 1,
            Self::Transport(_) => 2,
            Self::Timeout(_) => 3,
            Self::ChannelClosed => 4,
            Self::OperationMismatch { .. } => 5,
            Self::PolicyDenied => 6,
        }
    }
}
