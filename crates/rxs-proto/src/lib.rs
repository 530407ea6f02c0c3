//! Wire format for the RXS remote file-exchange protocol: the 18-byte
//! control-packet header, the closed operation enumeration, the six payload
//! slot shapes, the data-channel frame/envelope shapes, and the carry-over
//! scanner that turns a TCP byte stream into a sequence of framed packets.
//!
//! This crate performs no I/O; it only encodes, decodes, and validates
//! bytes already in memory.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod data;
pub mod error;
pub mod frame;
pub mod header;
pub mod opcode;
pub mod slot;

pub use data::{Envelope, MAX_PORTION_DATA_BYTES, RXS_DATA_PORT};
pub use error::ProtocolError;
pub use frame::{CarryOverBuffer, Packet, ScanResult, scan};
pub use header::PacketHeader;
pub use opcode::{Operation, PacketType};
pub use slot::{RXS_EOF, Slot, SlotShape};
