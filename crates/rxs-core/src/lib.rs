//! Session state, the error catalog, the user database, and the control
//! channel shared by the RXS server and client. No transport binding of its
//! own beyond the generic async stream the control channel is parameterized
//! over.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod control;
pub mod error;
pub mod session;
pub mod userdb;

pub use control::ControlChannel;
pub use error::{Errno, RxsError};
pub use session::{AddrPattern, ClientSession, Policy, ServerSession};
pub use userdb::UserRecord;
