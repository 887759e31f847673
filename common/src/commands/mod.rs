//! Commands sent by the MTA over a milter connection.
//!
//! The MTA replays its SMTP session command by command; each struct here is
//! the decoded payload of one frame.

mod body;
mod connect;
mod control;
mod header;
mod helo;
mod mail;
mod mmacro;
mod recipient;
mod unknown;

pub use self::body::{Body, EndOfBody};
pub use self::connect::{Connect, Family, PeerAddr};
pub use self::control::{Abort, Quit, QuitNc};
pub use self::header::{EndOfHeader, Header};
pub use self::helo::Helo;
pub use self::mail::{Data, Mail};
pub use self::mmacro::Macro;
pub use self::recipient::Recipient;
pub use self::unknown::Unknown;
