//! Writing protocol items back onto the wire.
//!
//! Everything that can become a frame body implements [`Writable`]; framing
//! itself (length prefix plus command byte) is the codec's job.

use bytes::BytesMut;
use enum_dispatch::enum_dispatch;

use crate::commands::{
    Abort, Body, Connect, Data, EndOfBody, EndOfHeader, Header, Helo, Macro, Mail, Quit, QuitNc,
    Recipient, Unknown,
};
use crate::decoding::ClientCommand;
use crate::optneg::OptNeg;

/// Write something 'to the wire'.
#[enum_dispatch(ClientCommand)]
pub trait Writable {
    /// Append the frame body of `self` to `buffer`
    fn write(&self, buffer: &mut BytesMut);

    /// Byte-length that would be appended if [`Self::write`] is called
    fn len(&self) -> usize;

    /// The command byte identifying this item on the wire
    fn code(&self) -> u8;

    /// Whether a call to [`Self::write`] would append anything
    fn is_empty(&self) -> bool;
}
