//! Replies sent back to the MTA.
//!
//! One tagged enum covers every frame this endpoint can emit, from bare
//! control actions to header edits. The body layouts follow the published
//! milter protocol; framing is the codec's job.

use bytes::{BufMut, BytesMut};

use crate::encoding::Writable;
use crate::optneg::OptNeg;

/// A reply frame towards the MTA
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Deliver the message, no further milter stages
    Accept,
    /// Proceed to the next protocol stage
    Continue,
    /// Silently drop the message while pretending to accept it
    Discard,
    /// Keep-alive while a slow scan is in progress
    Progress,
    /// Refuse the message
    Reject,
    /// Ask the MTA to have the client retry later
    Tempfail,
    /// Append a header to the message
    AddHeader {
        /// Header name
        name: String,
        /// Header value
        value: String,
    },
    /// Replace the index-th occurrence of header `name`.
    ///
    /// The index is 1-based and counted per name. An empty value deletes
    /// the occurrence.
    ChgHeader {
        /// 1-based occurrence of `name` to replace
        index: u32,
        /// Header name
        name: String,
        /// New value, empty to delete
        value: String,
    },
    /// Insert a header at a position in the full header list
    InsHeader {
        /// 0-based position in the complete header list
        index: u32,
        /// Header name
        name: String,
        /// Header value
        value: String,
    },
    /// Add an envelope recipient
    AddRcpt(String),
    /// Remove an envelope recipient
    DelRcpt(String),
    /// Replace the envelope sender
    ChgFrom(String),
    /// Answer the current SMTP command with a specific status
    ReplyCode {
        /// Three digit SMTP status, e.g. `554`
        rcode: String,
        /// Enhanced status code, e.g. `5.7.1`
        xcode: String,
        /// Human readable text after the codes
        message: String,
    },
    /// Our side of option negotiation
    OptNeg(OptNeg),
}

impl Writable for Reply {
    fn write(&self, buffer: &mut BytesMut) {
        match self {
            Reply::Accept
            | Reply::Continue
            | Reply::Discard
            | Reply::Progress
            | Reply::Reject
            | Reply::Tempfail => {}
            Reply::AddHeader { name, value } => {
                buffer.extend_from_slice(name.as_bytes());
                buffer.put_u8(0);
                buffer.extend_from_slice(value.as_bytes());
                buffer.put_u8(0);
            }
            Reply::ChgHeader { index, name, value } | Reply::InsHeader { index, name, value } => {
                buffer.put_u32(*index);
                buffer.extend_from_slice(name.as_bytes());
                buffer.put_u8(0);
                buffer.extend_from_slice(value.as_bytes());
                buffer.put_u8(0);
            }
            Reply::AddRcpt(value) | Reply::DelRcpt(value) | Reply::ChgFrom(value) => {
                buffer.extend_from_slice(value.as_bytes());
                buffer.put_u8(0);
            }
            Reply::ReplyCode {
                rcode,
                xcode,
                message,
            } => {
                buffer.extend_from_slice(rcode.as_bytes());
                buffer.put_u8(b' ');
                buffer.extend_from_slice(xcode.as_bytes());
                buffer.put_u8(b' ');
                buffer.extend_from_slice(message.as_bytes());
                buffer.put_u8(0);
            }
            Reply::OptNeg(optneg) => optneg.write(buffer),
        }
    }

    fn len(&self) -> usize {
        match self {
            Reply::Accept
            | Reply::Continue
            | Reply::Discard
            | Reply::Progress
            | Reply::Reject
            | Reply::Tempfail => 0,
            Reply::AddHeader { name, value } => name.len() + 1 + value.len() + 1,
            Reply::ChgHeader { name, value, .. } | Reply::InsHeader { name, value, .. } => {
                4 + name.len() + 1 + value.len() + 1
            }
            Reply::AddRcpt(value) | Reply::DelRcpt(value) | Reply::ChgFrom(value) => {
                value.len() + 1
            }
            Reply::ReplyCode {
                rcode,
                xcode,
                message,
            } => rcode.len() + 1 + xcode.len() + 1 + message.len() + 1,
            Reply::OptNeg(optneg) => optneg.len(),
        }
    }

    fn code(&self) -> u8 {
        match self {
            Reply::Accept => b'a',
            Reply::Continue => b'c',
            Reply::Discard => b'd',
            Reply::Progress => b'p',
            Reply::Reject => b'r',
            Reply::Tempfail => b't',
            Reply::AddHeader { .. } => b'h',
            Reply::ChgHeader { .. } => b'm',
            Reply::InsHeader { .. } => b'i',
            Reply::AddRcpt(_) => b'+',
            Reply::DelRcpt(_) => b'-',
            Reply::ChgFrom(_) => b'e',
            Reply::ReplyCode { .. } => b'y',
            Reply::OptNeg(_) => b'O',
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
