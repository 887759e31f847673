use std::io;

use bytes::BytesMut;
use thiserror::Error;

/// Encapsulating error for everything that can go wrong on the wire
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload bytes that could not be interpreted
    #[error(transparent)]
    InvalidData(#[from] InvalidData),
    /// A payload that ended before all of its fields did
    #[error(transparent)]
    NotEnoughData(#[from] NotEnoughData),
    /// A frame declaring a payload too large to be genuine milter traffic
    #[error("frame declares a {0} byte payload, over the protocol limit")]
    TooMuchData(usize),
    /// The MTA negotiated a milter protocol version below our minimum
    #[error("MTA speaks milter protocol version {received}, minimum supported is {supported}")]
    UnsupportedVersion {
        /// The version the MTA offered
        received: u32,
        /// The oldest version this implementation accepts
        supported: u32,
    },
    /// An io error from the underlying codec transport
    #[error(transparent)]
    CodecError(#[from] io::Error),
}

/// Error for bytes that do not decode as the announced command
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct InvalidData {
    /// A human readable message
    pub msg: &'static str,
    /// The bytes that did not decode
    pub offending_bytes: BytesMut,
}

impl InvalidData {
    /// Create a new `InvalidData` error
    #[must_use]
    pub fn new(msg: &'static str, offending_bytes: BytesMut) -> Self {
        Self {
            msg,
            offending_bytes,
        }
    }
}

/// Error for a payload that is too short for the fields it must carry
#[derive(Debug, Error)]
#[error("decoding {item}: expected {expected} bytes but got {got}: {msg}")]
pub struct NotEnoughData {
    /// The item that ran out of bytes
    pub item: &'static str,
    /// Human readable message
    pub msg: &'static str,
    /// How many bytes were needed
    pub expected: usize,
    /// How many bytes were available
    pub got: usize,
    /// The remaining bytes at the point of failure
    pub buffer: BytesMut,
}

impl NotEnoughData {
    /// Create a new `NotEnoughData` error
    #[must_use]
    pub fn new(
        item: &'static str,
        msg: &'static str,
        expected: usize,
        got: usize,
        buffer: BytesMut,
    ) -> Self {
        Self {
            item,
            msg,
            expected,
            got,
            buffer,
        }
    }
}
