//! Export the codec entry point for the fuzz targets.
//!
//! Feature gated behind the private `_fuzzing` flag, not part of the public
//! API.

use asynchronous_codec::Decoder;
use bytes::BytesMut;

use spamgate_common::{decoding::ClientCommand, ProtocolError};

use crate::codec::MilterCodec;

/// Run one decode step over `buffer`, exactly as a live session would.
///
/// # Errors
/// Transparently returns errors from the decode function.
pub fn fuzz_parse(buffer: &mut BytesMut) -> Result<Option<ClientCommand>, ProtocolError> {
    let mut codec = MilterCodec::new();
    (&mut codec).decode(buffer)
}
