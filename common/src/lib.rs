#![doc = include_str!("../Readme.md")]

pub mod commands;
pub mod decoding;
pub mod encoding;
pub mod optneg;
pub mod replies;

mod error;

pub use error::{InvalidData, NotEnoughData, ProtocolError};

/// Message chunk size the milter protocol is designed around.
///
/// MTAs deliver body data in chunks of roughly this size. A frame declaring
/// a payload larger than twice this value cannot be genuine milter traffic
/// and is rejected before any memory is reserved for it.
pub const MESSAGE_CHUNK: usize = 65536;
