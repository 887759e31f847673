use std::borrow::Cow;

use bytes::{BufMut, BytesMut};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::ProtocolError;

/// The HELO/EHLO argument of the SMTP client.
///
/// The terminating NUL is optional on the wire; some MTAs omit it.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Helo {
    buffer: BytesMut,
}

impl From<&[u8]> for Helo {
    fn from(value: &[u8]) -> Self {
        Self {
            buffer: BytesMut::from_iter(value),
        }
    }
}

impl Helo {
    const CODE: u8 = b'H';

    /// The helo greeting sent by the client
    #[must_use]
    pub fn helo(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Take the greeting bytes out of this package
    #[must_use]
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }
}

impl Parsable for Helo {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        if let Some(b'\0') = buffer.last() {
            buffer.truncate(buffer.len() - 1);
        }

        Ok(Self { buffer })
    }
}

impl Writable for Helo {
    fn write(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.buffer);
        buffer.put_u8(0);
    }

    fn len(&self) -> usize {
        self.buffer.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
