use std::borrow::Cow;

use bytes::{BufMut, BytesMut};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::ProtocolError;
use spamgate_utils::ByteParsing;

/// The MAIL FROM of the envelope.
///
/// The sender runs up to the first NUL; a payload without any NUL is taken
/// as a bare sender (observed from some MTAs). ESMTP parameters after the
/// sender are kept but not interpreted.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Mail {
    sender: BytesMut,
    esmtp_args: Option<BytesMut>,
}

impl From<&[u8]> for Mail {
    fn from(value: &[u8]) -> Self {
        Self {
            sender: BytesMut::from_iter(value),
            esmtp_args: None,
        }
    }
}

impl Mail {
    const CODE: u8 = b'M';

    /// The envelope sender of this mail
    #[must_use]
    pub fn sender(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.sender)
    }

    /// The envelope sender, raw
    #[must_use]
    pub fn sender_raw(&self) -> &[u8] {
        &self.sender
    }

    /// ESMTP parameters following the sender, if any were sent
    #[must_use]
    pub fn esmtp_args(&self) -> Vec<Cow<str>> {
        let Some(args) = &self.esmtp_args else {
            return Vec::new();
        };

        args[..]
            .split(|&b| b == 0)
            .map(String::from_utf8_lossy)
            .collect()
    }
}

impl Parsable for Mail {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let sender = match buffer.delimited(0) {
            Some(sender) => sender,
            // Unterminated sender, should not happen but does
            None => buffer.split(),
        };

        let esmtp_args = if buffer.is_empty() {
            None
        } else {
            Some(buffer)
        };

        Ok(Self { sender, esmtp_args })
    }
}

impl Writable for Mail {
    fn write(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.sender);
        buffer.put_u8(0);
        if let Some(args) = &self.esmtp_args {
            buffer.extend_from_slice(args);
        }
    }

    fn len(&self) -> usize {
        self.sender.len()
            + 1
            + self
                .esmtp_args
                .as_ref()
                .map(BytesMut::len)
                .unwrap_or_default()
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        self.sender.is_empty() && self.esmtp_args.is_none()
    }
}

/// The SMTP DATA command was issued.
///
/// Carries nothing; headers and body follow in their own frames.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Data;

impl Data {
    const CODE: u8 = b'T';
}

impl Parsable for Data {
    const CODE: u8 = Self::CODE;

    fn parse(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

impl Writable for Data {
    fn write(&self, _buffer: &mut BytesMut) {}

    fn len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        false
    }
}
