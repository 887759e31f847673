use bytes::{BufMut, BytesMut};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::ProtocolError;
use spamgate_utils::ByteParsing;

/// Recipients delivered in one RCPT frame.
///
/// MTAs normally send one recipient per frame, but the payload format allows
/// several NUL-separated tokens, so all of them are kept. An unterminated
/// tail counts as a final recipient.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Recipient {
    addrs: Vec<BytesMut>,
}

impl From<&[u8]> for Recipient {
    fn from(value: &[u8]) -> Self {
        Self {
            addrs: vec![BytesMut::from_iter(value)],
        }
    }
}

impl Recipient {
    const CODE: u8 = b'R';

    /// Iterate the raw recipient tokens in wire order
    pub fn addrs(&self) -> impl Iterator<Item = &[u8]> {
        self.addrs.iter().map(|addr| &addr[..])
    }
}

impl Parsable for Recipient {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let mut addrs = Vec::with_capacity(1);

        while !buffer.is_empty() {
            match buffer.delimited(0) {
                Some(addr) => {
                    if !addr.is_empty() {
                        addrs.push(addr);
                    }
                }
                None => {
                    addrs.push(buffer.split());
                }
            }
        }

        Ok(Self { addrs })
    }
}

impl Writable for Recipient {
    fn write(&self, buffer: &mut BytesMut) {
        for addr in &self.addrs {
            buffer.extend_from_slice(addr);
            buffer.put_u8(0);
        }
    }

    fn len(&self) -> usize {
        self.addrs.iter().map(|addr| addr.len() + 1).sum()
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}
