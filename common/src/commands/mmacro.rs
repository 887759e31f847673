use bytes::{BufMut, BytesMut};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::{NotEnoughData, ProtocolError};
use spamgate_utils::ByteParsing;

/// MTA-provided key/value pairs for one protocol stage.
///
/// The payload opens with the command byte of the stage these macros belong
/// to, followed by NUL-terminated name/value pairs. Zero pairs is legal, as
/// is a completely empty payload.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Macro {
    /// Command byte of the stage these macros accompany
    pub stage: u8,
    macros: Vec<(BytesMut, BytesMut)>,
}

impl Macro {
    const CODE: u8 = b'D';

    /// Create a macro package for `stage` from (name, value) pairs
    #[must_use]
    pub fn new(stage: u8, pairs: &[(&[u8], &[u8])]) -> Self {
        Self {
            stage,
            macros: pairs
                .iter()
                .map(|(name, value)| (BytesMut::from_iter(*name), BytesMut::from_iter(*value)))
                .collect(),
        }
    }

    /// Iterate the received macros in (name, value) format
    pub fn macros(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.macros.iter().map(|(name, value)| (&name[..], &value[..]))
    }
}

impl Parsable for Macro {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(stage) = buffer.safe_get_u8() else {
            // No stage byte at all. Postfix never sends this but an empty
            // macro set is nothing to fail a session over.
            return Ok(Self::default());
        };

        let field_count = bytecount::count(&buffer, 0);
        let mut macros = Vec::with_capacity(field_count / 2);

        while !buffer.is_empty() {
            let Some(name) = buffer.delimited(0) else {
                return Err(NotEnoughData::new(
                    "Macro",
                    "missing null byte terminating a macro name",
                    1,
                    0,
                    buffer,
                )
                .into());
            };

            let Some(value) = buffer.delimited(0) else {
                return Err(NotEnoughData::new(
                    "Macro",
                    "missing null byte terminating a macro value",
                    1,
                    0,
                    buffer,
                )
                .into());
            };

            macros.push((name, value));
        }

        Ok(Self { stage, macros })
    }
}

impl Writable for Macro {
    fn write(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.stage);
        for (name, value) in &self.macros {
            buffer.extend_from_slice(name);
            buffer.put_u8(0);
            buffer.extend_from_slice(value);
            buffer.put_u8(0);
        }
    }

    fn len(&self) -> usize {
        1 + self
            .macros
            .iter()
            .map(|(name, value)| name.len() + 1 + value.len() + 1)
            .sum::<usize>()
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        false
    }
}
