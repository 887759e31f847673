//! Option negotiation between the MTA and this endpoint.
//!
//! The MTA opens every milter connection with an OPTNEG frame carrying its
//! protocol version, the modification actions it permits, and protocol flags
//! describing which commands it will send and which replies it expects.

mod capability;
mod protocol;

use bytes::{Buf, BytesMut};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::{NotEnoughData, ProtocolError};

pub use capability::Capability;
pub use protocol::Protocol;

/// `SMFIC_OPTNEG`: the three-word option negotiation payload
#[derive(Clone, PartialEq, Debug)]
pub struct OptNeg {
    /// Milter protocol version
    pub version: u32,
    /// Modification actions the sender permits / requests
    pub actions: Capability,
    /// Protocol flags configuring which commands flow and which get replies
    pub protocol: Protocol,
}

impl Default for OptNeg {
    fn default() -> Self {
        Self {
            version: Self::MIN_VERSION,
            actions: Capability::default(),
            protocol: Protocol::default(),
        }
    }
}

impl OptNeg {
    /// The oldest milter protocol version this endpoint speaks.
    ///
    /// Postfix ≥ 2.6 and any reasonably recent Sendmail negotiate 6.
    /// MTAs offering less are turned away at negotiation.
    pub const MIN_VERSION: u32 = 6;

    const DATA_SIZE: usize = 4 + 4 + 4;
    const CODE: u8 = b'O';

    /// Build our answer to the MTA's offer.
    ///
    /// The reply pins the version to [`Self::MIN_VERSION`], widens the
    /// offered actions by everything this endpoint may want to do, and asks
    /// the MTA not to await replies for per-command stages: this endpoint
    /// only answers negotiation and end-of-body.
    ///
    /// # Errors
    /// [`ProtocolError::UnsupportedVersion`] when the MTA's version is below
    /// the minimum.
    pub fn negotiate(&self) -> Result<Self, ProtocolError> {
        if self.version < Self::MIN_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                received: self.version,
                supported: Self::MIN_VERSION,
            });
        }

        Ok(Self {
            version: Self::MIN_VERSION,
            actions: self.actions.union(Capability::ACTIONS_MASK),
            protocol: Protocol::NOREPLY_MASK,
        })
    }
}

impl Parsable for OptNeg {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        if buffer.len() != Self::DATA_SIZE {
            return Err(NotEnoughData::new(
                "Option negotiation",
                "expected exactly three 32 bit words",
                Self::DATA_SIZE,
                buffer.len(),
                buffer,
            )
            .into());
        }

        let version = buffer.get_u32();
        let actions = Capability::from_bits_retain(buffer.get_u32());
        let protocol = Protocol::from_bits_retain(buffer.get_u32());

        Ok(Self {
            version,
            actions,
            protocol,
        })
    }
}

impl Writable for OptNeg {
    fn write(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.version.to_be_bytes());
        buffer.extend_from_slice(&self.actions.bits().to_be_bytes());
        buffer.extend_from_slice(&self.protocol.bits().to_be_bytes());
    }

    fn len(&self) -> usize {
        Self::DATA_SIZE
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        false
    }
}
