//! Decoding MTA-sent frame payloads into structured commands.

use bytes::BytesMut;
use enum_dispatch::enum_dispatch;

use spamgate_utils::ByteParsing;

use crate::commands::{
    Abort, Body, Connect, Data, EndOfBody, EndOfHeader, Header, Helo, Macro, Mail, Quit, QuitNc,
    Recipient, Unknown,
};
use crate::optneg::OptNeg;
use crate::{InvalidData, NotEnoughData, ProtocolError};

/// Parse something 'from the wire'.
pub(crate) trait Parsable: Sized {
    /// The command byte identifying this item
    const CODE: u8;

    /// Parse a `Self` from the given frame payload.
    ///
    /// # Errors
    /// Fails with a [`ProtocolError`] when the payload does not decode as
    /// this command.
    fn parse(buffer: BytesMut) -> Result<Self, ProtocolError>;
}

macro_rules! client_commands {
    ($($variant:ident),+ $(,)?) => {
        /// Every command an MTA may send, decoded.
        ///
        /// See the contained variants for payload details.
        #[allow(missing_docs)]
        #[enum_dispatch]
        #[cfg_attr(feature = "tracing", derive(strum::Display))]
        #[derive(Debug, Clone)]
        pub enum ClientCommand {
            $($variant($variant),)+
        }

        impl ClientCommand {
            /// Decode a frame (command byte plus payload) into a command.
            ///
            /// # Errors
            /// Fails if the command byte is not part of the protocol, or if
            /// the payload does not parse for that command.
            pub fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
                let Some(code) = buffer.safe_get_u8() else {
                    return Err(NotEnoughData::new(
                        "Command",
                        "command byte missing",
                        1,
                        0,
                        buffer,
                    )
                    .into());
                };

                match code {
                    $($variant::CODE => Ok($variant::parse(buffer)?.into()),)+
                    _ => Err(InvalidData::new(
                        "unknown milter command byte",
                        BytesMut::from_iter([code]),
                    )
                    .into()),
                }
            }
        }
    };
}

client_commands!(
    // Option negotiation opens every connection
    OptNeg,
    // Connection control
    Abort,
    Quit,
    QuitNc,
    // MTA-provided key/value pairs
    Macro,
    Unknown,
    // SMTP opening
    Connect,
    Helo,
    // Envelope
    Mail,
    Recipient,
    // Message content
    Data,
    Header,
    EndOfHeader,
    Body,
    EndOfBody,
);
