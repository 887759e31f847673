use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::decoding::Parsable;
use crate::encoding::Writable;
use crate::{InvalidData, NotEnoughData, ProtocolError};
use spamgate_utils::ByteParsing;

/// Wire marker for the connection family
#[allow(missing_docs)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Family {
    Unknown = b'U',
    Unix = b'L',
    Inet = b'4',
    Inet6 = b'6',
}

/// Peer address of the SMTP client, as reported by the MTA
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PeerAddr {
    /// TCP peer, IPv4 or IPv6
    Inet(SocketAddr),
    /// Local socket peer
    Unix(String),
}

impl PeerAddr {
    /// The wire family byte matching this address
    #[must_use]
    pub fn family(&self) -> Family {
        match self {
            PeerAddr::Inet(sock) if sock.is_ipv4() => Family::Inet,
            PeerAddr::Inet(_) => Family::Inet6,
            PeerAddr::Unix(_) => Family::Unix,
        }
    }

    /// Whether this is a local (unix socket) peer
    #[must_use]
    pub fn is_unix(&self) -> bool {
        matches!(self, PeerAddr::Unix(_))
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddr::Inet(sock) => write!(f, "{sock}"),
            PeerAddr::Unix(path) => f.write_str(path),
        }
    }
}

/// Connection information about the SMTP client.
///
/// Sendmail reports the client hostname here; Postfix does not, so an empty
/// hostname is normal. An address the MTA knows nothing about (family
/// `Unknown`, or missing address bytes) leaves `addr` unset rather than
/// failing the session.
#[derive(Clone, PartialEq, Debug)]
pub struct Connect {
    hostname: BytesMut,
    /// Peer address, when the MTA reported a usable one
    pub addr: Option<PeerAddr>,
}

impl Connect {
    const CODE: u8 = b'C';

    /// Create a connect package
    #[must_use]
    pub fn new(hostname: &[u8], addr: Option<PeerAddr>) -> Self {
        Self {
            hostname: BytesMut::from_iter(hostname),
            addr,
        }
    }

    /// The MTA-reported hostname of the SMTP client. May be empty.
    #[must_use]
    pub fn hostname(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.hostname)
    }

    /// Split into hostname bytes and peer address
    #[must_use]
    pub fn into_parts(self) -> (BytesMut, Option<PeerAddr>) {
        (self.hostname, self.addr)
    }
}

/// Sendmail prefixes IPv6 addresses with `IPv6:` and sometimes brackets
/// them; normalize both away before parsing.
fn parse_inet6(raw: &[u8]) -> Option<Ipv6Addr> {
    let raw = if raw.len() >= 5 && raw[..5].eq_ignore_ascii_case(b"IPv6:") {
        &raw[5..]
    } else {
        raw
    };

    let raw = match raw {
        [b'[', inner @ .., b']'] => inner,
        _ => raw,
    };

    std::str::from_utf8(raw).ok()?.parse().ok()
}

impl Parsable for Connect {
    const CODE: u8 = Self::CODE;

    fn parse(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(hostname) = buffer.delimited(0) else {
            return Err(InvalidData::new(
                "connect package is missing the hostname terminator",
                buffer,
            )
            .into());
        };

        let Some(family_byte) = buffer.safe_get_u8() else {
            return Err(NotEnoughData::new("Connect", "family byte missing", 1, 0, buffer).into());
        };
        let Ok(family) = Family::try_from(family_byte) else {
            return Err(InvalidData::new(
                "connect package with an unsupported protocol family",
                BytesMut::from_iter([family_byte]),
            )
            .into());
        };

        if family == Family::Unknown {
            // The MTA has no peer information. Not an error.
            return Ok(Self {
                hostname,
                addr: None,
            });
        }

        let Some(port) = buffer.safe_get_u16() else {
            // Truncated connect info, degrade like an unknown peer.
            return Ok(Self {
                hostname,
                addr: None,
            });
        };

        if let Some(b'\0') = buffer.last() {
            buffer.truncate(buffer.len() - 1);
        }

        if buffer.is_empty() {
            return Ok(Self {
                hostname,
                addr: None,
            });
        }

        let addr = match family {
            // Returned early above, kept for exhaustiveness.
            Family::Unknown => None,
            Family::Unix => Some(PeerAddr::Unix(
                String::from_utf8_lossy(&buffer).into_owned(),
            )),
            Family::Inet => {
                let Some(ip) = std::str::from_utf8(&buffer)
                    .ok()
                    .and_then(|raw| raw.parse::<Ipv4Addr>().ok())
                else {
                    return Err(InvalidData::new(
                        "connect package with a malformed IPv4 address",
                        buffer,
                    )
                    .into());
                };
                Some(PeerAddr::Inet(SocketAddr::new(IpAddr::V4(ip), port)))
            }
            Family::Inet6 => {
                let Some(ip) = parse_inet6(&buffer) else {
                    return Err(InvalidData::new(
                        "connect package with a malformed IPv6 address",
                        buffer,
                    )
                    .into());
                };
                Some(PeerAddr::Inet(SocketAddr::new(IpAddr::V6(ip), port)))
            }
        };

        Ok(Self { hostname, addr })
    }
}

impl Writable for Connect {
    fn write(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.hostname);
        buffer.put_u8(0);

        let Some(addr) = &self.addr else {
            buffer.put_u8(Family::Unknown.into());
            return;
        };

        buffer.put_u8(addr.family().into());

        match addr {
            PeerAddr::Inet(sock) => {
                buffer.put_u16(sock.port());
                buffer.extend_from_slice(sock.ip().to_string().as_bytes());
            }
            PeerAddr::Unix(path) => {
                buffer.put_u16(0);
                buffer.extend_from_slice(path.as_bytes());
            }
        }
        buffer.put_u8(0);
    }

    fn len(&self) -> usize {
        let addr_len = match &self.addr {
            None => 0,
            Some(PeerAddr::Inet(sock)) => 2 + sock.ip().to_string().len() + 1,
            Some(PeerAddr::Unix(path)) => 2 + path.len() + 1,
        };

        self.hostname.len() + 1 + 1 + addr_len
    }

    fn code(&self) -> u8 {
        Self::CODE
    }

    fn is_empty(&self) -> bool {
        false
    }
}
