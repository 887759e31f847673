//! Per-connection milter state.
//!
//! The MTA replays its SMTP session command by command; everything lands
//! here until end-of-body, when the accumulated message is rendered into a
//! scan request. ABORT and QUIT_NC clear different slices of this state so
//! one connection can carry many envelopes.

use bitflags::bitflags;
use bytes::BytesMut;

use spamgate_common::commands::{Body, Connect, Header, Helo, Macro, Mail, PeerAddr, Recipient};
use spamgate_utils::{debug, CaseFoldMap};

bitflags! {
    /// Which slices of session state a reset clears
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Reset: u8 {
        /// Envelope, message bytes and header counts
        const COMMON = 1 << 0;
        /// Peer address from CONNECT
        const ADDR = 1 << 1;
        /// Accumulated macros
        const MACROS = 1 << 2;

        /// Scope cleared by an ABORT: the message in flight is dropped but
        /// the same SMTP client carries on
        const ABORT = Self::COMMON.bits();
        /// Scope cleared when the connection is recycled for a possibly
        /// different SMTP client
        const QUIT_NC = Self::COMMON.bits() | Self::ADDR.bits() | Self::MACROS.bits();
    }
}

/// Envelope address as received in MAIL FROM / RCPT TO.
///
/// Full RFC 5321 parsing belongs to the scanner; this keeps just enough
/// structure to put the address into a scan request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SmtpAddr {
    addr: String,
}

impl SmtpAddr {
    /// Parse one address token of a MAIL or RCPT payload.
    ///
    /// One matched layer of angle brackets is stripped; `<>` is the null
    /// sender. An empty token or unbalanced brackets do not parse.
    pub(crate) fn parse(raw: &[u8]) -> Option<Self> {
        let token = String::from_utf8_lossy(raw);
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let addr = if let Some(inner) = token.strip_prefix('<') {
            inner.strip_suffix('>')?
        } else if token.ends_with('>') {
            return None;
        } else {
            token
        };

        Some(Self {
            addr: addr.to_string(),
        })
    }

    /// The bare address, brackets stripped. Empty for the null sender.
    pub(crate) fn as_str(&self) -> &str {
        &self.addr
    }
}

/// Everything accumulated over one milter connection
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Client hostname from CONNECT, possibly overridden by `{mail_host}`
    pub(crate) hostname: BytesMut,
    /// HELO/EHLO argument
    pub(crate) helo: BytesMut,
    /// Envelope sender
    pub(crate) from: Option<SmtpAddr>,
    /// Envelope recipients in wire order
    pub(crate) rcpts: Vec<SmtpAddr>,
    /// Peer address from CONNECT
    pub(crate) addr: Option<PeerAddr>,
    /// Headers joined by CRLF, a blank line, then the body
    pub(crate) message: BytesMut,
    /// Occurrences per header name, for 1-based CHGHEADER targeting
    pub(crate) headers_seen: CaseFoldMap<u32>,
    /// MTA macros, case-insensitive, braces included in the names
    pub(crate) macros: CaseFoldMap<String>,
    /// A reject verdict discards instead of rejecting
    pub(crate) discard_on_reject: bool,
    /// Probe mode: record the verdict in a header but accept
    pub(crate) no_action: bool,
}

impl Session {
    pub(crate) fn new(discard_on_reject: bool) -> Self {
        Self {
            discard_on_reject,
            ..Self::default()
        }
    }

    pub(crate) fn connect(&mut self, connect: Connect) {
        let (hostname, addr) = connect.into_parts();
        self.hostname = hostname;
        self.addr = addr;
        debug!(
            "connection from {}",
            self.addr
                .as_ref()
                .map_or_else(|| "unknown peer".to_string(), ToString::to_string)
        );
    }

    pub(crate) fn helo(&mut self, helo: Helo) {
        self.helo = helo.into_bytes();
    }

    pub(crate) fn absorb_macros(&mut self, macro_: &Macro) {
        for (name, value) in macro_.macros() {
            let name = String::from_utf8_lossy(name);
            let value = String::from_utf8_lossy(value).into_owned();

            // Postfix reports the real client hostname through this macro.
            if name.eq_ignore_ascii_case("{mail_host}") {
                self.hostname.clear();
                self.hostname.extend_from_slice(value.as_bytes());
            }

            self.macros.insert(&name, value);
        }
    }

    pub(crate) fn mail(&mut self, mail: &Mail) {
        if let Some(addr) = SmtpAddr::parse(mail.sender_raw()) {
            self.from = Some(addr);
        }
    }

    pub(crate) fn rcpt(&mut self, rcpt: &Recipient) {
        for raw in rcpt.addrs() {
            if let Some(addr) = SmtpAddr::parse(raw) {
                self.rcpts.push(addr);
            }
        }
    }

    pub(crate) fn header(&mut self, header: &Header) {
        let name = header.name();
        let seen = self.headers_seen.get(&name).copied().unwrap_or(0);
        self.headers_seen.insert(&name, seen + 1);

        self.message.extend_from_slice(name.as_bytes());
        self.message.extend_from_slice(b": ");
        self.message.extend_from_slice(header.value().as_bytes());
        self.message.extend_from_slice(b"\r\n");
    }

    pub(crate) fn end_of_headers(&mut self) {
        self.message.extend_from_slice(b"\r\n");
    }

    pub(crate) fn body_chunk(&mut self, body: &Body) {
        debug!("got body chunk: {} bytes", body.as_bytes().len());
        self.message.extend_from_slice(body.as_bytes());
    }

    /// How often header `name` was seen in the current message
    pub(crate) fn header_count(&self, name: &str) -> u32 {
        self.headers_seen.get(name).copied().unwrap_or(0)
    }

    /// Clear the given slices of state. Buffers keep their capacity; the
    /// verdict policy bits survive every reset.
    pub(crate) fn reset(&mut self, scope: Reset) {
        if scope.contains(Reset::COMMON) {
            self.message.clear();
            self.rcpts.clear();
            self.from = None;
            self.helo.clear();
            self.hostname.clear();
            self.headers_seen.clear();
        }

        if scope.contains(Reset::ADDR) {
            self.addr = None;
        }

        if scope.contains(Reset::MACROS) {
            self.macros.clear();
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn session_with_message() -> Session {
        let mut session = Session::new(false);

        session.connect(Connect::new(
            b"client.example",
            Some(PeerAddr::Inet("192.0.2.1:25".parse().unwrap())),
        ));
        session.absorb_macros(&Macro::new(b'C', &[(b"j".as_slice(), b"mx.example".as_slice())]));
        session.helo(Helo::from(b"client.example".as_slice()));
        session.mail(&Mail::from(b"<sender@example.com>".as_slice()));
        session.rcpt(&Recipient::from(b"<user@example.net>".as_slice()));
        session.header(&Header::new(b"From", b"sender@example.com"));
        session.header(&Header::new(b"Subject", b"hello"));
        session.end_of_headers();
        session.body_chunk(&Body::from(b"body".as_slice()));

        session
    }

    #[rstest]
    #[case(b"<user@example.net>".as_slice(), Some("user@example.net"))]
    #[case(b" <user@example.net> ".as_slice(), Some("user@example.net"))]
    #[case(b"user@example.net".as_slice(), Some("user@example.net"))]
    #[case(b"<>".as_slice(), Some(""))]
    #[case(b"".as_slice(), None)]
    #[case(b"   ".as_slice(), None)]
    #[case(b"<user@example.net".as_slice(), None)]
    #[case(b"user@example.net>".as_slice(), None)]
    fn test_smtp_addr(#[case] raw: &[u8], #[case] expected: Option<&str>) {
        let parsed = SmtpAddr::parse(raw);

        assert_eq!(parsed.as_ref().map(SmtpAddr::as_str), expected);
    }

    #[test]
    fn test_message_assembly() {
        let mut session = Session::new(false);

        for value in ["a@example.com", "b@example.com", "c@example.com"] {
            session.header(&Header::new(b"From", value.as_bytes()));
        }
        session.header(&Header::new(b"Subject", b"hi"));
        session.end_of_headers();
        session.body_chunk(&Body::from(b"01234".as_slice()));
        session.body_chunk(&Body::from(b"56789".as_slice()));

        let expected = "From: a@example.com\r\nFrom: b@example.com\r\nFrom: c@example.com\r\n\
                        Subject: hi\r\n\r\n0123456789";
        assert_eq!(&session.message[..], expected.as_bytes());
        assert_eq!(session.header_count("From"), 3);
        assert_eq!(session.header_count("from"), 3);
        assert_eq!(session.header_count("Subject"), 1);
        assert_eq!(session.header_count("Received"), 0);
    }

    #[test]
    fn test_mail_host_macro_overrides_hostname() {
        let mut session = Session::new(false);

        session.connect(Connect::new(b"reverse.example", None));
        session.absorb_macros(&Macro::new(
            b'C',
            &[(b"{Mail_Host}".as_slice(), b"real.example".as_slice())],
        ));

        assert_eq!(&session.hostname[..], b"real.example");
    }

    #[test]
    fn test_abort_reset_keeps_peer_and_macros() {
        let mut session = session_with_message();

        session.reset(Reset::ABORT);

        assert!(session.message.is_empty());
        assert!(session.rcpts.is_empty());
        assert_eq!(session.from, None);
        assert!(session.helo.is_empty());
        assert!(session.hostname.is_empty());
        assert_eq!(session.header_count("From"), 0);

        // The connection (and so the peer) is unchanged.
        assert!(session.addr.is_some());
        assert_eq!(session.macros.get("j").map(String::as_str), Some("mx.example"));
    }

    #[test]
    fn test_quit_nc_reset_clears_everything() {
        let mut session = session_with_message();

        session.reset(Reset::QUIT_NC);

        assert!(session.message.is_empty());
        assert_eq!(session.addr, None);
        assert!(session.macros.is_empty());
    }

    #[test]
    fn test_reset_keeps_policy_bits() {
        let mut session = Session::new(true);
        session.no_action = true;

        session.reset(Reset::QUIT_NC);

        assert!(session.discard_on_reject);
        assert!(session.no_action);
    }
}
