//! Rendering a finished session into a request for the scanning backend.

use bytes::BytesMut;

use crate::session::Session;

// Semantic request headers the scanner understands.
const QUEUE_ID_HEADER: &str = "Queue-Id";
const FROM_HEADER: &str = "From";
const RCPT_HEADER: &str = "Rcpt";
const HELO_HEADER: &str = "Helo";
const HOSTNAME_HEADER: &str = "Hostname";
const IP_HEADER: &str = "IP";
const USER_HEADER: &str = "User";
const USER_AGENT_HEADER: &str = "User-Agent";
const MTA_NAME_HEADER: &str = "MTA-Name";
const MTA_TAG_HEADER: &str = "MTA-Tag";
const TLS_CIPHER_HEADER: &str = "TLS-Cipher";
const TLS_VERSION_HEADER: &str = "TLS-Version";
const MILTER_HEADER: &str = "Milter";

/// One message, ready to hand to the scanner.
///
/// The body is the reconstructed RFC 822 message; the headers describe the
/// envelope and connection around it. [`Scanner`](crate::Scanner)
/// implementations turn this into an HTTP request verbatim:
/// [`ScanRequest::METHOD`] to [`ScanRequest::PATH`], the semantic headers as
/// HTTP headers, the body as the request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    headers: Vec<(&'static str, String)>,
    body: BytesMut,
}

impl ScanRequest {
    /// Scan requests are always POSTs
    pub const METHOD: &'static str = "POST";
    /// Scanner endpoint for a full message check
    pub const PATH: &'static str = "/checkv2";

    /// The semantic request headers, in emission order
    pub fn headers(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.headers.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// The reconstructed message
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the request, yielding the message body
    #[must_use]
    pub fn into_body(self) -> BytesMut {
        self.body
    }

    /// Render `session` into a scan request.
    ///
    /// The message buffer moves into the request; the session is left with
    /// an empty one (the header counts stay, the verdict needs them).
    pub(crate) fn from_session(session: &mut Session) -> Self {
        let mut headers = Vec::new();

        if !session.hostname.is_empty() {
            headers.push((
                HOSTNAME_HEADER,
                String::from_utf8_lossy(&session.hostname).into_owned(),
            ));
        }
        if !session.helo.is_empty() {
            headers.push((
                HELO_HEADER,
                String::from_utf8_lossy(&session.helo).into_owned(),
            ));
        }
        if let Some(from) = &session.from {
            headers.push((FROM_HEADER, from.as_str().to_string()));
        }
        for rcpt in &session.rcpts {
            headers.push((RCPT_HEADER, rcpt.as_str().to_string()));
        }
        if let Some(addr) = &session.addr {
            headers.push((IP_HEADER, addr.to_string()));
        }

        macro_headers(session, &mut headers);

        headers.push((MILTER_HEADER, "Yes".to_string()));

        Self {
            headers,
            body: session.message.split(),
        }
    }
}

/// Macro-derived headers. Postfix macro names are assumed, with the
/// Sendmail spellings as fallbacks where they differ.
fn macro_headers(session: &Session, headers: &mut Vec<(&'static str, String)>) {
    let macros = &session.macros;
    let first = |names: &[&str]| names.iter().find_map(|name| macros.get(name).cloned());

    if let Some(queue_id) = first(&["{i}", "i"]) {
        headers.push((QUEUE_ID_HEADER, queue_id));
    }

    if let Some(tag) = macros.get("{daemon_name}") {
        headers.push((MTA_TAG_HEADER, tag.clone()));
    }

    if let Some(agent) = first(&["{v}", "v"]) {
        headers.push((USER_AGENT_HEADER, agent));
    }

    if let Some(cipher) = macros.get("{cipher}") {
        headers.push((TLS_CIPHER_HEADER, cipher.clone()));
    }

    if let Some(tls_version) = macros.get("{tls_version}") {
        headers.push((TLS_VERSION_HEADER, tls_version.clone()));
    }

    if let Some(user) = macros.get("{auth_authen}") {
        headers.push((USER_HEADER, user.clone()));
    }

    // Fall back to the resolved client name when CONNECT brought none.
    if session.hostname.is_empty() {
        if let Some(client) = macros.get("{client_name}") {
            headers.push((HOSTNAME_HEADER, client.clone()));
        }
    }

    match macros.get("{daemon_name}") {
        // Postfix style
        Some(name) => headers.push((MTA_NAME_HEADER, name.clone())),
        // Sendmail style
        None => {
            if let Some(name) = first(&["{j}", "j"]) {
                headers.push((MTA_NAME_HEADER, name));
            }
        }
    }
}
