#![doc = include_str!("../Readme.md")]

mod codec;
mod scan;
mod session;
mod verdict;

#[cfg(feature = "_fuzzing")]
pub mod fuzzing;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use asynchronous_codec::Framed;
use futures::{AsyncRead, AsyncWrite, Future, SinkExt, StreamExt};
use thiserror::Error;
use tokio::time;
#[cfg(feature = "tracing")]
use tracing::instrument;

use spamgate_common::decoding::ClientCommand;
use spamgate_common::replies::Reply;
use spamgate_common::ProtocolError;
use spamgate_utils::debug;

pub use scan::ScanRequest;

pub(crate) use self::codec::MilterCodec;
use self::session::{Reset, Session};

/// Process-wide milter behavior, fixed at startup.
///
/// Set once and passed to [`Server::new`]; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct MilterConfig {
    /// Header name marking spam under the `add_header` action
    pub spam_header: String,
    /// Whether a reject verdict silently discards the message instead of
    /// refusing it. A verdict may override this per message.
    pub discard_on_reject: bool,
}

impl Default for MilterConfig {
    fn default() -> Self {
        Self {
            spam_header: "X-Spam".to_string(),
            discard_on_reject: false,
        }
    }
}

impl MilterConfig {
    /// Library-level setup: an optional custom spam header (`None` keeps
    /// the `X-Spam` default) and the reject-becomes-discard policy.
    #[must_use]
    pub fn new(spam_header: Option<&str>, discard_on_reject: bool) -> Self {
        let mut config = Self::default();
        if let Some(header) = spam_header {
            config.spam_header = header.to_string();
        }
        config.discard_on_reject = discard_on_reject;
        config
    }
}

/// The hand-off to the scanning backend.
///
/// Called once per message at end-of-body. Implementations typically POST
/// [`ScanRequest::body`] to `ScanRequest::PATH` with the semantic headers
/// attached, then return the decoded JSON verdict.
#[async_trait]
pub trait Scanner: Send {
    /// Transport or backend error produced while scanning
    type Error: Send;

    /// Scan one finished message, returning the verdict tree
    async fn scan(&mut self, request: ScanRequest) -> Result<serde_json::Value, Self::Error>;
}

/// Everything that can terminate a milter session.
///
/// Each of these ends the session exactly once; no further replies are sent
/// after an error, the MTA simply observes the close.
#[derive(Debug, Error)]
pub enum Error<ScanError> {
    /// The socket failed underneath the session
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The MTA sent bytes that do not parse as milter protocol. There is no
    /// resynchronizing a milter stream, the connection is dropped.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No traffic within the configured window
    #[error("milter connection timed out")]
    Timeout,

    /// The MTA closed the connection without a QUIT
    #[error("connection closed by the MTA mid-session")]
    PeerClosed,

    /// The scanning backend failed; the message was neither accepted nor
    /// refused
    #[error("scan backend failed")]
    Scan {
        /// The scanner's error, passed through
        source: ScanError,
    },
}

/// The milter endpoint bridging an MTA to the scanning backend.
///
/// One `Server` handles any number of connections sequentially; state lives
/// per connection. The MTA drives: this endpoint never reconnects.
#[derive(Debug)]
pub struct Server<'s, S: Scanner> {
    scanner: &'s mut S,
    config: MilterConfig,
    codec: MilterCodec,
    timeout: Option<Duration>,
}

impl<'s, S: Scanner> Server<'s, S> {
    /// Create an endpoint around a scanner hand-off.
    ///
    /// `timeout` bounds every read and write turn; `None` waits forever.
    pub fn new(scanner: &'s mut S, config: MilterConfig, timeout: Option<Duration>) -> Self {
        Self {
            scanner,
            config,
            codec: MilterCodec::new(),
            timeout,
        }
    }

    /// Handle one milter connection until QUIT, error or timeout.
    ///
    /// Commands are processed in wire order. Most stages only accumulate
    /// state: option negotiation announces that no per-command replies will
    /// be sent, so the only frames going back are the negotiation answer and
    /// the verdict replies after end-of-body.
    ///
    /// # Errors
    /// [`enum@Error`] for the ways a session can die: socket errors,
    /// unparseable frames, a timeout, the MTA hanging up without QUIT, or
    /// the scanner failing.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub async fn handle_connection<RW: AsyncRead + AsyncWrite + Unpin + Send>(
        &mut self,
        socket: RW,
    ) -> Result<(), Error<S::Error>> {
        let mut framed = Framed::new(socket, &mut self.codec);
        let mut session = Session::new(self.config.discard_on_reject);

        loop {
            let command = match deadline(self.timeout, framed.next()).await? {
                Some(command) => command.map_err(classify)?,
                None => return Err(Error::PeerClosed),
            };
            debug!("received {}", command);

            match command {
                ClientCommand::OptNeg(theirs) => {
                    let ours = theirs.negotiate()?;
                    deadline(self.timeout, framed.send(&Reply::OptNeg(ours)))
                        .await?
                        .map_err(classify)?;
                }
                ClientCommand::Connect(connect) => session.connect(connect),
                ClientCommand::Macro(macro_) => session.absorb_macros(&macro_),
                ClientCommand::Helo(helo) => session.helo(helo),
                ClientCommand::Mail(mail) => session.mail(&mail),
                ClientCommand::Recipient(rcpt) => session.rcpt(&rcpt),
                ClientCommand::Header(header) => session.header(&header),
                ClientCommand::EndOfHeader(_) => session.end_of_headers(),
                ClientCommand::Body(body) => session.body_chunk(&body),
                // DATA carries nothing; unknown SMTP commands are accepted
                // and have no effect.
                ClientCommand::Data(_) | ClientCommand::Unknown(_) => {}
                ClientCommand::EndOfBody(_) => {
                    let request = ScanRequest::from_session(&mut session);
                    let results = self
                        .scanner
                        .scan(request)
                        .await
                        .map_err(|source| Error::Scan { source })?;

                    for reply in verdict::apply(&mut session, &self.config, Some(&results)) {
                        deadline(self.timeout, framed.send(&reply))
                            .await?
                            .map_err(classify)?;
                    }
                }
                ClientCommand::Abort(_) => session.reset(Reset::ABORT),
                ClientCommand::QuitNc(_) => session.reset(Reset::QUIT_NC),
                ClientCommand::Quit(_) => {
                    debug!("MTA quit, closing the connection");
                    return Ok(());
                }
            }
        }
    }
}

/// Pull transport failures out of the codec error so callers see
/// [`Error::Io`] for a broken socket and [`Error::Protocol`] for bad bytes
fn classify<E>(err: ProtocolError) -> Error<E> {
    match err {
        ProtocolError::CodecError(source) => Error::Io(source),
        other => Error::Protocol(other),
    }
}

/// Run `fut`, bounding it by the session timeout when one is set
async fn deadline<F: Future, E>(
    timeout: Option<Duration>,
    fut: F,
) -> Result<F::Output, Error<E>> {
    match timeout {
        Some(window) => time::timeout(window, fut)
            .await
            .map_err(|_elapsed| Error::Timeout),
        None => Ok(fut.await),
    }
}
