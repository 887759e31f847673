//! In-memory plumbing for driving a milter session end to end.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::io::{AsyncRead, AsyncWrite};
use serde_json::Value;

use spamgate_server::{ScanRequest, Scanner};

/// A socket whose read side replays a scripted byte stream and whose write
/// side records everything the endpoint emits.
pub struct ScriptedSocket {
    input: BytesMut,
    pub written: Vec<u8>,
    /// Keep the read side pending instead of signalling EOF once the script
    /// is drained. Used to exercise timeouts.
    pub hang_when_drained: bool,
}

impl ScriptedSocket {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: BytesMut::from_iter(input),
            written: Vec::new(),
            hang_when_drained: false,
        }
    }
}

impl AsyncRead for ScriptedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        if self.input.is_empty() {
            if self.hang_when_drained {
                // The timeout timer wakes the task, no waker needed here.
                return Poll::Pending;
            }
            return Poll::Ready(Ok(0));
        }

        let n = self.input.len().min(buf.len());
        buf[..n].copy_from_slice(&self.input[..n]);
        self.input.advance(n);
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for ScriptedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Records every scan request and answers each with the same verdict.
pub struct MockScanner {
    pub verdict: Value,
    pub requests: Vec<ScanRequest>,
}

impl MockScanner {
    pub fn new(verdict: Value) -> Self {
        Self {
            verdict,
            requests: Vec::new(),
        }
    }
}

#[async_trait]
impl Scanner for MockScanner {
    type Error = &'static str;

    async fn scan(&mut self, request: ScanRequest) -> Result<Value, Self::Error> {
        self.requests.push(request);
        Ok(self.verdict.clone())
    }
}

/// Frame a command byte plus payload the way the MTA would.
pub fn frame(code: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 1 + body.len());
    out.extend_from_slice(&(1 + body.len() as u32).to_be_bytes());
    out.push(code);
    out.extend_from_slice(body);
    out
}

/// Split the endpoint's output back into (code, payload) frames.
pub fn split_frames(mut written: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut frames = Vec::new();

    while !written.is_empty() {
        assert!(written.len() >= 5, "trailing partial frame: {written:?}");

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&written[..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;
        assert!(length >= 1, "zero length frame emitted");
        assert!(written.len() >= 4 + length, "truncated frame: {written:?}");

        frames.push((written[4], written[5..4 + length].to_vec()));
        written = &written[4 + length..];
    }

    frames
}
