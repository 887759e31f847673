//! End-to-end runs of the milter endpoint over an in-memory socket.

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

use spamgate_common::optneg::{Capability, Protocol};
use spamgate_common::ProtocolError;
use spamgate_server::{Error, MilterConfig, Server};

use crate::utils::{frame, split_frames, MockScanner, ScriptedSocket};

mod utils;

/// OPTNEG payload as postfix would send it.
fn optneg_payload(version: u32, actions: u32, protocol: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(version.to_be_bytes());
    body.extend(actions.to_be_bytes());
    body.extend(protocol.to_be_bytes());
    body
}

/// CONNECT payload for an IPv4 peer.
fn connect_payload(hostname: &str, port: u16, address: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(hostname.as_bytes());
    body.push(0);
    body.push(b'4');
    body.extend(port.to_be_bytes());
    body.extend(address.as_bytes());
    body.push(0);
    body
}

fn header_payload(name: &str, value: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(name.as_bytes());
    body.push(0);
    body.extend(value.as_bytes());
    body.push(0);
    body
}

/// The standard opening: negotiation, connection macros, envelope.
fn envelope(stream: &mut Vec<u8>) {
    stream.extend(frame(b'O', &optneg_payload(6, 0x1F, 0x1FF)));
    stream.extend(frame(
        b'D',
        b"Cj\0mx.example\0{daemon_name}\0smtpd\0",
    ));
    stream.extend(frame(
        b'C',
        &connect_payload("client.example", 25, "192.0.2.1"),
    ));
    stream.extend(frame(b'H', b"client.example\0"));
    stream.extend(frame(b'M', b"<sender@example.com>\0"));
    stream.extend(frame(b'R', b"<user@example.net>\0"));
}

#[tokio::test]
async fn test_full_session_tags_and_accepts() {
    let mut stream = Vec::new();
    envelope(&mut stream);
    stream.extend(frame(b'D', b"Ei\04A2F1C\0"));
    for _ in 0..3 {
        stream.extend(frame(b'L', &header_payload("From", "sender@example.com")));
    }
    stream.extend(frame(b'L', &header_payload("Subject", "hello")));
    stream.extend(frame(b'N', b""));
    stream.extend(frame(b'B', b"01234"));
    stream.extend(frame(b'B', b"56789"));
    stream.extend(frame(b'E', b""));
    stream.extend(frame(b'Q', b""));

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({ "action": "add_header" }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    server
        .handle_connection(&mut socket)
        .await
        .expect("session must close cleanly on quit");

    // The scanner saw one finished message.
    assert_eq!(scanner.requests.len(), 1);
    let request = &scanner.requests[0];

    let headers: Vec<(&str, &str)> = request.headers().collect();
    assert!(headers.contains(&("Hostname", "client.example")));
    assert!(headers.contains(&("Helo", "client.example")));
    assert!(headers.contains(&("From", "sender@example.com")));
    assert!(headers.contains(&("Rcpt", "user@example.net")));
    assert!(headers.contains(&("IP", "192.0.2.1:25")));
    assert!(headers.contains(&("Queue-Id", "4A2F1C")));
    assert!(headers.contains(&("MTA-Tag", "smtpd")));
    assert!(headers.contains(&("MTA-Name", "smtpd")));
    assert_eq!(headers.last(), Some(&("Milter", "Yes")));

    let expected_body = "From: sender@example.com\r\nFrom: sender@example.com\r\n\
                         From: sender@example.com\r\nSubject: hello\r\n\r\n0123456789";
    assert_eq!(request.body(), expected_body.as_bytes());

    // On the wire: our OPTNEG, then the spam tag, then accept.
    let frames = split_frames(&socket.written);
    assert_eq!(frames.len(), 3);

    let (code, payload) = &frames[0];
    assert_eq!(*code, b'O');
    let mut expected = Vec::new();
    expected.extend(6u32.to_be_bytes());
    expected.extend((0x1F | Capability::ACTIONS_MASK.bits()).to_be_bytes());
    expected.extend(Protocol::NOREPLY_MASK.bits().to_be_bytes());
    assert_eq!(payload, &expected);

    assert_eq!(frames[1], (b'm', b"\0\0\0\x01X-Spam\0Yes\0".to_vec()));
    assert_eq!(frames[2], (b'a', Vec::new()));
}

#[tokio::test]
async fn test_reject_with_custom_text() {
    let mut stream = Vec::new();
    envelope(&mut stream);
    stream.extend(frame(b'L', &header_payload("Subject", "buy now")));
    stream.extend(frame(b'N', b""));
    stream.extend(frame(b'B', b"cheap pills"));
    stream.extend(frame(b'E', b""));
    stream.extend(frame(b'Q', b""));

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({
        "action": "reject",
        "messages": { "smtp_message": "blocked" },
    }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    server
        .handle_connection(&mut socket)
        .await
        .expect("session must close cleanly on quit");

    let frames = split_frames(&socket.written);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1], (b'y', b"554 5.7.1 blocked\0".to_vec()));
    assert_eq!(frames[2], (b'r', Vec::new()));
}

#[tokio::test]
async fn test_abort_resets_header_counts() {
    let mut stream = Vec::new();
    envelope(&mut stream);
    // Two From headers, then the MTA aborts the message.
    stream.extend(frame(b'L', &header_payload("From", "a@example.com")));
    stream.extend(frame(b'L', &header_payload("From", "b@example.com")));
    stream.extend(frame(b'A', b""));
    // A fresh message with a single From header.
    stream.extend(frame(b'M', b"<sender@example.com>\0"));
    stream.extend(frame(b'R', b"<user@example.net>\0"));
    stream.extend(frame(b'L', &header_payload("From", "c@example.com")));
    stream.extend(frame(b'N', b""));
    stream.extend(frame(b'B', b"hi"));
    stream.extend(frame(b'E', b""));
    stream.extend(frame(b'Q', b""));

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({
        "action": "greylist",
        "milter": { "remove_headers": { "From": 0 } },
    }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    server
        .handle_connection(&mut socket)
        .await
        .expect("session must close cleanly on quit");

    // Only the post-abort From header counts: one removal, then accept.
    let frames = split_frames(&socket.written);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1], (b'm', b"\0\0\0\x01From\0\0".to_vec()));
    assert_eq!(frames[2], (b'a', Vec::new()));

    // The aborted fragment never reached the scanner.
    assert_eq!(scanner.requests.len(), 1);
    assert_eq!(scanner.requests[0].body(), b"From: c@example.com\r\n\r\nhi");
}

#[tokio::test]
async fn test_quit_nc_starts_a_fresh_envelope() {
    let mut stream = Vec::new();
    envelope(&mut stream);
    stream.extend(frame(b'L', &header_payload("Subject", "first")));
    stream.extend(frame(b'N', b""));
    stream.extend(frame(b'E', b""));
    stream.extend(frame(b'K', b""));
    // Second envelope on the same connection: no CONNECT, no macros.
    stream.extend(frame(b'M', b"<second@example.org>\0"));
    stream.extend(frame(b'L', &header_payload("Subject", "second")));
    stream.extend(frame(b'N', b""));
    stream.extend(frame(b'E', b""));
    stream.extend(frame(b'Q', b""));

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({ "action": "greylist" }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    server
        .handle_connection(&mut socket)
        .await
        .expect("session must close cleanly on quit");

    assert_eq!(scanner.requests.len(), 2);

    let first: Vec<(&str, &str)> = scanner.requests[0].headers().collect();
    assert!(first.contains(&("IP", "192.0.2.1:25")));
    assert!(first.contains(&("MTA-Name", "smtpd")));

    // Peer address and macros are gone after QUIT_NC.
    let second: Vec<(&str, &str)> = scanner.requests[1].headers().collect();
    assert!(!second.iter().any(|(name, _)| *name == "IP"));
    assert!(!second.iter().any(|(name, _)| *name == "MTA-Name"));
    assert!(second.contains(&("From", "second@example.org")));
}

#[tokio::test]
async fn test_old_protocol_version_is_refused() {
    let mut stream = Vec::new();
    stream.extend(frame(b'O', &optneg_payload(2, 0x1F, 0x7F)));

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({ "action": "no_action" }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    let result = server.handle_connection(&mut socket).await;

    assert_matches!(
        result,
        Err(Error::Protocol(ProtocolError::UnsupportedVersion {
            received: 2,
            supported: 6,
        }))
    );
    // No partial reply made it out.
    assert!(socket.written.is_empty());
}

#[tokio::test]
async fn test_peer_closing_without_quit_is_an_error() {
    let mut stream = Vec::new();
    envelope(&mut stream);

    let mut socket = ScriptedSocket::new(stream);
    let mut scanner = MockScanner::new(json!({ "action": "no_action" }));
    let mut server = Server::new(&mut scanner, MilterConfig::default(), None);

    let result = server.handle_connection(&mut socket).await;

    assert_matches!(result, Err(Error::PeerClosed));
}

#[tokio::test]
async fn test_idle_session_times_out() {
    let mut stream = Vec::new();
    envelope(&mut stream);

    let mut socket = ScriptedSocket::new(stream);
    socket.hang_when_drained = true;

    let mut scanner = MockScanner::new(json!({ "action": "no_action" }));
    let mut server = Server::new(
        &mut scanner,
        MilterConfig::default(),
        Some(Duration::from_millis(50)),
    );

    let result = server.handle_connection(&mut socket).await;

    assert_matches!(result, Err(Error::Timeout));
}
