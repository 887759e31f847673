//! A runnable milter endpoint with a canned scanner.
//!
//! Every message is answered with an `add_header` verdict, so the MTA tags
//! it and delivers. Point postfix at it to watch the exchange:
//!
//! ```text
//! smtpd_milters = inet:127.0.0.1:11332
//! ```

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::compat::TokioAsyncReadCompatExt;

use spamgate_server::{Error, MilterConfig, ScanRequest, Scanner, Server};

struct StubScanner;

#[async_trait]
impl Scanner for StubScanner {
    type Error = &'static str;

    async fn scan(&mut self, request: ScanRequest) -> Result<Value, Self::Error> {
        println!(
            "would {} {} with:",
            ScanRequest::METHOD,
            ScanRequest::PATH
        );
        for (name, value) in request.headers() {
            println!("  {name}: {value}");
        }
        println!("  ({} message bytes)", request.body().len());

        Ok(json!({ "action": "add_header" }))
    }
}

#[tokio::main]
async fn main() {
    let addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:11332".to_string());
    let listener = TcpListener::bind(&addr).await.expect("failed to bind");
    println!("listening on {addr}");

    let mut scanner = StubScanner;
    let mut server = Server::new(
        &mut scanner,
        MilterConfig::default(),
        Some(Duration::from_secs(120)),
    );

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .expect("failed accepting connection");
        println!("MTA connected from {peer}");

        match server.handle_connection(stream.compat()).await {
            Ok(()) => println!("session closed cleanly"),
            Err(Error::PeerClosed) => println!("MTA hung up without quit"),
            Err(e) => eprintln!("session failed: {e}"),
        }
    }
}
