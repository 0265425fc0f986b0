//! Mock KiwiSDR WebSocket server.
//!
//! [`MockWsServer`] listens on a random localhost port and accepts a single
//! WebSocket client. It records the request path, waits for a configured
//! number of text commands (the client's login handshake), sends its
//! scripted binary frames, then keeps recording commands until the client
//! closes or disconnects.
//!
//! # Example
//!
//! ```no_run
//! use kiwisdr_test_harness::MockWsServer;
//!
//! # async fn example() -> kiwisdr_core::Result<()> {
//! let mut server = MockWsServer::new().await?;
//! server.after_handshake(11);
//! server.send(b"MSGtoo_busy=1");
//! server.start();
//! let host = server.addr().to_string();
//! // ... connect a session to `host` ...
//! let log = server.wait().await.map_err(kiwisdr_core::Error::Transport)?;
//! assert!(log.path.ends_with("/SND"));
//! # Ok(())
//! # }
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use kiwisdr_core::{Error, Result};

/// What the server saw from its client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerLog {
    /// Request path of the WebSocket upgrade, e.g. `/1700000000/SND`.
    pub path: String,
    /// Text commands received, in order.
    pub received: Vec<String>,
    /// Whether the client sent a close frame.
    pub client_closed: bool,
}

/// A single-connection WebSocket server with scripted output.
pub struct MockWsServer {
    addr: String,
    listener: Option<TcpListener>,
    handshake_len: usize,
    script: Vec<Vec<u8>>,
    server_handle: Option<JoinHandle<std::result::Result<ServerLog, String>>>,
}

impl MockWsServer {
    /// Bind a new server on a random port. It does not accept connections
    /// until [`start`](MockWsServer::start) is called.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock WebSocket server: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        Ok(Self {
            addr,
            listener: Some(listener),
            handshake_len: 0,
            script: Vec::new(),
            server_handle: None,
        })
    }

    /// Number of text commands to receive before sending the script.
    pub fn after_handshake(&mut self, commands: usize) {
        self.handshake_len = commands;
    }

    /// Queue one binary frame (tag included).
    pub fn send(&mut self, frame: &[u8]) {
        self.script.push(frame.to_vec());
    }

    /// `host:port` the server listens on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Accept one client in the background and run the script.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let handshake_len = self.handshake_len;
        let script = std::mem::take(&mut self.script);

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            tracing::debug!(peer = %peer, "Mock server accepted connection");

            let mut log = ServerLog::default();
            let path = &mut log.path;
            let capture_path = |req: &Request,
                                resp: Response|
             -> std::result::Result<Response, ErrorResponse> {
                *path = req.uri().path().to_string();
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, capture_path)
                .await
                .map_err(|e| format!("WebSocket upgrade failed: {}", e))?;
            let (mut sink, mut stream) = ws.split();

            let mut script_sent = false;
            loop {
                if !script_sent && log.received.len() >= handshake_len {
                    for frame in &script {
                        sink.send(Message::binary(frame.clone()))
                            .await
                            .map_err(|e| format!("script write failed: {}", e))?;
                    }
                    script_sent = true;
                }

                match stream.next().await {
                    Some(Ok(Message::Text(text))) => log.received.push(text.as_str().to_owned()),
                    Some(Ok(Message::Close(_))) => {
                        log.client_closed = true;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Mock server read ended");
                        break;
                    }
                    None => break,
                }
            }

            // Flush the close reply; the client may already be gone.
            let _ = sink.close().await;
            Ok::<_, String>(log)
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the client session to end and return what the server saw.
    pub async fn wait(self) -> std::result::Result<ServerLog, String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Err("server was never started".into()),
        }
    }
}
