//! Frame transport traits.
//!
//! A KiwiSDR session runs over a message-oriented transport (a WebSocket in
//! production). The transport is split into a read half, owned by the
//! session's receive task, and a write half, shared behind the session's
//! send lock. Protocol code only sees these traits, so sessions can be
//! driven by the scripted transports in `kiwisdr-test-harness`.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Read half of a frame transport.
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next complete inbound message.
    ///
    /// Returns [`Error::ConnectionLost`](crate::error::Error::ConnectionLost)
    /// once the peer has closed the connection, or a transport error if the
    /// read failed.
    async fn read_frame(&mut self) -> Result<Bytes>;
}

/// Write half of a frame transport.
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Send a graceful close ("going away") to the peer.
    async fn close(&mut self) -> Result<()>;
}
