//! In-memory frame transport for session tests.
//!
//! [`MockKiwi`] plays the server side: tests push inbound frames (or read
//! errors) and inspect the text commands and close requests the session
//! wrote. The reader and writer it hands out implement the session's
//! [`FrameReader`] and [`FrameWriter`] traits.
//!
//! # Example
//!
//! ```
//! use kiwisdr_test_harness::MockKiwi;
//!
//! let mock = MockKiwi::new();
//! let (reader, writer) = mock.transport();
//! mock.push_msg("audio_rate=12000");
//! // ... hand reader/writer to Session::from_transport ...
//! # drop((reader, writer));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use kiwisdr_core::{Error, FrameReader, FrameWriter, Result, Tag};

/// One write the session made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug, Default)]
struct State {
    /// Feeds the reader; `None` once the server side has gone away.
    inbound: Option<mpsc::UnboundedSender<Result<Bytes>>>,
    sent_log: Vec<Outbound>,
    fail_writes: bool,
    closed: bool,
}

/// Scripted server end of a mock transport.
#[derive(Debug, Clone, Default)]
pub struct MockKiwi {
    state: Arc<Mutex<State>>,
}

impl MockKiwi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh reader/writer pair bound to this mock.
    ///
    /// Calling it again replaces the inbound side; the previous reader then
    /// sees the connection drop.
    pub fn transport(&self) -> (MockFrameReader, MockFrameWriter) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.inbound = Some(tx);
        state.closed = false;
        (
            MockFrameReader { inbound: rx },
            MockFrameWriter {
                state: Arc::clone(&self.state),
            },
        )
    }

    /// Deliver one raw frame (tag included).
    pub fn push_frame(&self, raw: &[u8]) {
        self.push(Ok(Bytes::copy_from_slice(raw)));
    }

    /// Deliver a MSG frame with the given text body.
    pub fn push_msg(&self, body: &str) {
        self.push(Ok(tagged(Tag::MSG, body.as_bytes())));
    }

    /// Deliver an SND frame with the given payload (header included).
    pub fn push_snd(&self, payload: &[u8]) {
        self.push(Ok(tagged(Tag::SND, payload)));
    }

    /// Make the next read fail with `error`.
    pub fn push_error(&self, error: Error) {
        self.push(Err(error));
    }

    /// Drop the server side; pending frames are still delivered first.
    pub fn disconnect(&self) {
        self.lock().inbound = None;
    }

    /// Make every subsequent write and close fail.
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// Everything the session wrote, in order.
    pub fn outbound(&self) -> Vec<Outbound> {
        self.lock().sent_log.clone()
    }

    /// Text commands the session wrote, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.lock()
            .sent_log
            .iter()
            .filter_map(|o| match o {
                Outbound::Text(t) => Some(t.clone()),
                Outbound::Close => None,
            })
            .collect()
    }

    /// Number of text commands equal to `command`.
    pub fn count_sent(&self, command: &str) -> usize {
        self.lock()
            .sent_log
            .iter()
            .filter(|o| matches!(o, Outbound::Text(t) if t == command))
            .count()
    }

    /// Number of close requests that went through.
    pub fn close_count(&self) -> usize {
        self.lock()
            .sent_log
            .iter()
            .filter(|o| **o == Outbound::Close)
            .count()
    }

    fn push(&self, item: Result<Bytes>) {
        if let Some(tx) = &self.lock().inbound {
            let _ = tx.send(item);
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn tagged(tag: Tag, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(tag.as_bytes().len() + body.len());
    buf.put_slice(tag.as_bytes());
    buf.put_slice(body);
    buf.freeze()
}

/// Read half handed to the session.
#[derive(Debug)]
pub struct MockFrameReader {
    inbound: mpsc::UnboundedReceiver<Result<Bytes>>,
}

#[async_trait]
impl FrameReader for MockFrameReader {
    async fn read_frame(&mut self) -> Result<Bytes> {
        match self.inbound.recv().await {
            Some(item) => item,
            None => Err(Error::ConnectionLost),
        }
    }
}

/// Write half handed to the session.
///
/// A successful close behaves like a server acknowledging it: the reader
/// sees the connection drop and later writes fail.
#[derive(Debug)]
pub struct MockFrameWriter {
    state: Arc<Mutex<State>>,
}

impl MockFrameWriter {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FrameWriter for MockFrameWriter {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(Error::Transport("mock write failure".into()));
        }
        if state.closed {
            return Err(Error::ConnectionLost);
        }
        state.sent_log.push(Outbound::Text(text.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(Error::Transport("mock close failure".into()));
        }
        if state.closed {
            return Err(Error::ConnectionLost);
        }
        state.closed = true;
        state.inbound = None;
        state.sent_log.push(Outbound::Close);
        Ok(())
    }
}
