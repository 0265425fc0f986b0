//! Inbound session events.
//!
//! The session's receive task turns every transport message into a
//! [`SessionEvent`] and publishes it on a bounded [`tokio::sync::mpsc`]
//! queue with a single consumer. Unlike a broadcast channel, the queue
//! never drops events: a slow consumer stalls the receive task instead.

use std::fmt;

use bytes::Bytes;

use crate::error::Error;

/// Length of the ASCII tag that prefixes every inbound frame.
pub const TAG_LEN: usize = 3;

/// A 3-byte frame tag such as `MSG` or `SND`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; TAG_LEN]);

impl Tag {
    /// Control/status frame carrying `key=value` parameters.
    pub const MSG: Tag = Tag(*b"MSG");
    /// Audio data frame.
    pub const SND: Tag = Tag(*b"SND");
    /// Waterfall data frame.
    pub const W_F: Tag = Tag(*b"W_F");

    pub const fn new(bytes: [u8; TAG_LEN]) -> Self {
        Tag(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// One inbound frame with its tag split from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: Tag,
    /// Everything after the tag. May be empty.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(tag: Tag, payload: Bytes) -> Self {
        Frame { tag, payload }
    }
}

/// An event delivered on a session's event queue.
///
/// An [`Error`](SessionEvent::Error) is always the last event; the queue
/// closes right after it.
#[derive(Debug)]
pub enum SessionEvent {
    /// A frame was received.
    Frame(Frame),
    /// The session ended with a terminal error.
    Error(Error),
}

impl SessionEvent {
    /// The frame carried by this event, if any.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            SessionEvent::Frame(frame) => Some(frame),
            SessionEvent::Error(_) => None,
        }
    }
}
