//! Error types for the KiwiSDR client.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, server-reported
//! protocol conditions and per-packet decode failures are all captured here.

/// The error type for all KiwiSDR client operations.
///
/// Variants fall into three groups, distinguished by
/// [`is_fatal()`](Error::is_fatal):
///
/// - transport failures (dial, read, write): fatal to the session
/// - protocol conditions reported by the server or malformed frames: fatal
/// - decode failures for a single audio packet: recoverable
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (WebSocket dial, read or write).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server closed the connection.
    #[error("connection lost")]
    ConnectionLost,

    /// The server refused the session because all channels are in use.
    #[error("server too busy")]
    ServerTooBusy,

    /// The server rejected the session password.
    #[error("bad password")]
    BadPassword,

    /// The server reported that it is down.
    #[error("server down")]
    ServerDown,

    /// An inbound frame was shorter than its 3-byte tag.
    #[error("received frame too short: {len} bytes")]
    FrameTooShort {
        /// Length of the offending frame in bytes.
        len: usize,
    },

    /// An audio payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An invalid parameter was passed to a builder or command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session's event stream was already consumed or has ended.
    #[error("stream closed")]
    StreamClosed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the session.
    ///
    /// Decode errors only affect the packet they were raised for, and
    /// parameter errors are raised before any session exists.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Decode(_) | Error::InvalidParameter(_))
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
