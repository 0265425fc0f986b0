//! kiwisdr-core: shared types, errors and transport traits for the KiwiSDR
//! client.
//!
//! # Key types
//!
//! - [`SessionConfig`], [`Tuning`], [`Mode`] -- what to connect to and how
//!   the receiver is tuned
//! - [`Frame`] / [`SessionEvent`] -- inbound frames and terminal errors
//! - [`FrameReader`] / [`FrameWriter`] -- the split message transport
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use events::{Frame, SessionEvent, TAG_LEN, Tag};
pub use transport::{FrameReader, FrameWriter};
pub use types::*;
