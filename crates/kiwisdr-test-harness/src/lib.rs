//! kiwisdr-test-harness: scripted transports and a mock KiwiSDR server.
//!
//! [`MockKiwi`] drives a session's frame reader and records everything the
//! session writes, for deterministic unit tests of the receive loop and the
//! streaming pipeline. [`MockWsServer`] is a real WebSocket listener on
//! localhost for end-to-end tests of connection setup.

pub mod mock_transport;
pub mod mock_ws;

pub use mock_transport::{MockFrameReader, MockFrameWriter, MockKiwi, Outbound};
pub use mock_ws::{MockWsServer, ServerLog};
