//! KiwiSDR WebSocket client.
//!
//! This crate talks to KiwiSDR software-defined radio servers. It provides:
//!
//! - **Session** ([`session`]) -- dial, login handshake, and the background
//!   receive task that publishes inbound frames and watches for server
//!   rejections.
//! - **Codec** ([`codec`]) -- frame tag splitting, MSG parameter parsing,
//!   `load_cfg` decoding, and the text command builders.
//! - **Info** ([`info`]) -- the server-reported key/value table.
//! - **Audio** ([`audio`], [`adpcm`]) -- SND packet decoding, plain PCM or
//!   IMA ADPCM.
//! - **Streaming** ([`stream`]) -- duration-bounded audio streams with
//!   keepalives.
//! - **Dialer** ([`dialer`]) -- session ids and spacing between connection
//!   attempts.
//! - **SessionBuilder** ([`builder`]) -- fluent construction of sessions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kiwisdr_client::{AudioStream, Dialer, SessionBuilder};
//! use kiwisdr_core::Mode;
//!
//! # async fn example() -> kiwisdr_core::Result<()> {
//! let dialer = Dialer::new();
//! let session = SessionBuilder::new()
//!     .host("kiwi.example.net")
//!     .frequency(10_000_000)
//!     .mode(Mode::AM)
//!     .build(&dialer)
//!     .await?;
//!
//! let mut audio = AudioStream::start(Arc::new(session), Duration::from_secs(10)).await?;
//! while let Some(packet) = audio.recv().await {
//!     let packet = packet?;
//!     // packet.samples are 12 kHz mono i16
//! }
//! # Ok(())
//! # }
//! ```

pub mod adpcm;
pub mod audio;
pub mod builder;
pub mod codec;
pub mod dialer;
pub mod info;
pub mod session;
pub mod stream;
pub mod ws;

pub use adpcm::ImaAdpcmDecoder;
pub use audio::{AUDIO_SAMPLE_RATE, AudioPacket, AudioPacketDecoder};
pub use builder::SessionBuilder;
pub use dialer::{ClientIdAllocator, Dialer};
pub use info::Info;
pub use session::Session;
pub use stream::AudioStream;
