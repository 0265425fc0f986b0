//! SessionBuilder -- fluent builder for opening [`Session`]s.
//!
//! Collects connection and receiver settings, then dials the server and
//! runs the login handshake.
//!
//! # Example
//!
//! ```no_run
//! use kiwisdr_client::{Dialer, SessionBuilder};
//! use kiwisdr_core::Mode;
//!
//! # async fn example() -> kiwisdr_core::Result<()> {
//! let dialer = Dialer::new();
//! let session = SessionBuilder::new()
//!     .host("kiwi.example.net")
//!     .frequency(7_074_000)
//!     .mode(Mode::USB)
//!     .build(&dialer)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use kiwisdr_core::{
    ConnectionKind, DEFAULT_IDENTITY, DEFAULT_MANUAL_GAIN, Error, FrameReader, FrameWriter, Mode,
    Result, SessionConfig, Tuning,
};

use crate::codec::DEFAULT_PORT;
use crate::dialer::Dialer;
use crate::session::Session;

/// Fluent builder for [`Session`].
///
/// Defaults: port 8073, AGC on, manual gain 50, no waterfall, sound stream,
/// uncompressed audio, untuned receiver.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    host: Option<String>,
    port: u16,
    password: String,
    identity: String,
    kind: ConnectionKind,
    compression: bool,
    agc: bool,
    manual_gain: u32,
    no_waterfall: bool,
    tuning: Tuning,
}

impl SessionBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        SessionBuilder {
            host: None,
            port: DEFAULT_PORT,
            password: String::new(),
            identity: DEFAULT_IDENTITY.to_string(),
            kind: ConnectionKind::Sound,
            compression: false,
            agc: true,
            manual_gain: DEFAULT_MANUAL_GAIN,
            no_waterfall: true,
            tuning: Tuning::default(),
        }
    }

    /// Server hostname or address, optionally with `:port`.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Port used when the host carries none (default: 8073).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Name shown in the server's user list (default: "kiwisdr-rs").
    pub fn identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    pub fn kind(mut self, kind: ConnectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Request ADPCM-compressed audio (default: false).
    pub fn compression(mut self, enable: bool) -> Self {
        self.compression = enable;
        self
    }

    /// Automatic gain control (default: true).
    pub fn agc(mut self, enable: bool) -> Self {
        self.agc = enable;
        self
    }

    /// Manual gain used with AGC off (default: 50; 0 also means 50).
    pub fn manual_gain(mut self, gain: u32) -> Self {
        self.manual_gain = gain;
        self
    }

    pub fn no_waterfall(mut self, enable: bool) -> Self {
        self.no_waterfall = enable;
        self
    }

    /// Dial frequency in hertz.
    pub fn frequency(mut self, freq_hz: i64) -> Self {
        self.tuning.freq_hz = freq_hz;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.tuning.mode = mode;
        self
    }

    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Session configuration for the current settings.
    ///
    /// Fails when no host has been set or the host is blank.
    pub fn config(&self) -> Result<SessionConfig> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                Error::InvalidParameter("host is required: call .host() before .build()".into())
            })?;
        Ok(self.config_for(self.server_host(host)))
    }

    /// Connect to the server and log in.
    pub async fn build(self, dialer: &Dialer) -> Result<Session> {
        let config = self.config()?;
        Session::connect(dialer, config, self.tuning).await
    }

    /// Log in over an already-open transport.
    ///
    /// The host is optional here; the session id still comes from `dialer`.
    pub async fn build_with_transport(
        self,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
        dialer: &Dialer,
    ) -> Result<Session> {
        let server_host = match self.host.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => self.server_host(h),
            _ => String::new(),
        };
        let config = self.config_for(server_host);
        let id = dialer.ids().next_id();
        Session::from_transport(id, config, self.tuning, reader, writer).await
    }

    fn server_host(&self, host: &str) -> String {
        if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    fn config_for(&self, server_host: String) -> SessionConfig {
        SessionConfig {
            server_host,
            password: self.password.clone(),
            kind: self.kind,
            identity: self.identity.clone(),
            compression: self.compression,
            agc: self.agc,
            manual_gain: self.manual_gain,
            no_waterfall: self.no_waterfall,
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
