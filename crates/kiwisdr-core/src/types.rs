//! Session configuration, tuning and receiver mode types.

use std::fmt;

/// Manual RF gain used when the configuration leaves it at zero.
pub const DEFAULT_MANUAL_GAIN: u32 = 50;

/// Identity string reported to the server when none is configured.
pub const DEFAULT_IDENTITY: &str = "kiwisdr-rs";

// ---------------------------------------------------------------------------
// ConnectionKind
// ---------------------------------------------------------------------------

/// Which data stream a connection carries.
///
/// The kind selects the last segment of the WebSocket path
/// (`/<session-id>/<kind>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionKind {
    /// Audio stream (`SND`).
    #[default]
    Sound,
    /// Waterfall/spectrum stream (`W_F`).
    Waterfall,
}

impl ConnectionKind {
    /// Path segment used when dialing the server.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ConnectionKind::Sound => "SND",
            ConnectionKind::Waterfall => "W_F",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// A receiver demodulation preset: mode name, passband edges and the tuning
/// offset applied to the dial frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode {
    /// Mode name as the server expects it (`"am"`, `"cw"`, `"lsb"`, `"usb"`).
    pub name: &'static str,
    /// Lower passband edge in Hz, relative to the carrier.
    pub low_cut: i32,
    /// Upper passband edge in Hz, relative to the carrier.
    pub high_cut: i32,
    /// Offset in Hz added to the dial frequency when tuning.
    pub offset: i32,
}

impl Mode {
    pub const NONE: Mode = Mode::new("", 0, 0, 0);

    pub const AM: Mode = Mode::new("am", -4900, 4900, 0);
    pub const CW: Mode = Mode::new("cw", 300, 700, -500);
    pub const LSB: Mode = Mode::new("lsb", -2700, -300, 0);
    pub const USB: Mode = Mode::new("usb", 300, 2700, 0);

    pub const AM_NARROW: Mode = Mode::new("am", -2500, 2500, 0);
    pub const CW_NARROW: Mode = Mode::new("cw", 470, 530, -500);
    pub const LSB_NARROW: Mode = Mode::new("lsb", -2200, -300, 0);
    pub const USB_NARROW: Mode = Mode::new("usb", 300, 2200, 0);

    pub const AM_3500: Mode = Mode::new("am", -3500, 3500, 0);
    pub const CW_3500: Mode = Mode::new("cw", 200, 3500, -500);
    pub const LSB_3500: Mode = Mode::new("lsb", -3500, -200, 0);
    pub const USB_3500: Mode = Mode::new("usb", 200, 3500, 0);

    /// Every named preset, keyed by the name accepted on the command line.
    pub const PRESETS: &'static [(&'static str, Mode)] = &[
        ("am", Mode::AM),
        ("cw", Mode::CW),
        ("lsb", Mode::LSB),
        ("usb", Mode::USB),
        ("am_narrow", Mode::AM_NARROW),
        ("cw_narrow", Mode::CW_NARROW),
        ("lsb_narrow", Mode::LSB_NARROW),
        ("usb_narrow", Mode::USB_NARROW),
        ("am_3500", Mode::AM_3500),
        ("cw_3500", Mode::CW_3500),
        ("lsb_3500", Mode::LSB_3500),
        ("usb_3500", Mode::USB_3500),
    ];

    /// Construct a mode preset.
    pub const fn new(name: &'static str, low_cut: i32, high_cut: i32, offset: i32) -> Self {
        Mode {
            name,
            low_cut,
            high_cut,
            offset,
        }
    }

    /// Look up a named preset (e.g. `"usb"`, `"cw_narrow"`, `"am_3500"`).
    pub fn by_name(name: &str) -> Option<Mode> {
        Mode::PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(_, mode)| *mode)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::NONE
    }
}

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Frequency and mode the receiver is tuned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tuning {
    /// Dial frequency in hertz. Zero or negative leaves the receiver untuned.
    pub freq_hz: i64,
    /// Demodulation preset.
    pub mode: Mode,
}

impl Tuning {
    pub fn new(freq_hz: i64, mode: Mode) -> Self {
        Tuning { freq_hz, mode }
    }

    /// Whether a tuning command should be sent during the handshake.
    pub fn is_tuned(&self) -> bool {
        self.freq_hz > 0
    }

    /// Frequency sent to the server: dial frequency plus the mode offset, in kHz.
    pub fn tuned_khz(&self) -> f64 {
        (self.freq_hz + i64::from(self.mode.offset)) as f64 / 1000.0
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Connection and receiver settings for one session.
///
/// A session takes its own copy at creation; changing a config afterwards
/// has no effect on sessions already created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Server address as `host:port`.
    pub server_host: String,
    /// Session password (empty for open servers).
    pub password: String,
    /// Which data stream to open.
    pub kind: ConnectionKind,
    /// Identity string shown in the server's user list.
    pub identity: String,
    /// Request ADPCM-compressed audio.
    pub compression: bool,
    /// Enable the receiver's automatic gain control.
    pub agc: bool,
    /// Manual RF gain used when AGC is off. Zero selects [`DEFAULT_MANUAL_GAIN`].
    pub manual_gain: u32,
    /// Do not open a waterfall alongside the audio stream.
    pub no_waterfall: bool,
}

impl SessionConfig {
    /// Manual gain with the zero-means-default rule applied.
    pub fn effective_manual_gain(&self) -> u32 {
        if self.manual_gain == 0 {
            DEFAULT_MANUAL_GAIN
        } else {
            self.manual_gain
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            server_host: String::new(),
            password: String::new(),
            kind: ConnectionKind::Sound,
            identity: DEFAULT_IDENTITY.to_string(),
            compression: false,
            agc: true,
            manual_gain: DEFAULT_MANUAL_GAIN,
            no_waterfall: true,
        }
    }
}
