// kiwi-listen -- stream audio from a KiwiSDR to stdout.
//
// Connects to the server given by --kiwi, tunes to --freq/--mode and writes
// mono signed 16-bit little-endian PCM at 12 kHz for --duration seconds.
// Diagnostics go to stderr (RUST_LOG overrides the default `info` level).
//
// Usage:
//   kiwi-listen --kiwi sybil.yak.net --freq 740000 --mode am --duration 5 \
//       | paplay --rate=12000 --format=s16le --channels=1 --raw /dev/stdin
//   kiwi-listen --kiwi kiwi.local:8073 --mode usb --freq 7074000 --agc false --mangain 70
//   kiwi-listen --kiwi kiwi.local --outgain -3 --compress --printinfo > capture.raw

use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use kiwisdr_client::{AUDIO_SAMPLE_RATE, AudioStream, Dialer, SessionBuilder};
use kiwisdr_core::{DEFAULT_IDENTITY, DEFAULT_MANUAL_GAIN, Mode};

/// Default play time: a little over a year, i.e. until interrupted.
const DEFAULT_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

/// Largest magnitude written; the output is symmetric around zero.
const CLIP_LEVEL: i32 = 0x7FFF;

const STDOUT_BUFFER_SIZE: usize = 512;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Stream audio from a KiwiSDR as raw s16le PCM on stdout.
#[derive(Parser, Debug)]
#[command(name = "kiwi-listen", version, about)]
struct Cli {
    /// KiwiSDR server, `host` or `host:port` (port 8073 when omitted).
    #[arg(long, default_value = "sybil.yak.net")]
    kiwi: String,

    /// How long to play, in seconds.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: u64,

    /// Frequency in Hz.
    #[arg(long, default_value_t = 740_000)]
    freq: i64,

    /// Mode preset: am, cw, lsb, usb, optionally with a _narrow or _3500 suffix.
    #[arg(long, default_value = "am")]
    mode: String,

    /// Output gain in decibels (negative quieter, positive louder).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    outgain: f64,

    /// Automatic gain control in the receiver.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    agc: bool,

    /// Manual gain used when AGC is off.
    #[arg(long, default_value_t = DEFAULT_MANUAL_GAIN)]
    mangain: u32,

    /// Session password.
    #[arg(long, default_value = "")]
    password: String,

    /// Name shown in the server's user list.
    #[arg(long, default_value = DEFAULT_IDENTITY)]
    ident: String,

    /// Request ADPCM-compressed audio.
    #[arg(long)]
    compress: bool,

    /// Print the information the server sent to stderr when done.
    #[arg(long)]
    printinfo: bool,
}

// ---------------------------------------------------------------------------
// Sample output
// ---------------------------------------------------------------------------

/// Convert decibels to a multiplicative gain.
fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Scale samples by `gain`, truncating toward zero and clipping to +/-0x7FFF.
fn apply_gain(samples: &[i16], gain: f64) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = (gain * f64::from(s)) as i32;
            scaled.clamp(-CLIP_LEVEL, CLIP_LEVEL) as i16
        })
        .collect()
}

/// Write samples as signed 16-bit little-endian.
fn write_s16le<W: Write>(out: &mut W, samples: &[i16]) -> io::Result<()> {
    for s in samples {
        out.write_all(&s.to_le_bytes())?;
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mode = Mode::by_name(&cli.mode)
        .with_context(|| format!("unknown mode name: {:?}", cli.mode))?;
    let gain = db_to_gain(cli.outgain);

    let dialer = Dialer::new();
    let session = SessionBuilder::new()
        .host(&cli.kiwi)
        .password(&cli.password)
        .identity(&cli.ident)
        .agc(cli.agc)
        .manual_gain(cli.mangain)
        .compression(cli.compress)
        .frequency(cli.freq)
        .mode(mode)
        .build(&dialer)
        .await
        .with_context(|| format!("failed to connect to KiwiSDR at {}", cli.kiwi))?;
    let session = Arc::new(session);

    tracing::info!(
        server = %session.config().server_host,
        freq_hz = cli.freq,
        mode = mode.name,
        sample_rate = AUDIO_SAMPLE_RATE,
        "Streaming s16le mono to stdout"
    );

    let mut audio = AudioStream::start(Arc::clone(&session), Duration::from_secs(cli.duration))
        .await
        .context("failed to start audio stream")?;

    let mut out = BufWriter::with_capacity(STDOUT_BUFFER_SIZE, io::stdout());
    let mut ended_with = None;
    while let Some(item) = audio.recv().await {
        match item {
            Ok(packet) => {
                write_s16le(&mut out, &apply_gain(&packet.samples, gain))
                    .context("cannot write audio to stdout")?;
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(error = %e, "Skipping audio packet");
            }
            Err(e) => {
                ended_with = Some(e);
                break;
            }
        }
    }
    out.flush().context("cannot write audio to stdout")?;
    audio.finished().await;

    if cli.printinfo {
        for (key, value) in session.info().await.iter() {
            eprintln!("[ {:>40} : {} ]", key, value);
        }
    }

    match ended_with {
        Some(e) => Err(e).context("KiwiSDR session ended"),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_gain_is_identity() {
        let samples = [0, 1, -1, 1234, -1234, 0x7FFF];
        assert_eq!(apply_gain(&samples, db_to_gain(0.0)), samples.to_vec());
    }

    #[test]
    fn test_ten_db_multiplies_by_ten() {
        assert!((db_to_gain(10.0) - 10.0).abs() < 1e-9);
        assert_eq!(apply_gain(&[100, -100], 10.0), vec![1000, -1000]);
    }

    #[test]
    fn test_gain_clips_symmetrically() {
        let out = apply_gain(&[10_000, -10_000, i16::MIN], 10.0);
        assert_eq!(out, vec![0x7FFF, -0x7FFF, -0x7FFF]);
    }

    #[test]
    fn test_gain_truncates_toward_zero() {
        assert_eq!(apply_gain(&[3, -3], 0.5), vec![1, -1]);
    }

    #[test]
    fn test_negative_gain_attenuates() {
        let out = apply_gain(&[1005, -1005], db_to_gain(-10.0));
        assert_eq!(out, vec![100, -100]);
    }

    #[test]
    fn test_write_s16le() {
        let mut buf = Vec::new();
        write_s16le(&mut buf, &[0x0102, -2, 0]).unwrap();
        assert_eq!(buf, vec![0x02, 0x01, 0xFE, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["kiwi-listen"]).unwrap();
        assert_eq!(cli.kiwi, "sybil.yak.net");
        assert_eq!(cli.duration, DEFAULT_DURATION_SECS);
        assert_eq!(cli.freq, 740_000);
        assert_eq!(cli.mode, "am");
        assert_eq!(cli.outgain, 0.0);
        assert!(cli.agc);
        assert_eq!(cli.mangain, 50);
        assert_eq!(cli.ident, "kiwisdr-rs");
        assert!(!cli.compress);
        assert!(!cli.printinfo);
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::try_parse_from([
            "kiwi-listen",
            "--kiwi",
            "kiwi.local:8074",
            "--duration",
            "5",
            "--mode",
            "usb_narrow",
            "--outgain",
            "-3",
            "--agc",
            "false",
            "--mangain",
            "70",
            "--compress",
            "--printinfo",
        ])
        .unwrap();
        assert_eq!(cli.kiwi, "kiwi.local:8074");
        assert_eq!(cli.duration, 5);
        assert_eq!(Mode::by_name(&cli.mode), Some(Mode::USB_NARROW));
        assert_eq!(cli.outgain, -3.0);
        assert!(!cli.agc);
        assert_eq!(cli.mangain, 70);
        assert!(cli.compress);
        assert!(cli.printinfo);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Mode::by_name("fm").is_none());
    }
}
