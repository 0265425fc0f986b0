//! SND frame decoding.
//!
//! Every SND payload starts with a 7-byte header followed by the sample
//! region:
//!
//! ```text
//! offset  size  field
//! 0       1     flag (unsigned)
//! 1       4     sequence (signed, little-endian)
//! 5       2     signal meter (unsigned, big-endian)
//! 7       ..    samples: big-endian i16 pairs, or IMA ADPCM nibbles
//! ```
//!
//! Offsets are relative to the payload, i.e. after the 3-byte `SND` tag.

use kiwisdr_core::{Error, Result};

use crate::adpcm::ImaAdpcmDecoder;

/// Size of the SND header that precedes the samples.
pub const SND_HEADER_LEN: usize = 7;

/// Output sample rate of a KiwiSDR audio stream in hertz (nominal).
pub const AUDIO_SAMPLE_RATE: u32 = 12_000;

/// One decoded block of audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    pub flag: u8,
    pub sequence: i32,
    /// Raw signal-meter reading as sent by the server.
    pub smeter: u16,
    /// Mono signed 16-bit samples.
    pub samples: Vec<i16>,
}

/// Decodes SND payloads for one audio stream.
///
/// Holds the ADPCM state when the stream is compressed, so a single decoder
/// must see every packet of the stream in order.
#[derive(Debug, Clone)]
pub struct AudioPacketDecoder {
    compressed: bool,
    adpcm: ImaAdpcmDecoder,
}

impl AudioPacketDecoder {
    /// Create a decoder for a compressed (`true`) or plain PCM stream.
    pub fn new(compressed: bool) -> Self {
        AudioPacketDecoder {
            compressed,
            adpcm: ImaAdpcmDecoder::new(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Decode one SND payload.
    ///
    /// A payload shorter than the header is a decode error; a payload of
    /// exactly the header yields a packet with no samples.
    pub fn decode(&mut self, payload: &[u8]) -> Result<AudioPacket> {
        if payload.len() < SND_HEADER_LEN {
            return Err(Error::Decode(format!(
                "short audio packet: {} bytes, header is {}",
                payload.len(),
                SND_HEADER_LEN
            )));
        }

        let flag = payload[0];
        let sequence = i32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let smeter = u16::from_be_bytes([payload[5], payload[6]]);

        let samples = if self.compressed {
            self.adpcm.decode(payload, SND_HEADER_LEN)
        } else {
            decode_pcm(&payload[SND_HEADER_LEN..])
        };

        Ok(AudioPacket {
            flag,
            sequence,
            smeter,
            samples,
        })
    }
}

/// Big-endian i16 pairs; a trailing odd byte is dropped.
fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
