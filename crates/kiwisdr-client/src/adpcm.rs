//! 4-bit IMA ADPCM decoder.
//!
//! The KiwiSDR compresses audio with standard IMA ADPCM: each 4-bit code
//! encodes a signed step relative to the previous sample, and the step size
//! adapts through a shared 89-entry table. The decoder state (table index
//! and previous sample) carries over from packet to packet, so one decoder
//! must be used for the whole audio stream of a session.

/// IMA ADPCM step sizes.
const STEP_SIZE_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Step index adjustment per code. Magnitudes 0-3 shrink the step, 4-7 grow it.
const INDEX_ADJUST_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const MAX_INDEX: i32 = STEP_SIZE_TABLE.len() as i32 - 1;

/// Stateful IMA ADPCM decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImaAdpcmDecoder {
    index: i32,
    prev: i32,
}

impl ImaAdpcmDecoder {
    /// A decoder at step index 0 with a previous sample of 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position in the step-size table (always `0..=88`).
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Last reconstructed sample.
    pub fn previous_sample(&self) -> i16 {
        self.prev as i16
    }

    /// Decode every byte of `data` from offset `skip` onward.
    ///
    /// Each byte yields two samples: low nibble first, then high nibble.
    /// A `skip` past the end of `data` yields no samples.
    pub fn decode(&mut self, data: &[u8], skip: usize) -> Vec<i16> {
        let bytes = data.get(skip..).unwrap_or_default();
        let mut samples = Vec::with_capacity(bytes.len() * 2);
        for &byte in bytes {
            samples.push(self.decode_sample(byte & 0x0F));
            samples.push(self.decode_sample(byte >> 4));
        }
        samples
    }

    /// Decode one 4-bit code (the upper four bits are ignored).
    pub fn decode_sample(&mut self, code: u8) -> i16 {
        let code = code & 0x0F;
        let step = STEP_SIZE_TABLE[self.index as usize];
        self.index = (self.index + INDEX_ADJUST_TABLE[code as usize]).clamp(0, MAX_INDEX);

        let mut difference = step >> 3;
        if code & 1 != 0 {
            difference += step >> 2;
        }
        if code & 2 != 0 {
            difference += step >> 1;
        }
        if code & 4 != 0 {
            difference += step;
        }
        if code & 8 != 0 {
            difference = -difference;
        }

        let sample = (self.prev + difference).clamp(i16::MIN as i32, i16::MAX as i32);
        self.prev = sample;
        sample as i16
    }
}
