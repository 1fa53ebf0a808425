//! Linear PCM to A-law compression

/// Segment end points for the biased magnitude
const SEG_END: [i32; 8] = [0x1f, 0x3f, 0x7f, 0xff, 0x1ff, 0x3ff, 0x7ff, 0xfff];

/// Number of A-law segments
const NSEGS: usize = 8;

/// Quantization field mask
const QUANT_MASK: i32 = 0x0f;

/// Left shift for the segment number
const SEG_SHIFT: u32 = 4;

/// Compress one 16-bit linear sample to an A-law byte.
///
/// Scales the sample to the law's 13-bit domain, folds negatives into the
/// biased magnitude, finds the minimal segment that holds it, then packs
/// sign, segment and quantization bits under the 0x55 bias. Magnitudes past
/// the 12-bit ceiling clip to the law's maximum value.
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut linear = (sample >> 3) as i32;

    let mask: u8 = if linear >= 0 {
        0xd5 // sign (7th) bit = 1
    } else {
        linear = -linear - 1;
        0x55 // sign bit = 0
    };

    let mut seg = 0usize;
    while seg < NSEGS && linear > SEG_END[seg] {
        seg += 1;
    }

    if seg >= NSEGS {
        // out of range, return maximum value
        0x7f ^ mask
    } else {
        let mut aval = (seg as u8) << SEG_SHIFT;
        if seg < 2 {
            aval |= ((linear >> 1) & QUANT_MASK) as u8;
        } else {
            aval |= ((linear >> seg) & QUANT_MASK) as u8;
        }
        aval ^ mask
    }
}

/// Buffer-wise A-law encoder
pub struct AlawEncoder {
    /// Frames encoded
    frames_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl AlawEncoder {
    pub fn new() -> Self {
        Self {
            frames_encoded: 0,
            bytes_produced: 0,
        }
    }

    /// Encode linear PCM samples into A-law bytes
    ///
    /// Output has the same element count as the input (one byte per sample).
    pub fn encode(&mut self, samples: &[i16]) -> Vec<u8> {
        let data = samples
            .iter()
            .map(|&s| linear_to_alaw(s))
            .collect::<Vec<u8>>();

        self.frames_encoded += 1;
        self.bytes_produced += data.len() as u64;
        data
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

impl Default for AlawEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::alaw_to_linear;

    #[test]
    fn test_known_values() {
        assert_eq!(linear_to_alaw(-8), 0x55);
        assert_eq!(linear_to_alaw(8), 0xD5);
        assert_eq!(linear_to_alaw(32256), 0xAA);
        assert_eq!(linear_to_alaw(-32256), 0x2A);
    }

    #[test]
    fn test_extremes_clip_to_max_segment() {
        // Values past the law's largest code point land on segment 7
        assert_eq!(linear_to_alaw(i16::MAX), 0xAA);
        assert_eq!(linear_to_alaw(i16::MIN), 0x2A);
    }

    #[test]
    fn test_quantization_is_lossy_but_stable() {
        // 100 >> 3 = 12, segment 0 → quantized; the quantized value must
        // re-encode to the same byte (idempotent after one pass).
        let byte = linear_to_alaw(100);
        let quantized = alaw_to_linear(byte);
        assert_ne!(quantized, 100);
        assert_eq!(linear_to_alaw(quantized), byte);
    }

    #[test]
    fn test_encode_preserves_length() {
        let mut encoder = AlawEncoder::new();
        let data = encoder.encode(&[0i16; 320]);
        assert_eq!(data.len(), 320);

        let stats = encoder.stats();
        assert_eq!(stats.frames_encoded, 1);
        assert_eq!(stats.bytes_produced, 320);
    }
}
