//! A-law to linear PCM expansion

use crate::error::CodecError;

/// Expand one A-law byte to a 16-bit linear sample.
///
/// Inverts the 0x55 bias, splits the byte into sign, 3-bit segment and 4-bit
/// mantissa, then reconstructs the magnitude by shifting the mantissa with a
/// segment-dependent offset. The output range is the law's native
/// -32256..=32256; [`linear_to_alaw`](crate::codec::linear_to_alaw)
/// reproduces the input byte exactly for every value this can return.
pub fn alaw_to_linear(alaw: u8) -> i16 {
    let alaw = alaw ^ 0x55;
    let sign = alaw & 0x80 != 0;
    let exponent = (alaw & 0x70) >> 4;

    let mut magnitude = (((alaw & 0x0f) as i32) << 4) + 8;
    if exponent != 0 {
        magnitude += 0x100;
    }
    if exponent > 1 {
        magnitude <<= exponent - 1;
    }

    if sign {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}

/// Buffer-wise A-law decoder with an explicit post-decode gain
pub struct AlawDecoder {
    /// Gain applied after expansion, before the samples reach the ring.
    ///
    /// A hardware output-level trim, not part of the wire format. Defaults
    /// to 1.0 (bit-exact expansion).
    gain: f32,
    /// Frames decoded
    frames_decoded: u64,
    /// Total samples produced
    samples_produced: u64,
}

impl AlawDecoder {
    /// Create a decoder with the given post-decode gain
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            frames_decoded: 0,
            samples_produced: 0,
        }
    }

    /// Decode an A-law buffer into linear PCM samples
    ///
    /// Output has the same element count as the input (one sample per byte).
    pub fn decode(&mut self, data: &[u8]) -> Vec<i16> {
        let samples = data
            .iter()
            .map(|&byte| self.expand(byte))
            .collect::<Vec<i16>>();

        self.frames_decoded += 1;
        self.samples_produced += samples.len() as u64;
        samples
    }

    /// Decode into a caller-supplied buffer, returning the sample count
    pub fn decode_into(&mut self, data: &[u8], out: &mut [i16]) -> Result<usize, CodecError> {
        if out.len() < data.len() {
            return Err(CodecError::OutputTooSmall {
                need: data.len(),
                have: out.len(),
            });
        }

        for (slot, &byte) in out.iter_mut().zip(data.iter()) {
            *slot = self.expand(byte);
        }

        self.frames_decoded += 1;
        self.samples_produced += data.len() as u64;
        Ok(data.len())
    }

    #[inline]
    fn expand(&self, byte: u8) -> i16 {
        let linear = alaw_to_linear(byte);
        if self.gain == 1.0 {
            linear
        } else {
            (linear as f32 * self.gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16
        }
    }

    /// Get the configured gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Update the gain
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            samples_produced: self.samples_produced,
        }
    }
}

impl Default for AlawDecoder {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub samples_produced: u64,
}
