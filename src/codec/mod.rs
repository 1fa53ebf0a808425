//! A-law companding codec
//!
//! Bidirectional conversion between 8-bit logarithmic (A-law) samples as
//! carried on the media channel and 16-bit signed linear PCM as consumed by
//! the audio device. The byte format is wire-visible to the peer, so both
//! directions are bit-exact reproductions of the companding law; see the
//! round-trip tests in `decoder.rs`.

pub mod decoder;
pub mod encoder;

pub use decoder::{alaw_to_linear, AlawDecoder};
pub use encoder::{linear_to_alaw, AlawEncoder};
