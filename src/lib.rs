//! # Voice Bridge
//!
//! Real-time bridge between a bidirectional network media channel and a
//! local audio device, built around one bounded ring buffer and a small set
//! of independently scheduled worker threads.
//!
//! ## Architecture Overview
//!
//! ```text
//!                       ┌────────────────────────────────┐
//!   network media  ──▶  │ PeerSession event pump (15 ms) │
//!                       └──────────────┬─────────────────┘
//!                                      │ Media(bytes)
//!                                      ▼
//!                       ┌────────────────────────────────┐
//!                       │ PlaybackPipeline               │
//!                       │  A-law decode → ByteRing       │
//!                       │  (producer blocks, never drops)│
//!                       └──────────────┬─────────────────┘
//!                                      │ drain thread, threshold-gated
//!                                      ▼
//!                            AudioDevice::write (speaker)
//!
//!   AudioDevice::read (mic) ──▶ A-law encode ──▶ PeerSession::send_media
//!        ▲                                            ▲
//!        │  periodic encoder task (while connected)   │
//!        │  CaptureSession (on "start" command)  ─────┘
//!        │       both serialized by TransmitToken
//!
//!   LifecycleController: spawns the encoder task once per connect and
//!   invokes the restart handler on terminal states.
//! ```

pub mod audio;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use bridge::AudioBridge;
pub use error::{Error, Result};

/// Application-wide constants (reference sizing)
pub mod constants {
    use std::time::Duration;

    /// Fixed sample rate for the media channel
    pub const SAMPLE_RATE: u32 = 8000;

    /// Samples per frame (one device I/O or network send)
    pub const FRAME_SAMPLES: usize = 320;

    /// Bytes per linear PCM sample
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Bytes of linear PCM in one frame
    pub const FRAME_BYTES: usize = FRAME_SAMPLES * BYTES_PER_SAMPLE;

    /// Playback ring buffer capacity in bytes
    pub const RING_CAPACITY: usize = 160 * 1024;

    /// Minimum buffered bytes before the drain loop writes to the device
    pub const PLAYBACK_THRESHOLD: usize = FRAME_BYTES;

    /// Drain loop recheck interval when below threshold
    pub const DRAIN_POLL: Duration = Duration::from_millis(1);

    /// Session event pump cadence
    pub const SESSION_TICK: Duration = Duration::from_millis(15);

    /// Maximum wait on device reads and writes
    pub const DEVICE_MAX_WAIT: Duration = Duration::from_millis(500);

    /// Commanded capture duration in seconds
    pub const CAPTURE_SECONDS: u32 = 5;

    /// Control command that triggers a capture session
    pub const START_COMMAND: &str = "start";

    /// Data channel markers framing a capture session
    pub const MARKER_START: &[u8] = b"start";
    pub const MARKER_END: &[u8] = b"end";

    /// Name of the data channel opened toward the peer
    pub const DATA_CHANNEL_LABEL: &str = "bridge-events";

    /// Fixed greeting payload sent when the data channel opens
    pub const GREETING: &str = "{\"type\": \"response.create\", \"response\": {\"modalities\": \
                                [\"audio\", \"text\"], \"instructions\": \"Say 'How can I help?.'\"}}";
}
