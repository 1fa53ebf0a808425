//! Playback pipeline: inbound media frames to the output device
//!
//! The producer half runs in the network session's delivery context and
//! blocks on ring space rather than dropping audio. The consumer half is a
//! long-lived drain thread that writes to the device only when at least one
//! frame's worth of bytes has accumulated.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::AudioDevice;
use crate::audio::ring::SharedByteRing;
use crate::codec::AlawDecoder;
use crate::constants;
use crate::error::AudioError;

/// Decode-and-buffer pipeline feeding the output device
pub struct PlaybackPipeline {
    ring: SharedByteRing,
    decoder: Mutex<AlawDecoder>,
    /// Minimum buffered bytes before a device write
    threshold: usize,
    /// Maximum wait on a single device write
    device_max_wait: Duration,
}

impl PlaybackPipeline {
    pub fn new(
        ring: SharedByteRing,
        decoder: AlawDecoder,
        threshold: usize,
        device_max_wait: Duration,
    ) -> Self {
        Self {
            ring,
            decoder: Mutex::new(decoder),
            threshold,
            device_max_wait,
        }
    }

    /// Decode an inbound compressed frame and enqueue it for playback
    ///
    /// Blocks the calling context while the ring is full. Backpressure is
    /// chosen over loss: this call never drops a frame.
    pub fn decode_inbound(&self, data: &[u8]) -> Result<(), AudioError> {
        let samples = self.decoder.lock().decode(data);

        let mut bytes = Vec::with_capacity(samples.len() * constants::BYTES_PER_SAMPLE);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        self.ring.push_all(&bytes, None)
    }

    /// One drain iteration: write everything buffered if the threshold is met
    ///
    /// Returns true if a device write was attempted. A failed write is
    /// logged and its data is lost; the ring is single-pass, there is no
    /// replay.
    pub fn drain_once(&self, device: &dyn AudioDevice, scratch: &mut Vec<u8>) -> bool {
        scratch.clear();
        let drained = self.ring.pop_available(self.threshold, scratch);
        if drained == 0 {
            return false;
        }

        if let Err(e) = device.write(scratch, self.device_max_wait) {
            tracing::warn!("playback write failed, {drained} bytes lost: {e}");
        }
        true
    }

    /// Spawn the drain loop on its own thread
    ///
    /// Runs until `stop` is set, sleeping a short fixed interval whenever
    /// the ring is below the threshold.
    pub fn spawn_drain(
        self: &Arc<Self>,
        device: Arc<dyn AudioDevice>,
        stop: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        let pipeline = self.clone();
        thread::Builder::new()
            .name("playback-drain".to_string())
            .spawn(move || {
                let mut scratch = Vec::with_capacity(pipeline.ring.capacity());
                while !stop.load(Ordering::Relaxed) {
                    if !pipeline.drain_once(device.as_ref(), &mut scratch) {
                        thread::sleep(constants::DRAIN_POLL);
                    }
                }
            })
    }

    /// Buffered byte count (test and stats hook)
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }
}
