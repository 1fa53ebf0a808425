//! Commanded capture/transmit session
//!
//! Triggered by the control channel's `start` command: captures a fixed
//! total duration from the device input, compresses it and streams it to
//! the peer, framed by `start`/`end` markers on the data channel. The
//! session always emits the `end` marker, even when a device read aborts
//! the loop early. The peer must never be left waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::AudioDevice;
use crate::codec::AlawEncoder;
use crate::constants;
use crate::session::PeerSession;

/// Exclusive claim on the media send primitive
///
/// The periodic encoder task and a capture session both write to
/// [`PeerSession::send_media`]; this token serializes them. A capture
/// trigger that arrives while the token is held is rejected.
pub struct TransmitToken {
    held: AtomicBool,
}

impl TransmitToken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            held: AtomicBool::new(false),
        })
    }

    /// Claim the token; `None` if another transmitter holds it
    pub fn try_acquire(self: &Arc<Self>) -> Option<TransmitGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(TransmitGuard {
                token: self.clone(),
            })
        } else {
            None
        }
    }

    /// Check whether the token is currently held
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Released on drop
pub struct TransmitGuard {
    token: Arc<TransmitToken>,
}

impl Drop for TransmitGuard {
    fn drop(&mut self) {
        self.token.held.store(false, Ordering::Release);
    }
}

/// Result of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Iterations that completed a read/convert/send cycle
    pub iterations_completed: usize,
    /// True when a device read failure cut the session short
    pub aborted: bool,
}

/// Parameters of one capture session
#[derive(Debug, Clone, Copy)]
pub struct CaptureParams {
    pub frame_samples: usize,
    pub iterations: usize,
    pub device_max_wait: Duration,
}

/// Run a capture session to completion on the calling thread
///
/// Iteration count = capture duration in samples / frame size (reference:
/// 5 s × 8 kHz / 320 = 125). A read failure is fail-fast: remaining
/// iterations are skipped, but the `end` marker is still sent.
pub fn run_capture(
    device: &dyn AudioDevice,
    session: &dyn PeerSession,
    params: CaptureParams,
) -> CaptureOutcome {
    if let Err(e) = session.send_control(constants::MARKER_START) {
        tracing::warn!("capture start marker not sent: {e}");
    }

    let mut encoder = AlawEncoder::new();
    let mut frame = vec![0u8; params.frame_samples * constants::BYTES_PER_SAMPLE];
    let mut completed = 0;
    let mut aborted = false;

    for _ in 0..params.iterations {
        let bytes_read = match device.read(&mut frame, params.device_max_wait) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("capture read failed after {completed} frames: {e}");
                aborted = true;
                break;
            }
        };

        let samples = frame[..bytes_read]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<i16>>();
        let compressed = encoder.encode(&samples);

        if let Err(e) = session.send_media(&compressed) {
            tracing::warn!("capture frame not sent: {e}");
        }
        completed += 1;
    }

    // Always terminate the session on the wire, success or failure
    if let Err(e) = session.send_control(constants::MARKER_END) {
        tracing::warn!("capture end marker not sent: {e}");
    }

    let stats = encoder.stats();
    tracing::info!(
        "capture session done: {completed}/{} frames, {} bytes sent, aborted={aborted}",
        params.iterations,
        stats.bytes_produced,
    );

    CaptureOutcome {
        iterations_completed: completed,
        aborted,
    }
}

/// Spawn a capture session on its own thread
///
/// The transmit guard travels with the thread and releases when the
/// session ends, re-admitting the periodic encoder task.
pub fn spawn_capture(
    device: Arc<dyn AudioDevice>,
    session: Arc<dyn PeerSession>,
    params: CaptureParams,
    guard: TransmitGuard,
) -> std::io::Result<JoinHandle<CaptureOutcome>> {
    thread::Builder::new()
        .name("capture-session".to_string())
        .spawn(move || {
            let outcome = run_capture(device.as_ref(), session.as_ref(), params);
            drop(guard);
            outcome
        })
}
