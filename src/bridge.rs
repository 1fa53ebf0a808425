//! Bridge context
//!
//! Single owner of the pieces that make up a running bridge: the audio
//! device, the peer session, the playback pipeline with its ring, the
//! transmit token, and the lifecycle controller. The binary builds one of
//! these from configuration and then runs its pump loop against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::audio::capture::{CaptureParams, TransmitToken};
use crate::audio::device::AudioDevice;
use crate::audio::playback::PlaybackPipeline;
use crate::audio::ring::{create_shared_ring, SharedByteRing};
use crate::codec::AlawDecoder;
use crate::config::AppConfig;
use crate::error::Result;
use crate::lifecycle::{LifecycleController, RestartHandler};
use crate::session::{PeerSession, SessionEvent, SignalingExchange};

pub struct AudioBridge {
    device: Arc<dyn AudioDevice>,
    session: Arc<dyn PeerSession>,
    ring: SharedByteRing,
    playback: Arc<PlaybackPipeline>,
    token: Arc<TransmitToken>,
    controller: LifecycleController,
    events: Receiver<SessionEvent>,
    capture_params: CaptureParams,
    tick: Duration,
    drain_stop: Arc<AtomicBool>,
    drain_handle: Option<JoinHandle<()>>,
}

impl AudioBridge {
    /// Wire a bridge from configuration and its external collaborators
    pub fn new(
        config: &AppConfig,
        device: Arc<dyn AudioDevice>,
        session: Arc<dyn PeerSession>,
        signaling: Arc<dyn SignalingExchange>,
        restart: Arc<dyn RestartHandler>,
    ) -> Result<Self> {
        let ring = create_shared_ring(config.audio.ring_capacity)?;
        let playback = Arc::new(PlaybackPipeline::new(
            ring.clone(),
            AlawDecoder::new(config.audio.decode_gain),
            config.audio.playback_threshold,
            config.audio.device_max_wait(),
        ));
        let token = TransmitToken::new();
        let events = session.events();

        let controller = LifecycleController::new(
            device.clone(),
            session.clone(),
            signaling,
            playback.clone(),
            token.clone(),
            restart,
            config.audio.frame_samples,
            config.network.tick(),
            config.audio.device_max_wait(),
        );

        Ok(Self {
            device,
            session,
            ring,
            playback,
            token,
            controller,
            events,
            capture_params: CaptureParams {
                frame_samples: config.audio.frame_samples,
                iterations: config
                    .capture
                    .iterations(config.audio.sample_rate, config.audio.frame_samples),
                device_max_wait: config.audio.device_max_wait(),
            },
            tick: config.network.tick(),
            drain_stop: Arc::new(AtomicBool::new(false)),
            drain_handle: None,
        })
    }

    /// Start the playback drain worker
    pub fn start_playback(&mut self) -> std::io::Result<()> {
        let handle = self
            .playback
            .spawn_drain(self.device.clone(), self.drain_stop.clone())?;
        self.drain_handle = Some(handle);
        Ok(())
    }

    /// Poll the session and feed pending events through the controller
    ///
    /// One call is one pump cycle; the binary runs this on the session tick.
    pub fn pump_once(&mut self) {
        self.session.pump();
        while let Ok(event) = self.events.try_recv() {
            self.controller.handle_event(event);
        }
    }

    /// Whether a terminal peer state has requested a restart
    pub fn restart_requested(&self) -> bool {
        self.controller.restart_requested()
    }

    pub fn device(&self) -> Arc<dyn AudioDevice> {
        self.device.clone()
    }

    pub fn session(&self) -> Arc<dyn PeerSession> {
        self.session.clone()
    }

    pub fn token(&self) -> Arc<TransmitToken> {
        self.token.clone()
    }

    pub fn capture_params(&self) -> CaptureParams {
        self.capture_params
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Bytes currently queued for playback
    pub fn buffered_playback_bytes(&self) -> usize {
        self.ring.len()
    }

    /// Stop the drain worker and the encoder task
    pub fn shutdown(&mut self) {
        self.drain_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.drain_handle.take() {
            let _ = handle.join();
        }
        self.controller.shutdown();
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
