//! Connection lifecycle controller
//!
//! Drives the bridge off the peer session's event stream: spawns the
//! periodic encoder task exactly once per transition into the connected
//! state, hands local descriptions to the signaling exchange, opens the
//! data channel with its greeting, and treats terminal states as
//! unrecoverable: one restart request, nothing else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::capture::TransmitToken;
use crate::audio::device::AudioDevice;
use crate::audio::playback::PlaybackPipeline;
use crate::codec::AlawEncoder;
use crate::constants;
use crate::session::{PeerSession, SessionEvent, SignalingExchange};

/// Recovery hook invoked on terminal peer states
///
/// The reference system restarts the whole device; the binary's handler
/// exits the process and leaves the restart to a supervisor.
pub trait RestartHandler: Send + Sync {
    fn restart(&self);
}

/// Periodic device-input → network encoder task
///
/// Long-lived loop at the session tick: read one frame, compress, send.
/// Managed by an explicit stop flag and join handle so ownership of the
/// task is visible, not implied.
pub struct EncoderTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EncoderTask {
    fn spawn(
        device: Arc<dyn AudioDevice>,
        session: Arc<dyn PeerSession>,
        token: Arc<TransmitToken>,
        frame_samples: usize,
        tick: Duration,
        device_max_wait: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("encoder-task".to_string())
            .spawn(move || {
                let mut encoder = AlawEncoder::new();
                let mut frame = vec![0u8; frame_samples * constants::BYTES_PER_SAMPLE];

                while !stop_flag.load(Ordering::Relaxed) {
                    // A capture session owning the token gets the device
                    // input to itself; don't read at all while it runs
                    if token.is_held() {
                        thread::sleep(tick);
                        continue;
                    }

                    match device.read(&mut frame, device_max_wait) {
                        Ok(bytes_read) => {
                            let samples = frame[..bytes_read]
                                .chunks_exact(2)
                                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                                .collect::<Vec<i16>>();
                            let compressed = encoder.encode(&samples);

                            if let Some(_guard) = token.try_acquire() {
                                if let Err(e) = session.send_media(&compressed) {
                                    tracing::warn!("encoder frame not sent: {e}");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!("encoder read failed: {e}");
                        }
                    }
                    thread::sleep(tick);
                }
            })?;

        Ok(Self { stop, handle })
    }

    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

/// State machine over the session's connectivity events
pub struct LifecycleController {
    device: Arc<dyn AudioDevice>,
    session: Arc<dyn PeerSession>,
    signaling: Arc<dyn SignalingExchange>,
    playback: Arc<PlaybackPipeline>,
    token: Arc<TransmitToken>,
    restart: Arc<dyn RestartHandler>,
    /// Spawn guard: Some while the encoder task runs
    encoder_task: Option<EncoderTask>,
    encoder_spawns: usize,
    /// Set once the data channel is created; repeated open notifications
    /// (our own connect plus the peer's channel announcement) are no-ops
    data_channel_opened: bool,
    /// Set after the restart hook fires; later events are ignored
    restart_requested: bool,
    frame_samples: usize,
    tick: Duration,
    device_max_wait: Duration,
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Arc<dyn AudioDevice>,
        session: Arc<dyn PeerSession>,
        signaling: Arc<dyn SignalingExchange>,
        playback: Arc<PlaybackPipeline>,
        token: Arc<TransmitToken>,
        restart: Arc<dyn RestartHandler>,
        frame_samples: usize,
        tick: Duration,
        device_max_wait: Duration,
    ) -> Self {
        Self {
            device,
            session,
            signaling,
            playback,
            token,
            restart,
            encoder_task: None,
            encoder_spawns: 0,
            data_channel_opened: false,
            restart_requested: false,
            frame_samples,
            tick,
            device_max_wait,
        }
    }

    /// Process one session event
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.restart_requested {
            return;
        }

        match event {
            SessionEvent::StateChange(state) => {
                tracing::info!("peer state: {state:?}");
                if state.is_terminal() {
                    tracing::error!("terminal peer state {state:?}, requesting restart");
                    self.restart_requested = true;
                    self.restart.restart();
                } else if state == crate::session::PeerState::Connected {
                    self.spawn_encoder();
                }
                // Intermediate states are informational only
            }
            SessionEvent::LocalDescription(description) => {
                match self.signaling.exchange(&description) {
                    Ok(remote) => {
                        if let Err(e) = self.session.set_remote_description(&remote) {
                            tracing::error!("failed to apply remote description: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!("signaling exchange failed: {e}");
                    }
                }
            }
            SessionEvent::DataChannelOpen => {
                if self.data_channel_opened {
                    tracing::debug!("data channel already open, ignoring repeated open");
                    return;
                }
                match self.session.create_data_channel(constants::DATA_CHANNEL_LABEL) {
                    Ok(()) => {
                        self.data_channel_opened = true;
                        tracing::info!("data channel created");
                        if let Err(e) = self.session.send_control(constants::GREETING.as_bytes()) {
                            tracing::warn!("greeting not sent: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to create data channel: {e}");
                    }
                }
            }
            SessionEvent::DataChannelMessage(data) => {
                tracing::info!("data channel message: {}", String::from_utf8_lossy(&data));
            }
            SessionEvent::Media(data) => {
                // Blocks here, in the pump context, when the ring is full
                if let Err(e) = self.playback.decode_inbound(&data) {
                    tracing::warn!("inbound frame dropped: {e}");
                }
            }
        }
    }

    fn spawn_encoder(&mut self) {
        if self.encoder_task.is_some() {
            tracing::debug!("encoder task already running, ignoring repeated connect");
            return;
        }

        match EncoderTask::spawn(
            self.device.clone(),
            self.session.clone(),
            self.token.clone(),
            self.frame_samples,
            self.tick,
            self.device_max_wait,
        ) {
            Ok(task) => {
                self.encoder_task = Some(task);
                self.encoder_spawns += 1;
                tracing::info!("encoder task started");
            }
            Err(e) => {
                tracing::error!("failed to spawn encoder task: {e}");
            }
        }
    }

    /// Whether the encoder task is currently running
    pub fn encoder_running(&self) -> bool {
        self.encoder_task.is_some()
    }

    /// Total encoder task spawns since construction
    pub fn encoder_spawns(&self) -> usize {
        self.encoder_spawns
    }

    /// Whether a terminal state requested a restart
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Stop the encoder task and clear its handle
    pub fn shutdown(&mut self) {
        if let Some(task) = self.encoder_task.take() {
            task.stop();
        }
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{InputConfig, OutputConfig};
    use crate::audio::ring::create_shared_ring;
    use crate::codec::AlawDecoder;
    use crate::error::{AudioError, SessionError};
    use crate::session::PeerState;
    use crossbeam_channel::{unbounded, Receiver};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct SilentDevice;

    impl AudioDevice for SilentDevice {
        fn configure_output(&self, _: OutputConfig) -> Result<(), AudioError> {
            Ok(())
        }
        fn configure_input(&self, _: InputConfig) -> Result<(), AudioError> {
            Ok(())
        }
        fn write(&self, data: &[u8], _: Duration) -> Result<usize, AudioError> {
            Ok(data.len())
        }
        fn read(&self, buf: &mut [u8], _: Duration) -> Result<usize, AudioError> {
            buf.fill(0);
            Ok(buf.len())
        }
    }

    #[derive(Default)]
    struct FakeSession {
        remote_descriptions: Mutex<Vec<String>>,
        channels: Mutex<Vec<String>>,
        control: Mutex<Vec<Vec<u8>>>,
        media_sent: AtomicUsize,
    }

    impl PeerSession for FakeSession {
        fn send_media(&self, _: &[u8]) -> Result<(), SessionError> {
            self.media_sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        fn send_control(&self, data: &[u8]) -> Result<(), SessionError> {
            self.control.lock().push(data.to_vec());
            Ok(())
        }
        fn set_remote_description(&self, description: &str) -> Result<(), SessionError> {
            self.remote_descriptions.lock().push(description.to_string());
            Ok(())
        }
        fn create_offer(&self) -> Result<(), SessionError> {
            Ok(())
        }
        fn create_data_channel(&self, label: &str) -> Result<(), SessionError> {
            self.channels.lock().push(label.to_string());
            Ok(())
        }
        fn pump(&self) {}
        fn events(&self) -> Receiver<SessionEvent> {
            let (_tx, rx) = unbounded();
            rx
        }
    }

    struct UppercaseSignaling;

    impl SignalingExchange for UppercaseSignaling {
        fn exchange(&self, local: &str) -> Result<String, SessionError> {
            Ok(local.to_uppercase())
        }
    }

    #[derive(Default)]
    struct CountingRestart {
        count: AtomicUsize,
    }

    impl RestartHandler for CountingRestart {
        fn restart(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller(
        session: Arc<FakeSession>,
        restart: Arc<CountingRestart>,
    ) -> LifecycleController {
        let ring = create_shared_ring(4096).unwrap();
        let playback = Arc::new(PlaybackPipeline::new(
            ring,
            AlawDecoder::default(),
            640,
            Duration::from_millis(10),
        ));
        LifecycleController::new(
            Arc::new(SilentDevice),
            session,
            Arc::new(UppercaseSignaling),
            playback,
            TransmitToken::new(),
            restart,
            320,
            Duration::from_millis(1),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_single_spawn_on_repeated_connected() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session, restart);

        for state in [PeerState::Connecting, PeerState::Connected, PeerState::Connected] {
            controller.handle_event(SessionEvent::StateChange(state));
        }

        assert_eq!(controller.encoder_spawns(), 1);
        assert!(controller.encoder_running());
        controller.shutdown();
        assert!(!controller.encoder_running());
    }

    #[test]
    fn test_terminal_state_restarts_once() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session.clone(), restart.clone());

        controller.handle_event(SessionEvent::StateChange(PeerState::Disconnected));
        assert_eq!(restart.count.load(Ordering::SeqCst), 1);
        assert!(controller.restart_requested());

        // No further processing once a restart is pending
        controller.handle_event(SessionEvent::StateChange(PeerState::Closed));
        controller.handle_event(SessionEvent::StateChange(PeerState::Connected));
        assert_eq!(restart.count.load(Ordering::SeqCst), 1);
        assert_eq!(controller.encoder_spawns(), 0);
    }

    #[test]
    fn test_intermediate_states_are_ignored() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session, restart.clone());

        for state in [PeerState::New, PeerState::Checking, PeerState::Completed] {
            controller.handle_event(SessionEvent::StateChange(state));
        }

        assert_eq!(controller.encoder_spawns(), 0);
        assert_eq!(restart.count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_local_description_goes_through_signaling() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session.clone(), restart);

        controller.handle_event(SessionEvent::LocalDescription("udp:addr".to_string()));

        let applied = session.remote_descriptions.lock();
        assert_eq!(applied.as_slice(), ["UDP:ADDR".to_string()]);
    }

    #[test]
    fn test_data_channel_open_sends_greeting() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session.clone(), restart);

        controller.handle_event(SessionEvent::DataChannelOpen);

        assert_eq!(session.channels.lock().as_slice(), [constants::DATA_CHANNEL_LABEL]);
        let control = session.control.lock();
        assert_eq!(control.len(), 1);
        assert_eq!(control[0], constants::GREETING.as_bytes());
    }

    #[test]
    fn test_repeated_channel_open_creates_once() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let mut controller = controller(session.clone(), restart);

        // Own connect announcement plus the peer echoing its channel back
        for _ in 0..3 {
            controller.handle_event(SessionEvent::DataChannelOpen);
        }

        assert_eq!(session.channels.lock().len(), 1);
        assert_eq!(session.control.lock().len(), 1);
    }

    #[test]
    fn test_encoder_idles_while_capture_holds_token() {
        #[derive(Default)]
        struct CountingDevice {
            reads: AtomicUsize,
        }

        impl AudioDevice for CountingDevice {
            fn configure_output(&self, _: OutputConfig) -> Result<(), AudioError> {
                Ok(())
            }
            fn configure_input(&self, _: InputConfig) -> Result<(), AudioError> {
                Ok(())
            }
            fn write(&self, data: &[u8], _: Duration) -> Result<usize, AudioError> {
                Ok(data.len())
            }
            fn read(&self, buf: &mut [u8], _: Duration) -> Result<usize, AudioError> {
                self.reads.fetch_add(1, Ordering::SeqCst);
                buf.fill(0);
                Ok(buf.len())
            }
        }

        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let device = Arc::new(CountingDevice::default());
        let token = TransmitToken::new();
        let ring = create_shared_ring(4096).unwrap();
        let playback = Arc::new(PlaybackPipeline::new(
            ring,
            AlawDecoder::default(),
            640,
            Duration::from_millis(10),
        ));
        let mut controller = LifecycleController::new(
            device.clone(),
            session,
            Arc::new(UppercaseSignaling),
            playback,
            token.clone(),
            restart,
            8,
            Duration::from_millis(1),
            Duration::from_millis(1),
        );

        let guard = token.try_acquire().unwrap();
        controller.handle_event(SessionEvent::StateChange(PeerState::Connected));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(device.reads.load(Ordering::SeqCst), 0);

        drop(guard);
        std::thread::sleep(Duration::from_millis(50));
        assert!(device.reads.load(Ordering::SeqCst) > 0);

        controller.shutdown();
    }

    #[test]
    fn test_inbound_media_reaches_playback() {
        let session = Arc::new(FakeSession::default());
        let restart = Arc::new(CountingRestart::default());
        let ring = create_shared_ring(4096).unwrap();
        let playback = Arc::new(PlaybackPipeline::new(
            ring.clone(),
            AlawDecoder::default(),
            640,
            Duration::from_millis(10),
        ));
        let mut controller = LifecycleController::new(
            Arc::new(SilentDevice),
            session,
            Arc::new(UppercaseSignaling),
            playback,
            TransmitToken::new(),
            restart,
            320,
            Duration::from_millis(1),
            Duration::from_millis(10),
        );

        controller.handle_event(SessionEvent::Media(vec![0x55; 320]));
        assert_eq!(ring.len(), 640);
    }
}
