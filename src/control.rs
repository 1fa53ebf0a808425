//! Operator command input
//!
//! Line-oriented commands read from any `BufRead` source, normally the
//! binary's stdin. A `start` line triggers one capture session; overlapping
//! triggers are rejected while a previous session still holds the transmit
//! token.

use std::io::BufRead;
use std::sync::Arc;

use crate::audio::capture::{spawn_capture, CaptureParams, TransmitToken};
use crate::audio::device::AudioDevice;
use crate::constants;
use crate::session::PeerSession;

/// Outcome of dispatching a single command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A capture session was started
    CaptureStarted,
    /// A capture session is already in flight
    CaptureBusy,
    /// The line was not a recognized command
    Ignored,
}

/// Dispatch one command line
pub fn dispatch_command(
    line: &str,
    device: &Arc<dyn AudioDevice>,
    session: &Arc<dyn PeerSession>,
    token: &Arc<TransmitToken>,
    params: CaptureParams,
) -> CommandOutcome {
    let command = line.trim();
    if command != constants::START_COMMAND {
        if !command.is_empty() {
            tracing::info!("unrecognized command: {command:?}");
        }
        return CommandOutcome::Ignored;
    }

    let Some(guard) = token.try_acquire() else {
        tracing::warn!("capture already in progress, ignoring start");
        return CommandOutcome::CaptureBusy;
    };

    match spawn_capture(device.clone(), session.clone(), params, guard) {
        Ok(_handle) => {
            tracing::info!("capture session started");
            CommandOutcome::CaptureStarted
        }
        Err(e) => {
            tracing::error!("failed to spawn capture session: {e}");
            CommandOutcome::Ignored
        }
    }
}

/// Read commands until the source is exhausted
///
/// Runs on a dedicated thread in the binary so stdin never blocks the
/// session pump.
pub fn run_command_loop<R: BufRead>(
    reader: R,
    device: Arc<dyn AudioDevice>,
    session: Arc<dyn PeerSession>,
    token: Arc<TransmitToken>,
    params: CaptureParams,
) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                dispatch_command(&line, &device, &session, &token, params);
            }
            Err(e) => {
                tracing::warn!("command input closed: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{InputConfig, OutputConfig};
    use crate::error::{AudioError, SessionError};
    use crate::session::SessionEvent;
    use crossbeam_channel::{unbounded, Receiver};
    use parking_lot::Mutex;
    use std::time::Duration;

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
    struct RecordingSession {
        control: Mutex<Vec<Vec<u8>>>,
        media: Mutex<Vec<Vec<u8>>>,
    }

    impl PeerSession for RecordingSession {
        fn send_media(&self, data: &[u8]) -> Result<(), SessionError> {
            self.media.lock().push(data.to_vec());
            Ok(())
        }
        fn send_control(&self, data: &[u8]) -> Result<(), SessionError> {
            self.control.lock().push(data.to_vec());
            Ok(())
        }
        fn set_remote_description(&self, _: &str) -> Result<(), SessionError> {
            Ok(())
        }
        fn create_offer(&self) -> Result<(), SessionError> {
            Ok(())
        }
        fn create_data_channel(&self, _: &str) -> Result<(), SessionError> {
            Ok(())
        }
        fn pump(&self) {}
        fn events(&self) -> Receiver<SessionEvent> {
            let (_tx, rx) = unbounded();
            rx
        }
    }

    fn params() -> CaptureParams {
        CaptureParams {
            frame_samples: 8,
            iterations: 2,
            device_max_wait: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_start_command_triggers_capture() {
        let device: Arc<dyn AudioDevice> = Arc::new(SilentDevice);
        let session = Arc::new(RecordingSession::default());
        let peer: Arc<dyn PeerSession> = session.clone();
        let token = TransmitToken::new();

        let outcome = dispatch_command("start\n", &device, &peer, &token, params());
        assert_eq!(outcome, CommandOutcome::CaptureStarted);

        // Wait for the session thread to finish and release the token
        while token.is_held() {
            std::thread::sleep(Duration::from_millis(1));
        }
        let control = session.control.lock();
        assert_eq!(control.first().map(Vec::as_slice), Some(&b"start"[..]));
        assert_eq!(control.last().map(Vec::as_slice), Some(&b"end"[..]));
        assert_eq!(session.media.lock().len(), 2);
    }

    #[test]
    fn test_busy_token_rejects_start() {
        let device: Arc<dyn AudioDevice> = Arc::new(SilentDevice);
        let peer: Arc<dyn PeerSession> = Arc::new(RecordingSession::default());
        let token = TransmitToken::new();

        let _guard = token.try_acquire().unwrap();
        let outcome = dispatch_command("start", &device, &peer, &token, params());
        assert_eq!(outcome, CommandOutcome::CaptureBusy);
    }

    #[test]
    fn test_other_lines_are_ignored() {
        let device: Arc<dyn AudioDevice> = Arc::new(SilentDevice);
        let peer: Arc<dyn PeerSession> = Arc::new(RecordingSession::default());
        let token = TransmitToken::new();

        for line in ["", "stop", "START", "start now"] {
            assert_eq!(
                dispatch_command(line, &device, &peer, &token, params()),
                CommandOutcome::Ignored
            );
        }
        assert!(!token.is_held());
    }

    #[test]
    fn test_command_loop_reads_until_eof() {
        let device: Arc<dyn AudioDevice> = Arc::new(SilentDevice);
        let session = Arc::new(RecordingSession::default());
        let peer: Arc<dyn PeerSession> = session.clone();
        let token = TransmitToken::new();

        let input = b"noise\nstart\n".to_vec();
        run_command_loop(&input[..], device, peer.clone(), token.clone(), params());

        while token.is_held() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(session.control.lock().len(), 2);
    }
}
