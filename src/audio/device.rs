//! Audio device boundary
//!
//! The bridge core only speaks [`AudioDevice`]: blocking frame reads and
//! writes with a bounded wait, over 16-bit little-endian PCM bytes. The
//! cpal-backed implementation adapts the host's callback streams to that
//! contract by parking each stream on its own thread and moving samples
//! through bounded channels.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::AudioError;

/// Output stream parameters (data-rate contract with the peer)
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Input stream parameters
#[derive(Debug, Clone, Copy)]
pub struct InputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Blocking audio device interface
///
/// Buffers are 16-bit signed little-endian PCM. Reads and writes block up
/// to `max_wait` and report how many bytes actually moved.
pub trait AudioDevice: Send + Sync {
    fn configure_output(&self, config: OutputConfig) -> Result<(), AudioError>;
    fn configure_input(&self, config: InputConfig) -> Result<(), AudioError>;
    fn write(&self, data: &[u8], max_wait: Duration) -> Result<usize, AudioError>;
    fn read(&self, buf: &mut [u8], max_wait: Duration) -> Result<usize, AudioError>;
}

/// Basic information about a host audio device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
}

/// List the host's audio devices
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let is_default = default_input.as_ref() == Some(&name);
                devices.push(DeviceInfo {
                    name,
                    is_input: true,
                    is_output: false,
                    is_default,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                let is_default = default_output.as_ref() == Some(&name);
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                    existing.is_default |= is_default;
                } else {
                    devices.push(DeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                        is_default,
                    });
                }
            }
        }
    }

    devices
}

/// Capacity of the callback-side channels, in frames
const STREAM_CHANNEL_FRAMES: usize = 32;

/// cpal-backed [`AudioDevice`]
///
/// `configure_output`/`configure_input` each spawn a thread that owns the
/// cpal stream (streams are not `Send`); `write` feeds the output callback
/// through a bounded channel, `read` drains the input callback's channel.
pub struct CpalDevice {
    input_name: Option<String>,
    output_name: Option<String>,
    out_tx: Mutex<Option<Sender<Vec<i16>>>>,
    in_rx: Mutex<Option<Receiver<Vec<i16>>>>,
    /// Samples received from the input callback but not yet read out
    read_leftover: Mutex<VecDeque<u8>>,
    running: Arc<AtomicBool>,
}

impl CpalDevice {
    /// Create a device handle; `None` selects the host default
    pub fn new(input_name: Option<String>, output_name: Option<String>) -> Self {
        Self {
            input_name,
            output_name,
            out_tx: Mutex::new(None),
            in_rx: Mutex::new(None),
            read_leftover: Mutex::new(VecDeque::new()),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    fn open_input(&self) -> Result<cpal::Device, AudioError> {
        Self::open(&self.input_name, true)
    }

    fn open_output(&self) -> Result<cpal::Device, AudioError> {
        Self::open(&self.output_name, false)
    }

    fn open(name: &Option<String>, is_input: bool) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        match name {
            None => {
                let device = if is_input {
                    host.default_input_device()
                } else {
                    host.default_output_device()
                };
                device.ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))
            }
            Some(wanted) => {
                let mut devices = if is_input {
                    host.input_devices()
                } else {
                    host.output_devices()
                }
                .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

                devices
                    .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                    .ok_or_else(|| AudioError::DeviceNotFound(wanted.clone()))
            }
        }
    }

    /// Stop the stream threads
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl AudioDevice for CpalDevice {
    fn configure_output(&self, config: OutputConfig) -> Result<(), AudioError> {
        let device = self.open_output()?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(STREAM_CHANNEL_FRAMES);
        *self.out_tx.lock() = Some(tx);
        let running = self.running.clone();

        thread::Builder::new()
            .name("device-output".to_string())
            .spawn(move || {
                // Samples queued for the callback but not yet played
                let mut pending: VecDeque<i16> = VecDeque::new();
                let stream = device.build_output_stream(
                    &stream_config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        while pending.len() < out.len() {
                            match rx.try_recv() {
                                Ok(chunk) => pending.extend(chunk),
                                Err(_) => break,
                            }
                        }
                        for slot in out.iter_mut() {
                            // Underrun plays silence
                            let sample = pending.pop_front().unwrap_or(0);
                            *slot = sample as f32 / 32768.0;
                        }
                    },
                    move |err| {
                        tracing::warn!("output stream error: {err}");
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("failed to start output stream: {e}");
                            return;
                        }
                        while running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to build output stream: {e}");
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(())
    }

    fn configure_input(&self, config: InputConfig) -> Result<(), AudioError> {
        let device = self.open_input()?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(STREAM_CHANNEL_FRAMES);
        *self.in_rx.lock() = Some(rx);
        let running = self.running.clone();

        thread::Builder::new()
            .name("device-input".to_string())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let chunk = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                            .collect::<Vec<i16>>();
                        // A stalled reader drops new input here rather than
                        // blocking the audio callback
                        let _ = tx.try_send(chunk);
                    },
                    move |err| {
                        tracing::warn!("input stream error: {err}");
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("failed to start input stream: {e}");
                            return;
                        }
                        while running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to build input stream: {e}");
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(())
    }

    fn write(&self, data: &[u8], max_wait: Duration) -> Result<usize, AudioError> {
        let tx = self.out_tx.lock();
        let tx = tx
            .as_ref()
            .ok_or_else(|| AudioError::WriteFailed("output not configured".to_string()))?;

        let samples = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<i16>>();

        tx.send_timeout(samples, max_wait)
            .map_err(|_| AudioError::WriteFailed("output queue full".to_string()))?;
        Ok(data.len())
    }

    fn read(&self, buf: &mut [u8], max_wait: Duration) -> Result<usize, AudioError> {
        let rx = self.in_rx.lock();
        let rx = rx
            .as_ref()
            .ok_or_else(|| AudioError::ReadFailed("input not configured".to_string()))?;

        let deadline = Instant::now() + max_wait;
        let mut leftover = self.read_leftover.lock();

        while leftover.len() < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(chunk) => {
                    for sample in chunk {
                        leftover.extend(sample.to_le_bytes());
                    }
                }
                Err(_) => break,
            }
        }

        if leftover.is_empty() {
            return Err(AudioError::ReadFailed("timed out".to_string()));
        }

        let count = buf.len().min(leftover.len());
        for slot in buf.iter_mut().take(count) {
            *slot = leftover.pop_front().unwrap_or(0);
        }
        Ok(count)
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
