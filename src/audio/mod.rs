//! Audio subsystem module

pub mod capture;
pub mod device;
pub mod playback;
pub mod ring;

pub use capture::{run_capture, spawn_capture, CaptureOutcome, CaptureParams, TransmitToken};
pub use device::{list_devices, AudioDevice, CpalDevice};
pub use playback::PlaybackPipeline;
pub use ring::{create_shared_ring, ByteRing, SharedByteRing};
