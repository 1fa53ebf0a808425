//! Error types for the voice bridge

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Ring buffer allocation failed: {0} bytes")]
    BufferAllocation(usize),

    #[error("Item of {item} bytes exceeds ring capacity of {capacity}")]
    ItemTooLarge { item: usize, capacity: usize },

    #[error("Timed out waiting for ring buffer space")]
    BufferTimeout,

    #[error("Device read failed: {0}")]
    ReadFailed(String),

    #[error("Device write failed: {0}")]
    WriteFailed(String),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Output buffer too small: need {need}, have {have}")]
    OutputTooSmall { need: usize, have: usize },

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(usize),
}

/// Peer session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to create peer session: {0}")]
    CreateFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid remote description: {0}")]
    InvalidDescription(String),

    #[error("Signaling exchange failed: {0}")]
    SignalingFailed(String),

    #[error("Data channel unavailable")]
    NoDataChannel,

    #[error("Session closed")]
    Closed,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
