//! Engine error type.
//!
//! Errors never reach the end user: the factory logs them and degrades to the
//! silent engine, and haptic failures are swallowed where they happen.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no default audio output device")]
    NoDevice,

    #[error("requested output device not found: {0}")]
    DeviceNotFound(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),

    #[error("vibration failed: {0}")]
    Haptic(String),

    #[error("sample rate is fixed by the output device")]
    FixedSampleRate,
}
