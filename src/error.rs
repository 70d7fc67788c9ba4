//! Error kinds shared across the capture/analysis pipeline.

use thiserror::Error;

/// Everything that can go wrong, from CLI parsing through to the final
/// write of a CSV line.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to open radio device: {0}")]
    RadioOpen(String),

    #[error("failed to configure radio: {0}")]
    RadioConfig(String),

    #[error("quick-tune calibration failed: {0}")]
    CalibrationFailed(String),

    #[error("requested receive timestamp has already passed")]
    TimestampInPast,

    #[error("radio receive timed out")]
    Timeout,

    #[error("capture I/O error: {0}")]
    CaptureIo(String),

    #[error("radio device lost")]
    DeviceLost,

    #[error("radio error: {0}")]
    Other(String),

    #[error("DFT error: {0}")]
    Dft(String),

    #[error("sink write error: {0}")]
    SinkWrite(#[from] std::io::Error),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, SweepError>;
