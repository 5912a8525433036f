use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlickerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Camera connection failed: {0}")]
    DeviceConnection(String),

    #[error("Camera error: {0}")]
    Device(String),

    #[error("Camera is busy: stop acquisition before reconfiguring")]
    DeviceBusy,

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Frame dimensions {actual:?} do not match configured {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame stack is empty")]
    EmptyStack,

    #[error("Pipeline is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FlickerError>;
