use thiserror::Error;

use crate::frame::FrameError;

pub type Result<T> = std::result::Result<T, HomelineError>;

#[derive(Debug, Error)]
pub enum HomelineError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("packet payload too short: {0} byte(s), expected >= 6")]
    ShortPayload(usize),

    #[error("invalid hex in packet header: {0:?}")]
    HeaderHex(String),

    #[error("packet payload is not ASCII")]
    NonAsciiPayload,
}
