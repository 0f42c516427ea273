use std::path::PathBuf;
use thiserror::Error;

/// 解码层错误（视频源）
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Video file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),
    #[error("Probe failed: {0}")]
    ProbeFailed(String),
    #[error("No video stream found")]
    NoVideoStream,
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Cannot seek backward from {current} to {target}")]
    SeekBackward { current: u64, target: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 流水线错误
#[derive(Debug, Error)]
pub enum SlidesError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Mismatched frame dimensions: expected {expected}, found {found}")]
    MismatchedDimensions { expected: String, found: String },
    #[error("Frame {width}x{height} is smaller than the {window}x{window} similarity window")]
    FrameTooSmall { width: u32, height: u32, window: u32 },
    #[error("No frames to export")]
    EmptyResult,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Worker thread panicked")]
    WorkerPanicked,
    #[error("Video error: {0}")]
    Decode(#[from] VideoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SlidesResult<T> = Result<T, SlidesError>;

impl SlidesError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
