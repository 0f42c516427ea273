use super::error::{SlidesError, SlidesResult};
use image::RgbImage;
use std::fmt;

/// 每个像素的通道数（RGB）
pub const CHANNELS: usize = 3;

/// 帧数据结构（不可变 RGB 缓冲区）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>, // RGB 格式，行优先
    /// 在采样序列中的序号
    pub index: usize,
    /// 在源视频中的帧号
    pub position: u64,
}

/// 帧尺寸（宽、高、通道数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, position: u64) -> SlidesResult<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(SlidesError::invalid_input(format!(
                "frame buffer of {} bytes does not match {}x{} RGB",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            index: 0,
            position,
        })
    }

    pub fn from_image(image: RgbImage, position: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
            index: 0,
            position,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            channels: CHANNELS,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn to_image(&self) -> RgbImage {
        // 构造时已校验长度
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// 两帧尺寸不一致时返回 MismatchedDimensions
    pub fn ensure_same_shape(&self, other: &Frame) -> SlidesResult<()> {
        if self.shape() != other.shape() {
            return Err(SlidesError::MismatchedDimensions {
                expected: self.shape().to_string(),
                found: other.shape().to_string(),
            });
        }
        Ok(())
    }
}

/// 帧元数据（轻量级，用于报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub index: usize,
    pub position: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            index: frame.index,
            position: frame.position,
        }
    }
}
