//! 视频源抽象
//!
//! `read_frame` 区分三种结果：`Ok(Some)` 读到帧，`Ok(None)` 流结束，
//! `Err` 解码失败。采样器默认把后两者同样视为终止。

use super::error::VideoError;
use super::frame::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 视频元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// 帧率 (fps)
    pub fps: f64,
    /// 总帧数，容器未提供且无法估算时为 None
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    pub fn duration(&self) -> Option<Duration> {
        let frames = self.frame_count?;
        if self.fps <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(frames as f64 / self.fps))
    }
}

pub trait VideoSource {
    fn info(&self) -> &VideoInfo;

    /// 下一次 `read_frame` 将读取的帧号
    fn position(&self) -> u64;

    fn seek(&mut self, position: u64) -> Result<(), VideoError>;

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn info(&self) -> &VideoInfo {
        (**self).info()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn seek(&mut self, position: u64) -> Result<(), VideoError> {
        (**self).seek(position)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        (**self).read_frame()
    }
}

/// 内存视频源（测试及嵌入场景）
pub struct MemorySource {
    info: VideoInfo,
    frames: Vec<Frame>,
    cursor: u64,
    fail_at: Option<u64>,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self {
            info: VideoInfo {
                width,
                height,
                fps,
                frame_count: Some(frames.len() as u64),
            },
            frames,
            cursor: 0,
            fail_at: None,
        }
    }

    /// 读取指定帧号时模拟解码失败
    pub fn with_decode_failure_at(mut self, position: u64) -> Self {
        self.fail_at = Some(position);
        self
    }
}

impl VideoSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn seek(&mut self, position: u64) -> Result<(), VideoError> {
        self.cursor = position;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        if self.fail_at == Some(self.cursor) {
            return Err(VideoError::DecodeFailed(format!(
                "corrupt frame at {}",
                self.cursor
            )));
        }
        let Some(frame) = self.frames.get(self.cursor as usize) else {
            return Ok(None);
        };
        let mut frame = frame.clone();
        frame.position = self.cursor;
        self.cursor += 1;
        Ok(Some(frame))
    }
}
