use super::error::{SlidesError, SlidesResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 采样步长上限
pub const MAX_STRIDE: u64 = 2000;

/// 可接受的输入扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "avi"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 每隔 n_frame 帧读取一帧
    pub n_frame: u64,
    /// 读取位置超过该值后停止
    pub frame_limit: Option<u64>,
    /// 相同像素比例低于该值的相邻帧才进入 SSIM 阶段
    pub diff_threshold: f64,
    /// SSIM 低于该值时保留后一帧
    pub ssim_threshold: f64,
    /// 无条件保留第一帧采样
    pub include_first_frame: bool,
    /// 解码失败视为致命错误而非流结束
    pub strict_decode: bool,
    /// 输出页面分辨率 (dpi)
    pub resolution_dpi: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            n_frame: 24,
            frame_limit: None,
            diff_threshold: 0.90,
            ssim_threshold: 0.90,
            include_first_frame: false,
            strict_decode: false,
            resolution_dpi: 100.0,
        }
    }
}

impl ExtractionConfig {
    /// 长录屏：稀疏采样
    pub fn for_long_recording() -> Self {
        Self {
            n_frame: 150,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SlidesResult<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> SlidesResult<()> {
        if self.n_frame < 1 || self.n_frame > MAX_STRIDE {
            return Err(SlidesError::invalid_input(format!(
                "n_frame must be in 1..={}, got {}",
                MAX_STRIDE, self.n_frame
            )));
        }
        check_unit_interval("diff_threshold", self.diff_threshold)?;
        check_unit_interval("ssim_threshold", self.ssim_threshold)?;
        if !(self.resolution_dpi.is_finite() && self.resolution_dpi > 0.0) {
            return Err(SlidesError::invalid_input(format!(
                "resolution_dpi must be positive, got {}",
                self.resolution_dpi
            )));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> SlidesResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SlidesError::invalid_input(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}

/// 校验输入视频路径：存在且扩展名受支持
pub fn validate_input_path(path: &Path) -> SlidesResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SlidesError::invalid_input(format!(
            "unsupported input {}; expected one of {:?}",
            path.display(),
            SUPPORTED_EXTENSIONS
        )));
    }
    if !path.is_file() {
        return Err(SlidesError::invalid_input(format!(
            "input {} does not exist",
            path.display()
        )));
    }
    Ok(())
}
