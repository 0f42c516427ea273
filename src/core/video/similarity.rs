//! 结构相似度 (SSIM) 终筛
//!
//! 与 scikit-image `structural_similarity` 默认参数一致：7x7 均匀窗口、
//! K1=0.01、K2=0.03、数据范围 255、样本协方差；边缘 3 像素不参与平均。
//! 多通道结果为各通道均值的平均。

use super::cancel::CancelFlag;
use super::diff_filter::CandidatePair;
use super::error::{SlidesError, SlidesResult};
use super::frame::{Frame, CHANNELS};
use super::progress::{ProgressSink, Stage, StageProgress};
use log::debug;

/// 窗口边长
pub const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// 窗口内的一阶、二阶累加量
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    x: u64,
    y: u64,
    xx: u64,
    yy: u64,
    xy: u64,
}

impl Moments {
    fn push(&mut self, a: u8, b: u8) {
        let (a, b) = (a as u64, b as u64);
        self.x += a;
        self.y += b;
        self.xx += a * a;
        self.yy += b * b;
        self.xy += a * b;
    }

    fn pop(&mut self, a: u8, b: u8) {
        let (a, b) = (a as u64, b as u64);
        self.x -= a;
        self.y -= b;
        self.xx -= a * a;
        self.yy -= b * b;
        self.xy -= a * b;
    }

    fn add(&mut self, other: &Moments) {
        self.x += other.x;
        self.y += other.y;
        self.xx += other.xx;
        self.yy += other.yy;
        self.xy += other.xy;
    }

    fn sub(&mut self, other: &Moments) {
        self.x -= other.x;
        self.y -= other.y;
        self.xx -= other.xx;
        self.yy -= other.yy;
        self.xy -= other.xy;
    }

    fn ssim(&self) -> f64 {
        let n = (WINDOW * WINDOW) as f64;
        let cov_norm = n / (n - 1.0);
        let c1 = (K1 * DATA_RANGE).powi(2);
        let c2 = (K2 * DATA_RANGE).powi(2);

        let ux = self.x as f64 / n;
        let uy = self.y as f64 / n;
        let uxx = self.xx as f64 / n;
        let uyy = self.yy as f64 / n;
        let uxy = self.xy as f64 / n;
        let vx = cov_norm * (uxx - ux * ux);
        let vy = cov_norm * (uyy - uy * uy);
        let vxy = cov_norm * (uxy - ux * uy);

        let a1 = 2.0 * ux * uy + c1;
        let a2 = 2.0 * vxy + c2;
        let b1 = ux * ux + uy * uy + c1;
        let b2 = vx + vy + c2;
        (a1 * a2) / (b1 * b2)
    }
}

/// 一行内所有水平窗口的累加量
fn row_windows(a: &[u8], b: &[u8], width: usize, row: usize, channel: usize, out: &mut [Moments]) {
    let base = row * width;
    let mut acc = Moments::default();
    for x in 0..width {
        let i = (base + x) * CHANNELS + channel;
        acc.push(a[i], b[i]);
        if x >= WINDOW {
            let j = (base + x - WINDOW) * CHANNELS + channel;
            acc.pop(a[j], b[j]);
        }
        if x + 1 >= WINDOW {
            out[x + 1 - WINDOW] = acc;
        }
    }
}

fn channel_ssim(a: &[u8], b: &[u8], width: usize, height: usize, channel: usize) -> f64 {
    let out_w = width - WINDOW + 1;
    let out_h = height - WINDOW + 1;
    let mut columns = vec![Moments::default(); out_w];
    let mut row = vec![Moments::default(); out_w];
    let mut sum = 0.0;

    // 按列滑动：加入新行，移出窗口外的旧行
    for y in 0..height {
        row_windows(a, b, width, y, channel, &mut row);
        columns.iter_mut().zip(&row).for_each(|(c, r)| c.add(r));
        if y >= WINDOW {
            row_windows(a, b, width, y - WINDOW, channel, &mut row);
            columns.iter_mut().zip(&row).for_each(|(c, r)| c.sub(r));
        }
        if y + 1 >= WINDOW {
            sum += columns.iter().map(Moments::ssim).sum::<f64>();
        }
    }

    sum / (out_w * out_h) as f64
}

/// 两帧的多通道平均 SSIM
pub fn structural_similarity(a: &Frame, b: &Frame) -> SlidesResult<f64> {
    a.ensure_same_shape(b)?;
    let (width, height) = (a.width() as usize, a.height() as usize);
    if width < WINDOW || height < WINDOW {
        return Err(SlidesError::FrameTooSmall {
            width: a.width(),
            height: a.height(),
            window: WINDOW as u32,
        });
    }

    let total: f64 = (0..CHANNELS)
        .map(|c| channel_ssim(a.data(), b.data(), width, height, c))
        .sum();
    Ok(total / CHANNELS as f64)
}

/// SSIM 终筛：分数低于阈值时保留较晚的一帧
pub struct SimilarityFilter {
    threshold: f64,
}

impl SimilarityFilter {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_distinct(&self, pair: &CandidatePair<'_>) -> SlidesResult<bool> {
        let score = structural_similarity(pair.prev, pair.cur)?;
        let keep = score < self.threshold;
        debug!(
            "ssim #{} -> #{}: score={:.4} keep={}",
            pair.prev.index, pair.cur.index, score, keep
        );
        Ok(keep)
    }

    pub fn filter<'a>(
        &self,
        pairs: &[CandidatePair<'a>],
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<Vec<&'a Frame>> {
        let total = pairs.len() as u64;
        let mut progress = StageProgress::start(sink, Stage::Similarity);
        let mut uniques = Vec::new();

        for (i, pair) in pairs.iter().enumerate() {
            cancel.check()?;
            if self.is_distinct(pair)? {
                uniques.push(pair.cur);
            }
            progress.update(i as u64 + 1, total);
        }

        progress.finish();
        Ok(uniques)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::progress::NullSink;

    fn uniform_frame(width: u32, height: u32, fill: u8, index: usize) -> Frame {
        let mut frame =
            Frame::new(width, height, vec![fill; (width * height * 3) as usize], 0).unwrap();
        frame.index = index;
        frame
    }

    fn noise_frame(width: u32, height: u32, seed: u64, index: usize) -> Frame {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let data = (0..width * height * 3)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect();
        let mut frame = Frame::new(width, height, data, 0).unwrap();
        frame.index = index;
        frame
    }

    /// 逐窗口直接计算的参考实现
    fn reference_ssim(a: &Frame, b: &Frame) -> f64 {
        let (w, h) = (a.width() as usize, a.height() as usize);
        let mut total = 0.0;
        for c in 0..CHANNELS {
            let mut sum = 0.0;
            for y0 in 0..=h - WINDOW {
                for x0 in 0..=w - WINDOW {
                    let mut m = Moments::default();
                    for y in y0..y0 + WINDOW {
                        for x in x0..x0 + WINDOW {
                            let i = (y * w + x) * CHANNELS + c;
                            m.push(a.data()[i], b.data()[i]);
                        }
                    }
                    sum += m.ssim();
                }
            }
            total += sum / ((h - WINDOW + 1) * (w - WINDOW + 1)) as f64;
        }
        total / CHANNELS as f64
    }

    #[test]
    fn test_identical_frames_score_one() {
        let a = noise_frame(20, 15, 3, 0);
        let score = structural_similarity(&a, &a.clone()).unwrap();
        assert_eq!(score, 1.0);

        let filter = SimilarityFilter::with_threshold(0.999);
        let pair = CandidatePair { prev: &a, cur: &a };
        assert!(!filter.is_distinct(&pair).unwrap());
    }

    #[test]
    fn test_uniform_frames_closed_form() {
        let a = uniform_frame(10, 10, 60, 0);
        let b = uniform_frame(10, 10, 120, 1);
        let c1 = (K1 * DATA_RANGE).powi(2);
        let expected = (2.0 * 60.0 * 120.0 + c1) / (60.0f64.powi(2) + 120.0f64.powi(2) + c1);

        let score = structural_similarity(&a, &b).unwrap();
        assert!((score - expected).abs() < 1e-12, "{} vs {}", score, expected);
    }

    #[test]
    fn test_sliding_windows_match_reference() {
        let a = noise_frame(13, 9, 1, 0);
        let b = noise_frame(13, 9, 2, 1);

        let fast = structural_similarity(&a, &b).unwrap();
        let slow = reference_ssim(&a, &b);
        assert!((fast - slow).abs() < 1e-9, "{} vs {}", fast, slow);
    }

    #[test]
    fn test_unrelated_noise_is_dissimilar() {
        let a = noise_frame(32, 24, 7, 0);
        let b = noise_frame(32, 24, 8, 1);
        assert!(structural_similarity(&a, &b).unwrap() < 0.2);
    }

    #[test]
    fn test_frame_too_small() {
        let a = uniform_frame(6, 40, 0, 0);
        assert!(matches!(
            structural_similarity(&a, &a),
            Err(SlidesError::FrameTooSmall { window: 7, .. })
        ));
    }

    #[test]
    fn test_mismatched_dimensions() {
        let a = uniform_frame(8, 8, 0, 0);
        let b = uniform_frame(9, 8, 0, 1);
        assert!(matches!(
            structural_similarity(&a, &b),
            Err(SlidesError::MismatchedDimensions { .. })
        ));
    }

    #[test]
    fn test_filter_keeps_later_frame_in_order() {
        let frames = vec![
            noise_frame(16, 16, 1, 0),
            noise_frame(16, 16, 2, 1),
            noise_frame(16, 16, 2, 2),
            noise_frame(16, 16, 3, 3),
        ];
        let pairs: Vec<CandidatePair> = frames
            .windows(2)
            .map(|w| CandidatePair {
                prev: &w[0],
                cur: &w[1],
            })
            .collect();

        let filter = SimilarityFilter::with_threshold(0.9);
        let uniques = filter.filter(&pairs, &NullSink, &CancelFlag::new()).unwrap();
        let indices: Vec<usize> = uniques.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
