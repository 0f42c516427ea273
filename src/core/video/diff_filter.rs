use super::cancel::CancelFlag;
use super::error::SlidesResult;
use super::frame::Frame;
use super::progress::{ProgressSink, Stage, StageProgress};
use log::debug;

/// 差值小于该值的元素视为相等（8 位采样上即完全相等）
pub const EQUALITY_EPSILON: f32 = 0.01;

/// 采样序列中相邻的两帧
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub prev: &'a Frame,
    pub cur: &'a Frame,
}

/// 像素差预筛：丢弃几乎完全相同的相邻帧
pub struct PixelDiffFilter {
    threshold: f64,
}

impl PixelDiffFilter {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 相等元素所占比例
    pub fn equal_fraction(prev: &Frame, cur: &Frame) -> SlidesResult<f64> {
        prev.ensure_same_shape(cur)?;

        let equal = prev
            .data()
            .iter()
            .zip(cur.data())
            .filter(|&(&a, &b)| (a as f32 - b as f32).abs() < EQUALITY_EPSILON)
            .count();
        Ok(equal as f64 / prev.data().len() as f64)
    }

    /// equal_fraction < threshold 时成为候选对
    pub fn is_candidate(&self, prev: &Frame, cur: &Frame) -> SlidesResult<bool> {
        let equal_fraction = Self::equal_fraction(prev, cur)?;
        let keep = equal_fraction < self.threshold;
        debug!(
            "diff #{} -> #{}: equal_fraction={:.4} keep={}",
            prev.index, cur.index, equal_fraction, keep
        );
        Ok(keep)
    }

    pub fn filter<'a>(
        &self,
        frames: &'a [Frame],
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<Vec<CandidatePair<'a>>> {
        let total = frames.len().saturating_sub(1) as u64;
        let mut progress = StageProgress::start(sink, Stage::Diff);
        let mut pairs = Vec::new();

        for (i, window) in frames.windows(2).enumerate() {
            cancel.check()?;
            let (prev, cur) = (&window[0], &window[1]);
            if self.is_candidate(prev, cur)? {
                pairs.push(CandidatePair { prev, cur });
            }
            progress.update(i as u64 + 1, total);
        }

        progress.finish();
        Ok(pairs)
    }
}
