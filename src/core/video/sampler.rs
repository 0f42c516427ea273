use super::cancel::CancelFlag;
use super::error::{SlidesError, SlidesResult, VideoError};
use super::frame::Frame;
use super::progress::{ProgressSink, Stage, StageProgress};
use super::source::VideoSource;
use log::{debug, warn};
use serde::Serialize;

/// 采样结束原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum StreamEnd {
    EndOfStream,
    /// 解码失败，按流结束处理
    DecodeFailed(String),
    LimitReached,
}

/// 按时间顺序排列的采样帧
#[derive(Debug)]
pub struct SampledSequence {
    pub frames: Vec<Frame>,
    pub end: StreamEnd,
}

/// 固定步长抽帧
pub struct FrameSampler {
    stride: u64,
    limit: Option<u64>,
    strict_decode: bool,
}

impl FrameSampler {
    pub fn new(stride: u64, limit: Option<u64>) -> SlidesResult<Self> {
        if stride < 1 {
            return Err(SlidesError::invalid_input("sampling stride must be at least 1"));
        }
        Ok(Self {
            stride,
            limit,
            strict_decode: false,
        })
    }

    pub fn with_strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    /// 读取第 0 帧，之后每次前进 stride 帧，直到读取失败或超过 limit。
    /// 源在返回前释放。
    pub fn sample<S: VideoSource>(
        &self,
        mut source: S,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<SampledSequence> {
        let total = source.info().frame_count.unwrap_or(0);
        let mut progress = StageProgress::start(sink, Stage::Sampling);
        let mut frames: Vec<Frame> = Vec::new();
        let mut position = source.position();

        let end = loop {
            cancel.check()?;

            let mut frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StreamEnd::EndOfStream,
                Err(e) => break self.absorb(e)?,
            };
            frame.index = frames.len();
            debug!("sampled frame #{} at position {}", frame.index, frame.position);
            frames.push(frame);

            position += self.stride;
            progress.update(position, total);

            if self.limit.is_some_and(|limit| position > limit) {
                break StreamEnd::LimitReached;
            }
            if let Err(e) = source.seek(position) {
                break self.absorb(e)?;
            }
        };

        drop(source);
        progress.finish();
        Ok(SampledSequence { frames, end })
    }

    fn absorb(&self, error: VideoError) -> SlidesResult<StreamEnd> {
        if self.strict_decode {
            return Err(error.into());
        }
        warn!("⚠️ decode failure treated as end of stream: {}", error);
        Ok(StreamEnd::DecodeFailed(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::progress::{NullSink, PipelineEvent};
    use crate::core::video::source::MemorySource;
    use std::cell::RefCell;

    fn create_source(count: u64) -> MemorySource {
        let frames = (0..count)
            .map(|i| Frame::new(4, 4, vec![(i % 256) as u8; 4 * 4 * 3], i).unwrap())
            .collect();
        MemorySource::new(frames, 25.0)
    }

    fn positions(sequence: &SampledSequence) -> Vec<u64> {
        sequence.frames.iter().map(|f| f.position).collect()
    }

    #[test]
    fn test_rejects_zero_stride() {
        assert!(matches!(
            FrameSampler::new(0, None),
            Err(SlidesError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sampled_count_is_ceil() {
        for (total, stride) in [(100u64, 10u64), (95, 10), (7, 3), (5, 1), (3, 24)] {
            let sampler = FrameSampler::new(stride, None).unwrap();
            let sequence = sampler
                .sample(create_source(total), &NullSink, &CancelFlag::new())
                .unwrap();
            assert_eq!(
                sequence.frames.len() as u64,
                total.div_ceil(stride),
                "total {} stride {}",
                total,
                stride
            );
            assert_eq!(sequence.end, StreamEnd::EndOfStream);
        }
    }

    #[test]
    fn test_positions_and_indices() {
        let sampler = FrameSampler::new(10, None).unwrap();
        let sequence = sampler
            .sample(create_source(35), &NullSink, &CancelFlag::new())
            .unwrap();

        assert_eq!(positions(&sequence), vec![0, 10, 20, 30]);
        let indices: Vec<usize> = sequence.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_limit_stops_after_position_exceeds() {
        let sampler = FrameSampler::new(10, Some(25)).unwrap();
        let sequence = sampler
            .sample(create_source(100), &NullSink, &CancelFlag::new())
            .unwrap();

        assert_eq!(positions(&sequence), vec![0, 10, 20]);
        assert_eq!(sequence.end, StreamEnd::LimitReached);
    }

    #[test]
    fn test_decode_failure_is_absorbed() {
        let source = create_source(50).with_decode_failure_at(20);
        let sampler = FrameSampler::new(10, None).unwrap();
        let sequence = sampler
            .sample(source, &NullSink, &CancelFlag::new())
            .unwrap();

        assert_eq!(positions(&sequence), vec![0, 10]);
        assert!(matches!(sequence.end, StreamEnd::DecodeFailed(_)));
    }

    #[test]
    fn test_strict_decode_propagates() {
        let source = create_source(50).with_decode_failure_at(20);
        let sampler = FrameSampler::new(10, None)
            .unwrap()
            .with_strict_decode(true);

        assert!(matches!(
            sampler.sample(source, &NullSink, &CancelFlag::new()),
            Err(SlidesError::Decode(_))
        ));
    }

    #[test]
    fn test_cancelled_before_read() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let sampler = FrameSampler::new(1, None).unwrap();

        assert!(matches!(
            sampler.sample(create_source(10), &NullSink, &cancel),
            Err(SlidesError::Cancelled)
        ));
    }

    #[test]
    fn test_progress_ends_at_100() {
        let events = RefCell::new(Vec::new());
        let sink = |e: PipelineEvent| events.borrow_mut().push(e);
        let sampler = FrameSampler::new(10, Some(25)).unwrap();
        sampler
            .sample(create_source(100), &sink, &CancelFlag::new())
            .unwrap();

        let percents: Vec<u8> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress {
                    stage: Stage::Sampling,
                    percent,
                } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 10, 20, 30, 100]);
    }
}
