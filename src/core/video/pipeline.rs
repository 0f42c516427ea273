use super::cancel::CancelFlag;
use super::config::ExtractionConfig;
use super::diff_filter::PixelDiffFilter;
use super::error::SlidesResult;
use super::frame::{Frame, FrameInfo};
use super::progress::{PipelineEvent, ProgressSink};
use super::sampler::{FrameSampler, StreamEnd};
use super::similarity::SimilarityFilter;
use super::source::{VideoInfo, VideoSource};
use crate::core::document::DocumentExporter;
use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 一次运行的统计
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub video: VideoInfo,
    pub stream_end: StreamEnd,
    pub sampled_frames: usize,
    pub candidate_pairs: usize,
    pub unique_frames: usize,
    pub pages: Vec<FrameInfo>,
    pub output: Option<PathBuf>,
}

/// 去重后的帧及统计
#[derive(Debug)]
pub struct ExtractionResult {
    pub frames: Vec<Frame>,
    pub report: ConversionReport,
}

/// 依次执行 采样 → 像素差 → SSIM → 导出，不做任何过滤判断
pub struct PipelineOrchestrator {
    config: ExtractionConfig,
}

impl PipelineOrchestrator {
    pub fn new(config: ExtractionConfig) -> SlidesResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract<S: VideoSource>(
        &self,
        source: S,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<ExtractionResult> {
        let video = source.info().clone();
        let sampler = FrameSampler::new(self.config.n_frame, self.config.frame_limit)?
            .with_strict_decode(self.config.strict_decode);

        info!("Reading frames every {} ...", self.config.n_frame);
        let sampled = sampler.sample(source, sink, cancel)?;
        info!("Read {} frames ({:?}).", sampled.frames.len(), sampled.end);
        cancel.check()?;

        info!("Calculating differences ...");
        let diff_filter = PixelDiffFilter::with_threshold(self.config.diff_threshold);
        let pairs = diff_filter.filter(&sampled.frames, sink, cancel)?;
        info!("Found {} pairs with differences.", pairs.len());
        cancel.check()?;

        info!("Applying structural similarity ...");
        let similarity = SimilarityFilter::with_threshold(self.config.ssim_threshold);
        let uniques = similarity.filter(&pairs, sink, cancel)?;
        info!("Found {} uniques with SSIM.", uniques.len());

        let mut keep: Vec<usize> = uniques.iter().map(|f| f.index).collect();
        let candidate_pairs = pairs.len();
        let unique_frames = keep.len();
        if self.config.include_first_frame && !sampled.frames.is_empty() {
            keep.insert(0, 0);
        }

        let sampled_frames = sampled.frames.len();
        let frames: Vec<Frame> = sampled
            .frames
            .into_iter()
            .filter(|f| keep.binary_search(&f.index).is_ok())
            .collect();

        let report = ConversionReport {
            video,
            stream_end: sampled.end,
            sampled_frames,
            candidate_pairs,
            unique_frames,
            pages: frames.iter().map(FrameInfo::from_frame).collect(),
            output: None,
        };
        Ok(ExtractionResult { frames, report })
    }

    /// 完整运行并导出；结束时推送 Done 或 Failed
    pub fn run<S: VideoSource>(
        &self,
        source: S,
        output: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<ConversionReport> {
        let result = self.run_stages(source, output, sink, cancel);
        match &result {
            Ok(report) => sink.emit(PipelineEvent::Done {
                pages: report.pages.len(),
            }),
            Err(e) => {
                error!("❌ conversion failed: {}", e);
                sink.emit(PipelineEvent::Failed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    fn run_stages<S: VideoSource>(
        &self,
        source: S,
        output: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<ConversionReport> {
        let ExtractionResult { frames, mut report } = self.extract(source, sink, cancel)?;
        cancel.check()?;

        info!("Exporting ...");
        DocumentExporter::new(self.config.resolution_dpi).export(&frames, output)?;
        report.output = Some(output.to_path_buf());
        info!("✅ Done.");
        Ok(report)
    }
}
