//! 录屏转 PDF 的对外接口
//!
//! ```no_run
//! use slide_deck::api::video::SlideExtractor;
//! use slide_deck::{CancelFlag, ExtractionConfig, NullSink};
//! use std::path::Path;
//!
//! let extractor = SlideExtractor::create(ExtractionConfig::default())?;
//! let report = extractor.convert(Path::new("talk.mp4"), None, &NullSink, &CancelFlag::new())?;
//! println!("{} pages", report.pages.len());
//! # Ok::<(), slide_deck::SlidesError>(())
//! ```

use crate::core::video::{
    validate_input_path, CancelFlag, ConversionReport, ExtractionConfig, FfmpegSource,
    PipelineEvent, PipelineOrchestrator, ProgressSink, SlidesError, SlidesResult,
};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

/// 默认输出路径：输入文件扩展名换成 .pdf
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// 幻灯片提取器 - 采样 + 双阈值去重 + PDF 导出
pub struct SlideExtractor {
    orchestrator: PipelineOrchestrator,
}

impl SlideExtractor {
    /// 校验配置后创建
    pub fn create(config: ExtractionConfig) -> SlidesResult<Self> {
        crate::init_logging(false);
        let orchestrator = PipelineOrchestrator::new(config)?;
        info!("🎬 SlideExtractor: created");
        Ok(Self { orchestrator })
    }

    pub fn config(&self) -> &ExtractionConfig {
        self.orchestrator.config()
    }

    /// 在当前线程同步转换
    pub fn convert(
        &self,
        input: &Path,
        output: Option<&Path>,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> SlidesResult<ConversionReport> {
        validate_input_path(input)?;
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));

        info!("Reading file {} ...", input.display());
        let source = match FfmpegSource::open(input) {
            Ok(source) => source,
            Err(e) => {
                let e = SlidesError::from(e);
                sink.emit(PipelineEvent::Failed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        self.orchestrator.run(source, &output, sink, cancel)
    }

    /// 在独立工作线程中转换，通过通道接收事件。
    /// 输入校验在返回前同步完成。
    pub fn spawn(self, input: PathBuf, output: Option<PathBuf>) -> SlidesResult<ConversionHandle> {
        validate_input_path(&input)?;

        let (tx, rx) = mpsc::channel();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let join = thread::Builder::new()
            .name("slide-deck-worker".into())
            .spawn(move || self.convert(&input, output.as_deref(), &tx, &worker_cancel))?;

        Ok(ConversionHandle {
            events: rx,
            cancel,
            join,
        })
    }
}

impl Drop for SlideExtractor {
    fn drop(&mut self) {
        info!("🗑️ SlideExtractor: released");
    }
}

/// 后台转换句柄
pub struct ConversionHandle {
    events: Receiver<PipelineEvent>,
    cancel: CancelFlag,
    join: JoinHandle<SlidesResult<ConversionReport>>,
}

impl ConversionHandle {
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// 请求在下一次读帧或阶段切换时停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn join(self) -> SlidesResult<ConversionReport> {
        self.join.join().map_err(|_| SlidesError::WorkerPanicked)?
    }
}
