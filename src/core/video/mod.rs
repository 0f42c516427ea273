//! 幻灯片抽取流水线：固定步长采样 → 像素差预筛 → SSIM 终筛

pub mod cancel;
pub mod config;
pub mod diff_filter;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod pipeline;
pub mod progress;
pub mod sampler;
pub mod similarity;
pub mod source;

pub use cancel::CancelFlag;
pub use config::{validate_input_path, ExtractionConfig, MAX_STRIDE, SUPPORTED_EXTENSIONS};
pub use diff_filter::{CandidatePair, PixelDiffFilter};
pub use error::{SlidesError, SlidesResult, VideoError};
pub use ffmpeg::{probe_video, FfmpegSource};
pub use frame::{Frame, FrameInfo, FrameShape};
pub use pipeline::{ConversionReport, ExtractionResult, PipelineOrchestrator};
pub use progress::{NullSink, PipelineEvent, ProgressSink, Stage};
pub use sampler::{FrameSampler, SampledSequence, StreamEnd};
pub use similarity::{structural_similarity, SimilarityFilter};
pub use source::{MemorySource, VideoInfo, VideoSource};
