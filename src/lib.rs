pub mod api;
pub mod core;

pub use crate::core::document::DocumentExporter;
pub use crate::core::video::{
    CancelFlag, ConversionReport, ExtractionConfig, Frame, NullSink, PipelineEvent,
    PipelineOrchestrator, ProgressSink, SlidesError, SlidesResult, Stage, VideoSource,
};

/// RUST_LOG 未设置时的默认级别
fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// 初始化日志；重复调用无副作用
pub fn init_logging(verbose: bool) {
    let default_level = default_log_level(verbose);
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}
