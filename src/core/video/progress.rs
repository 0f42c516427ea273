//! 进度事件与进度接收端

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Sender, SyncSender, TrySendError};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Sampling,
    Diff,
    Similarity,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Sampling => "Sampling",
            Stage::Diff => "Diff",
            Stage::Similarity => "Similarity",
        }
    }
}

/// 推送给调用方的事件；一次运行以 Done 或 Failed 结束
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { stage: Stage, percent: u8 },
    Done { pages: usize },
    Failed { reason: String },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Done { .. } | PipelineEvent::Failed { .. })
    }

    /// 阶段的 100 或运行结束事件，接收端不能丢
    pub fn is_milestone(&self) -> bool {
        self.is_terminal() || matches!(self, PipelineEvent::Progress { percent: 100, .. })
    }
}

/// 进度接收端。实现应尽快返回，只在里程碑事件上允许等待。
pub trait ProgressSink {
    fn emit(&self, event: PipelineEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(PipelineEvent),
{
    fn emit(&self, event: PipelineEvent) {
        self(event)
    }
}

impl ProgressSink for Sender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        // 接收端已关闭时丢弃
        let _ = self.send(event);
    }
}

/// 有界通道：中间进度在通道满时丢弃，里程碑事件阻塞等待接收端
impl ProgressSink for SyncSender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        if event.is_milestone() {
            let _ = self.send(event);
            return;
        }
        match self.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                log::trace!("progress channel full, dropping {:?}", event);
            }
        }
    }
}

/// 不关心进度时使用
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// 单个阶段的进度跟踪：百分比严格递增，以 100 结束
pub(crate) struct StageProgress<'a> {
    sink: &'a dyn ProgressSink,
    stage: Stage,
    last: Option<u8>,
}

impl<'a> StageProgress<'a> {
    pub(crate) fn start(sink: &'a dyn ProgressSink, stage: Stage) -> Self {
        let mut progress = Self {
            sink,
            stage,
            last: None,
        };
        progress.report(0);
        progress
    }

    pub(crate) fn update(&mut self, done: u64, total: u64) {
        self.report(to_percent(done, total));
    }

    pub(crate) fn finish(mut self) {
        self.report(100);
    }

    fn report(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.sink.emit(PipelineEvent::Progress {
            stage: self.stage,
            percent,
        });
    }
}

/// done / total 换算为 [0, 100]；总数未知时为 0
pub fn to_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}
