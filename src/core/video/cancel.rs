use super::error::{SlidesError, SlidesResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 协作式取消标志，可在线程间克隆共享
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 已取消时返回 Cancelled
    pub fn check(&self) -> SlidesResult<()> {
        if self.is_cancelled() {
            Err(SlidesError::Cancelled)
        } else {
            Ok(())
        }
    }
}
