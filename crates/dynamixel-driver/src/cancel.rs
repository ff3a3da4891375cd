//! 协作式取消令牌

use crate::error::DriverError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 取消令牌
///
/// 克隆共享同一个标志。总线在排队等锁和等待应答的每个轮询片之间检查它；
/// 取消后正在进行的调用以 [`DriverError::Cancelled`] 尽快返回。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// 已取消时返回 `Err(DriverError::Cancelled)`
    pub fn check(&self) -> Result<(), DriverError> {
        if self.is_cancelled() {
            Err(DriverError::Cancelled)
        } else {
            Ok(())
        }
    }
}
