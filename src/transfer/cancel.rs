//! # 取消令牌
//!
//! ## 实现思路
//!
//! `AtomicBool` 记录是否已取消，`Notify` 唤醒正在等待的驱动任务。
//! 驱动方 `select!` 等待 `cancelled()`，命中后直接丢弃进行中的请求 future，
//! 底层 HTTP 连接随之中止。

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use super::TransferError;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// 可克隆、可跨任务共享的取消令牌。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消；首次调用返回 `true`。
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// 等待直到令牌被取消。
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // 先注册等待再检查标志，避免错过 notify_waiters
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// 运行 `future`，取消时提前返回 `Cancelled` 并丢弃该 future。
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, TransferError> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(TransferError::Cancelled),
            output = future => Ok(output),
        }
    }
}
