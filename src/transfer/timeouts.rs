//! # 分阶段超时
//!
//! ## 设计思路
//!
//! 一次上传依次经历三个阶段，每个阶段独立计时、独立归类：
//!
//! ```text
//! Connecting ──(请求体首块被传输层拉取)──→ Sending ──(末块被拉取)──→ Receiving ──→ 完成
//!   connect_timeout                       send_timeout               receive_timeout
//! ```
//!
//! 阶段只前进不后退；请求体流通过 `PhaseSignals::advance` 推进阶段，
//! 驱动方收到通知后重置截止时间。

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::{CancelToken, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferPhase {
    Connecting = 0,
    Sending = 1,
    Receiving = 2,
}

impl TransferPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Sending,
            _ => Self::Receiving,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
        }
    }

    /// 在该阶段超时对应的错误分类。
    pub fn timeout_error(self) -> TransferError {
        match self {
            Self::Connecting => TransferError::ConnectTimeout,
            Self::Sending => TransferError::SendTimeout,
            Self::Receiving => TransferError::ReceiveTimeout,
        }
    }
}

/// 三类超时。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub connect: Duration,
    pub send: Duration,
    pub receive: Duration,
}

impl PhaseTimeouts {
    pub fn for_phase(&self, phase: TransferPhase) -> Duration {
        match phase {
            TransferPhase::Connecting => self.connect,
            TransferPhase::Sending => self.send,
            TransferPhase::Receiving => self.receive,
        }
    }
}

/// 请求体流与驱动方之间共享的阶段信号。
#[derive(Debug)]
pub(super) struct PhaseSignals {
    phase: AtomicU8,
    changed: Notify,
}

impl PhaseSignals {
    pub(super) fn new() -> Self {
        Self::starting_at(TransferPhase::Connecting)
    }

    pub(super) fn starting_at(phase: TransferPhase) -> Self {
        Self {
            phase: AtomicU8::new(phase as u8),
            changed: Notify::new(),
        }
    }

    pub(super) fn current(&self) -> TransferPhase {
        TransferPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// 推进到 `phase`；不会回退。
    pub(super) fn advance(&self, phase: TransferPhase) {
        let previous = self.phase.fetch_max(phase as u8, Ordering::SeqCst);
        if (phase as u8) > previous {
            // notify_one 会保留许可，驱动方稍后轮询也不会漏掉
            self.changed.notify_one();
        }
    }
}

/// 驱动请求 future，按当前阶段计时，并响应取消。
pub(super) async fn drive_with_phase_timeouts<F, T>(
    request: F,
    signals: &PhaseSignals,
    timeouts: PhaseTimeouts,
    cancel: &CancelToken,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    tokio::pin!(request);

    let mut phase = signals.current();
    let deadline = tokio::time::sleep(timeouts.for_phase(phase));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("🛑 传输已取消（阶段: {}）", phase.as_str());
                return Err(TransferError::Cancelled);
            }
            result = &mut request => return result,
            _ = signals.changed.notified() => {
                let next = signals.current();
                if next != phase {
                    log::debug!("⏱️ 传输阶段: {} -> {}", phase.as_str(), next.as_str());
                    phase = next;
                    deadline.as_mut().reset(Instant::now() + timeouts.for_phase(phase));
                }
            }
            _ = &mut deadline => {
                log::warn!(
                    "⏰ 传输超时（阶段: {}，限制: {}ms）",
                    phase.as_str(),
                    timeouts.for_phase(phase).as_millis()
                );
                return Err(phase.timeout_error());
            }
        }
    }
}
