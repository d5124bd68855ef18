//! # 生命周期观察者
//!
//! 所有方法都有空默认实现，按需覆盖。

use std::sync::Mutex;

use super::UploadSnapshot;
use crate::model::UploadResult;

const LOG_PROGRESS_PERCENT_STEP: u8 = 5;

pub trait LifecycleObserver: Send + Sync {
    fn on_state_changed(&self, _snapshot: &UploadSnapshot) {}

    fn on_progress(&self, _fraction: f64) {}

    fn on_success(&self, _result: &UploadResult) {}

    fn on_error(&self, _message: &str) {}

    fn on_cancel(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {}

/// 把生命周期事件写入日志；进度按 5% 步长节流。
#[derive(Debug, Default)]
pub struct LoggingObserver {
    last_percent: Mutex<Option<u8>>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn should_log_progress(last_percent: Option<u8>, percent: u8) -> bool {
    match last_percent {
        None => true,
        Some(last) => percent == 100 || percent.saturating_sub(last) >= LOG_PROGRESS_PERCENT_STEP,
    }
}

impl LifecycleObserver for LoggingObserver {
    fn on_state_changed(&self, snapshot: &UploadSnapshot) {
        if snapshot.state.is_in_flight() && snapshot.progress == 0.0 {
            if let Ok(mut last) = self.last_percent.lock() {
                *last = None;
            }
        }
        log::info!("🔄 状态: {}", snapshot.state.as_str());
    }

    fn on_progress(&self, fraction: f64) {
        let percent = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;
        let mut last = match self.last_percent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("进度日志节流状态锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };

        if *last == Some(percent) || !should_log_progress(*last, percent) {
            return;
        }
        *last = Some(percent);
        log::info!("📶 上传进度: {}%", percent);
    }

    fn on_success(&self, result: &UploadResult) {
        log::info!(
            "🎉 生成完成 - 标题: {}",
            result.title.as_deref().unwrap_or("<无标题>")
        );
    }

    fn on_error(&self, message: &str) {
        log::error!("❌ 上传失败: {}", message);
    }

    fn on_cancel(&self) {
        log::info!("🛑 上传已取消");
    }
}
