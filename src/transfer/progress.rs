//! # 进度计算与门控
//!
//! ## 设计思路
//!
//! - 比例只在总量已知且大于 0 时计算，结果夹在 `[0, 1]`。
//! - `ProgressGate` 负责对外投递：只允许非递减的值通过，
//!   关闭或取消之后不再投递任何进度。

use std::sync::{Arc, Mutex};

use super::CancelToken;

/// 传输层进度回调：`(已发送字节, 总字节)`。
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// 计算进度比例；总量未知或为 0 时返回 `None`。
pub fn progress_fraction(sent: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|total| *total > 0)?;
    Some((sent as f64 / total as f64).clamp(0.0, 1.0))
}

#[derive(Debug)]
struct GateState {
    last: f64,
    emitted: bool,
    closed: bool,
}

/// 单次尝试的进度出口。
pub struct ProgressGate {
    state: Mutex<GateState>,
    sink: Box<dyn Fn(f64) + Send + Sync>,
    cancel: CancelToken,
}

impl ProgressGate {
    pub fn new(cancel: CancelToken, sink: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(GateState {
                last: 0.0,
                emitted: false,
                closed: false,
            }),
            sink: Box::new(sink),
            cancel,
        }
    }

    /// 投递一个比例值，返回是否实际投递。
    ///
    /// 持锁调用 sink，保证并发上报时的投递顺序与数值顺序一致。
    pub fn report(&self, fraction: f64) -> bool {
        if !fraction.is_finite() {
            return false;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.closed || self.cancel.is_cancelled() {
            return false;
        }
        if state.emitted && fraction <= state.last {
            return false;
        }

        state.last = fraction;
        state.emitted = true;
        (self.sink)(fraction);
        true
    }

    /// 按字节数投递；总量未知或为 0 时不投递。
    pub fn report_bytes(&self, sent: u64, total: Option<u64>) -> bool {
        match progress_fraction(sent, total) {
            Some(fraction) => self.report(fraction),
            None => false,
        }
    }

    /// 关闭后不再投递任何进度。
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
    }

    /// 最近一次投递的比例。
    pub fn last(&self) -> f64 {
        self.state.lock().map(|state| state.last).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_gate(cancel: CancelToken) -> (ProgressGate, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let gate = ProgressGate::new(cancel, move |value| {
            sink.lock().expect("lock progress sink failed").push(value);
        });
        (gate, seen)
    }

    #[test]
    fn fraction_requires_known_positive_total() {
        assert_eq!(progress_fraction(10, None), None);
        assert_eq!(progress_fraction(10, Some(0)), None);
        assert_eq!(progress_fraction(5, Some(10)), Some(0.5));
        assert_eq!(progress_fraction(20, Some(10)), Some(1.0));
    }

    #[test]
    fn gate_drops_regressions_and_duplicates() {
        let (gate, seen) = collecting_gate(CancelToken::new());

        assert!(gate.report_bytes(2, Some(10)));
        assert!(!gate.report_bytes(1, Some(10)));
        assert!(!gate.report_bytes(2, Some(10)));
        assert!(!gate.report_bytes(3, None));
        assert!(gate.report_bytes(10, Some(10)));

        assert_eq!(*seen.lock().expect("lock failed"), vec![0.2, 1.0]);
        assert_eq!(gate.last(), 1.0);
    }

    #[test]
    fn gate_is_silent_after_close_or_cancel() {
        let cancel = CancelToken::new();
        let (gate, seen) = collecting_gate(cancel.clone());

        assert!(gate.report(0.1));
        cancel.cancel();
        assert!(!gate.report(0.5));

        let (closed_gate, closed_seen) = collecting_gate(CancelToken::new());
        closed_gate.close();
        assert!(!closed_gate.report(0.5));

        assert_eq!(seen.lock().expect("lock failed").len(), 1);
        assert!(closed_seen.lock().expect("lock failed").is_empty());
    }
}
