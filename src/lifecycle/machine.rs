//! # 状态机实现
//!
//! ## 实现思路
//!
//! 一次尝试（`run_attempt`）按顺序经过以下挂起点，每个挂起点都与取消令牌竞争：
//!
//! 1. 健康检查（不可达则直接进入 `error`，不会发出上传请求）
//! 2. multipart 上传；收到 2xx 状态行时进度固定为 1.0 并进入 `processing`
//! 3. 可选：结果缺少诗歌时调用生成接口补齐
//! 4. 展示延迟（可为 0）
//!
//! 结束时先关闭进度门，再投递唯一的终态回调。
//! 取消令牌在结束时从共享状态中摘除，此后 `LifecycleHandle::cancel` 不再影响本次尝试。

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{LifecycleObserver, NoopObserver, UploadSnapshot, UploadState};
use crate::acquisition::{ImageHandle, ImageValidator};
use crate::error::AppError;
use crate::model::{PoetryLanguage, PoetryRequest, PoetryStyle, UploadResult};
use crate::storage::cleanup_scratch_files;
use crate::store::{DEFAULT_RESULT_CAPACITY, ResultStore};
use crate::transfer::{CancelToken, ProgressFn, ProgressGate, TransferError, UploadTransport};

/// 状态机配置。
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// 进入 `completed` 之前的展示延迟（毫秒），可为 0。
    pub completion_delay_ms: u64,
    /// 最近结果保留条数。
    pub result_capacity: usize,
    /// 上传成功但结果中没有诗歌时，是否主动请求生成。
    pub request_poetry_if_missing: bool,
    pub poetry_style: PoetryStyle,
    pub poetry_language: PoetryLanguage,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: 2_000,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            request_poetry_if_missing: false,
            poetry_style: PoetryStyle::default(),
            poetry_language: PoetryLanguage::default(),
        }
    }
}

impl LifecycleConfig {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

struct Shared {
    snapshot: Mutex<UploadSnapshot>,
    active_cancel: Mutex<Option<CancelToken>>,
    observer: Arc<dyn LifecycleObserver>,
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{}锁中毒，继续使用恢复数据", what);
            poisoned.into_inner()
        }
    }
}

impl Shared {
    fn snapshot(&self) -> UploadSnapshot {
        lock_or_recover(&self.snapshot, "状态快照").clone()
    }

    fn transition(&self, state: UploadState, progress: Option<f64>, message: Option<String>) {
        let snapshot = {
            let mut current = lock_or_recover(&self.snapshot, "状态快照");
            current.state = state;
            if let Some(progress) = progress {
                current.progress = progress;
            }
            current.message = message;
            current.clone()
        };
        self.observer.on_state_changed(&snapshot);
    }

    /// 传输进度只在 `uploading` 期间写入快照。
    fn transfer_progress(&self, fraction: f64) {
        {
            let mut current = lock_or_recover(&self.snapshot, "状态快照");
            if current.state != UploadState::Uploading {
                return;
            }
            current.progress = fraction;
        }
        self.observer.on_progress(fraction);
    }

    /// `uploading → processing`，每次尝试最多一次。
    fn enter_processing(&self) {
        let snapshot = {
            let mut current = lock_or_recover(&self.snapshot, "状态快照");
            if current.state != UploadState::Uploading {
                return;
            }
            current.state = UploadState::Processing;
            current.progress = 1.0;
            current.message = None;
            current.clone()
        };
        self.observer.on_state_changed(&snapshot);
    }

    fn begin_attempt(&self, token: CancelToken) {
        *lock_or_recover(&self.active_cancel, "取消令牌") = Some(token);
    }

    /// 摘除令牌并返回本次尝试最终是否被取消。
    fn finish_attempt(&self, token: &CancelToken) -> bool {
        lock_or_recover(&self.active_cancel, "取消令牌").take();
        token.is_cancelled()
    }
}

/// 可跨任务共享的控制句柄（信号处理、界面等）。
#[derive(Clone)]
pub struct LifecycleHandle {
    shared: Arc<Shared>,
}

impl LifecycleHandle {
    /// 取消进行中的尝试；没有进行中的尝试时返回 `false`。
    pub fn cancel(&self) -> bool {
        let guard = lock_or_recover(&self.shared.active_cancel, "取消令牌");
        match guard.as_ref() {
            Some(token) => token.cancel(),
            None => false,
        }
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.shared.snapshot()
    }

    pub fn state(&self) -> UploadState {
        self.snapshot().state
    }
}

#[derive(Debug)]
struct StageTimings {
    started_at: Instant,
    last_mark: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimings {
    fn start() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            last_mark: now,
            stages: Vec::new(),
        }
    }

    fn mark(&mut self, stage: &'static str) {
        let now = Instant::now();
        self.stages.push((stage, now.duration_since(self.last_mark)));
        self.last_mark = now;
    }

    fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .stages
            .iter()
            .map(|(stage, elapsed)| format!("{}: {}ms", stage, elapsed.as_millis()))
            .collect();
        parts.push(format!("total: {}ms", self.started_at.elapsed().as_millis()));
        parts.join(" ")
    }
}

/// 上传生命周期状态机。
pub struct UploadLifecycle<T> {
    transport: T,
    validator: ImageValidator,
    config: LifecycleConfig,
    shared: Arc<Shared>,
    current: Option<ImageHandle>,
    results: ResultStore,
    scratch_dir: Option<PathBuf>,
}

impl<T: UploadTransport> UploadLifecycle<T> {
    pub fn new(transport: T, validator: ImageValidator, config: LifecycleConfig) -> Self {
        Self::with_observer(transport, validator, config, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        transport: T,
        validator: ImageValidator,
        config: LifecycleConfig,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        let results = ResultStore::with_capacity(config.result_capacity);
        Self {
            transport,
            validator,
            config,
            shared: Arc::new(Shared {
                snapshot: Mutex::new(UploadSnapshot::default()),
                active_cancel: Mutex::new(None),
                observer,
            }),
            current: None,
            results,
            scratch_dir: None,
        }
    }

    /// 完成或放弃一次尝试后清理该目录下的临时副本。
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.shared.snapshot()
    }

    pub fn state(&self) -> UploadState {
        self.snapshot().state
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// 当前保留的图片句柄（`error` 状态下供重试使用）。
    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 提交图片并开始一次新的尝试。
    ///
    /// 校验失败时直接返回 `AppError::Acquire`，状态不变。
    pub async fn submit(&mut self, image: ImageHandle) -> Result<UploadResult, AppError> {
        self.validator.validate(&image).await?;
        self.current = Some(image);
        self.run_attempt().await
    }

    /// 从 `error` 状态使用同一句柄重试，不重新选图与校验。
    pub async fn retry(&mut self) -> Result<UploadResult, AppError> {
        let state = self.state();
        if state != UploadState::Error {
            return Err(AppError::InvalidState(format!(
                "只有 error 状态可以重试（当前: {}）",
                state.as_str()
            )));
        }
        if self.current.is_none() {
            return Err(AppError::InvalidState("没有可重试的图片".to_string()));
        }

        log::info!("🔁 使用同一图片重试");
        self.run_attempt().await
    }

    /// 放弃当前结果 / 错误并回到 `idle`。
    ///
    /// 已经投递过终态回调的尝试不会再触发 `on_cancel`。
    pub fn dismiss(&mut self) {
        let state = self.state();
        if state.is_in_flight() {
            self.handle().cancel();
            return;
        }
        if state == UploadState::Idle && self.current.is_none() {
            return;
        }

        self.current = None;
        self.shared.transition(UploadState::Idle, Some(0.0), None);
        self.cleanup_scratch();
    }

    async fn run_attempt(&mut self) -> Result<UploadResult, AppError> {
        let image = self
            .current
            .clone()
            .ok_or_else(|| AppError::InvalidState("没有待上传的图片".to_string()))?;

        let cancel = CancelToken::new();
        self.shared.begin_attempt(cancel.clone());
        self.shared.transition(UploadState::Uploading, Some(0.0), None);

        let gate = {
            let shared = Arc::clone(&self.shared);
            Arc::new(ProgressGate::new(cancel.clone(), move |fraction| {
                shared.transfer_progress(fraction)
            }))
        };

        let mut timings = StageTimings::start();
        let outcome = self.execute(&image, &gate, &cancel, &mut timings).await;

        gate.close();
        let cancelled = self.shared.finish_attempt(&cancel);

        match outcome {
            _ if cancelled => {
                self.shared.transition(UploadState::Idle, Some(0.0), None);
                self.shared.observer.on_cancel();
                self.current = None;
                self.cleanup_scratch();
                log::info!("🛑 尝试已放弃 - {}", timings.summary());
                Err(AppError::Transfer(TransferError::Cancelled))
            }
            Ok(result) => {
                self.results.insert(result.clone());
                self.shared
                    .transition(UploadState::Completed, Some(1.0), Some(result.message.clone()));
                self.shared.observer.on_success(&result);
                self.cleanup_scratch();
                log::info!("⏱️ 上传阶段耗时 - {}", timings.summary());
                Ok(result)
            }
            Err(err) => {
                let message = err.to_string();
                self.shared.transition(UploadState::Error, None, Some(message.clone()));
                self.shared.observer.on_error(&message);
                log::debug!("⏱️ 失败前阶段耗时 - {}", timings.summary());
                Err(AppError::Transfer(err))
            }
        }
    }

    async fn execute(
        &self,
        image: &ImageHandle,
        gate: &Arc<ProgressGate>,
        cancel: &CancelToken,
        timings: &mut StageTimings,
    ) -> Result<UploadResult, TransferError> {
        cancel.run(self.transport.check_health(cancel)).await??;
        timings.mark("health");

        let on_progress: ProgressFn = {
            let gate = Arc::clone(gate);
            Arc::new(move |sent, total| {
                gate.report_bytes(sent, total);
            })
        };
        let on_accepted = {
            let gate = Arc::clone(gate);
            let shared = Arc::clone(&self.shared);
            let cancel = cancel.clone();
            move || {
                if cancel.is_cancelled() {
                    return;
                }
                gate.report(1.0);
                shared.enter_processing();
            }
        };

        let mut result = cancel
            .run(self.transport.upload(image, on_progress, on_accepted, cancel))
            .await??;
        // 传输实现未回调 on_accepted 时在这里补上状态迁移
        if !cancel.is_cancelled() {
            gate.report(1.0);
            self.shared.enter_processing();
        }
        timings.mark("upload");

        if self.config.request_poetry_if_missing && !result.has_poetry() {
            if let Some(image_id) = result.image_id.clone() {
                let request = PoetryRequest {
                    image_id,
                    style: self.config.poetry_style,
                    language: self.config.poetry_language,
                };
                let generated = cancel
                    .run(self.transport.generate_poetry(&request, cancel))
                    .await??;
                result = generated.merge_missing_from(&result);
                timings.mark("generate");
            }
        }

        let delay = self.config.completion_delay();
        if !delay.is_zero() {
            cancel.run(tokio::time::sleep(delay)).await?;
            timings.mark("delay");
        }

        Ok(result)
    }

    fn cleanup_scratch(&self) {
        if let Some(dir) = &self.scratch_dir {
            cleanup_scratch_files(dir);
        }
    }
}
