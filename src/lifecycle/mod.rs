//! # 上传生命周期（lifecycle）
//!
//! ## 设计思路
//!
//! 状态机拥有一次“上传并生成”尝试的全部状态：
//!
//! ```text
//!            submit(valid)               2xx 状态行                 解析成功 + 展示延迟
//!   idle ───────────────→ uploading ───────────────→ processing ─────────────────────→ completed
//!    ↑                        │                           │
//!    │ cancel                 └──────── 分类错误 ─────────→ error ──retry（同一句柄）──→ uploading
//!    └──────────────────────────────────────────────────────┘
//! ```
//!
//! - 无效句柄在进入状态机之前被拒绝，状态保持不变
//! - `on_success` / `on_error` / `on_cancel` 每次尝试至多触发一个
//! - 所有进度回调都早于终态回调投递
//!
//! 主要结果通过 `submit` / `retry` 的返回值交付，观察者只是附加通知渠道。

mod machine;
mod observer;
mod state;

pub use machine::{LifecycleConfig, LifecycleHandle, UploadLifecycle};
pub use observer::{LifecycleObserver, LoggingObserver, NoopObserver};
pub use state::{UploadSnapshot, UploadState};
