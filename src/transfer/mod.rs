//! # 传输模块（transfer）
//!
//! ## 设计思路
//!
//! 把“打包 → 流式发送 → 进度 → 超时分类 → 取消”收敛到一个客户端，
//! 上层只看到分类后的 `TransferError`，不会接触原始传输异常。
//!
//! - `config`：服务地址与三类超时
//! - `error`：错误分类与 `reqwest` 错误映射
//! - `cancel`：可跨任务共享的取消令牌
//! - `progress`：进度比例计算与单调门控
//! - `timeouts`：连接 / 发送 / 接收分阶段超时驱动
//! - `body`：带进度回调的分块 multipart 请求体
//! - `client`：`HttpTransferClient`（健康检查、上传、生成诗歌、历史列表）
//! - `transport`：状态机依赖的 `UploadTransport` 抽象
//!
//! ## 调用链
//!
//! ```text
//! UploadTransport::check_health  ──→ GET /health（失败 => Unreachable）
//! UploadTransport::upload
//!    ├─ body.rs（分块流 + 进度 + 阶段推进）
//!    ├─ timeouts.rs（按阶段计时，select 取消令牌）
//!    └─ client.rs（状态码 / JSON 解析 => UploadResult 或 BadResponse）
//! ```

mod body;
mod cancel;
mod client;
mod config;
mod error;
mod progress;
mod timeouts;
mod transport;

pub use cancel::CancelToken;
pub use client::{GENERATE_POETRY_PATH, HEALTH_PATH, HttpTransferClient, UPLOAD_IMAGE_PATH, UPLOADS_PATH};
pub use config::{DEFAULT_SERVER_URL, TransferConfig};
pub use error::TransferError;
pub use progress::{ProgressFn, ProgressGate, progress_fraction};
pub use timeouts::{PhaseTimeouts, TransferPhase};
pub use transport::UploadTransport;
