//! # 图片诗人 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    命令行 (main.rs, clap)                 │
//! │        upload · generate · list · health · cleanup · info │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                库 (image_poet)                    │
//! │                                                          │
//! │  ┌─ acquisition ── 选图 · 签名识别 · 降采样 · 校验        │
//! │  │       ↓ ImageHandle                                   │
//! │  ├─ lifecycle ──── idle → uploading → processing →       │
//! │  │       ↓            completed / error（重试 / 取消）    │
//! │  ├─ transfer ───── 健康检查 · multipart 上传 · 分阶段超时 │
//! │  │       ↓ UploadResult                                  │
//! │  ├─ store ──────── 最近 N 条结果（新的在前）              │
//! │  │                                                       │
//! │  ├─ model          线上 JSON 形状                         │
//! │  ├─ settings       JSON 文件 + 环境变量                   │
//! │  ├─ storage        临时副本目录                           │
//! │  └─ error ──────── AppError (统一错误类型)                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，所有公开操作的返回类型 |
//! | [`model`] | `UploadResult` 与诗歌请求的序列化 |
//! | [`store`] | 有界的最近结果列表 |
//! | [`storage`] | 临时副本的命名、写入、清理与统计 |
//! | [`settings`] | 设置加载、环境变量覆盖、范围校验 |
//! | [`acquisition`] | 从平台选图结果生成与平台无关的 `ImageHandle` |
//! | [`transfer`] | HTTP 传输、进度、取消与错误分类 |
//! | [`lifecycle`] | 上传生命周期状态机 |

pub mod error;
pub mod model;
pub mod store;
pub mod storage;
pub mod settings;
pub mod acquisition;
pub mod transfer;
pub mod lifecycle;
