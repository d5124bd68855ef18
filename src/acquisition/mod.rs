//! # 选图模块（acquisition）
//!
//! ## 设计思路
//!
//! 将“平台选图 → 加载字节 → 签名识别 → 降采样 / 压缩 → 生成句柄 → 上传前校验”
//! 按职责拆分为多个子模块，下游只消费 `ImageHandle` 这一和平台无关的类型。
//!
//! - `source`：`PickSource` / `PickedImage` / `ImageHandle` 与平台选图接口 `ImagePicker`
//! - `loader`：路径 / 字节 / Base64 的加载与签名识别
//! - `pipeline`：解码、像素上限、降采样、按质量重新编码
//! - `validator`：唯一的上传前校验（扩展名白名单 + 体积上限）
//! - `acquirer`：编排整条选图流程并写入临时副本
//! - `config/error`：配置与错误
//!
//! ## 调用链
//!
//! ```text
//! ImageAcquirer::acquire(PickSource)
//!    ├─ ImagePicker::pick（平台实现，None => NoSelection）
//!    ├─ loader.rs（加载字节 + 签名识别）
//!    ├─ pipeline.rs（降采样 + 压缩）
//!    └─ storage::write_scratch_copy（仅路径来源且内容被重新编码时）
//!    ↓
//! ImageHandle  ──→  ImageValidator::validate（在任何网络请求之前）
//! ```

mod acquirer;
mod config;
mod error;
mod loader;
mod pipeline;
mod source;
mod validator;

pub use acquirer::ImageAcquirer;
pub use config::{AcquisitionConfig, DEFAULT_MAX_FILE_SIZE, SUPPORTED_EXTENSIONS};
pub use error::AcquireError;
pub use source::{ImageHandle, ImagePicker, PickSource, PickedImage};
pub use validator::{ImageValidator, check_format_and_size};
