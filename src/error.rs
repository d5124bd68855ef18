//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，作为跨模块公开操作（选图、上传、配置、
//! 临时目录）的唯一返回错误类型，调用方只需匹配一个枚举。
//!
//! 选图阶段的 `AcquireError` 与传输阶段的 `TransferError` 各自保留完整分类，
//! 在这里通过 `#[from]` 上转，不丢失分支信息。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `AcquireError` / `TransferError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于命令行 `--json` 输出。

use serde::Serialize;

use crate::acquisition::AcquireError;
use crate::transfer::TransferError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 选图 / 校验阶段失败（不会进入上传状态机）
    #[error("{0}")]
    Acquire(#[from] AcquireError),

    /// 传输阶段的分类错误
    #[error("{0}")]
    Transfer(#[from] TransferError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 临时目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 配置无效
    #[error("配置错误: {0}")]
    Config(String),

    /// 当前状态不允许该操作（例如非 error 状态下重试）
    #[error("状态错误: {0}")]
    InvalidState(String),
}

impl AppError {
    /// 若为传输错误，返回其分类。
    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            Self::Transfer(err) => Some(err),
            _ => None,
        }
    }

    /// 稳定错误码，便于脚本侧按分支处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Acquire(err) => err.code(),
            Self::Transfer(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Storage(_) => "E_STORAGE",
            Self::Config(_) => "E_CONFIG",
            Self::InvalidState(_) => "E_INVALID_STATE",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_errors_keep_their_classification() {
        let err: AppError = TransferError::SendTimeout.into();

        assert_eq!(err.code(), "E_SEND_TIMEOUT");
        assert_eq!(err.as_transfer(), Some(&TransferError::SendTimeout));
        assert_eq!(err.to_string(), TransferError::SendTimeout.to_string());
    }

    #[test]
    fn app_error_serializes_to_message_string() {
        let err = AppError::Config("server_url 不能为空".to_string());
        let json = serde_json::to_string(&err).expect("serialize app error failed");

        assert_eq!(json, "\"配置错误: server_url 不能为空\"");
    }
}
