//! # 传输错误分类
//!
//! ## 设计思路
//!
//! 每一类失败对应一条独立的用户提示，原始 `reqwest::Error` 不越过传输边界。
//! 超时按所处阶段归类（连接 / 发送 / 接收），而不是笼统的“超时”。

use super::TransferPhase;

/// 分类后的传输错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("无法连接到服务器，请检查网络或服务地址")]
    Unreachable,

    #[error("连接服务器超时，请稍后重试")]
    ConnectTimeout,

    #[error("上传图片超时，请检查网络后重试")]
    SendTimeout,

    #[error("等待服务器响应超时，请稍后重试")]
    ReceiveTimeout,

    #[error("服务器错误（{status}）：{message}")]
    BadResponse { status: u16, message: String },

    #[error("请求已取消")]
    Cancelled,

    #[error("网络连接错误：{0}")]
    ConnectionError(String),

    #[error("未知错误：{0}")]
    Unknown(String),
}

impl TransferError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable => "E_UNREACHABLE",
            Self::ConnectTimeout => "E_CONNECT_TIMEOUT",
            Self::SendTimeout => "E_SEND_TIMEOUT",
            Self::ReceiveTimeout => "E_RECEIVE_TIMEOUT",
            Self::BadResponse { .. } => "E_BAD_RESPONSE",
            Self::Cancelled => "E_CANCELLED",
            Self::ConnectionError(_) => "E_CONNECTION",
            Self::Unknown(_) => "E_UNKNOWN",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout | Self::SendTimeout | Self::ReceiveTimeout)
    }
}

/// 统一映射 reqwest 错误；`phase` 为出错时所处的传输阶段。
pub(super) fn classify_reqwest_error(error: reqwest::Error, phase: TransferPhase) -> TransferError {
    if error.is_timeout() {
        if error.is_connect() {
            return TransferError::ConnectTimeout;
        }
        return phase.timeout_error();
    }

    if let Some(status) = error.status() {
        return TransferError::BadResponse {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("请求失败").to_string(),
        };
    }

    let is_connect = error.is_connect();
    let is_transport = error.is_request() || error.is_body();
    let is_decode = error.is_decode();
    let message = error.without_url().to_string();

    if is_connect {
        TransferError::ConnectionError(format!("无法连接：{}", message))
    } else if is_decode {
        TransferError::Unknown(format!("响应解析失败：{}", message))
    } else if is_transport {
        TransferError::ConnectionError(format!("请求失败：{}", message))
    } else {
        TransferError::Unknown(message)
    }
}
