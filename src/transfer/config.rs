//! # 传输配置
//!
//! 三类超时互相独立，默认均为 30 秒；健康检查单独使用更短的超时。

use std::time::Duration;

use super::PhaseTimeouts;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// 传输客户端配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// 服务端根地址（可带路径前缀）。
    pub base_url: String,
    /// 建立连接超时（毫秒）。
    pub connect_timeout_ms: u64,
    /// 请求体发送超时（毫秒）。
    pub send_timeout_ms: u64,
    /// 等待并读取响应超时（毫秒）。
    pub receive_timeout_ms: u64,
    /// 健康检查整体超时（毫秒）。
    pub health_timeout_ms: u64,
    /// 请求体分块大小（字节），决定进度回调粒度。
    pub upload_chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_ms: 30_000,
            send_timeout_ms: 30_000,
            receive_timeout_ms: 30_000,
            health_timeout_ms: 5_000,
            upload_chunk_size: 64 * 1024,
        }
    }
}

impl TransferConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn phase_timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            send: Duration::from_millis(self.send_timeout_ms),
            receive: Duration::from_millis(self.receive_timeout_ms),
        }
    }
}
