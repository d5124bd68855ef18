use serde::Serialize;

/// 生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// 单次尝试的终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }
}

/// 对外可见的状态快照。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSnapshot {
    pub state: UploadState,
    /// 上传进度，`[0, 1]`。
    pub progress: f64,
    /// `error` 时为分类后的提示，`completed` 时为服务端消息。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for UploadSnapshot {
    fn default() -> Self {
        Self {
            state: UploadState::Idle,
            progress: 0.0,
            message: None,
        }
    }
}
