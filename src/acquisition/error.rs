//! # 选图错误
//!
//! 选图与校验失败都在选图边界处理，不会进入上传状态机。

/// 选图阶段错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("未选择图片")]
    NoSelection,

    #[error("图片格式或大小不符合要求：{0}")]
    InvalidFormatOrSize(String),

    #[error("临时文件错误：{0}")]
    Storage(String),
}

impl AcquireError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSelection => "E_NO_SELECTION",
            Self::InvalidFormatOrSize(_) => "E_INVALID_IMAGE",
            Self::Storage(_) => "E_SCRATCH",
        }
    }
}
