//! # 上传前校验
//!
//! 唯一的校验步骤：扩展名必须在白名单内，体积不超过上限。
//! 两项检查都在任何网络请求之前执行，任一失败直接短路。

use super::config::SUPPORTED_EXTENSIONS;
use super::source::extension_of;
use super::{AcquireError, ImageHandle};

/// 纯函数核心：按文件名与字节数校验，与平台无关。
pub fn check_format_and_size(name: &str, size: u64, max_file_size: u64) -> Result<(), AcquireError> {
    let extension = extension_of(name).unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "不支持的图片格式：{}（可选：jpg / jpeg / png / webp）",
            if extension.is_empty() { "<无扩展名>" } else { extension.as_str() }
        )));
    }

    if size > max_file_size {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "图片过大：{:.2} MB（限制：{:.2} MB）",
            size as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 句柄校验器。
#[derive(Debug, Clone, Copy)]
pub struct ImageValidator {
    max_file_size: u64,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_FILE_SIZE)
    }
}

impl ImageValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// 校验句柄，失败时给出面向用户的原因。
    pub async fn validate(&self, handle: &ImageHandle) -> Result<(), AcquireError> {
        let name = handle.file_name();
        let size = handle.size().await.map_err(|e| {
            AcquireError::InvalidFormatOrSize(format!("无法读取图片信息：{}", e))
        })?;

        let result = check_format_and_size(&name, size, self.max_file_size);
        if let Err(err) = &result {
            log::warn!("🚫 图片校验未通过 - {}: {}", name, err);
        }
        result
    }

    pub async fn is_valid(&self, handle: &ImageHandle) -> bool {
        self.validate(handle).await.is_ok()
    }
}
