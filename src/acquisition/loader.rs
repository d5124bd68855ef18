//! # 加载与签名识别
//!
//! ## 设计思路
//!
//! 统一处理不同选图结果（路径 / 字节 / Base64）的原始字节加载，
//! 并在解码之前用文件签名（magic bytes）识别真实类型，尽早拒绝非图片内容。
//!
//! ## 实现思路
//!
//! - 路径：存在性 + metadata 体积上限 + 读取。
//! - Base64：Data URL / 纯 Base64 解析，解码前按长度估算体积上限。
//! - 字节：直接进入签名识别。

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};

use super::{AcquireError, AcquisitionConfig, PickedImage};

/// 加载阶段输出：原始字节、文件名与来源路径。
pub(super) struct RawImage {
    pub(super) bytes: Vec<u8>,
    pub(super) name: String,
    /// 来源为本地文件时的原始路径。
    pub(super) origin: Option<PathBuf>,
    /// 签名识别出的扩展名（如 `jpg` / `png`）。
    pub(super) detected_extension: &'static str,
}

pub(super) async fn load_picked(
    picked: PickedImage,
    config: &AcquisitionConfig,
) -> Result<RawImage, AcquireError> {
    let (bytes, name, origin) = match picked {
        PickedImage::Path(path) => {
            let bytes = load_from_file(&path, config.max_source_size).await?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string());
            (bytes, name, Some(path))
        }
        PickedImage::Bytes { bytes, name } => {
            ensure_within_limit(bytes.len() as u64, config.max_source_size)?;
            (bytes, name, None)
        }
        PickedImage::Base64 { data, name } => {
            let bytes = parse_base64_with_limit(&data, config.max_source_size)?;
            (bytes, name, None)
        }
    };

    let detected_extension = detect_image_extension(&bytes)?;
    Ok(RawImage {
        bytes,
        name,
        origin,
        detected_extension,
    })
}

async fn load_from_file(path: &Path, max_source_size: u64) -> Result<Vec<u8>, AcquireError> {
    log::info!("📁 读取本地图片 - 路径: {}", path.display());

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        AcquireError::InvalidFormatOrSize(format!("无法读取文件信息：{}", e))
    })?;
    ensure_within_limit(metadata.len(), max_source_size)?;

    tokio::fs::read(path)
        .await
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("无法读取图片文件：{}", e)))
}

fn ensure_within_limit(size: u64, max_source_size: u64) -> Result<(), AcquireError> {
    if size > max_source_size {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "原始图片过大：{:.2} MB（限制：{:.2} MB）",
            size as f64 / 1024.0 / 1024.0,
            max_source_size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, AcquireError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| AcquireError::InvalidFormatOrSize("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| AcquireError::InvalidFormatOrSize("Base64 解码体积估算溢出".to_string()))
}

/// 解析 Base64 输入（支持 Data URL / 纯 Base64），解码前先按长度估算体积。
pub(super) fn parse_base64_with_limit(data: &str, max_size: u64) -> Result<Vec<u8>, AcquireError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:image/") {
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| AcquireError::InvalidFormatOrSize("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_size {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("Base64 解码失败：{}", e)))
}

/// 通过文件签名识别图片类型，返回对应扩展名。
pub(super) fn detect_image_extension(bytes: &[u8]) -> Result<&'static str, AcquireError> {
    if bytes.is_empty() {
        return Err(AcquireError::InvalidFormatOrSize("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| AcquireError::InvalidFormatOrSize("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(kind.extension())
}
