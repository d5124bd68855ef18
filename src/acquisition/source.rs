//! # 数据源与句柄
//!
//! ## 设计思路
//!
//! 将“平台选图结果”和“下游消费的句柄”解耦：
//! - `PickedImage` 表示平台选图器交出的原始结果（路径 / 字节 / Base64）
//! - `ImageHandle` 在选图阶段一次性确定，下游组件只按这一个和类型处理，
//!   调用点不再按平台分支

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::AcquireError;

/// 选图来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSource {
    Camera,
    Gallery,
}

impl PickSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Gallery => "gallery",
        }
    }
}

/// 平台选图器交出的结果。
#[derive(Debug, Clone)]
pub enum PickedImage {
    /// 本地文件路径（移动端相册 / 相机临时文件）。
    Path(PathBuf),
    /// 内存中的字节（Web 平台的 Blob）。
    Bytes { bytes: Vec<u8>, name: String },
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64 { data: String, name: String },
}

/// 平台选图接口。
///
/// 用户取消选择时返回 `Ok(None)`，由选图流程统一转为 `NoSelection`。
pub trait ImagePicker: Send + Sync {
    fn pick(
        &self,
        source: PickSource,
    ) -> impl Future<Output = Result<Option<PickedImage>, AcquireError>> + Send;
}

/// 与平台无关的图片句柄。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageHandle {
    LocalFile(PathBuf),
    InMemoryBlob { bytes: Bytes, name: String },
}

impl ImageHandle {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::LocalFile(path.into())
    }

    pub fn in_memory(bytes: impl Into<Bytes>, name: impl Into<String>) -> Self {
        Self::InMemoryBlob {
            bytes: bytes.into(),
            name: name.into(),
        }
    }

    /// 上传时保留的文件名。
    pub fn file_name(&self) -> String {
        match self {
            Self::LocalFile(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string()),
            Self::InMemoryBlob { name, .. } => name.clone(),
        }
    }

    /// 小写扩展名。
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name())
    }

    /// 按扩展名推断 MIME 类型。
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }

    /// 本地文件路径（仅 `LocalFile`）。
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::LocalFile(path) => Some(path),
            Self::InMemoryBlob { .. } => None,
        }
    }

    /// 字节大小；本地文件读取 metadata。
    pub async fn size(&self) -> std::io::Result<u64> {
        match self {
            Self::LocalFile(path) => Ok(tokio::fs::metadata(path).await?.len()),
            Self::InMemoryBlob { bytes, .. } => Ok(bytes.len() as u64),
        }
    }

    /// 读取全部字节；内存句柄为零拷贝克隆。
    pub async fn read_bytes(&self) -> std::io::Result<Bytes> {
        match self {
            Self::LocalFile(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            Self::InMemoryBlob { bytes, .. } => Ok(bytes.clone()),
        }
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
