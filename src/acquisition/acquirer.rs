//! # 选图流程编排
//!
//! ## 实现思路
//!
//! 1. 调用平台选图器，`None` 统一转为 `NoSelection`
//! 2. 加载字节并按签名识别真实类型
//! 3. 降采样 / 压缩
//! 4. 产出句柄：
//!    - 路径来源且内容被重新编码：写入临时副本，返回副本路径
//!    - 路径来源且内容未改变：直接引用原文件
//!    - 字节 / Base64 来源：返回内存句柄
//!
//! 选图流程不做上传前校验，校验由 `ImageValidator` 在提交时唯一执行一次。

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;

use super::loader::{RawImage, load_picked};
use super::pipeline::{PreparedImage, prepare_for_upload};
use super::{AcquireError, AcquisitionConfig, ImageHandle, ImagePicker, ImageValidator, PickSource};
use crate::storage::{cleanup_scratch_files, write_scratch_copy};

pub struct ImageAcquirer<P> {
    picker: P,
    config: AcquisitionConfig,
}

impl<P: ImagePicker> ImageAcquirer<P> {
    pub fn new(picker: P, config: AcquisitionConfig) -> Self {
        Self { picker, config }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// 与当前配置体积上限一致的校验器。
    pub fn validator(&self) -> ImageValidator {
        ImageValidator::new(self.config.max_file_size)
    }

    /// 从指定来源选图并生成可上传的句柄。
    pub async fn acquire(&self, source: PickSource) -> Result<ImageHandle, AcquireError> {
        let started_at = Instant::now();

        let picked = self
            .picker
            .pick(source)
            .await?
            .ok_or(AcquireError::NoSelection)?;

        let raw = load_picked(picked, &self.config).await?;
        let prepared = prepare_for_upload(&raw, &self.config)?;
        let handle = self.build_handle(raw, prepared)?;

        log::info!(
            "🖼️ 选图完成 - 来源: {} 文件: {} 耗时: {}ms",
            source.as_str(),
            handle.file_name(),
            started_at.elapsed().as_millis()
        );
        Ok(handle)
    }

    /// 清理临时副本目录，返回删除数量。
    pub fn cleanup_scratch(&self) -> usize {
        cleanup_scratch_files(&self.config.scratch_dir)
    }

    fn build_handle(&self, raw: RawImage, prepared: PreparedImage) -> Result<ImageHandle, AcquireError> {
        match (raw.origin, prepared.encoded) {
            (Some(_), Some(encoded)) => {
                let path = write_scratch_copy(&self.config.scratch_dir, prepared.extension, &encoded)
                    .map_err(|e| AcquireError::Storage(e.to_string()))?;
                Ok(ImageHandle::LocalFile(path))
            }
            (Some(origin), None) => Ok(ImageHandle::LocalFile(origin)),
            (None, Some(encoded)) => Ok(ImageHandle::InMemoryBlob {
                bytes: Bytes::from(encoded),
                name: rename_extension(&raw.name, prepared.extension),
            }),
            (None, None) => Ok(ImageHandle::InMemoryBlob {
                bytes: Bytes::from(raw.bytes),
                name: raw.name,
            }),
        }
    }
}

/// 重新编码后的内存句柄沿用原文件名主体，扩展名跟随实际格式。
fn rename_extension(name: &str, extension: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.{}", stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::PickedImage;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::path::PathBuf;

    struct FakePicker(Option<PickedImage>);

    impl ImagePicker for FakePicker {
        async fn pick(&self, _source: PickSource) -> Result<Option<PickedImage>, AcquireError> {
            Ok(self.0.clone())
        }
    }

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 251) as u8, (y % 251) as u8, 90]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, format)
            .expect("encode test image failed");
        cursor.into_inner()
    }

    fn config_in(dir: &Path) -> AcquisitionConfig {
        AcquisitionConfig {
            scratch_dir: dir.join("scratch"),
            ..AcquisitionConfig::default()
        }
    }

    #[tokio::test]
    async fn cancelled_pick_is_no_selection() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let acquirer = ImageAcquirer::new(FakePicker(None), config_in(dir.path()));

        let result = acquirer.acquire(PickSource::Camera).await;

        assert_eq!(result, Err(AcquireError::NoSelection));
    }

    #[tokio::test]
    async fn small_png_path_is_referenced_directly() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("small.png");
        std::fs::write(&path, encoded(32, 32, ImageFormat::Png)).expect("write image failed");

        let acquirer = ImageAcquirer::new(FakePicker(Some(PickedImage::Path(path.clone()))), config_in(dir.path()));
        let handle = acquirer.acquire(PickSource::Gallery).await.expect("acquire failed");

        assert_eq!(handle, ImageHandle::LocalFile(path));
    }

    #[tokio::test]
    async fn jpeg_path_is_recompressed_into_scratch_copy() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, encoded(2000, 1500, ImageFormat::Jpeg)).expect("write image failed");

        let config = config_in(dir.path());
        let scratch_dir: PathBuf = config.scratch_dir.clone();
        let acquirer = ImageAcquirer::new(FakePicker(Some(PickedImage::Path(path.clone()))), config);
        let handle = acquirer.acquire(PickSource::Gallery).await.expect("acquire failed");

        let copy = handle.path().expect("should be a local file").to_path_buf();
        assert!(copy.starts_with(&scratch_dir));
        assert_eq!(handle.extension().as_deref(), Some("jpg"));

        let bytes = std::fs::read(&copy).expect("read scratch copy failed");
        let decoded = image::load_from_memory(&bytes).expect("decode scratch copy failed");
        assert_eq!((decoded.width(), decoded.height()), (1440, 1080));

        assert!(acquirer.validator().is_valid(&handle).await);
        assert_eq!(acquirer.cleanup_scratch(), 1);
        assert!(!copy.exists());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn in_memory_jpeg_keeps_name_stem() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let picked = PickedImage::Bytes {
            bytes: encoded(40, 30, ImageFormat::Jpeg),
            name: "capture.jpeg".to_string(),
        };
        let acquirer = ImageAcquirer::new(FakePicker(Some(picked)), config_in(dir.path()));

        let handle = acquirer.acquire(PickSource::Camera).await.expect("acquire failed");

        assert!(handle.path().is_none());
        assert_eq!(handle.file_name(), "capture.jpg");
        assert_eq!(handle.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn non_image_bytes_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let picked = PickedImage::Bytes {
            bytes: b"plain text, not pixels".to_vec(),
            name: "notes.png".to_string(),
        };
        let acquirer = ImageAcquirer::new(FakePicker(Some(picked)), config_in(dir.path()));

        let result = acquirer.acquire(PickSource::Gallery).await;

        assert!(matches!(result, Err(AcquireError::InvalidFormatOrSize(_))));
    }

    #[test]
    fn rename_extension_falls_back_to_image() {
        assert_eq!(rename_extension("a.jpeg", "jpg"), "a.jpg");
        assert_eq!(rename_extension("", "png"), "image.png");
    }
}
