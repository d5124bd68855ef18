//! # 降采样与压缩流水线
//!
//! ## 设计思路
//!
//! 在选图阶段就把分辨率与压缩质量收敛到固定上限，上传体积因此可预期。
//! 优先做尺寸检查，再进行完整解码，降低超大输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 白名单之外的格式原样放行（交给唯一的校验步骤拒绝）
//! 2. 读取 header 尺寸并按像素上限快速拒绝
//! 3. 计算目标尺寸：长边 / 短边分别受限，只缩不放
//! 4. 需要时完整解码并降采样（`fast_image_resize`，失败回退 `resize_exact`）
//! 5. JPEG 总是按质量重新编码；PNG / WebP 仅在降采样后重新编码

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;

use super::loader::RawImage;
use super::{AcquireError, AcquisitionConfig};

/// 流水线输出。
pub(super) struct PreparedImage {
    /// 重新编码后的字节；`None` 表示原样使用输入。
    pub(super) encoded: Option<Vec<u8>>,
    /// 输出内容对应的扩展名。
    pub(super) extension: &'static str,
    pub(super) width: Option<u32>,
    pub(super) height: Option<u32>,
}

/// 按长边 / 短边上限计算目标尺寸；无需缩小时返回 `None`。
pub(super) fn compute_target_dimensions(
    width: u32,
    height: u32,
    max_long_edge: u32,
    max_short_edge: u32,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let long_edge = width.max(height) as f64;
    let short_edge = width.min(height) as f64;
    let scale = (max_long_edge as f64 / long_edge)
        .min(max_short_edge as f64 / short_edge)
        .min(1.0);

    if scale >= 1.0 {
        return None;
    }

    let target_width = ((width as f64 * scale).floor() as u32).max(1);
    let target_height = ((height as f64 * scale).floor() as u32).max(1);
    Some((target_width, target_height))
}

pub(super) fn prepare_for_upload(
    raw: &RawImage,
    config: &AcquisitionConfig,
) -> Result<PreparedImage, AcquireError> {
    let format = match raw.detected_extension {
        "jpg" => ImageFormat::Jpeg,
        "png" => ImageFormat::Png,
        "webp" => ImageFormat::WebP,
        other => {
            log::debug!("⏭️ 格式 {} 不在重新编码范围内，原样放行", other);
            return Ok(PreparedImage {
                encoded: None,
                extension: other,
                width: None,
                height: None,
            });
        }
    };

    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;

    let target = compute_target_dimensions(
        header_width,
        header_height,
        config.max_long_edge,
        config.max_short_edge,
    );

    if target.is_none() && format != ImageFormat::Jpeg {
        return Ok(PreparedImage {
            encoded: None,
            extension: raw.detected_extension,
            width: Some(header_width),
            height: Some(header_height),
        });
    }

    let decoded = image::load_from_memory_with_format(&raw.bytes, format)
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("图片解码失败：{}", e)))?;

    let resized = match target {
        Some((target_width, target_height)) => {
            log::info!(
                "🧩 选图降采样：{}x{} -> {}x{}（filter={:?}）",
                header_width,
                header_height,
                target_width,
                target_height,
                config.resize_filter
            );
            downscale(decoded, target_width, target_height, config.resize_filter)
        }
        None => decoded,
    };

    let (width, height) = resized.dimensions();
    let encoded = encode(&resized, format, config.jpeg_quality)?;

    log::info!(
        "✅ 图片已压缩 - 原始: {}x{} {} bytes 输出: {}x{} {} bytes",
        header_width,
        header_height,
        raw.bytes.len(),
        width,
        height,
        encoded.len()
    );

    Ok(PreparedImage {
        encoded: Some(encoded),
        extension: raw.detected_extension,
        width: Some(width),
        height: Some(height),
    })
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), AcquireError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &AcquisitionConfig, width: u32, height: u32) -> Result<(), AcquireError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| AcquireError::InvalidFormatOrSize("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(AcquireError::InvalidFormatOrSize(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn downscale(image: DynamicImage, target_width: u32, target_height: u32, filter: FilterType) -> DynamicImage {
    match resize_with_fast_image_resize(&image, target_width, target_height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
            image.resize_exact(target_width, target_height, filter)
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, AcquireError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image = fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| AcquireError::InvalidFormatOrSize(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| AcquireError::InvalidFormatOrSize("fast_image_resize 输出缓冲长度异常".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

fn encode(image: &DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>, AcquireError> {
    let mut cursor = Cursor::new(Vec::new());

    let result = match format {
        ImageFormat::Jpeg => {
            // JPEG 不支持 alpha 通道
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, jpeg_quality.clamp(1, 100)))
        }
        ImageFormat::WebP => DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut cursor, ImageFormat::WebP),
        other => image.write_to(&mut cursor, other),
    };

    result.map_err(|e| AcquireError::InvalidFormatOrSize(format!("图片编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}
