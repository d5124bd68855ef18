//! # 选图配置
//!
//! ## 设计思路
//!
//! 把“可调策略”集中到 `AcquisitionConfig`：分辨率上限与压缩质量在选图时就生效，
//! 保证上传体积可预期，而不是依赖服务端拒绝。

use std::path::PathBuf;

use image::imageops::FilterType;

use crate::storage::default_scratch_dir;

/// 允许上传的扩展名（小写）。
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// 上传体积上限：10 MiB。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 选图阶段配置。
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// 上传前允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 选图原始文件允许的最大体积（降采样前，字节）。
    pub max_source_size: u64,
    /// 长边上限（像素）。
    pub max_long_edge: u32,
    /// 短边上限（像素）。
    pub max_short_edge: u32,
    /// JPEG 重新编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 解码前按文件头尺寸拒绝的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 降采样滤镜。
    pub resize_filter: FilterType,
    /// 临时副本目录。
    pub scratch_dir: PathBuf,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_source_size: 64 * 1024 * 1024,
            max_long_edge: 1920,
            max_short_edge: 1080,
            jpeg_quality: 85,
            max_decoded_pixels: 40_000_000,
            resize_filter: FilterType::Triangle,
            scratch_dir: default_scratch_dir(),
        }
    }
}
