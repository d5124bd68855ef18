//! 临时目录（scratch）管理模块
//!
//! # 设计思路
//!
//! 选图阶段降采样 / 重新编码后的副本写入临时目录，按固定命名约定区分，
//! 上传完成或放弃后再统一清理，避免临时文件无限堆积。
//!
//! # 实现思路
//!
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 文件名 `poet_scratch_<时间戳>_<序号>.<扩展名>`，清理时只删除匹配约定的文件。
//! - 清理是尽力而为：单个文件删除失败只记录 warn 日志，不向上返回。
//! - 其他可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

pub const SCRATCH_FILE_PREFIX: &str = "poet_scratch_";

static SCRATCH_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^poet_scratch_\d{14,}_\d+\.(?:jpe?g|png|webp)$")
        .expect("scratch file pattern must compile")
});

static SCRATCH_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 临时目录信息
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 默认临时目录：系统临时目录下的 `image-poet`。
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("image-poet")
}

/// 确保临时目录存在并返回其路径。
///
/// # 返回
/// - `Ok(PathBuf)` — 可用的临时目录
/// - `Err(AppError::Storage)` — 无法创建目录
pub fn ensure_scratch_dir(dir: &Path) -> Result<PathBuf, AppError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Storage(format!("创建临时目录 '{}' 失败: {}", dir.display(), e))
        })?;
    }
    Ok(dir.to_path_buf())
}

/// 文件名是否符合临时副本命名约定。
pub fn is_scratch_file_name(name: &str) -> bool {
    SCRATCH_FILE_PATTERN.is_match(name)
}

/// 生成新的临时副本文件名。
pub fn scratch_file_name(extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
    let sequence = SCRATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}{}_{}.{}",
        SCRATCH_FILE_PREFIX,
        timestamp,
        sequence,
        extension.to_ascii_lowercase()
    )
}

/// 将字节写入临时目录，返回副本路径。
pub fn write_scratch_copy(dir: &Path, extension: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    let dir = ensure_scratch_dir(dir)?;
    let file_path = dir.join(scratch_file_name(extension));
    fs::write(&file_path, bytes).map_err(|e| {
        AppError::Storage(format!("写入临时副本 '{}' 失败: {}", file_path.display(), e))
    })?;
    log::debug!("💾 已写入临时副本: {} ({} bytes)", file_path.display(), bytes.len());
    Ok(file_path)
}

/// 尽力清理临时副本，返回成功删除的数量。
///
/// 目录不存在视为无事可做；单个文件删除失败只记录日志。
pub fn cleanup_scratch_files(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("⚠️ 读取临时目录失败，跳过清理: {} ({})", dir.display(), err);
            }
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_scratch_file_name(name) {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) => log::warn!("⚠️ 删除临时副本失败（已忽略）: {} ({})", name, err),
        }
    }

    if removed > 0 {
        log::info!("🧹 已清理 {} 个临时副本", removed);
    }
    removed
}

/// 获取临时目录信息（路径 + 副本占用大小 + 副本数）
pub fn scratch_dir_info(dir: &Path) -> Result<StorageInfo, AppError> {
    let dir = ensure_scratch_dir(dir)?;
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    let entries = fs::read_dir(&dir)
        .map_err(|e| AppError::Storage(format!("读取临时目录失败: {}", e)))?;
    for entry in entries.flatten() {
        let is_scratch = entry
            .file_name()
            .to_str()
            .is_some_and(is_scratch_file_name);
        if !is_scratch {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                total_size += metadata.len();
                file_count += 1;
            }
        }
    }

    Ok(StorageInfo {
        path: dir.to_string_lossy().to_string(),
        total_size,
        file_count,
    })
}
