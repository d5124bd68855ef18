//! 应用设置模块
//!
//! # 设计思路
//!
//! 所有可调参数集中在 `AppSettings`，由 JSON 文件 + 环境变量两层组成，
//! 再派生出各模块自己的配置（传输 / 选图 / 状态机），模块之间不直接读取设置文件。
//!
//! # 实现思路
//!
//! - 文件不存在时使用默认值；字段缺失按默认值补齐（`#[serde(default)]`）。
//! - 环境变量覆盖文件中的同名设置，便于容器与脚本场景。
//! - 加载结束统一做范围校验，非法值返回 `AppError::Config`，不静默修正。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionConfig, DEFAULT_MAX_FILE_SIZE};
use crate::error::AppError;
use crate::lifecycle::LifecycleConfig;
use crate::model::{PoetryLanguage, PoetryStyle};
use crate::storage::default_scratch_dir;
use crate::store::DEFAULT_RESULT_CAPACITY;
use crate::transfer::{DEFAULT_SERVER_URL, TransferConfig};

pub const ENV_SERVER_URL: &str = "IMAGE_POET_SERVER_URL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "IMAGE_POET_CONNECT_TIMEOUT_MS";
pub const ENV_SEND_TIMEOUT_MS: &str = "IMAGE_POET_SEND_TIMEOUT_MS";
pub const ENV_RECEIVE_TIMEOUT_MS: &str = "IMAGE_POET_RECEIVE_TIMEOUT_MS";
pub const ENV_COMPLETION_DELAY_MS: &str = "IMAGE_POET_COMPLETION_DELAY_MS";
pub const ENV_SCRATCH_DIR: &str = "IMAGE_POET_SCRATCH_DIR";

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;
const MIN_CHUNK_SIZE: usize = 1024;
const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server_url: String,
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub receive_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub upload_chunk_size: usize,
    pub completion_delay_ms: u64,
    pub result_capacity: usize,
    pub max_file_size: u64,
    pub max_long_edge: u32,
    pub max_short_edge: u32,
    pub jpeg_quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    pub request_poetry_if_missing: bool,
    pub poetry_style: PoetryStyle,
    pub poetry_language: PoetryLanguage,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_ms: 30_000,
            send_timeout_ms: 30_000,
            receive_timeout_ms: 30_000,
            health_timeout_ms: 5_000,
            upload_chunk_size: 64 * 1024,
            completion_delay_ms: 2_000,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_long_edge: 1920,
            max_short_edge: 1080,
            jpeg_quality: 85,
            scratch_dir: None,
            request_poetry_if_missing: false,
            poetry_style: PoetryStyle::Classic,
            poetry_language: PoetryLanguage::Korean,
        }
    }
}

impl AppSettings {
    /// 读取设置文件（可选）→ 应用环境变量 → 校验。
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("📄 设置文件不存在，使用默认设置: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("解析设置文件失败: {}", e)))?;
        log::info!("📄 已加载设置文件: {}", path.display());
        Ok(settings)
    }

    /// 写入格式化 JSON。
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("序列化设置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 用 `lookup` 提供的值覆盖设置；`lookup` 通常是环境变量读取。
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = read(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(value) = read(ENV_CONNECT_TIMEOUT_MS) {
            self.connect_timeout_ms = parse_millis(ENV_CONNECT_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = read(ENV_SEND_TIMEOUT_MS) {
            self.send_timeout_ms = parse_millis(ENV_SEND_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = read(ENV_RECEIVE_TIMEOUT_MS) {
            self.receive_timeout_ms = parse_millis(ENV_RECEIVE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = read(ENV_COMPLETION_DELAY_MS) {
            self.completion_delay_ms = parse_millis(ENV_COMPLETION_DELAY_MS, &value)?;
        }
        if let Some(dir) = read(ENV_SCRATCH_DIR) {
            self.scratch_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(AppError::Config("server_url 不能为空".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "server_url 只支持 http / https：{}",
                url
            )));
        }

        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("send_timeout_ms", self.send_timeout_ms),
            ("receive_timeout_ms", self.receive_timeout_ms),
            ("health_timeout_ms", self.health_timeout_ms),
        ] {
            if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} 超出范围：{}（允许：{}~{} ms）",
                    name, value, MIN_TIMEOUT_MS, MAX_TIMEOUT_MS
                )));
            }
        }

        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.upload_chunk_size) {
            return Err(AppError::Config(format!(
                "upload_chunk_size 超出范围：{}（允许：{}~{} 字节）",
                self.upload_chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(AppError::Config(format!(
                "jpeg_quality 超出范围：{}（允许：1~100）",
                self.jpeg_quality
            )));
        }
        if self.result_capacity == 0 {
            return Err(AppError::Config("result_capacity 至少为 1".to_string()));
        }
        if self.max_file_size == 0 || self.max_long_edge == 0 || self.max_short_edge == 0 {
            return Err(AppError::Config(
                "max_file_size / max_long_edge / max_short_edge 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(default_scratch_dir)
    }

    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            base_url: self.server_url.trim().to_string(),
            connect_timeout_ms: self.connect_timeout_ms,
            send_timeout_ms: self.send_timeout_ms,
            receive_timeout_ms: self.receive_timeout_ms,
            health_timeout_ms: self.health_timeout_ms,
            upload_chunk_size: self.upload_chunk_size,
        }
    }

    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            max_file_size: self.max_file_size,
            max_long_edge: self.max_long_edge,
            max_short_edge: self.max_short_edge,
            jpeg_quality: self.jpeg_quality,
            scratch_dir: self.scratch_dir(),
            ..AcquisitionConfig::default()
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            completion_delay_ms: self.completion_delay_ms,
            result_capacity: self.result_capacity,
            request_poetry_if_missing: self.request_poetry_if_missing,
            poetry_style: self.poetry_style,
            poetry_language: self.poetry_language,
        }
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, AppError> {
    value
        .parse::<u64>()
        .map_err(|_| AppError::Config(format!("{} 不是有效的毫秒数：{}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.transfer_config(), TransferConfig::default());
        assert_eq!(settings.lifecycle_config(), LifecycleConfig::default());
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let settings = AppSettings::from_file(&dir.path().join("absent.json")).expect("load failed");
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_file_is_filled_with_defaults_and_roundtrips() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"server_url":"https://poet.example.com","completion_delay_ms":0,"poetry_style":"haiku"}"#,
        )
        .expect("write settings failed");

        let settings = AppSettings::from_file(&path).expect("load failed");
        assert_eq!(settings.server_url, "https://poet.example.com");
        assert_eq!(settings.completion_delay_ms, 0);
        assert_eq!(settings.poetry_style, PoetryStyle::Haiku);
        assert_eq!(settings.receive_timeout_ms, 30_000);

        let saved = dir.path().join("nested").join("copy.json");
        settings.save(&saved).expect("save failed");
        assert_eq!(AppSettings::from_file(&saved).expect("reload failed"), settings);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write settings failed");

        assert!(matches!(AppSettings::from_file(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = AppSettings::default();
        settings
            .apply_overrides(lookup(&[
                (ENV_SERVER_URL, " http://10.0.2.2:8000 "),
                (ENV_SEND_TIMEOUT_MS, "1500"),
                (ENV_COMPLETION_DELAY_MS, "0"),
                (ENV_SCRATCH_DIR, "/tmp/poet-scratch"),
                (ENV_RECEIVE_TIMEOUT_MS, ""),
            ]))
            .expect("apply overrides failed");

        assert_eq!(settings.server_url, "http://10.0.2.2:8000");
        assert_eq!(settings.send_timeout_ms, 1500);
        assert_eq!(settings.receive_timeout_ms, 30_000);
        assert_eq!(settings.completion_delay_ms, 0);
        assert_eq!(settings.scratch_dir(), PathBuf::from("/tmp/poet-scratch"));
        assert_eq!(settings.acquisition_config().scratch_dir, PathBuf::from("/tmp/poet-scratch"));
    }

    #[test]
    fn non_numeric_override_is_rejected() {
        let mut settings = AppSettings::default();
        let result = settings.apply_overrides(lookup(&[(ENV_CONNECT_TIMEOUT_MS, "soon")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases: Vec<Box<dyn Fn(&mut AppSettings)>> = vec![
            Box::new(|s: &mut AppSettings| s.server_url = "ftp://host".to_string()),
            Box::new(|s: &mut AppSettings| s.server_url = "  ".to_string()),
            Box::new(|s: &mut AppSettings| s.connect_timeout_ms = 50),
            Box::new(|s: &mut AppSettings| s.receive_timeout_ms = 301_000),
            Box::new(|s: &mut AppSettings| s.upload_chunk_size = 512),
            Box::new(|s: &mut AppSettings| s.jpeg_quality = 0),
            Box::new(|s: &mut AppSettings| s.result_capacity = 0),
            Box::new(|s: &mut AppSettings| s.max_long_edge = 0),
        ];

        for mutate in cases {
            let mut settings = AppSettings::default();
            mutate(&mut settings);
            assert!(matches!(settings.validate(), Err(AppError::Config(_))), "{settings:?}");
        }
    }
}
