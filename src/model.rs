//! # 响应数据模型
//!
//! ## 设计思路
//!
//! `UploadResult` 是一次上传往返的终值：成功时带诗歌正文与标题，失败时只有消息。
//! 结构体字段即线上 JSON 形状（`poetry` 字段在模型中叫 `poetry_text`）。
//!
//! ## 实现思路
//!
//! - 反序列化先落到宽松的 `WireUploadResult`，再经 `From` 归一化：
//!   失败结果一律去掉 `poetry` / `title`。
//! - 后端的 `image_id` 可能是整数，统一转为字符串保存。
//! - `created_at` 兼容 RFC 3339 与不带时区的 ISO-8601（按 UTC 解释），
//!   序列化时输出 RFC 3339 UTC，保留原有精度，往返无损。
//! - 缺失的 `created_at` 保持 `None`，不会用当前时间填充。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::AppError;

/// 一次上传（或诗歌生成）往返的结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireUploadResult")]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "poetry", skip_serializing_if = "Option::is_none")]
    pub poetry_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        serialize_with = "serialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl UploadResult {
    /// 构造失败结果。
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            image_id: None,
            image_url: None,
            poetry_text: None,
            title: None,
            created_at: None,
            metadata: None,
        }
    }

    /// 是否已经带有可展示的诗歌。
    pub fn has_poetry(&self) -> bool {
        self.poetry_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// 用另一份结果补齐本结果缺失的字段（诗歌生成接口不回传图片地址与元数据）。
    pub(crate) fn merge_missing_from(mut self, other: &UploadResult) -> Self {
        if self.image_id.is_none() {
            self.image_id = other.image_id.clone();
        }
        if self.image_url.is_none() {
            self.image_url = other.image_url.clone();
        }
        if self.created_at.is_none() {
            self.created_at = other.created_at;
        }
        if self.metadata.is_none() {
            self.metadata = other.metadata.clone();
        }
        self
    }
}

#[derive(Deserialize)]
struct WireUploadResult {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "deserialize_id")]
    image_id: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    poetry: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl From<WireUploadResult> for UploadResult {
    fn from(wire: WireUploadResult) -> Self {
        let (poetry_text, title) = if wire.success {
            (wire.poetry, wire.title)
        } else {
            (None, None)
        };

        Self {
            success: wire.success,
            message: wire.message,
            image_id: wire.image_id,
            image_url: wire.image_url,
            poetry_text,
            title,
            created_at: wire.created_at,
            metadata: wire.metadata,
        }
    }
}

/// `GET /api/uploads` 的响应。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadsPage {
    #[serde(default)]
    pub uploads: Vec<UploadResult>,
}

/// 解析时间戳：RFC 3339 优先，其次是无时区 ISO-8601（按 UTC）。
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("无法解析时间戳 '{}': {}", trimmed, e))
}

/// 以 RFC 3339 UTC 格式输出时间戳。
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn serialize_timestamp<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serializer.serialize_str(&format_timestamp(value)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(serde_json::Number),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?.map(|id| match id {
        IdRepr::Text(text) => text,
        IdRepr::Number(number) => number.to_string(),
    }))
}

/// 诗歌风格。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoetryStyle {
    #[default]
    Classic,
    Modern,
    Haiku,
    FreeVerse,
}

impl PoetryStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Modern => "modern",
            Self::Haiku => "haiku",
            Self::FreeVerse => "free_verse",
        }
    }
}

impl FromStr for PoetryStyle {
    type Err = AppError;

    fn from_str(style: &str) -> Result<Self, Self::Err> {
        match style.trim().to_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "modern" => Ok(Self::Modern),
            "haiku" => Ok(Self::Haiku),
            "free_verse" => Ok(Self::FreeVerse),
            other => Err(AppError::Config(format!(
                "未知诗歌风格：{}（可选：classic / modern / haiku / free_verse）",
                other
            ))),
        }
    }
}

impl fmt::Display for PoetryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 诗歌语言。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoetryLanguage {
    #[default]
    Korean,
    English,
    Japanese,
}

impl PoetryLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Korean => "korean",
            Self::English => "english",
            Self::Japanese => "japanese",
        }
    }
}

impl FromStr for PoetryLanguage {
    type Err = AppError;

    fn from_str(language: &str) -> Result<Self, Self::Err> {
        match language.trim().to_lowercase().as_str() {
            "korean" => Ok(Self::Korean),
            "english" => Ok(Self::English),
            "japanese" => Ok(Self::Japanese),
            other => Err(AppError::Config(format!(
                "未知诗歌语言：{}（可选：korean / english / japanese）",
                other
            ))),
        }
    }
}

impl fmt::Display for PoetryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `POST /api/generate-poetry` 的请求体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoetryRequest {
    pub image_id: String,
    pub style: PoetryStyle,
    pub language: PoetryLanguage,
}

impl PoetryRequest {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            style: PoetryStyle::default(),
            language: PoetryLanguage::default(),
        }
    }
}
