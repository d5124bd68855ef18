//! # HTTP 传输客户端
//!
//! ## 设计思路
//!
//! 单个 `reqwest::Client` 复用连接池，在进程启动时构造一次，通过依赖注入传给状态机。
//! 所有请求都经过 `drive_with_phase_timeouts`，因此都能被取消令牌中止。
//!
//! ## 实现思路
//!
//! - `check_health`：`GET /health`，状态码必须为 200，任何失败都归为 `Unreachable`
//! - `upload_image`：分块 multipart 上传；收到 2xx 状态行后先回调 `on_accepted`，再读取响应体
//! - `generate_poetry`：JSON POST，与上传共享响应解析
//! - `list_uploads`：分页查询历史记录
//!
//! 响应解析规则：
//! - 非 2xx：`BadResponse`，消息依次取 `message` / `detail` / `error` / 原始文本 / 标准原因短语
//! - 2xx 但 `success: false`：同样视为 `BadResponse`
//! - 2xx 但无法解析：`Unknown`

use std::sync::Arc;
use std::time::Instant;

use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::body::build_upload_form;
use super::error::classify_reqwest_error;
use super::timeouts::{PhaseSignals, TransferPhase, drive_with_phase_timeouts};
use super::{CancelToken, ProgressFn, TransferConfig, TransferError};
use crate::acquisition::ImageHandle;
use crate::error::AppError;
use crate::model::{PoetryRequest, UploadResult, UploadsPage};

pub const HEALTH_PATH: &str = "health";
pub const UPLOAD_IMAGE_PATH: &str = "api/upload-image";
pub const GENERATE_POETRY_PATH: &str = "api/generate-poetry";
pub const UPLOADS_PATH: &str = "api/uploads";

const MAX_LIST_LIMIT: u32 = 100;
const MAX_RAW_MESSAGE_CHARS: usize = 200;

/// 基于 `reqwest` 的传输客户端。
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    client: reqwest::Client,
    base_url: Url,
    config: TransferConfig,
}

impl HttpTransferClient {
    pub fn new(config: TransferConfig) -> Result<Self, AppError> {
        let base_url = normalize_base_url(&config.base_url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("image-poet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransferError> {
        self.base_url
            .join(path)
            .map_err(|e| TransferError::Unknown(format!("无法拼接请求地址：{}", e)))
    }

    /// 可达性预检。
    pub async fn check_health(&self, cancel: &CancelToken) -> Result<(), TransferError> {
        let url = self.endpoint(HEALTH_PATH)?;
        let redacted = redact_url_for_log(url.as_str());
        let request = self.client.get(url).timeout(self.config.health_timeout()).send();

        match cancel.run(request).await? {
            Ok(response) if response.status() == StatusCode::OK => {
                log::debug!("💓 健康检查通过: {}", redacted);
                Ok(())
            }
            Ok(response) => {
                log::warn!("💔 健康检查失败: {} 返回 {}", redacted, response.status());
                Err(TransferError::Unreachable)
            }
            Err(err) => {
                log::warn!("💔 健康检查失败: {} ({})", redacted, err.without_url());
                Err(TransferError::Unreachable)
            }
        }
    }

    /// 上传图片并解析结果。
    ///
    /// `on_accepted` 在收到 2xx 状态行时调用一次，早于响应体读取。
    pub async fn upload_image<A>(
        &self,
        handle: &ImageHandle,
        on_progress: ProgressFn,
        on_accepted: A,
        cancel: &CancelToken,
    ) -> Result<UploadResult, TransferError>
    where
        A: FnOnce() + Send,
    {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let bytes = handle
            .read_bytes()
            .await
            .map_err(|e| TransferError::Unknown(format!("读取图片失败：{}", e)))?;
        let total = bytes.len();
        let file_name = handle.file_name();

        let signals = Arc::new(PhaseSignals::new());
        let form = build_upload_form(
            bytes,
            file_name.clone(),
            handle.mime_type(),
            self.config.upload_chunk_size,
            on_progress,
            Arc::clone(&signals),
        )?;

        let url = self.endpoint(UPLOAD_IMAGE_PATH)?;
        log::info!(
            "📤 开始上传 - 文件: {} 大小: {} bytes 目标: {}",
            file_name,
            total,
            redact_url_for_log(url.as_str())
        );

        let started_at = Instant::now();
        let client = &self.client;
        let phase_signals = &*signals;
        let request = async move {
            let response = client
                .post(url)
                .multipart(form)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(e, phase_signals.current()))?;

            phase_signals.advance(TransferPhase::Receiving);
            let status = response.status();
            if status.is_success() {
                on_accepted();
            }

            let body = response
                .text()
                .await
                .map_err(|e| classify_reqwest_error(e, TransferPhase::Receiving))?;
            parse_result_response(status, &body)
        };

        let result = drive_with_phase_timeouts(request, &signals, self.config.phase_timeouts(), cancel).await;
        match &result {
            Ok(upload) => log::info!(
                "✅ 上传完成 - image_id: {} 耗时: {}ms",
                upload.image_id.as_deref().unwrap_or("<none>"),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log::warn!("❌ 上传失败 [{}]: {}", err.code(), err),
        }
        result
    }

    /// 为已上传图片请求生成诗歌。
    pub async fn generate_poetry(
        &self,
        request: &PoetryRequest,
        cancel: &CancelToken,
    ) -> Result<UploadResult, TransferError> {
        let url = self.endpoint(GENERATE_POETRY_PATH)?;
        log::info!(
            "✍️ 请求生成诗歌 - image_id: {} 风格: {} 语言: {}",
            request.image_id,
            request.style,
            request.language
        );

        let pending = self.client.post(url).json(request).send();
        self.receive_json(pending, cancel, parse_result_response).await
    }

    /// 分页查询上传历史。`page` 从 1 开始，`limit` 限制在 `1..=100`。
    pub async fn list_uploads(
        &self,
        page: u32,
        limit: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<UploadResult>, TransferError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_LIST_LIMIT);

        let mut url = self.endpoint(UPLOADS_PATH)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        log::debug!("📜 查询上传历史 - page: {} limit: {}", page, limit);
        let pending = self.client.get(url).send();
        let page = self.receive_json(pending, cancel, parse_uploads_response).await?;
        Ok(page.uploads)
    }

    /// 非流式请求：整体按接收超时计时。
    async fn receive_json<F, T, P>(&self, pending: F, cancel: &CancelToken, parse: P) -> Result<T, TransferError>
    where
        F: Future<Output = Result<reqwest::Response, reqwest::Error>>,
        P: FnOnce(StatusCode, &str) -> Result<T, TransferError>,
    {
        let signals = PhaseSignals::starting_at(TransferPhase::Receiving);
        let request = async move {
            let response = pending
                .await
                .map_err(|e| classify_reqwest_error(e, TransferPhase::Receiving))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| classify_reqwest_error(e, TransferPhase::Receiving))?;
            parse(status, &body)
        };

        drive_with_phase_timeouts(request, &signals, self.config.phase_timeouts(), cancel).await
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("server_url 不能为空".to_string()));
    }

    let mut url = Url::parse(trimmed).map_err(|e| AppError::Config(format!("无效的服务地址 '{}'：{}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!("服务地址只支持 http / https：{}", trimmed)));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub(super) fn parse_result_response(status: StatusCode, body: &str) -> Result<UploadResult, TransferError> {
    if !status.is_success() {
        return Err(TransferError::BadResponse {
            status: status.as_u16(),
            message: extract_server_message(status, body),
        });
    }

    let result: UploadResult =
        serde_json::from_str(body).map_err(|e| TransferError::Unknown(format!("响应解析失败：{}", e)))?;

    if !result.success {
        let message = if result.message.trim().is_empty() {
            extract_server_message(status, body)
        } else {
            result.message
        };
        return Err(TransferError::BadResponse {
            status: status.as_u16(),
            message,
        });
    }

    Ok(result)
}

fn parse_uploads_response(status: StatusCode, body: &str) -> Result<UploadsPage, TransferError> {
    if !status.is_success() {
        return Err(TransferError::BadResponse {
            status: status.as_u16(),
            message: extract_server_message(status, body),
        });
    }

    serde_json::from_str(body).map_err(|e| TransferError::Unknown(format!("响应解析失败：{}", e)))
}

/// 从错误响应中提取面向用户的消息。
pub(super) fn extract_server_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => return text.trim().to_string(),
                Some(value @ (Value::Array(_) | Value::Object(_))) => return value.to_string(),
                _ => {}
            }
        }
    }

    let raw = body.trim();
    if !raw.is_empty() {
        return raw.chars().take(MAX_RAW_MESSAGE_CHARS).collect();
    }

    status.canonical_reason().unwrap_or("请求失败").to_string()
}

/// 日志中去掉 query 与 fragment。
fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}
