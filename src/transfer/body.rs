//! # multipart 请求体
//!
//! ## 实现思路
//!
//! 图片字节按固定块大小切分为流，传输层每拉取一块：
//! - 回调 `(已发送, 总量)`
//! - 首块推进到 `Sending`，末块推进到 `Receiving`
//!
//! 分块基于 `Bytes::slice`，不复制数据；总长度预先声明，服务端拿到的是定长请求体。

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, stream};
use reqwest::multipart::{Form, Part};

use super::timeouts::{PhaseSignals, TransferPhase};
use super::{ProgressFn, TransferError};

/// 构造上传表单：`image` 文件字段 + `timestamp`（毫秒时间戳）。
pub(super) fn build_upload_form(
    bytes: Bytes,
    file_name: String,
    mime_type: &str,
    chunk_size: usize,
    on_progress: ProgressFn,
    signals: Arc<PhaseSignals>,
) -> Result<Form, TransferError> {
    let total = bytes.len() as u64;
    let body = reqwest::Body::wrap_stream(progress_stream(bytes, chunk_size, on_progress, signals));

    let part = Part::stream_with_length(body, total)
        .file_name(file_name)
        .mime_str(mime_type)
        .map_err(|e| TransferError::Unknown(format!("无效的 MIME 类型：{}", e)))?;

    Ok(Form::new()
        .part("image", part)
        .text("timestamp", Utc::now().timestamp_millis().to_string()))
}

/// 按块产出请求体并回报进度。
pub(super) fn progress_stream(
    bytes: Bytes,
    chunk_size: usize,
    on_progress: ProgressFn,
    signals: Arc<PhaseSignals>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = bytes.len();
    let chunk_size = chunk_size.max(1);

    if total == 0 {
        signals.advance(TransferPhase::Sending);
    }

    let chunks: Vec<Bytes> = (0..total)
        .step_by(chunk_size)
        .map(|start| bytes.slice(start..(start + chunk_size).min(total)))
        .collect();

    let mut sent = 0usize;
    stream::iter(chunks).map(move |chunk| {
        if sent == 0 {
            signals.advance(TransferPhase::Sending);
        }
        sent += chunk.len();
        on_progress(sent as u64, Some(total as u64));
        if sent >= total {
            signals.advance(TransferPhase::Receiving);
        }
        Ok(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn stream_reports_cumulative_progress_and_advances_phases() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_progress: ProgressFn = Arc::new(move |sent, total| {
            sink.lock().expect("lock failed").push((sent, total));
        });
        let signals = Arc::new(PhaseSignals::new());

        let mut stream = Box::pin(progress_stream(
            Bytes::from(vec![1u8; 10]),
            4,
            on_progress,
            Arc::clone(&signals),
        ));

        assert_eq!(signals.current(), TransferPhase::Connecting);
        let first = stream.next().await.expect("first chunk").expect("chunk ok");
        assert_eq!(first.len(), 4);
        assert_eq!(signals.current(), TransferPhase::Sending);

        let mut total_len = first.len();
        while let Some(chunk) = stream.next().await {
            total_len += chunk.expect("chunk ok").len();
        }

        assert_eq!(total_len, 10);
        assert_eq!(signals.current(), TransferPhase::Receiving);
        assert_eq!(
            *seen.lock().expect("lock failed"),
            vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]
        );
    }

    #[tokio::test]
    async fn empty_body_reports_nothing() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let on_progress: ProgressFn = Arc::new(move |_, _| {
            *counter.lock().expect("lock failed") += 1;
        });
        let signals = Arc::new(PhaseSignals::new());

        let mut stream = Box::pin(progress_stream(Bytes::new(), 4, on_progress, Arc::clone(&signals)));

        assert!(stream.next().await.is_none());
        assert_eq!(*calls.lock().expect("lock failed"), 0);
        assert_eq!(signals.current(), TransferPhase::Sending);
    }
}
