//! # 传输抽象
//!
//! 状态机只依赖 `UploadTransport`，测试可注入替身实现，不需要真实网络。

use std::future::Future;

use super::{CancelToken, HttpTransferClient, ProgressFn, TransferError};
use crate::acquisition::ImageHandle;
use crate::model::{PoetryRequest, UploadResult};

pub trait UploadTransport: Send + Sync {
    /// 可达性预检；不可达时返回 `Unreachable`。
    fn check_health(&self, cancel: &CancelToken) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// 上传图片。`on_accepted` 在服务端以 2xx 接收请求时调用一次。
    fn upload<A>(
        &self,
        handle: &ImageHandle,
        on_progress: ProgressFn,
        on_accepted: A,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<UploadResult, TransferError>> + Send
    where
        A: FnOnce() + Send;

    fn generate_poetry(
        &self,
        request: &PoetryRequest,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<UploadResult, TransferError>> + Send;
}

impl UploadTransport for HttpTransferClient {
    async fn check_health(&self, cancel: &CancelToken) -> Result<(), TransferError> {
        HttpTransferClient::check_health(self, cancel).await
    }

    async fn upload<A>(
        &self,
        handle: &ImageHandle,
        on_progress: ProgressFn,
        on_accepted: A,
        cancel: &CancelToken,
    ) -> Result<UploadResult, TransferError>
    where
        A: FnOnce() + Send,
    {
        self.upload_image(handle, on_progress, on_accepted, cancel).await
    }

    async fn generate_poetry(&self, request: &PoetryRequest, cancel: &CancelToken) -> Result<UploadResult, TransferError> {
        HttpTransferClient::generate_poetry(self, request, cancel).await
    }
}
