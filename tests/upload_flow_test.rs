// End-to-end upload scenarios against scripted in-process HTTP servers
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use image_poet::acquisition::{
    AcquireError, AcquisitionConfig, ImageAcquirer, ImageHandle, ImagePicker, ImageValidator, PickSource,
    PickedImage,
};
use image_poet::error::AppError;
use image_poet::lifecycle::{LifecycleConfig, LifecycleObserver, UploadLifecycle, UploadSnapshot, UploadState};
use image_poet::model::UploadResult;
use image_poet::transfer::{HttpTransferClient, TransferConfig, TransferError};

const AUTUMN_BODY: &str = r#"{"success":true,"message":"ok","poetry":"red leaves drift down","title":"Autumn","created_at":"2024-01-01T00:00:00Z"}"#;

enum Reply {
    Json(&'static str, &'static str),
    Hang(Duration),
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());

        match content_length {
            Some(len) if buf.len() - header_end - 4 >= len => break,
            None if headers.contains("transfer-encoding: chunked") => {
                if buf.ends_with(b"0\r\n\r\n") {
                    break;
                }
            }
            None => break,
            _ => {}
        }
    }

    // request line only; bodies can be megabytes
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Serves one connection per scripted reply, in order, and returns the request lines seen.
fn spawn_server(script: Vec<Reply>) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
    let addr = listener.local_addr().expect("read local addr failed");

    let server = thread::spawn(move || {
        let mut seen = Vec::new();
        for reply in script {
            let (mut stream, _) = listener.accept().expect("accept failed");
            seen.push(read_request(&mut stream));

            match reply {
                Reply::Json(status_line, body) => {
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).expect("write response failed");
                    stream.flush().expect("flush failed");
                }
                Reply::Hang(duration) => thread::sleep(duration),
            }
        }
        seen
    });

    (format!("http://{}", addr), server)
}

fn transfer_config(base_url: &str) -> TransferConfig {
    TransferConfig {
        connect_timeout_ms: 2_000,
        send_timeout_ms: 5_000,
        receive_timeout_ms: 2_000,
        health_timeout_ms: 2_000,
        ..TransferConfig::with_base_url(base_url)
    }
}

#[derive(Default)]
struct Counter {
    progress: Mutex<Vec<f64>>,
    states: Mutex<Vec<UploadState>>,
    successes: Mutex<usize>,
    errors: Mutex<Vec<String>>,
    cancels: Mutex<usize>,
}

impl LifecycleObserver for Counter {
    fn on_state_changed(&self, snapshot: &UploadSnapshot) {
        self.states.lock().expect("lock failed").push(snapshot.state);
    }

    fn on_progress(&self, fraction: f64) {
        self.progress.lock().expect("lock failed").push(fraction);
    }

    fn on_success(&self, _result: &UploadResult) {
        *self.successes.lock().expect("lock failed") += 1;
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().expect("lock failed").push(message.to_string());
    }

    fn on_cancel(&self) {
        *self.cancels.lock().expect("lock failed") += 1;
    }
}

fn lifecycle_for(
    config: TransferConfig,
    observer: Arc<Counter>,
) -> UploadLifecycle<HttpTransferClient> {
    let client = HttpTransferClient::new(config).expect("client init failed");
    let lifecycle_config = LifecycleConfig {
        completion_delay_ms: 0,
        ..LifecycleConfig::default()
    };
    UploadLifecycle::with_observer(client, ImageValidator::default(), lifecycle_config, observer)
}

fn two_megabyte_jpeg() -> ImageHandle {
    ImageHandle::in_memory(vec![0x5A; 2 * 1024 * 1024], "autumn.jpg")
}

#[tokio::test]
async fn healthy_server_completes_and_stores_result() {
    let (base, server) = spawn_server(vec![
        Reply::Json("200 OK", r#"{"status":"healthy"}"#),
        Reply::Json("200 OK", AUTUMN_BODY),
    ]);
    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&base), observer.clone());

    let result = lifecycle.submit(two_megabyte_jpeg()).await.expect("upload failed");
    let requests = server.join().expect("server thread failed");

    let expected: UploadResult = serde_json::from_str(AUTUMN_BODY).expect("parse expected failed");
    assert_eq!(result, expected);
    assert_eq!(lifecycle.state(), UploadState::Completed);
    assert_eq!(lifecycle.results().latest(), Some(&expected));
    assert_eq!(*observer.successes.lock().expect("lock failed"), 1);
    assert!(observer.errors.lock().expect("lock failed").is_empty());

    assert_eq!(
        *observer.states.lock().expect("lock failed"),
        vec![UploadState::Uploading, UploadState::Processing, UploadState::Completed]
    );
    let progress = observer.progress.lock().expect("lock failed").clone();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(progress.last(), Some(&1.0));

    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /health "));
    assert!(requests[1].starts_with("POST /api/upload-image "));
}

#[tokio::test]
async fn failing_health_check_never_attempts_upload() {
    let (base, server) = spawn_server(vec![Reply::Json("503 Service Unavailable", "{}")]);
    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&base), observer.clone());

    let result = lifecycle.submit(two_megabyte_jpeg()).await;
    let requests = server.join().expect("server thread failed");

    assert!(matches!(result, Err(AppError::Transfer(TransferError::Unreachable))));
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /health "));

    let snapshot = lifecycle.snapshot();
    assert_eq!(snapshot.state, UploadState::Error);
    assert_eq!(snapshot.message, Some(TransferError::Unreachable.to_string()));
    assert_eq!(observer.errors.lock().expect("lock failed").len(), 1);
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let addr = listener.local_addr().expect("read local addr failed");
    drop(listener);

    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&format!("http://{}", addr)), observer.clone());

    let result = lifecycle.submit(two_megabyte_jpeg()).await;

    assert!(matches!(result, Err(AppError::Transfer(TransferError::Unreachable))));
    assert_eq!(lifecycle.state(), UploadState::Error);
    assert!(observer.progress.lock().expect("lock failed").is_empty());
}

#[tokio::test]
async fn receive_timeout_then_retry_succeeds_with_same_handle() {
    let (base, server) = spawn_server(vec![
        Reply::Json("200 OK", "{}"),
        Reply::Hang(Duration::from_millis(600)),
        Reply::Json("200 OK", "{}"),
        Reply::Json("200 OK", AUTUMN_BODY),
    ]);
    let mut config = transfer_config(&base);
    config.receive_timeout_ms = 300;

    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(config, observer.clone());
    let image = ImageHandle::in_memory(vec![7u8; 32 * 1024], "retry.png");

    let first = lifecycle.submit(image.clone()).await;
    assert!(matches!(first, Err(AppError::Transfer(TransferError::ReceiveTimeout))));
    assert_eq!(lifecycle.state(), UploadState::Error);
    assert_eq!(lifecycle.current_image(), Some(&image));

    let second = lifecycle.retry().await.expect("retry failed");
    let requests = server.join().expect("server thread failed");

    assert_eq!(second.title.as_deref(), Some("Autumn"));
    assert_eq!(lifecycle.state(), UploadState::Completed);
    assert_eq!(observer.errors.lock().expect("lock failed").len(), 1);
    assert_eq!(*observer.successes.lock().expect("lock failed"), 1);
    assert_eq!(requests.len(), 4);
    assert!(requests[1].starts_with("POST /api/upload-image "));
    assert!(requests[3].starts_with("POST /api/upload-image "));
}

#[tokio::test]
async fn cancel_in_flight_returns_to_idle() {
    let (base, server) = spawn_server(vec![
        Reply::Json("200 OK", "{}"),
        Reply::Hang(Duration::from_millis(800)),
    ]);
    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&base), observer.clone());

    let handle = lifecycle.handle();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel()
    });

    let result = lifecycle.submit(ImageHandle::in_memory(vec![1u8; 4096], "a.webp")).await;
    assert!(canceller.await.expect("canceller task failed"));
    server.join().expect("server thread failed");

    assert!(matches!(result, Err(AppError::Transfer(TransferError::Cancelled))));
    assert_eq!(lifecycle.state(), UploadState::Idle);
    assert_eq!(*observer.cancels.lock().expect("lock failed"), 1);
    assert_eq!(*observer.successes.lock().expect("lock failed"), 0);
    assert!(observer.errors.lock().expect("lock failed").is_empty());
}

#[tokio::test]
async fn invalid_image_is_rejected_before_any_request() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let addr = listener.local_addr().expect("read local addr failed");
    listener.set_nonblocking(true).expect("set nonblocking failed");

    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&format!("http://{}", addr)), observer.clone());

    let too_big = ImageHandle::in_memory(vec![0u8; 10 * 1024 * 1024 + 1], "huge.jpg");
    let result = lifecycle.submit(too_big).await;

    assert!(matches!(
        result,
        Err(AppError::Acquire(AcquireError::InvalidFormatOrSize(_)))
    ));
    assert_eq!(lifecycle.state(), UploadState::Idle);
    assert!(observer.states.lock().expect("lock failed").is_empty());
    assert!(listener.accept().is_err());
}

struct FilePicker(std::path::PathBuf);

impl ImagePicker for FilePicker {
    async fn pick(&self, _source: PickSource) -> Result<Option<PickedImage>, AcquireError> {
        Ok(Some(PickedImage::Path(self.0.clone())))
    }
}

#[tokio::test]
async fn acquired_scratch_copy_is_uploaded_then_cleaned() {
    let dir = tempfile::tempdir().expect("create temp dir failed");
    let original = dir.path().join("wide.png");
    let img = ImageBuffer::from_fn(2400, 1200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    DynamicImage::ImageRgb8(img)
        .save_with_format(&original, ImageFormat::Png)
        .expect("write source image failed");

    let scratch_dir = dir.path().join("scratch");
    let acquirer = ImageAcquirer::new(
        FilePicker(original.clone()),
        AcquisitionConfig {
            scratch_dir: scratch_dir.clone(),
            ..AcquisitionConfig::default()
        },
    );
    let image = acquirer.acquire(PickSource::Gallery).await.expect("acquire failed");
    let copy = image.path().expect("scratch copy expected").to_path_buf();
    assert!(copy.starts_with(&scratch_dir));

    let (base, server) = spawn_server(vec![
        Reply::Json("200 OK", "{}"),
        Reply::Json("200 OK", AUTUMN_BODY),
    ]);
    let observer = Arc::new(Counter::default());
    let mut lifecycle = lifecycle_for(transfer_config(&base), observer).with_scratch_dir(&scratch_dir);

    lifecycle.submit(image).await.expect("upload failed");
    server.join().expect("server thread failed");

    assert!(!copy.exists());
    assert!(original.exists());
}
