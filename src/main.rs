//! # 图片诗人 — 命令行入口
//!
//! 本文件只负责参数解析、依赖组装与输出格式。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;

use image_poet::acquisition::{AcquireError, ImageAcquirer, ImagePicker, PickSource, PickedImage};
use image_poet::error::AppError;
use image_poet::lifecycle::{LoggingObserver, UploadLifecycle};
use image_poet::model::{PoetryLanguage, PoetryRequest, PoetryStyle, UploadResult};
use image_poet::settings::AppSettings;
use image_poet::storage::{cleanup_scratch_files, scratch_dir_info};
use image_poet::transfer::{CancelToken, HttpTransferClient};

#[derive(Parser, Debug)]
#[command(name = "image-poet", version, about = "上传照片，让服务端为它写一首诗")]
struct Cli {
    /// 设置文件路径（JSON）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖服务地址
    #[arg(long, global = true)]
    server: Option<String>,

    /// 以 JSON 输出结果
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 上传图片并等待诗歌生成
    Upload(UploadArgs),
    /// 为已上传的图片生成诗歌
    Generate(GenerateArgs),
    /// 查看上传历史
    List(ListArgs),
    /// 检查服务是否可达
    Health,
    /// 清理临时副本
    Cleanup,
    /// 显示当前设置与临时目录信息
    Info,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// 图片路径（jpg / jpeg / png / webp）
    path: PathBuf,

    /// 失败后最多重试次数
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    image_id: String,

    /// classic / modern / haiku / free_verse
    #[arg(long)]
    style: Option<String>,

    /// korean / english / japanese
    #[arg(long)]
    language: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 20)]
    limit: u32,
}

/// 命令行“选图”：相册即给定路径，没有相机。
struct PathPicker {
    path: PathBuf,
}

impl ImagePicker for PathPicker {
    async fn pick(&self, source: PickSource) -> Result<Option<PickedImage>, AcquireError> {
        match source {
            PickSource::Gallery => Ok(Some(PickedImage::Path(self.path.clone()))),
            PickSource::Camera => Ok(None),
        }
    }
}

#[derive(Serialize)]
struct InfoOutput {
    settings: AppSettings,
    scratch: image_poet::storage::StorageInfo,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "error": err.to_string(), "code": err.code() })
                );
            } else {
                eprintln!("错误 [{}]: {}", err.code(), err);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut settings = AppSettings::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        settings.server_url = server;
        settings.validate()?;
    }

    match cli.command {
        Command::Upload(args) => upload(&settings, args, cli.json).await,
        Command::Generate(args) => {
            let client = HttpTransferClient::new(settings.transfer_config())?;
            let request = PoetryRequest {
                image_id: args.image_id,
                style: match args.style {
                    Some(style) => style.parse::<PoetryStyle>()?,
                    None => settings.poetry_style,
                },
                language: match args.language {
                    Some(language) => language.parse::<PoetryLanguage>()?,
                    None => settings.poetry_language,
                },
            };
            let result = client.generate_poetry(&request, &CancelToken::new()).await?;
            print_result(&result, cli.json)
        }
        Command::List(args) => {
            let client = HttpTransferClient::new(settings.transfer_config())?;
            let uploads = client
                .list_uploads(args.page, args.limit, &CancelToken::new())
                .await?;
            if cli.json {
                return print_json(&uploads);
            }
            if uploads.is_empty() {
                println!("（暂无上传记录）");
            }
            for upload in &uploads {
                println!(
                    "#{}  {}  {}",
                    upload.image_id.as_deref().unwrap_or("-"),
                    upload.title.as_deref().unwrap_or("<无标题>"),
                    upload
                        .created_at
                        .as_ref()
                        .map(image_poet::model::format_timestamp)
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Health => {
            let client = HttpTransferClient::new(settings.transfer_config())?;
            client.check_health(&CancelToken::new()).await?;
            if cli.json {
                print_json(&serde_json::json!({ "reachable": true }))
            } else {
                println!("服务可达: {}", client.base_url());
                Ok(())
            }
        }
        Command::Cleanup => {
            let removed = cleanup_scratch_files(&settings.scratch_dir());
            if cli.json {
                print_json(&serde_json::json!({ "removed": removed }))
            } else {
                println!("已清理 {} 个临时副本", removed);
                Ok(())
            }
        }
        Command::Info => {
            let scratch = scratch_dir_info(&settings.scratch_dir())?;
            if cli.json {
                return print_json(&InfoOutput { settings, scratch });
            }
            println!("服务地址: {}", settings.server_url);
            println!(
                "超时: connect {}ms / send {}ms / receive {}ms",
                settings.connect_timeout_ms, settings.send_timeout_ms, settings.receive_timeout_ms
            );
            println!(
                "临时目录: {}（{} 个副本，{} bytes）",
                scratch.path, scratch.file_count, scratch.total_size
            );
            Ok(())
        }
    }
}

async fn upload(settings: &AppSettings, args: UploadArgs, json: bool) -> Result<(), AppError> {
    let client = HttpTransferClient::new(settings.transfer_config())?;
    let acquirer = ImageAcquirer::new(PathPicker { path: args.path }, settings.acquisition_config());
    let image = acquirer.acquire(PickSource::Gallery).await?;

    let mut lifecycle = UploadLifecycle::with_observer(
        client,
        acquirer.validator(),
        settings.lifecycle_config(),
        Arc::new(LoggingObserver::new()),
    )
    .with_scratch_dir(settings.scratch_dir());

    let handle = lifecycle.handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("收到 Ctrl-C，正在取消上传");
            handle.cancel();
        }
    });

    let mut outcome = lifecycle.submit(image).await;
    let mut retries_left = args.retries;
    while let Err(AppError::Transfer(err)) = &outcome {
        if err.is_cancelled() || retries_left == 0 {
            break;
        }
        retries_left -= 1;
        log::warn!("⚠️ 第 {} 次重试（剩余 {} 次）", args.retries - retries_left, retries_left);
        outcome = lifecycle.retry().await;
    }
    ctrl_c.abort();

    print_result(&outcome?, json)
}

fn print_result(result: &UploadResult, json: bool) -> Result<(), AppError> {
    if json {
        return print_json(result);
    }

    if let Some(title) = &result.title {
        println!("《{}》", title);
    }
    if let Some(poetry) = &result.poetry_text {
        println!("{}", poetry);
    }
    if let Some(image_id) = &result.image_id {
        println!("\nimage_id: {}", image_id);
    }
    if result.title.is_none() && result.poetry_text.is_none() {
        println!("{}", result.message);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Config(format!("序列化输出失败: {}", e)))?;
    println!("{}", text);
    Ok(())
}
