use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use lecture_mind_client::models::{ExportFormat, VideoUpload};
use lecture_mind_client::utils::logging;
use lecture_mind_client::{
    Config, Controller, FilePreview, FileStore, LectureClient, PollState, Severity, UiChannel,
    UiEvent,
};

/// 把 UI 事件输出到日志
async fn render_events(mut rx: UnboundedReceiver<UiEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            UiEvent::Progress { view, .. } => {
                info!("⏳ {} {}% - {}", view.stage, view.percent, view.message)
            }
            UiEvent::ResultsReady(view) => info!(
                "📊 {} | {} | {} | 事件 {} 个 | 转录 {} 段",
                view.info.filename,
                view.info.duration,
                view.info.resolution,
                view.events.len(),
                view.transcript.len()
            ),
            UiEvent::DemoMode { setup_url } => {
                warn!("⚠️ 服务端处于演示模式，本地部署说明: {:?}", setup_url)
            }
            UiEvent::Notify(n) => match n.severity {
                Severity::Error => error!("❌ {}: {}", n.title, n.message),
                Severity::Warning => warn!("⚠️ {}: {}", n.title, n.message),
                Severity::Success | Severity::Info => info!("✓ {}: {}", n.title, n.message),
            },
            other => logging::log_ui_event(&other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let mut args = std::env::args().skip(1);
    let Some(video) = args.next() else {
        bail!("用法: lecture-mind <视频文件> [导出格式 ...]");
    };
    let formats = args
        .map(|f| ExportFormat::parse(&f))
        .collect::<Result<Vec<_>, _>>()?;

    let (ui, rx) = UiChannel::new();
    let renderer = tokio::spawn(render_events(rx));

    let api = Arc::new(LectureClient::new(&config)?);
    let store = Arc::new(FileStore::new(&config.storage_dir));
    let controller = Controller::new(api, store, ui, config.clone());

    controller.check_demo_mode().await;

    let path = Path::new(&video);
    let upload = VideoUpload::from_path(path, config.max_file_size)
        .await
        .with_context(|| format!("读取视频失败: {}", path.display()))?;
    let job_id = controller
        .upload(upload, Some(Box::new(FilePreview::new(path))))
        .await?;

    let state = controller.join_polling().await;
    if state != Some(PollState::Completed) || controller.current_result().is_none() {
        bail!("任务 {} 未能完成: {:?}", job_id, state);
    }

    for format in formats {
        match controller.save_export(format).await {
            Ok(path) => info!("✓ 已导出 {}", path.display()),
            Err(e) => error!("❌ 导出 {} 失败: {}", format, e),
        }
    }

    drop(controller);
    let _ = tokio::time::timeout(Duration::from_secs(1), renderer).await;
    Ok(())
}
