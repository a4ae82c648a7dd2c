/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::ProcessingResult;
use crate::view::UiEvent;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug 或 info；重复调用无副作用
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 Lecture Mind 客户端启动");
    info!("🌐 后端地址: {}", config.api_base_url);
    info!("⏱️ 轮询间隔: {}ms, 请求超时: {}s", config.poll_interval_ms, config.fetch_timeout_secs);
    info!("💾 本地存储: {}", config.storage_dir);
    info!("{}", "=".repeat(60));
}

/// 记录任务完成后的结果摘要
///
/// # 参数
/// - `job_id`: 任务 id
/// - `result`: 处理结果
pub fn log_job_summary(job_id: &str, result: &ProcessingResult) {
    info!("\n{}", "=".repeat(60));
    info!("📊 任务 {} 处理完成", job_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🎬 视频: {}", truncate_text(&result.metadata.filename, 60));
    info!(
        "📐 {}x{} @ {:.1}fps, 时长 {:.1}s",
        result.metadata.width, result.metadata.height, result.metadata.fps, result.metadata.duration
    );
    info!("📌 事件数: {}", result.events.len());
    info!("📝 转录片段: {}", result.transcript.len());
    if let Some(seconds) = result.processing_time {
        info!("⏳ 处理耗时: {:.1}s", seconds);
    }
    info!("{}", "=".repeat(60));
}

/// 记录没有专门渲染方式的 UI 事件
pub fn log_ui_event(event: &UiEvent) {
    match event {
        UiEvent::ExportAvailable(enabled) => debug!("导出可用: {}", enabled),
        UiEvent::AnnotationsChanged(view) => debug!(
            "标注更新: 书签 {} / 标记 {} / 笔记 {}",
            view.bookmarks.len(),
            view.markers.len(),
            view.notes.len()
        ),
        UiEvent::SearchResults { query, hits } => {
            info!("🔍 \"{}\" 命中 {} 条", truncate_text(query, 40), hits.len())
        }
        UiEvent::Reset => info!("↩️ 已重置，等待新的上传"),
        other => debug!("UI 事件: {:?}", other),
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
