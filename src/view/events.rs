//! UI 事件通道
//!
//! 控制器只通过这里把状态变化和提示推给渲染方。

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::progress::ProgressView;
use super::results::{AnnotationsView, ResultsView, SearchHit};
use crate::error::{AppError, ValidationError};

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// 用户可见的提示
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, message)
    }

    /// 错误到提示的统一映射；`fallback_title` 用于非校验类错误
    pub fn from_error(err: &AppError, fallback_title: &str) -> Self {
        match err {
            AppError::Validation(e) => {
                let severity = match e {
                    ValidationError::UnsupportedFileType { .. }
                    | ValidationError::FileTooLarge { .. }
                    | ValidationError::EmptyFile { .. } => Severity::Error,
                    _ => Severity::Warning,
                };
                Self::new(severity, e.title(), e.user_message())
            }
            AppError::Network(_) => Self::warning(fallback_title, err.user_message()),
            _ => Self::error(fallback_title, err.user_message()),
        }
    }
}

/// 推送给渲染方的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UiEvent {
    /// 上传或处理进度
    Progress { job_id: Option<String>, view: ProgressView },
    /// 结果已就绪
    ResultsReady(Box<ResultsView>),
    /// 导出按钮是否可用
    ExportAvailable(bool),
    /// 当前任务的标注有变化
    AnnotationsChanged(AnnotationsView),
    /// 搜索结果
    SearchResults { query: String, hits: Vec<SearchHit> },
    /// 服务端处于演示模式
    DemoMode { setup_url: Option<String> },
    /// 回到空闲状态
    Reset,
    Notify(Notification),
}

/// 无界事件通道的发送端，可克隆
#[derive(Debug, Clone)]
pub struct UiChannel {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 接收方已关闭时静默丢弃
    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI 通道已关闭，丢弃事件");
        }
    }

    pub fn notify(&self, notification: Notification) {
        self.emit(UiEvent::Notify(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;

    #[test]
    fn test_from_error_validation() {
        let err = AppError::from(ValidationError::FileTooLarge {
            size: 200 * 1024 * 1024,
            limit: 100 * 1024 * 1024,
        });
        let n = Notification::from_error(&err, "Upload Failed");
        assert_eq!(n.severity, Severity::Error);
        assert_eq!(n.title, "File Too Large");
        assert_eq!(n.message, "Maximum file size is 100MB");
    }

    #[test]
    fn test_from_error_network_is_warning() {
        let err = AppError::from(NetworkError::Aborted {
            endpoint: "/api/search/abc".into(),
        });
        let n = Notification::from_error(&err, "Search Failed");
        assert_eq!(n.severity, Severity::Warning);
        assert_eq!(n.title, "Search Failed");
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped() {
        let (ui, rx) = UiChannel::new();
        drop(rx);
        ui.notify(Notification::info("Theme", "dark"));
    }
}
