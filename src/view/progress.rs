use serde::Serialize;

use crate::models::Job;

/// 进度条视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub stage: String,
    pub message: String,
    /// 0 - 100
    pub percent: u8,
}

impl ProgressView {
    pub fn from_job(job: &Job) -> Self {
        let message = if job.message.trim().is_empty() {
            "Processing...".to_string()
        } else {
            job.message.clone()
        };
        Self {
            stage: job.stage.label().to_string(),
            message,
            percent: percent_of(job.progress),
        }
    }

    /// 上传开始时的初始进度
    pub fn uploading() -> Self {
        Self {
            stage: "Uploading".to_string(),
            message: "Preparing upload...".to_string(),
            percent: 0,
        }
    }
}

/// 进度分数转百分比：非法值为 0，超出范围时截断
pub fn percent_of(progress: f64) -> u8 {
    if !progress.is_finite() {
        return 0;
    }
    (progress.clamp(0.0, 1.0) * 100.0).round() as u8
}
