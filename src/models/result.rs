use serde::{Deserialize, Serialize};

use super::job::JobStatus;

/// 视频元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub filename: String,
    /// 秒
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

/// 检测到的事件（如换页）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub confidence: f64,
}

/// 转录片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub start_formatted: String,
    pub end_formatted: String,
}

/// 一个已完成任务的处理结果，设置后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub metadata: VideoMetadata,
    #[serde(default)]
    pub events: Vec<EventItem>,
    #[serde(default)]
    pub transcript: Vec<TranscriptChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

/// `GET /api/results/{job_id}` 的响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<ProcessingResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultsPayload {
    /// 只有状态为 completed 且带有结果时才可用
    pub fn into_completed(self) -> Option<ProcessingResult> {
        if self.status == JobStatus::Completed {
            self.result
        } else {
            None
        }
    }
}
