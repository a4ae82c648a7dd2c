use serde::{Deserialize, Deserializer, Serialize};

/// 任务状态
///
/// 上传阶段由客户端自己表示（见 `ProgressView::uploading`），服务端只报告上传之后的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    NotFound,
    /// 服务端返回了未知的状态字符串
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::NotFound)
    }
}

/// 后端处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Loading,
    ExtractingAudio,
    Transcribing,
    SamplingFrames,
    EncodingFrames,
    EncodingText,
    DetectingEvents,
    BuildingIndex,
    Completed,
    Unknown,
}

impl ProcessingStage {
    /// 从服务端的阶段名解析，未知名称返回 `Unknown`
    pub fn from_wire(name: &str) -> Self {
        match name {
            "loading" => ProcessingStage::Loading,
            "extracting_audio" => ProcessingStage::ExtractingAudio,
            "transcribing" => ProcessingStage::Transcribing,
            "sampling_frames" => ProcessingStage::SamplingFrames,
            "encoding_frames" => ProcessingStage::EncodingFrames,
            "encoding_text" => ProcessingStage::EncodingText,
            "detecting_events" => ProcessingStage::DetectingEvents,
            "building_index" => ProcessingStage::BuildingIndex,
            "completed" => ProcessingStage::Completed,
            _ => ProcessingStage::Unknown,
        }
    }

    /// 展示用名称
    pub fn label(self) -> &'static str {
        match self {
            ProcessingStage::Loading => "Loading Video",
            ProcessingStage::ExtractingAudio => "Extracting Audio",
            ProcessingStage::Transcribing => "Transcribing",
            ProcessingStage::SamplingFrames => "Sampling Frames",
            ProcessingStage::EncodingFrames => "Encoding Frames",
            ProcessingStage::EncodingText => "Encoding Text",
            ProcessingStage::DetectingEvents => "Detecting Events",
            ProcessingStage::BuildingIndex => "Building Index",
            ProcessingStage::Completed => "Complete",
            ProcessingStage::Unknown => "Processing",
        }
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// `GET /api/status/{job_id}` 的响应体
///
/// 字段解析宽松：`progress` 非数字、`stage` 非字符串时不会导致整个响应解析失败。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, deserialize_with = "lenient_stage")]
    pub stage: Option<ProcessingStage>,
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn lenient_progress<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()).filter(|p| p.is_finite()))
}

fn lenient_stage<'de, D>(deserializer: D) -> Result<Option<ProcessingStage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(ProcessingStage::from_wire))
}

/// 一个处理任务的最新快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub stage: ProcessingStage,
    /// 0.0 - 1.0
    pub progress: f64,
    pub message: String,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            stage: ProcessingStage::Unknown,
            progress: 0.0,
            message: String::new(),
            error: None,
        }
    }

    /// 用一次状态查询的结果更新快照
    pub fn apply(&mut self, payload: &StatusPayload) {
        self.status = match payload.status {
            JobStatus::Pending | JobStatus::Unknown => JobStatus::Processing,
            other => other,
        };
        self.stage = payload.stage.unwrap_or(ProcessingStage::Unknown);
        self.progress = payload.progress.unwrap_or(0.0).clamp(0.0, 1.0);
        self.message = payload.message.clone().unwrap_or_default();
        self.error = if self.status == JobStatus::Failed {
            payload.error.clone()
        } else {
            None
        };
    }

    /// 服务端不再认识该任务
    pub fn mark_not_found(&mut self) {
        self.status = JobStatus::NotFound;
    }
}
