use thiserror::Error;

/// 应用程序错误类型
///
/// 按处理方式分为五类：校验、网络、协议、存储、配置。
#[derive(Debug, Error)]
pub enum AppError {
    /// 校验错误（在发出任何网络请求之前拒绝）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 网络 / 超时错误
    #[error("网络错误: {0}")]
    Network(#[from] NetworkError),
    /// 协议错误（任务丢失、处理失败、异常响应）
    #[error("协议错误: {0}")]
    Protocol(#[from] ProtocolError),
    /// 本地持久化错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件读写错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("不支持的文件类型: {file_name}")]
    UnsupportedFileType { file_name: String },
    #[error("文件过大: {size} 字节 (上限 {limit} 字节)")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("文件为空: {file_name}")]
    EmptyFile { file_name: String },
    #[error("搜索关键词为空")]
    EmptyQuery,
    #[error("搜索关键词过长: {len} 字符 (上限 {max})")]
    QueryTooLong { len: usize, max: usize },
    #[error("top_k 超出范围: {value}")]
    InvalidTopK { value: usize },
    #[error("当前没有进行中的任务")]
    NoActiveJob,
    #[error("处理结果尚未就绪")]
    ResultsNotReady,
    #[error("笔记内容为空")]
    EmptyNoteContent,
    #[error("无效的时间戳: {value}")]
    InvalidTimestamp { value: String },
    #[error("未知的导出格式: {value}")]
    UnknownExportFormat { value: String },
    #[error("转录内容不足以生成{tool}")]
    NotEnoughContent { tool: &'static str },
}

/// 网络错误
#[derive(Debug, Error)]
pub enum NetworkError {
    /// 请求被中止（超时或调用方取消，两者在此处无法区分）
    #[error("请求已中止 ({endpoint})")]
    Aborted { endpoint: String },
    /// 连接失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// 协议错误
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("任务不存在: {job_id}")]
    JobNotFound { job_id: String },
    #[error("服务端返回错误响应 ({endpoint}): status={status}, detail={detail:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    #[error("响应解析失败 ({endpoint}): {source}")]
    MalformedPayload {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("任务 {job_id} 的处理结果不可用")]
    ResultsUnavailable { job_id: String },
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("读写存储失败 ({key}): {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("存储空间不足 ({key}): 上限 {limit} 字节")]
    QuotaExceeded { key: String, limit: usize },
    #[error("非法的存储键: {key}")]
    InvalidKey { key: String },
    #[error("序列化失败 ({key}): {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件失败 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} 无效: {value}")]
    Invalid { field: &'static str, value: String },
    #[error("创建 HTTP 客户端失败: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Protocol(ProtocolError::MalformedPayload {
            endpoint: String::new(),
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::Parse {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷方法 ==========

impl AppError {
    /// 是否为可在下一次轮询时自动恢复的错误
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::Protocol(ProtocolError::BadResponse { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    /// 是否为请求中止（超时或取消）
    pub fn is_aborted(&self) -> bool {
        matches!(self, AppError::Network(NetworkError::Aborted { .. }))
    }

    /// 面向用户的提示文本
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.user_message(),
            AppError::Network(NetworkError::Aborted { .. }) => {
                "The request timed out or was cancelled".to_string()
            }
            AppError::Network(NetworkError::RequestFailed { .. }) => {
                "Could not reach the server".to_string()
            }
            AppError::Protocol(ProtocolError::JobNotFound { .. }) => {
                "The processing job was lost. This can happen if the server restarted. Please upload again.".to_string()
            }
            AppError::Protocol(ProtocolError::BadResponse { status, detail, .. }) => detail
                .clone()
                .unwrap_or_else(|| format!("Request failed (HTTP {})", status)),
            AppError::Protocol(ProtocolError::MalformedPayload { .. }) => {
                "Unexpected response from server".to_string()
            }
            AppError::Protocol(ProtocolError::ResultsUnavailable { .. }) => {
                "Results not available".to_string()
            }
            AppError::Storage(_) => "Local storage is unavailable".to_string(),
            AppError::Config(e) => e.to_string(),
            AppError::Io(e) => e.to_string(),
        }
    }
}

impl ValidationError {
    /// 提示标题
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedFileType { .. } | ValidationError::EmptyFile { .. } => {
                "Invalid File"
            }
            ValidationError::FileTooLarge { .. } => "File Too Large",
            ValidationError::NoActiveJob => "No Video",
            ValidationError::ResultsNotReady => "No Content",
            ValidationError::NotEnoughContent { tool: "quiz" } => "Cannot Generate Quiz",
            ValidationError::NotEnoughContent { .. } => "Cannot Create Flashcards",
            ValidationError::EmptyNoteContent => "Empty Note",
            _ => "Invalid Input",
        }
    }

    /// 提示文本
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::UnsupportedFileType { .. } => {
                "Please upload a valid video file (MP4, WebM, AVI, MOV, MKV)".to_string()
            }
            ValidationError::FileTooLarge { limit, .. } => {
                format!("Maximum file size is {}MB", limit / (1024 * 1024))
            }
            ValidationError::EmptyFile { .. } => "The selected file is empty".to_string(),
            ValidationError::EmptyQuery => "Type to search transcript".to_string(),
            ValidationError::QueryTooLong { max, .. } => {
                format!("Search query must be at most {} characters", max)
            }
            ValidationError::InvalidTopK { .. } => "Result count must be between 1 and 20".to_string(),
            ValidationError::NoActiveJob => "Please upload and process a video first".to_string(),
            ValidationError::ResultsNotReady => {
                "Process a video first to generate study notes".to_string()
            }
            ValidationError::EmptyNoteContent => "Please write something before saving".to_string(),
            ValidationError::InvalidTimestamp { value } => {
                format!("Could not read timestamp '{}'", value)
            }
            ValidationError::UnknownExportFormat { value } => {
                format!("Unknown export format '{}'", value)
            }
            ValidationError::NotEnoughContent { .. } => "Not enough content in transcript".to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
