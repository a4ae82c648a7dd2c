use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 搜索关键词最大长度
pub const MAX_QUERY_LEN: usize = 500;

/// `POST /api/upload` 成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// 服务端错误响应（`{detail}` 或 `{error, detail}`）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorPayload {
    pub fn into_message(self) -> Option<String> {
        self.detail.or(self.error)
    }
}

/// `POST /api/search/{job_id}` 请求体
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
}

impl SearchRequest {
    /// 校验并构造搜索请求，关键词会去掉首尾空白
    pub fn new(query: &str, top_k: usize) -> Result<Self, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        let len = query.chars().count();
        if len > MAX_QUERY_LEN {
            return Err(ValidationError::QueryTooLong {
                len,
                max: MAX_QUERY_LEN,
            });
        }
        if !(1..=20).contains(&top_k) {
            return Err(ValidationError::InvalidTopK { value: top_k });
        }
        Ok(Self {
            query: query.to_string(),
            top_k,
        })
    }
}

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub text: String,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    #[serde(default)]
    pub score: Option<f64>,
    /// "visual" 或 "transcript"
    pub result_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResultItem>,
    #[serde(default)]
    pub total: Option<usize>,
}

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
    Srt,
    /// 本地生成的学习笔记，不经过服务端
    StudyNotes,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "markdown",
            ExportFormat::Json => "json",
            ExportFormat::Srt => "srt",
            ExportFormat::StudyNotes => "study-notes",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            "srt" => Ok(ExportFormat::Srt),
            "study-notes" | "study_notes" => Ok(ExportFormat::StudyNotes),
            _ => Err(ValidationError::UnknownExportFormat {
                value: value.to_string(),
            }),
        }
    }

    /// 是否需要请求服务端
    pub fn is_remote(self) -> bool {
        !matches!(self, ExportFormat::StudyNotes)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `GET /api/export/{job_id}/{format}` 响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(default)]
    pub format: Option<String>,
    pub content: String,
    pub filename: String,
}

/// `GET /api/config` 响应体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default)]
    pub local_setup_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_trims_and_validates() {
        let request = SearchRequest::new("  gradient descent  ", 5).unwrap();
        assert_eq!(request.query, "gradient descent");

        assert!(matches!(
            SearchRequest::new("   ", 5),
            Err(ValidationError::EmptyQuery)
        ));
        assert!(matches!(
            SearchRequest::new("x", 21),
            Err(ValidationError::InvalidTopK { value: 21 })
        ));
        let long = "a".repeat(MAX_QUERY_LEN + 1);
        assert!(matches!(
            SearchRequest::new(&long, 5),
            Err(ValidationError::QueryTooLong { .. })
        ));
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse("SRT").unwrap(), ExportFormat::Srt);
        assert_eq!(
            ExportFormat::parse("study-notes").unwrap(),
            ExportFormat::StudyNotes
        );
        assert!(!ExportFormat::StudyNotes.is_remote());
        assert!(ExportFormat::parse("pdf").is_err());
    }
}
