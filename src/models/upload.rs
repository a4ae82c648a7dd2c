use std::path::Path;

use crate::error::{AppResult, ValidationError};

/// 支持的视频格式：(扩展名, MIME)
pub const SUPPORTED_VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("avi", "video/avi"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
];

/// 校验文件名与大小，返回对应的 MIME 类型
///
/// 校验失败时不会发出任何网络请求。
pub fn validate_video(
    file_name: &str,
    size: u64,
    max_size: u64,
) -> Result<&'static str, ValidationError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let mime = extension
        .as_deref()
        .and_then(|ext| {
            SUPPORTED_VIDEO_TYPES
                .iter()
                .find(|(candidate, _)| *candidate == ext)
        })
        .map(|(_, mime)| *mime)
        .ok_or_else(|| ValidationError::UnsupportedFileType {
            file_name: file_name.to_string(),
        })?;

    if size > max_size {
        return Err(ValidationError::FileTooLarge {
            size,
            limit: max_size,
        });
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile {
            file_name: file_name.to_string(),
        });
    }
    Ok(mime)
}

/// 待上传的视频文件
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl VideoUpload {
    /// 从内存数据构造并校验
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        max_size: u64,
    ) -> Result<Self, ValidationError> {
        let file_name = file_name.into();
        let content_type = validate_video(&file_name, bytes.len() as u64, max_size)?;
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// 从磁盘读取；先按元数据校验大小，再读取内容
    pub async fn from_path(path: &Path, max_size: u64) -> AppResult<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = tokio::fs::metadata(path).await?.len();
        validate_video(&file_name, size, max_size)?;

        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes, max_size)?)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
