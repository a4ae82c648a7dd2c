//! 媒体预览资源
//!
//! 上传期间用于本地播放的资源，替换前必须显式释放。

use std::path::PathBuf;

use tracing::debug;

/// 需要显式释放的预览资源
pub trait MediaPreview: Send + Sync {
    /// 预览来源描述（用于日志）
    fn source(&self) -> String;

    /// 释放资源；多次调用必须无副作用
    fn release(&mut self);
}

/// 指向本地文件的预览
#[derive(Debug)]
pub struct FilePreview {
    path: PathBuf,
    released: bool,
}

impl FilePreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }
}

impl MediaPreview for FilePreview {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    fn release(&mut self) {
        if !self.released {
            debug!("释放预览资源: {}", self.path.display());
            self.released = true;
        }
    }
}
