use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_FILE_ENV: &str = "LECTURE_MIND_CONFIG";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端服务地址
    pub api_base_url: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单次网络请求超时（秒）
    pub fetch_timeout_secs: u64,
    /// 上传文件大小上限（字节）
    pub max_file_size: u64,
    /// 搜索返回条数
    pub search_top_k: usize,
    /// "最困惑时刻"展示条数
    pub top_confusing_limit: usize,
    /// 本地标注存储目录
    pub storage_dir: String,
    /// 导出文件目录
    pub export_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 500,
            fetch_timeout_secs: 30,
            max_file_size: 100 * 1024 * 1024,
            search_top_k: 5,
            top_confusing_limit: 5,
            storage_dir: ".lecture_mind".to_string(),
            export_dir: "exports".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 加载配置：若设置了 `LECTURE_MIND_CONFIG` 则先读取 TOML 文件，再应用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(self.api_base_url),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.poll_interval_ms),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.fetch_timeout_secs),
            max_file_size: std::env::var("MAX_FILE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_file_size),
            search_top_k: std::env::var("SEARCH_TOP_K").ok().and_then(|v| v.parse().ok()).unwrap_or(self.search_top_k),
            top_confusing_limit: std::env::var("TOP_CONFUSING_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.top_confusing_limit),
            storage_dir: std::env::var("STORAGE_DIR").unwrap_or(self.storage_dir),
            export_dir: std::env::var("EXPORT_DIR").unwrap_or(self.export_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
        }
    }

    /// 检查取值范围
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                value: self.poll_interval_ms.to_string(),
            }
            .into());
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_secs",
                value: self.fetch_timeout_secs.to_string(),
            }
            .into());
        }
        if !(1..=20).contains(&self.search_top_k) {
            return Err(ConfigError::Invalid {
                field: "search_top_k",
                value: self.search_top_k.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_frontend_constants() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_base_url = \"http://lecture.local:9000\"\npoll_interval_ms = 250"
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://lecture.local:9000");
        assert_eq!(config.poll_interval_ms, 250);
        // 未出现的字段保持默认值
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_top_k_rejected() {
        let config = Config {
            search_top_k: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
