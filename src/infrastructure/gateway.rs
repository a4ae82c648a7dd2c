//! 网络网关 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端，只负责给每次请求加上截止时间和取消能力，
//! 不解析状态码，也不认识任何业务接口。

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppResult, ConfigError};

/// 网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 超时或调用方取消；调用方需对照自己的取消令牌区分两者
    #[error("请求已中止")]
    Aborted,
    /// 传输层失败
    #[error("连接失败: {0}")]
    Connection(#[from] reqwest::Error),
}

/// 带超时与取消的请求网关
#[derive(Debug, Clone)]
pub struct FetchGateway {
    client: reqwest::Client,
    timeout: Duration,
}

impl FetchGateway {
    /// 创建网关
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self { client, timeout })
    }

    /// 底层客户端，用于构造请求
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 在截止时间内执行一次网络操作
    ///
    /// 超时和 `cancel` 触发任意一个都会丢弃 `call`（从而中止底层请求），
    /// 并返回 [`GatewayError::Aborted`]。
    pub async fn execute<F, T>(
        &self,
        call: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => {
                debug!("请求被调用方取消");
                Err(GatewayError::Aborted)
            }
            _ = tokio::time::sleep(self.timeout) => {
                debug!("请求超时 ({:?})", self.timeout);
                Err(GatewayError::Aborted)
            }
            result = call => result.map_err(GatewayError::Connection),
        }
    }
}

async fn wait_cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never<T>() -> impl Future<Output = Result<T, reqwest::Error>> {
        std::future::pending()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_call() {
        let gateway = FetchGateway::new(Duration::from_secs(30)).unwrap();
        let result = gateway.execute(never::<()>(), None).await;
        assert!(matches!(result, Err(GatewayError::Aborted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_token_aborts_call() {
        let gateway = FetchGateway::new(Duration::from_secs(30)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = gateway.execute(never::<()>(), Some(&token)).await;
        assert!(matches!(result, Err(GatewayError::Aborted)));
        // 调用方通过自己的令牌判断是否为主动取消
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_completed_call_passes_through() {
        let gateway = FetchGateway::new(Duration::from_secs(30)).unwrap();
        let result = gateway
            .execute(async { Ok::<_, reqwest::Error>(7) }, None)
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
