/// 视频分析后端 API 客户端
///
/// 封装所有与后端 REST 接口相关的调用逻辑
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult, NetworkError, ProtocolError};
use crate::infrastructure::{FetchGateway, GatewayError};
use crate::models::{
    ErrorPayload, ExportFormat, ExportPayload, ResultsPayload, SearchPayload, SearchRequest,
    ServerConfig, StatusPayload, UploadPayload, VideoUpload,
};

/// 一次状态查询的结果
#[derive(Debug, Clone)]
pub enum StatusReply {
    /// 2xx，带进度信息
    Progress(StatusPayload),
    /// 404，服务端已不认识该任务
    NotFound,
    /// 其他非 2xx 状态码，可能是暂时性的
    Unavailable { status: u16 },
}

/// 后端接口抽象，便于在测试中替换为内存实现
#[async_trait]
pub trait JobApi: Send + Sync {
    /// 上传视频，返回新任务 id
    async fn upload(
        &self,
        upload: &VideoUpload,
        cancel: &CancellationToken,
    ) -> AppResult<UploadPayload>;

    /// 查询任务状态
    async fn status(&self, job_id: &str, cancel: &CancellationToken) -> AppResult<StatusReply>;

    /// 拉取处理结果
    async fn results(&self, job_id: &str, cancel: &CancellationToken)
        -> AppResult<ResultsPayload>;

    /// 搜索转录与画面
    async fn search(&self, job_id: &str, request: &SearchRequest) -> AppResult<SearchPayload>;

    /// 服务端导出
    async fn export(&self, job_id: &str, format: ExportFormat) -> AppResult<ExportPayload>;

    /// 读取服务端功能开关
    async fn server_config(&self) -> AppResult<ServerConfig>;

    /// 通知服务端释放任务
    async fn delete_job(&self, job_id: &str) -> AppResult<()>;
}

/// 基于 HTTP 的后端客户端
pub struct LectureClient {
    base_url: String,
    gateway: FetchGateway,
}

struct RawResponse {
    status: StatusCode,
    body: String,
}

impl LectureClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            gateway: FetchGateway::new(config.fetch_timeout())?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发送请求并在截止时间内读完响应体
    async fn fetch(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<RawResponse> {
        debug!("请求后端接口: {}", endpoint);

        let call = async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        let raw = self
            .gateway
            .execute(call, cancel)
            .await
            .map_err(|e| match e {
                GatewayError::Aborted => NetworkError::Aborted {
                    endpoint: endpoint.to_string(),
                },
                GatewayError::Connection(source) => NetworkError::RequestFailed {
                    endpoint: endpoint.to_string(),
                    source,
                },
            })?;

        debug!("接口 {} 返回 {}", endpoint, raw.status);
        Ok(raw)
    }
}

#[async_trait]
impl JobApi for LectureClient {
    async fn upload(
        &self,
        upload: &VideoUpload,
        cancel: &CancellationToken,
    ) -> AppResult<UploadPayload> {
        let endpoint = "/api/upload";
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.content_type)
            .map_err(|source| NetworkError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let form = Form::new().part("file", part);
        let request = self.gateway.client().post(self.url(endpoint)).multipart(form);

        let raw = self.fetch(endpoint, request, Some(cancel)).await?;
        let body = ensure_success(endpoint, raw)?;
        parse_json(endpoint, &body)
    }

    async fn status(&self, job_id: &str, cancel: &CancellationToken) -> AppResult<StatusReply> {
        let endpoint = format!("/api/status/{}", job_id);
        let request = self.gateway.client().get(self.url(&endpoint));
        let raw = self.fetch(&endpoint, request, Some(cancel)).await?;
        interpret_status(&endpoint, raw.status.as_u16(), &raw.body)
    }

    async fn results(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<ResultsPayload> {
        let endpoint = format!("/api/results/{}", job_id);
        let request = self.gateway.client().get(self.url(&endpoint));
        let raw = self.fetch(&endpoint, request, Some(cancel)).await?;
        if raw.status == StatusCode::NOT_FOUND {
            return Err(ProtocolError::JobNotFound {
                job_id: job_id.to_string(),
            }
            .into());
        }
        let body = ensure_success(&endpoint, raw)?;
        parse_json(&endpoint, &body)
    }

    async fn search(&self, job_id: &str, request: &SearchRequest) -> AppResult<SearchPayload> {
        let endpoint = format!("/api/search/{}", job_id);
        let builder = self.gateway.client().post(self.url(&endpoint)).json(request);
        let raw = self.fetch(&endpoint, builder, None).await?;
        if raw.status == StatusCode::NOT_FOUND {
            return Err(ProtocolError::JobNotFound {
                job_id: job_id.to_string(),
            }
            .into());
        }
        let body = ensure_success(&endpoint, raw)?;
        parse_json(&endpoint, &body)
    }

    async fn export(&self, job_id: &str, format: ExportFormat) -> AppResult<ExportPayload> {
        let endpoint = format!("/api/export/{}/{}", job_id, format.as_str());
        let request = self.gateway.client().get(self.url(&endpoint));
        let raw = self.fetch(&endpoint, request, None).await?;
        let body = ensure_success(&endpoint, raw)?;
        parse_json(&endpoint, &body)
    }

    async fn server_config(&self) -> AppResult<ServerConfig> {
        let endpoint = "/api/config";
        let request = self.gateway.client().get(self.url(endpoint));
        let raw = self.fetch(endpoint, request, None).await?;
        let body = ensure_success(endpoint, raw)?;
        parse_json(endpoint, &body)
    }

    async fn delete_job(&self, job_id: &str) -> AppResult<()> {
        let endpoint = format!("/api/job/{}", job_id);
        let request = self.gateway.client().delete(self.url(&endpoint));
        let raw = self.fetch(&endpoint, request, None).await?;
        ensure_success(&endpoint, raw)?;
        Ok(())
    }
}

// ========== 响应解析 ==========

/// 将状态接口的 HTTP 响应映射为 [`StatusReply`]
pub fn interpret_status(endpoint: &str, status: u16, body: &str) -> AppResult<StatusReply> {
    match status {
        404 => Ok(StatusReply::NotFound),
        200..=299 => Ok(StatusReply::Progress(parse_json(endpoint, body)?)),
        other => Ok(StatusReply::Unavailable { status: other }),
    }
}

fn ensure_success(endpoint: &str, raw: RawResponse) -> AppResult<String> {
    if raw.status.is_success() {
        return Ok(raw.body);
    }
    let detail = serde_json::from_str::<ErrorPayload>(&raw.body)
        .ok()
        .and_then(ErrorPayload::into_message);
    Err(ProtocolError::BadResponse {
        endpoint: endpoint.to_string(),
        status: raw.status.as_u16(),
        detail,
    }
    .into())
}

fn parse_json<T: DeserializeOwned>(endpoint: &str, body: &str) -> AppResult<T> {
    serde_json::from_str(body).map_err(|source| {
        AppError::from(ProtocolError::MalformedPayload {
            endpoint: endpoint.to_string(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[test]
    fn test_interpret_status_codes() {
        let reply = interpret_status(
            "/api/status/abc",
            200,
            r#"{"status":"processing","stage":"transcribing","progress":0.4,"message":"Transcribing audio"}"#,
        )
        .unwrap();
        match reply {
            StatusReply::Progress(payload) => {
                assert_eq!(payload.status, JobStatus::Processing);
                assert_eq!(payload.progress, Some(0.4));
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        assert!(matches!(
            interpret_status("/api/status/abc", 404, r#"{"detail":"Job not found"}"#).unwrap(),
            StatusReply::NotFound
        ));
        assert!(matches!(
            interpret_status("/api/status/abc", 502, "Bad Gateway").unwrap(),
            StatusReply::Unavailable { status: 502 }
        ));
    }

    #[test]
    fn test_malformed_success_body_is_protocol_error() {
        let err = interpret_status("/api/status/abc", 200, "<html>").unwrap_err();
        assert!(matches!(
            err,
            AppError::Protocol(ProtocolError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_ensure_success_extracts_detail() {
        let raw = RawResponse {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"detail":"Invalid file type"}"#.to_string(),
        };
        let err = ensure_success("/api/upload", raw).unwrap_err();
        assert_eq!(err.user_message(), "Invalid file type");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = Config {
            api_base_url: "http://localhost:8000/".to_string(),
            ..Config::default()
        };
        let client = LectureClient::new(&config).unwrap();
        assert_eq!(client.url("/api/config"), "http://localhost:8000/api/config");
    }

    /// 需要本地运行后端：cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_server_config() {
        let _ = tracing_subscriber::fmt::try_init();
        let client = LectureClient::new(&Config::from_env()).unwrap();
        let config = client.server_config().await.unwrap();
        println!("demo_mode = {}", config.demo_mode);
    }
}
