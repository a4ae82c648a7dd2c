//! 任务轮询 - 流程层
//!
//! 核心职责：按固定间隔查询一个任务的状态，直到进入终止状态
//!
//! 状态机：
//! - `Idle → Polling`
//! - `Polling → Polling`：暂时性错误（非 404 的非 2xx、网络错误、超时），只记录日志
//! - `Polling → Completed / Failed / Lost`：服务端报告完成、失败或 404
//! - `Polling → Cancelled`：任务已不是当前任务，或取消令牌已触发
//!
//! 每次请求前后都检查任务是否仍是当前任务，过期的响应直接丢弃。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::{JobApi, StatusReply};
use crate::models::{Job, JobStatus};
use crate::session::JobSession;
use crate::view::{ProgressView, UiChannel, UiEvent};

/// 服务端未给出失败原因时的提示
pub const DEFAULT_FAILURE_MESSAGE: &str = "An error occurred";

/// 轮询状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed { message: String },
    /// 服务端返回 404
    Lost,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Idle | PollState::Polling)
    }
}

/// 单个任务的轮询引擎，只对创建时的任务 id 有效
pub struct PollingEngine<A: JobApi + ?Sized> {
    api: Arc<A>,
    session: JobSession,
    ui: UiChannel,
    token: CancellationToken,
    interval: Duration,
    job: Job,
    state: PollState,
}

impl<A: JobApi + ?Sized> PollingEngine<A> {
    pub fn new(
        api: Arc<A>,
        session: JobSession,
        ui: UiChannel,
        job_id: &str,
        token: CancellationToken,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            session,
            ui,
            token,
            interval,
            job: Job::new(job_id),
            state: PollState::Idle,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    fn is_stale(&self) -> bool {
        self.token.is_cancelled() || !self.session.is_active(&self.job.id)
    }

    /// 执行一轮查询并返回新状态；已终止时不再发请求
    pub async fn tick(&mut self) -> &PollState {
        if self.state.is_terminal() {
            return &self.state;
        }
        self.state = PollState::Polling;

        if self.is_stale() {
            debug!("任务 {} 已不是当前任务，停止轮询", self.job.id);
            self.state = PollState::Cancelled;
            return &self.state;
        }

        let reply = self.api.status(&self.job.id, &self.token).await;

        if self.is_stale() {
            debug!("任务 {} 在请求期间被替换，丢弃响应", self.job.id);
            self.state = PollState::Cancelled;
            return &self.state;
        }

        match reply {
            Err(e) if e.is_aborted() => {
                debug!("任务 {} 状态请求被中止: {}", self.job.id, e);
            }
            Err(e) => {
                warn!("⚠️ 任务 {} 状态查询失败，继续轮询: {}", self.job.id, e);
            }
            Ok(StatusReply::Unavailable { status }) => {
                warn!("⚠️ 任务 {} 状态接口返回 {}，继续轮询", self.job.id, status);
            }
            Ok(StatusReply::NotFound) => {
                warn!("❌ 任务 {} 在服务端不存在", self.job.id);
                self.job.mark_not_found();
                self.state = PollState::Lost;
            }
            Ok(StatusReply::Progress(payload)) => {
                self.job.apply(&payload);
                let view = ProgressView::from_job(&self.job);
                debug!(
                    "任务 {} 进度: {} {}% - {}",
                    self.job.id, view.stage, view.percent, view.message
                );
                self.ui.emit(UiEvent::Progress {
                    job_id: Some(self.job.id.clone()),
                    view,
                });

                match self.job.status {
                    JobStatus::Completed => {
                        info!("✓ 任务 {} 处理完成", self.job.id);
                        self.state = PollState::Completed;
                    }
                    JobStatus::Failed => {
                        let message = self
                            .job
                            .error
                            .clone()
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                        warn!("❌ 任务 {} 处理失败: {}", self.job.id, message);
                        self.state = PollState::Failed { message };
                    }
                    _ => {}
                }
            }
        }

        &self.state
    }

    /// 按固定间隔驱动 [`tick`](Self::tick)，直到进入终止状态
    ///
    /// 第一次查询在一个间隔之后发出；前一轮处理完之前不会发出下一次请求。
    pub async fn run(&mut self) -> PollState {
        info!("🚀 开始轮询任务 {}", self.job.id);
        let token = self.token.clone();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let cancelled = tokio::select! {
                biased;
                _ = token.cancelled() => true,
                _ = ticker.tick() => false,
            };
            if cancelled {
                self.state = PollState::Cancelled;
                break;
            }
            if self.tick().await.is_terminal() {
                break;
            }
        }

        debug!("任务 {} 轮询结束: {:?}", self.job.id, self.state);
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{AppResult, NetworkError};
    use crate::models::{
        ExportFormat, ExportPayload, ResultsPayload, SearchPayload, SearchRequest, ServerConfig,
        StatusPayload, UploadPayload, VideoUpload,
    };

    /// 按脚本返回状态的假接口
    struct ScriptedApi {
        replies: Mutex<VecDeque<AppResult<StatusReply>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedApi {
        fn new(replies: Vec<AppResult<StatusReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobApi for ScriptedApi {
        async fn upload(&self, _: &VideoUpload, _: &CancellationToken) -> AppResult<UploadPayload> {
            unimplemented!()
        }

        async fn status(&self, _: &str, _: &CancellationToken) -> AppResult<StatusReply> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StatusReply::Unavailable { status: 503 }))
        }

        async fn results(&self, _: &str, _: &CancellationToken) -> AppResult<ResultsPayload> {
            unimplemented!()
        }

        async fn search(&self, _: &str, _: &SearchRequest) -> AppResult<SearchPayload> {
            unimplemented!()
        }

        async fn export(&self, _: &str, _: ExportFormat) -> AppResult<ExportPayload> {
            unimplemented!()
        }

        async fn server_config(&self) -> AppResult<ServerConfig> {
            unimplemented!()
        }

        async fn delete_job(&self, _: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn progress(raw: &str) -> AppResult<StatusReply> {
        let payload: StatusPayload = serde_json::from_str(raw).unwrap();
        Ok(StatusReply::Progress(payload))
    }

    fn engine(api: Arc<ScriptedApi>, session: &JobSession, job_id: &str) -> PollingEngine<ScriptedApi> {
        let token = session.start_job(job_id);
        let (ui, _rx) = UiChannel::new();
        PollingEngine::new(api, session.clone(), ui, job_id, token, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_transient_errors_keep_polling() {
        let api = ScriptedApi::new(vec![
            Ok(StatusReply::Unavailable { status: 502 }),
            Err(NetworkError::Aborted {
                endpoint: "/api/status/abc".into(),
            }
            .into()),
            progress(r#"{"status":"processing","progress":0.4}"#),
        ]);
        let session = JobSession::new();
        let mut engine = engine(api.clone(), &session, "abc");

        for _ in 0..3 {
            assert_eq!(engine.tick().await, &PollState::Polling);
        }
        assert_eq!(engine.job().progress, 0.4);
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let api = ScriptedApi::new(vec![Ok(StatusReply::NotFound)]);
        let session = JobSession::new();
        let mut engine = engine(api.clone(), &session, "abc");

        assert_eq!(engine.tick().await, &PollState::Lost);
        assert_eq!(engine.tick().await, &PollState::Lost);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_uses_fallback_message() {
        let api = ScriptedApi::new(vec![progress(r#"{"status":"failed"}"#)]);
        let session = JobSession::new();
        let mut engine = engine(api, &session, "abc");

        assert_eq!(
            engine.tick().await,
            &PollState::Failed {
                message: DEFAULT_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_stale_engine_does_not_request() {
        let api = ScriptedApi::new(vec![]);
        let session = JobSession::new();
        let mut engine = engine(api.clone(), &session, "abc");
        session.start_job("xyz");

        assert_eq!(engine.tick().await, &PollState::Cancelled);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_completed() {
        let api = ScriptedApi::new(vec![
            progress(r#"{"status":"pending"}"#),
            progress(r#"{"status":"processing","stage":"transcribing","progress":0.5}"#),
            progress(r#"{"status":"completed","stage":"completed","progress":1.0}"#),
        ]);
        let session = JobSession::new();
        let mut engine = engine(api.clone(), &session, "abc");

        let started = Instant::now();
        assert_eq!(engine.run().await, PollState::Completed);
        assert_eq!(api.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_job_replaced() {
        let api = ScriptedApi::new(vec![]);
        let session = JobSession::new();
        let mut engine = engine(api.clone(), &session, "abc");

        let replacer = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            replacer.start_job("xyz");
        });

        assert_eq!(engine.run().await, PollState::Cancelled);
        assert_eq!(api.calls(), 2);
    }
}
