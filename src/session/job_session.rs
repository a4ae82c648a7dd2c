//! 会话上下文
//!
//! 保存当前任务 id、轮询取消令牌、上传代次、结果缓存与预览资源。
//! 所有异步回调在生效前都要通过 [`JobSession::is_active`] 检查自己是否仍属于当前任务；
//! 需要"检查后修改"的地方使用 `*_if_current` 系列方法，检查与修改在同一次加锁内完成。
//! 这些方法的回调在持锁期间执行，回调里不能再访问会话。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::preview::MediaPreview;
use super::result_cache::ResultCache;
use crate::models::ProcessingResult;

/// 一次上传的身份凭据
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

struct PreviewSlot {
    /// `None` 表示尚未绑定任务（上传进行中）
    owner: Option<String>,
    preview: Box<dyn MediaPreview>,
}

struct SessionState {
    current_job: Option<String>,
    job_token: CancellationToken,
    upload_generation: u64,
    upload_token: CancellationToken,
    results: ResultCache,
    preview: Option<PreviewSlot>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            current_job: None,
            job_token: CancellationToken::new(),
            upload_generation: 0,
            upload_token: CancellationToken::new(),
            results: ResultCache::default(),
            preview: None,
        }
    }

    fn release_preview(&mut self) {
        if let Some(mut slot) = self.preview.take() {
            slot.preview.release();
        }
    }

    fn stop_polling(&mut self) {
        self.job_token.cancel();
        self.job_token = CancellationToken::new();
    }

    fn start_job(&mut self, job_id: &str) -> CancellationToken {
        self.stop_polling();
        self.current_job = Some(job_id.to_string());
        self.results.clear();

        let foreign_preview = match self.preview.as_mut() {
            Some(slot) if slot.owner.is_none() => {
                slot.owner = Some(job_id.to_string());
                false
            }
            Some(slot) => slot.owner.as_deref() != Some(job_id),
            None => false,
        };
        if foreign_preview {
            self.release_preview();
        }

        info!("✓ 当前任务切换为 {}", job_id);
        self.job_token.clone()
    }

    fn reset(&mut self) -> Option<String> {
        self.stop_polling();
        self.upload_token.cancel();
        self.upload_token = CancellationToken::new();
        self.upload_generation += 1;
        self.results.clear();
        self.release_preview();
        self.current_job.take()
    }
}

/// 可克隆的会话句柄
#[derive(Clone)]
pub struct JobSession {
    state: Arc<RwLock<SessionState>>,
}

impl Default for JobSession {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::new())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ========== 上传 ==========

    /// 开始新的上传：作废旧上传与旧任务，返回新的上传凭据
    pub fn begin_upload(&self) -> UploadTicket {
        let mut state = self.write();
        state.upload_token.cancel();
        state.upload_token = CancellationToken::new();
        state.upload_generation += 1;
        state.stop_polling();
        if let Some(job_id) = state.current_job.take() {
            debug!("新上传开始，放弃任务 {}", job_id);
        }
        state.results.clear();
        state.release_preview();

        UploadTicket {
            generation: state.upload_generation,
            token: state.upload_token.clone(),
        }
    }

    /// 取消正在进行的上传（不影响已开始的任务）
    pub fn cancel_upload(&self) {
        let mut state = self.write();
        state.upload_token.cancel();
        state.upload_generation += 1;
        state.upload_token = CancellationToken::new();
        if state.preview.as_ref().is_some_and(|slot| slot.owner.is_none()) {
            state.release_preview();
        }
    }

    /// 挂上预览资源；替换前会释放旧资源
    pub fn attach_preview(&self, preview: Box<dyn MediaPreview>) {
        let mut state = self.write();
        state.release_preview();
        debug!("挂载预览资源: {}", preview.source());
        let owner = state.current_job.clone();
        state.preview = Some(PreviewSlot { owner, preview });
    }

    pub fn has_preview(&self) -> bool {
        self.read().preview.is_some()
    }

    // ========== 任务 ==========

    /// 切换到新任务，返回该任务专属的轮询取消令牌
    pub fn start_job(&self, job_id: &str) -> CancellationToken {
        self.write().start_job(job_id)
    }

    /// 仅当 `generation` 仍是最新上传时切换到新任务
    ///
    /// 判断、切换与 `on_started` 在同一次加锁内完成。
    pub fn start_job_if_upload_current(
        &self,
        generation: u64,
        job_id: &str,
        on_started: impl FnOnce(),
    ) -> Option<CancellationToken> {
        let mut state = self.write();
        if state.upload_generation != generation {
            return None;
        }
        let token = state.start_job(job_id);
        on_started();
        Some(token)
    }

    pub fn current_id(&self) -> Option<String> {
        self.read().current_job.clone()
    }

    /// 该 id 是否仍是当前任务
    pub fn is_active(&self, job_id: &str) -> bool {
        self.read().current_job.as_deref() == Some(job_id)
    }

    /// 当前任务的取消令牌
    pub fn polling_token(&self) -> CancellationToken {
        self.read().job_token.clone()
    }

    /// 回到空闲状态：停止轮询、清空任务与结果、释放预览
    pub fn reset(&self) -> Option<String> {
        self.write().reset()
    }

    /// 仅当 `job_id` 仍是当前任务时重置，`on_reset` 在同一次加锁内执行
    pub fn reset_if_current(&self, job_id: &str, on_reset: impl FnOnce()) -> bool {
        let mut state = self.write();
        if state.current_job.as_deref() != Some(job_id) {
            return false;
        }
        state.reset();
        on_reset();
        true
    }

    /// 仅当 `generation` 仍是最新上传时重置，`on_reset` 在同一次加锁内执行
    pub fn reset_if_upload_current(&self, generation: u64, on_reset: impl FnOnce()) -> bool {
        let mut state = self.write();
        if state.upload_generation != generation {
            return false;
        }
        state.reset();
        on_reset();
        true
    }

    // ========== 结果 ==========

    /// 仅在 `job_id` 仍是当前任务时缓存结果，`on_cached` 在同一次加锁内执行
    pub fn cache_result(
        &self,
        job_id: &str,
        result: ProcessingResult,
        on_cached: impl FnOnce(&Arc<ProcessingResult>),
    ) -> Option<Arc<ProcessingResult>> {
        let mut state = self.write();
        if state.current_job.as_deref() != Some(job_id) {
            return None;
        }
        let result = state.results.store(job_id, result);
        on_cached(&result);
        Some(result)
    }

    /// 当前任务的已缓存结果
    pub fn current_result(&self) -> Option<Arc<ProcessingResult>> {
        let state = self.read();
        let job_id = state.current_job.as_deref()?;
        state.results.get(job_id)
    }
}
