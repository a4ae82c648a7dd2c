//! 控制器 - 编排层
//!
//! ## 职责
//!
//! 串联会话、后端接口、轮询引擎、标注存储和 UI 事件通道，
//! 是唯一会 spawn 后台任务的模块。
//!
//! ## 核心流程
//!
//! 1. **上传**：校验 → 作废旧任务 → 上传 → 切换当前任务 → 启动轮询
//! 2. **轮询收尾**：完成时只拉取一次结果；失败 / 丢失时提示并重置
//! 3. **结果之后**：搜索、导出、标注、学习工具
//!
//! 所有异步回调在生效前都会确认自己仍属于当前任务。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::{JobApi, LectureClient};
use crate::config::Config;
use crate::error::{AppError, AppResult, NetworkError, ProtocolError, ValidationError};
use crate::infrastructure::KeyValueStore;
use crate::models::{
    Bookmark, BookmarkType, ConfusionMarker, ExportFormat, ExportPayload, Note,
    ProcessingResult, SearchRequest, ServerConfig, Theme, VideoUpload,
};
use crate::services::{
    generate_flashcards, generate_questions, render_study_notes, study_notes_filename,
    AnnotationStore, FlashcardDeck, Quiz,
};
use crate::session::{JobSession, MediaPreview};
use crate::utils::logging::log_job_summary;
use crate::utils::{format_duration, format_duration_full, parse_timestamp};
use crate::view::{
    AnnotationsView, Notification, ProgressView, ResultsView, SearchHit, UiChannel, UiEvent,
};
use crate::workflow::{PollState, PollingEngine};

const JOB_LOST_MESSAGE: &str =
    "The processing job was lost. This can happen if the server restarted. Please upload again.";

struct Inner<A: JobApi + ?Sized> {
    api: Arc<A>,
    config: Config,
    session: JobSession,
    store: Mutex<AnnotationStore>,
    ui: UiChannel,
    poller: Mutex<Option<JoinHandle<PollState>>>,
}

/// 可克隆的控制器句柄
pub struct Controller<A: JobApi + ?Sized = LectureClient> {
    inner: Arc<Inner<A>>,
}

impl<A: JobApi + ?Sized> Clone for Controller<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: JobApi + ?Sized + 'static> Controller<A> {
    /// 创建控制器
    ///
    /// # 参数
    /// - `api`: 后端接口实现
    /// - `kv`: 标注持久化
    /// - `ui`: UI 事件发送端
    pub fn new(api: Arc<A>, kv: Arc<dyn KeyValueStore>, ui: UiChannel, config: Config) -> Self {
        let store = AnnotationStore::open(kv);
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                session: JobSession::new(),
                store: Mutex::new(store),
                ui,
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn session(&self) -> &JobSession {
        &self.inner.session
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn current_job(&self) -> Option<String> {
        self.inner.session.current_id()
    }

    pub fn current_result(&self) -> Option<Arc<ProcessingResult>> {
        self.inner.session.current_result()
    }

    fn ui(&self) -> &UiChannel {
        &self.inner.ui
    }

    fn store(&self) -> MutexGuard<'_, AnnotationStore> {
        self.inner.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_job(&self) -> Result<String, ValidationError> {
        self.inner
            .session
            .current_id()
            .ok_or(ValidationError::NoActiveJob)
    }

    fn require_result(&self) -> Result<(String, Arc<ProcessingResult>), ValidationError> {
        let job_id = self.require_job()?;
        let result = self
            .inner
            .session
            .current_result()
            .ok_or(ValidationError::ResultsNotReady)?;
        Ok((job_id, result))
    }

    /// 校验失败统一提示，返回原错误
    fn report<T>(&self, result: AppResult<T>, title: &str) -> AppResult<T> {
        if let Err(e) = &result {
            if !e.is_aborted() {
                self.ui().notify(Notification::from_error(e, title));
            }
        }
        result
    }

    // ========== 上传 ==========

    /// 从磁盘读取视频并上传
    pub async fn upload_file(&self, path: &Path) -> AppResult<String> {
        let upload = VideoUpload::from_path(path, self.inner.config.max_file_size).await;
        let upload = self.report(upload, "Upload Failed")?;
        self.upload(upload, None).await
    }

    /// 上传视频并开始轮询，返回新任务 id
    ///
    /// 新上传会立即作废旧任务的轮询、结果和预览。
    pub async fn upload(
        &self,
        upload: VideoUpload,
        preview: Option<Box<dyn MediaPreview>>,
    ) -> AppResult<String> {
        let session = &self.inner.session;
        let ticket = session.begin_upload();
        if let Some(preview) = preview {
            session.attach_preview(preview);
        }

        info!("📤 上传视频 {} ({} 字节)", upload.file_name, upload.size());
        self.ui().emit(UiEvent::ExportAvailable(false));
        self.ui().emit(UiEvent::Progress {
            job_id: None,
            view: ProgressView::uploading(),
        });

        let outcome = self.inner.api.upload(&upload, &ticket.token).await;
        let superseded = || -> AppError {
            NetworkError::Aborted {
                endpoint: "/api/upload".to_string(),
            }
            .into()
        };

        let payload = match outcome {
            Ok(payload) => payload,
            Err(e) => {
                let cancelled = e.is_aborted() && ticket.token.is_cancelled();
                let notification = if cancelled {
                    Notification::warning("Upload Cancelled", "The upload was cancelled")
                } else {
                    Notification::error("Upload Failed", e.user_message())
                };
                let ui = self.ui();
                let current = session.reset_if_upload_current(ticket.generation, || {
                    ui.notify(notification);
                    emit_reset(ui);
                });
                if current {
                    if !cancelled {
                        warn!("❌ 上传失败: {}", e);
                    }
                    return Err(e);
                }
                debug!("上传 {} 已被新的上传取代", upload.file_name);
                ui.notify(Notification::warning(
                    "Upload Cancelled",
                    "The upload was cancelled",
                ));
                return Err(superseded());
            }
        };

        let job_id = payload.job_id;
        let ui = self.ui();
        let started = session.start_job_if_upload_current(ticket.generation, &job_id, || {
            ui.notify(Notification::success(
                "Upload Complete",
                "Processing your video...",
            ));
        });
        let Some(token) = started else {
            debug!("上传 {} 已被新的上传取代，释放任务 {}", upload.file_name, job_id);
            self.release_remote_job(&job_id).await;
            return Err(superseded());
        };

        info!("✓ 上传完成，任务 id: {}", job_id);
        self.spawn_polling(&job_id, token);
        Ok(job_id)
    }

    /// 取消正在进行的上传
    pub fn cancel_upload(&self) {
        self.inner.session.cancel_upload();
    }

    // ========== 轮询 ==========

    fn spawn_polling(&self, job_id: &str, token: CancellationToken) {
        let engine = PollingEngine::new(
            Arc::clone(&self.inner.api),
            self.inner.session.clone(),
            self.inner.ui.clone(),
            job_id,
            token,
            self.inner.config.poll_interval(),
        );
        let controller = self.clone();
        let handle = tokio::spawn(async move { controller.follow_job(engine).await });

        let mut poller = self.inner.poller.lock().unwrap_or_else(|e| e.into_inner());
        *poller = Some(handle);
    }

    /// 运行轮询直到终止，并处理终止状态
    pub async fn follow_job(&self, mut engine: PollingEngine<A>) -> PollState {
        let state = engine.run().await;
        let job_id = engine.job_id().to_string();

        if !self.inner.session.is_active(&job_id) {
            debug!("任务 {} 已不是当前任务，忽略终止状态 {:?}", job_id, state);
            return PollState::Cancelled;
        }

        match &state {
            PollState::Completed => {
                if let Err(e) = self.load_results(&job_id).await {
                    debug!("任务 {} 结果加载未完成: {}", job_id, e);
                }
            }
            PollState::Failed { message } => {
                self.reset_job(
                    &job_id,
                    Notification::error("Processing Failed", message.clone()),
                );
            }
            PollState::Lost => {
                self.reset_job(
                    &job_id,
                    Notification::error("Job Not Found", JOB_LOST_MESSAGE),
                );
            }
            PollState::Cancelled | PollState::Idle | PollState::Polling => {}
        }
        state
    }

    /// 任务仍是当前任务时提示并重置
    fn reset_job(&self, job_id: &str, notification: Notification) {
        let ui = self.ui();
        let reset = self.inner.session.reset_if_current(job_id, || {
            ui.notify(notification);
            emit_reset(ui);
        });
        if !reset {
            debug!("任务 {} 已不是当前任务，跳过重置", job_id);
        }
    }

    /// 等待当前轮询任务结束
    pub async fn join_polling(&self) -> Option<PollState> {
        let handle = {
            let mut poller = self.inner.poller.lock().unwrap_or_else(|e| e.into_inner());
            poller.take()
        }?;
        match handle.await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("⚠️ 轮询任务异常退出: {}", e);
                None
            }
        }
    }

    // ========== 结果 ==========

    /// 拉取并缓存处理结果，成功后开放导出
    pub async fn load_results(&self, job_id: &str) -> AppResult<Arc<ProcessingResult>> {
        let session = &self.inner.session;
        let token = session.polling_token();
        let outcome = self.inner.api.results(job_id, &token).await;

        if !session.is_active(job_id) {
            return Err(NetworkError::Aborted {
                endpoint: format!("/api/results/{}", job_id),
            }
            .into());
        }

        let result = outcome.and_then(|payload| {
            payload.into_completed().ok_or_else(|| {
                AppError::from(ProtocolError::ResultsUnavailable {
                    job_id: job_id.to_string(),
                })
            })
        });
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!("❌ 任务 {} 结果加载失败: {}", job_id, e);
                self.ui().notify(Notification::error("Error", e.user_message()));
                return Err(e);
            }
        };

        let ui = self.ui();
        let cached = session.cache_result(job_id, result, |result| {
            let view = {
                let store = self.store();
                ResultsView::build(
                    job_id,
                    result,
                    self.build_annotations(&store, job_id),
                    |ts| store.is_confusing(job_id, ts),
                )
            };
            ui.emit(UiEvent::ResultsReady(Box::new(view)));
            ui.emit(UiEvent::ExportAvailable(true));
            ui.notify(Notification::success(
                "Processing Complete",
                "Your video is ready to explore",
            ));
        });
        let Some(result) = cached else {
            return Err(NetworkError::Aborted {
                endpoint: format!("/api/results/{}", job_id),
            }
            .into());
        };

        log_job_summary(job_id, &result);
        Ok(result)
    }

    /// 回到空闲状态
    pub fn reset(&self) {
        if let Some(job_id) = self.inner.session.reset() {
            debug!("重置任务 {}", job_id);
        }
        emit_reset(self.ui());
    }

    /// 重置并通知服务端释放任务（失败时忽略）
    pub async fn discard_job(&self) {
        let job_id = self.inner.session.current_id();
        self.reset();
        if let Some(job_id) = job_id {
            self.release_remote_job(&job_id).await;
        }
    }

    async fn release_remote_job(&self, job_id: &str) {
        if let Err(e) = self.inner.api.delete_job(job_id).await {
            debug!("释放任务 {} 失败: {}", job_id, e);
        }
    }

    // ========== 搜索与导出 ==========

    /// 在当前任务中搜索
    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        let prepared = self
            .require_job()
            .and_then(|job_id| {
                SearchRequest::new(query, self.inner.config.search_top_k).map(|r| (job_id, r))
            })
            .map_err(AppError::from);
        let (job_id, request) = self.report(prepared, "Search Failed")?;

        let payload = self.inner.api.search(&job_id, &request).await;
        if !self.inner.session.is_active(&job_id) {
            return Ok(Vec::new());
        }
        let payload = self.report(payload, "Search Failed")?;

        let hits: Vec<SearchHit> = payload
            .results
            .iter()
            .map(|item| SearchHit::build(item, &request.query))
            .collect();
        debug!("搜索 \"{}\" 命中 {} 条", request.query, hits.len());
        self.ui().emit(UiEvent::SearchResults {
            query: request.query.clone(),
            hits: hits.clone(),
        });
        Ok(hits)
    }

    /// 生成导出内容；学习笔记在本地生成，其余格式由服务端生成
    pub async fn export(&self, format: ExportFormat) -> AppResult<ExportPayload> {
        let (job_id, result) = self.report(self.require_result().map_err(AppError::from), "Export Failed")?;

        if !format.is_remote() {
            return Ok(ExportPayload {
                format: Some(format.as_str().to_string()),
                content: self.study_notes_for(&job_id, &result),
                filename: study_notes_filename(&result.metadata.filename),
            });
        }

        let payload = self.inner.api.export(&job_id, format).await;
        if !self.inner.session.is_active(&job_id) {
            debug!("任务 {} 已不是当前任务，丢弃 {} 导出", job_id, format);
            return Err(NetworkError::Aborted {
                endpoint: format!("/api/export/{}/{}", job_id, format.as_str()),
            }
            .into());
        }
        self.report(payload, "Export Failed")
    }

    /// 导出并写入 `export_dir`，返回文件路径
    pub async fn save_export(&self, format: ExportFormat) -> AppResult<PathBuf> {
        let payload = self.export(format).await?;
        let written = write_export(Path::new(&self.inner.config.export_dir), &payload).await;
        let path = self.report(written, "Export Failed")?;

        info!("💾 导出 {} -> {}", format, path.display());
        self.ui().notify(Notification::success(
            "Export Complete",
            format!("Downloaded {}", payload.filename),
        ));
        Ok(path)
    }

    /// 当前任务的学习笔记 Markdown
    pub fn study_notes(&self) -> AppResult<String> {
        let (job_id, result) = self.report(self.require_result().map_err(AppError::from), "Export Failed")?;
        Ok(self.study_notes_for(&job_id, &result))
    }

    fn study_notes_for(&self, job_id: &str, result: &ProcessingResult) -> String {
        let store = self.store();
        render_study_notes(
            result,
            &store.bookmarks_for(job_id),
            &store.markers_for(job_id),
            Local::now(),
        )
    }

    /// 探测服务端是否处于演示模式，失败时忽略
    pub async fn check_demo_mode(&self) -> Option<ServerConfig> {
        match self.inner.api.server_config().await {
            Ok(config) => {
                if config.demo_mode {
                    info!("ℹ️ 服务端处于演示模式");
                    self.ui().emit(UiEvent::DemoMode {
                        setup_url: config.local_setup_url.clone(),
                    });
                }
                Some(config)
            }
            Err(e) => {
                debug!("读取服务端配置失败: {}", e);
                None
            }
        }
    }

    // ========== 标注 ==========

    fn build_annotations(&self, store: &AnnotationStore, job_id: &str) -> AnnotationsView {
        AnnotationsView::build(
            job_id,
            &store.bookmarks_for(job_id),
            &store.markers_for(job_id),
            &store.notes_for(job_id),
            store.top_confusing(job_id, self.inner.config.top_confusing_limit),
        )
    }

    /// 当前任务的标注；没有任务时为空
    pub fn annotations_view(&self) -> AnnotationsView {
        match self.inner.session.current_id() {
            Some(job_id) => self.build_annotations(&self.store(), &job_id),
            None => AnnotationsView::default(),
        }
    }

    fn annotations_changed(&self) {
        if self.inner.session.current_id().is_some() {
            self.ui()
                .emit(UiEvent::AnnotationsChanged(self.annotations_view()));
        }
    }

    pub fn add_bookmark(
        &self,
        timestamp: f64,
        kind: BookmarkType,
        note: Option<String>,
    ) -> AppResult<Bookmark> {
        let added = self
            .require_job()
            .and_then(|job_id| self.store().add_bookmark(&job_id, timestamp, kind, note))
            .map_err(AppError::from);
        let bookmark = self.report(added, "Bookmark Failed")?;

        self.ui().notify(Notification::success(
            "Bookmark Added",
            format!(
                "{} {} at {}",
                kind.icon(),
                kind.label(),
                format_duration_full(timestamp)
            ),
        ));
        self.annotations_changed();
        Ok(bookmark)
    }

    /// 快捷键 1-4 添加对应类型的书签；其他按键返回 `None`
    pub fn add_bookmark_by_shortcut(&self, key: char, timestamp: f64) -> AppResult<Option<Bookmark>> {
        match BookmarkType::from_shortcut(key) {
            Some(kind) => self.add_bookmark(timestamp, kind, None).map(Some),
            None => Ok(None),
        }
    }

    pub fn delete_bookmark(&self, id: &str) -> bool {
        let removed = self.store().remove_bookmark(id);
        if removed {
            self.ui().notify(Notification::info(
                "Bookmark Removed",
                "The bookmark has been deleted",
            ));
            self.annotations_changed();
        }
        removed
    }

    /// 切换困惑投票，返回切换后的状态
    pub fn toggle_confusion(&self, timestamp: f64) -> AppResult<bool> {
        let toggled = self
            .require_job()
            .and_then(|job_id| self.store().toggle_vote(&job_id, timestamp))
            .map_err(AppError::from);
        let marked = self.report(toggled, "Invalid Input")?;

        let formatted = format_duration(timestamp);
        let notification = if marked {
            Notification::info(
                "Marked Confusing",
                format!("Moment at {} marked as confusing", formatted),
            )
        } else {
            Notification::info(
                "Vote Removed",
                format!("Confusion mark removed from {}", formatted),
            )
        };
        self.ui().notify(notification);
        self.annotations_changed();
        Ok(marked)
    }

    pub fn mark_confusion(&self, timestamp: f64, note: Option<String>) -> AppResult<ConfusionMarker> {
        let added = self
            .require_job()
            .and_then(|job_id| self.store().add_marker(&job_id, timestamp, note))
            .map_err(AppError::from);
        let marker = self.report(added, "Invalid Input")?;

        self.ui().notify(Notification::info(
            "Marked for Review",
            format!("Confusion marker at {}", format_duration_full(timestamp)),
        ));
        self.annotations_changed();
        Ok(marker)
    }

    pub fn delete_marker(&self, id: &str) -> bool {
        let removed = self.store().remove_marker(id);
        if removed {
            self.annotations_changed();
        }
        removed
    }

    /// 添加笔记；时间戳为 `m:ss` 或 `h:mm:ss`
    pub fn add_note(
        &self,
        timestamp: &str,
        content: &str,
        tags: BTreeSet<String>,
    ) -> AppResult<Note> {
        let added = self
            .require_job()
            .and_then(|job_id| {
                let seconds = parse_timestamp(timestamp)?;
                self.store().add_note(&job_id, seconds, timestamp, content, tags)
            })
            .map_err(AppError::from);
        let note = self.report(added, "Invalid Input")?;

        self.ui().notify(Notification::success(
            "Note Saved",
            format!("Note added at {}", timestamp.trim()),
        ));
        self.annotations_changed();
        Ok(note)
    }

    pub fn delete_note(&self, id: &str) -> bool {
        let removed = self.store().remove_note(id);
        if removed {
            self.ui()
                .notify(Notification::info("Note Deleted", "Your note has been removed"));
            self.annotations_changed();
        }
        removed
    }

    // ========== 主题 ==========

    pub fn theme(&self) -> Theme {
        self.store().theme()
    }

    pub fn toggle_theme(&self) -> Theme {
        self.store().toggle_theme()
    }

    // ========== 学习工具 ==========

    /// 从当前结果的转录生成测验
    pub fn generate_quiz<R: Rng + ?Sized>(&self, rng: &mut R) -> AppResult<Quiz> {
        let generated = self.require_result().and_then(|(_, result)| {
            let questions = generate_questions(&result.transcript, rng);
            if questions.is_empty() {
                Err(ValidationError::NotEnoughContent { tool: "quiz" })
            } else {
                Ok(Quiz::new(questions))
            }
        });
        let quiz = self.report(generated.map_err(AppError::from), "Quiz Failed")?;

        self.ui().notify(Notification::success(
            "Quiz Generated",
            format!("{} questions created", quiz.len()),
        ));
        Ok(quiz)
    }

    /// 从当前结果的转录生成闪卡
    pub fn create_flashcards(&self) -> AppResult<FlashcardDeck> {
        let generated = self.require_result().and_then(|(_, result)| {
            let cards = generate_flashcards(&result.transcript);
            if cards.is_empty() {
                Err(ValidationError::NotEnoughContent { tool: "flashcards" })
            } else {
                Ok(FlashcardDeck::new(cards))
            }
        });
        let deck = self.report(generated.map_err(AppError::from), "Flashcards Failed")?;

        self.ui().notify(Notification::success(
            "Flashcards Created",
            format!("{} cards ready", deck.len()),
        ));
        Ok(deck)
    }
}

fn emit_reset(ui: &UiChannel) {
    ui.emit(UiEvent::ExportAvailable(false));
    ui.emit(UiEvent::Reset);
}

/// 写入导出文件；服务端给出的文件名只取最后一段
async fn write_export(dir: &Path, payload: &ExportPayload) -> AppResult<PathBuf> {
    let file_name = Path::new(&payload.filename)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "export.txt".into());
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, payload.content.as_bytes()).await?;
    Ok(path)
}
