use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use lecture_mind_client::error::{AppError, AppResult, ValidationError};
use lecture_mind_client::models::{
    Bookmark, BookmarkType, ExportFormat, ExportPayload, ProcessingResult, ResultsPayload,
    SearchPayload, SearchRequest, ServerConfig, StatusPayload, UploadPayload, VideoUpload,
};
use lecture_mind_client::{
    Config, Controller, JobApi, KeyValueStore, MemoryStore, PollState, Severity, StatusReply,
    UiChannel, UiEvent,
};

// ========== 假后端 ==========

/// 一次性关卡：启用后，下一个经过的请求挂起直到被放行
#[derive(Default)]
struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[derive(Default)]
struct FakeApi {
    job_ids: Mutex<VecDeque<String>>,
    statuses: Mutex<HashMap<String, VecDeque<StatusReply>>>,
    /// 该任务的状态请求会挂起，直到 `gate` 被通知
    gated_job: Mutex<Option<String>>,
    gate: Notify,
    entered: Notify,
    result: Mutex<Option<ProcessingResult>>,
    upload_gate: Gate,
    export_gate: Gate,
    deleted: Mutex<Vec<String>>,
    upload_calls: AtomicUsize,
    status_calls: AtomicUsize,
    results_calls: AtomicUsize,
}

impl FakeApi {
    fn new(job_ids: &[&str]) -> Arc<Self> {
        let api = Self::default();
        *api.job_ids.lock().unwrap() = job_ids.iter().map(|s| s.to_string()).collect();
        *api.result.lock().unwrap() = Some(sample_result());
        Arc::new(api)
    }

    fn script(&self, job_id: &str, replies: Vec<StatusReply>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), replies.into());
    }

    fn gate_job(&self, job_id: &str) {
        *self.gated_job.lock().unwrap() = Some(job_id.to_string());
    }
}

#[async_trait]
impl JobApi for FakeApi {
    async fn upload(&self, _: &VideoUpload, _: &CancellationToken) -> AppResult<UploadPayload> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let job_id = self
            .job_ids
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted job id");
        self.upload_gate.pass().await;
        Ok(UploadPayload {
            job_id,
            message: Some("Video uploaded successfully".into()),
        })
    }

    async fn status(&self, job_id: &str, _: &CancellationToken) -> AppResult<StatusReply> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let gated = self.gated_job.lock().unwrap().as_deref() == Some(job_id);
        if gated {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        let reply = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(StatusReply::Unavailable { status: 503 });
        Ok(reply)
    }

    async fn results(&self, job_id: &str, _: &CancellationToken) -> AppResult<ResultsPayload> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResultsPayload {
            job_id: Some(job_id.to_string()),
            status: lecture_mind_client::models::JobStatus::Completed,
            result: self.result.lock().unwrap().clone(),
            error: None,
        })
    }

    async fn search(&self, _: &str, request: &SearchRequest) -> AppResult<SearchPayload> {
        Ok(serde_json::from_value(serde_json::json!({
            "query": request.query,
            "results": [{
                "text": "Gradient descent minimises the loss",
                "timestamp": 12.0,
                "timestamp_formatted": "0:12",
                "result_type": "transcript",
                "score": 0.91
            }],
            "total": 1
        }))?)
    }

    async fn export(&self, _: &str, format: ExportFormat) -> AppResult<ExportPayload> {
        self.export_gate.pass().await;
        Ok(ExportPayload {
            format: Some(format.as_str().to_string()),
            content: "exported".into(),
            filename: format!("lecture.{}", format.as_str()),
        })
    }

    async fn server_config(&self) -> AppResult<ServerConfig> {
        Ok(ServerConfig {
            demo_mode: true,
            local_setup_url: Some("https://example.invalid/setup".into()),
        })
    }

    async fn delete_job(&self, job_id: &str) -> AppResult<()> {
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

// ========== 工具函数 ==========

fn sample_result() -> ProcessingResult {
    serde_json::from_str(
        r#"{
            "metadata":{"filename":"lecture01.mp4","duration":600.0,"width":1280,"height":720,"fps":30.0},
            "events":[{"timestamp":12.0,"timestamp_formatted":"0:12","confidence":0.9}],
            "transcript":[
                {"text":"Today we will study gradient descent in detail. It minimises a loss function step by step.","start":0.0,"end":8.0,"start_formatted":"0:00","end_formatted":"0:08"}
            ],
            "processing_time":4.2
        }"#,
    )
    .unwrap()
}

fn progress(raw: &str) -> StatusReply {
    let payload: StatusPayload = serde_json::from_str(raw).unwrap();
    StatusReply::Progress(payload)
}

fn video() -> VideoUpload {
    VideoUpload::new("lecture01.mp4", vec![0u8; 1024], 100 * 1024 * 1024).unwrap()
}

fn setup(
    api: Arc<FakeApi>,
    kv: Arc<dyn KeyValueStore>,
) -> (Controller<FakeApi>, UnboundedReceiver<UiEvent>) {
    let (ui, rx) = UiChannel::new();
    let controller = Controller::new(api, kv, ui, Config::default());
    (controller, rx)
}

fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notification_titles(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Notify(n) => Some(n.title.clone()),
            _ => None,
        })
        .collect()
}

// ========== 轮询场景 ==========

#[tokio::test(start_paused = true)]
async fn test_lost_job_resets_and_stops_polling() {
    let api = FakeApi::new(&["abc"]);
    api.script(
        "abc",
        vec![
            progress(r#"{"status":"processing","stage":"transcribing","progress":0.4}"#),
            StatusReply::NotFound,
        ],
    );
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));

    let job_id = assert_ok!(controller.upload(video(), None).await);
    assert_eq!(job_id, "abc");
    assert_eq!(controller.join_polling().await, Some(PollState::Lost));

    let events = drain(&mut rx);
    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Progress {
                job_id: Some(id),
                view,
            } if id == "abc" => Some(view.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![40]);

    let lost = events
        .iter()
        .find_map(|e| match e {
            UiEvent::Notify(n) if n.title == "Job Not Found" => Some(n.clone()),
            _ => None,
        })
        .expect("missing Job Not Found notification");
    assert_eq!(lost.severity, Severity::Error);
    assert!(events.contains(&UiEvent::Reset));
    assert!(controller.current_job().is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_completed_fetches_results_once_then_enables_export() {
    let api = FakeApi::new(&["abc"]);
    api.script(
        "abc",
        vec![
            progress(r#"{"status":"processing","stage":"encoding_frames","progress":0.7}"#),
            progress(r#"{"status":"completed","stage":"completed","progress":1.0}"#),
        ],
    );
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));

    assert_ok!(controller.upload(video(), None).await);
    let early = controller.export(ExportFormat::StudyNotes).await;
    assert!(matches!(
        early,
        Err(AppError::Validation(ValidationError::ResultsNotReady))
    ));

    assert_eq!(controller.join_polling().await, Some(PollState::Completed));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.results_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);

    let events = drain(&mut rx);
    let ready = events
        .iter()
        .position(|e| matches!(e, UiEvent::ResultsReady(_)))
        .expect("missing ResultsReady");
    let enabled: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == UiEvent::ExportAvailable(true))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(enabled.len(), 1);
    assert!(enabled[0] > ready);
    assert!(notification_titles(&events).contains(&"Processing Complete".to_string()));

    let notes = assert_ok!(controller.export(ExportFormat::StudyNotes).await);
    assert_eq!(notes.filename, "lecture01_study_notes.md");
    assert!(notes.content.starts_with("# Study Notes: lecture01.mp4"));

    let srt = assert_ok!(controller.export(ExportFormat::Srt).await);
    assert_eq!(srt.filename, "lecture.srt");
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_surfaces_server_error() {
    let api = FakeApi::new(&["abc"]);
    api.script(
        "abc",
        vec![progress(r#"{"status":"failed","error":"Unsupported codec"}"#)],
    );
    let (controller, mut rx) = setup(api, Arc::new(MemoryStore::new()));

    assert_ok!(controller.upload(video(), None).await);
    assert_eq!(
        controller.join_polling().await,
        Some(PollState::Failed {
            message: "Unsupported codec".into()
        })
    );

    let events = drain(&mut rx);
    let failed = events
        .iter()
        .find_map(|e| match e {
            UiEvent::Notify(n) if n.title == "Processing Failed" => Some(n.message.clone()),
            _ => None,
        });
    assert_eq!(failed.as_deref(), Some("Unsupported codec"));
    assert!(controller.current_job().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_upload_silences_previous_job() {
    let api = FakeApi::new(&["job-a", "job-b"]);
    api.script(
        "job-a",
        vec![progress(r#"{"status":"processing","progress":0.3}"#)],
    );
    api.gate_job("job-a");
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));

    assert_ok!(controller.upload(video(), None).await);
    api.entered.notified().await;

    assert_eq!(assert_ok!(controller.upload(video(), None).await), "job-b");
    drain(&mut rx);

    api.gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| !matches!(
        e,
        UiEvent::Progress { job_id: Some(id), .. } if id == "job-a"
    )));
    assert!(notification_titles(&events).is_empty());
    assert_eq!(controller.current_job().as_deref(), Some("job-b"));
}

#[tokio::test]
async fn test_invalid_file_rejected_before_network() {
    let api = FakeApi::new(&["abc"]);
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));

    let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    std::fs::write(file.path(), b"%PDF-1.4").unwrap();

    let err = assert_err!(controller.upload_file(file.path()).await);
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::UnsupportedFileType { .. })
    ));
    assert_eq!(api.upload_calls.load(Ordering::SeqCst), 0);
    assert_eq!(notification_titles(&drain(&mut rx)), vec!["Invalid File"]);
}

// ========== 标注场景 ==========

#[tokio::test]
async fn test_malformed_bookmarks_degrade_to_empty() {
    let kv = Arc::new(MemoryStore::new());
    kv.set("lectureMind_bookmarks", "{\"oops\":").unwrap();
    let (controller, _rx) = setup(FakeApi::new(&[]), kv);
    controller.session().start_job("abc");

    assert!(controller.annotations_view().bookmarks.is_empty());
    assert_ok!(controller.add_bookmark(5.0, BookmarkType::Important, None));
    assert_eq!(controller.annotations_view().bookmarks.len(), 1);
}

#[tokio::test]
async fn test_delete_bookmark_removes_only_target() {
    let kv = Arc::new(MemoryStore::new());
    let (controller, _rx) = setup(FakeApi::new(&[]), kv.clone());
    controller.session().start_job("abc");

    let first: Bookmark = assert_ok!(controller.add_bookmark(
        30.0,
        BookmarkType::Question,
        Some("ask about this".into())
    ));
    let second = assert_ok!(controller.add_bookmark(60.0, BookmarkType::Insight, None));

    assert!(controller.delete_bookmark(&first.id));
    let view = controller.annotations_view();
    assert_eq!(view.bookmarks.len(), 1);
    assert_eq!(view.bookmarks[0].id, second.id);

    let again = assert_ok!(controller.add_bookmark(30.0, BookmarkType::Question, None));
    assert_ne!(again.id, first.id);

    let stored: Vec<Bookmark> =
        serde_json::from_str(&kv.get("lectureMind_bookmarks").unwrap().unwrap()).unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_confusion_vote_toggle_twice_is_absent() {
    let (controller, _rx) = setup(FakeApi::new(&[]), Arc::new(MemoryStore::new()));
    controller.session().start_job("abc");

    assert!(assert_ok!(controller.toggle_confusion(12.0)));
    assert_eq!(controller.annotations_view().top_confusing.len(), 1);
    assert!(!assert_ok!(controller.toggle_confusion(12.0)));
    assert!(controller.annotations_view().top_confusing.is_empty());
}

#[tokio::test]
async fn test_annotations_filtered_by_current_job() {
    let (controller, _rx) = setup(FakeApi::new(&[]), Arc::new(MemoryStore::new()));

    controller.session().start_job("job-a");
    assert_ok!(controller.add_bookmark(10.0, BookmarkType::Todo, None));
    assert_ok!(controller.mark_confusion(11.0, Some("lost".into())));
    assert_ok!(controller.add_note("0:12", "Check the proof", Default::default()));

    controller.session().start_job("job-b");
    let view = controller.annotations_view();
    assert!(view.is_empty());
    assert_eq!(view.job_id, "job-b");

    controller.session().start_job("job-a");
    let view = controller.annotations_view();
    assert_eq!(view.bookmarks.len(), 1);
    assert_eq!(view.markers.len(), 1);
    assert_eq!(view.notes.len(), 1);
    assert_eq!(view.notes[0].timestamp, 12.0);
}

#[tokio::test]
async fn test_annotation_requires_current_job() {
    let (controller, mut rx) = setup(FakeApi::new(&[]), Arc::new(MemoryStore::new()));

    let err = assert_err!(controller.add_bookmark(1.0, BookmarkType::Important, None));
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::NoActiveJob)
    ));
    assert_eq!(notification_titles(&drain(&mut rx)), vec!["No Video"]);
}

// ========== 结果之后的功能 ==========

#[tokio::test(start_paused = true)]
async fn test_search_and_study_tools_after_completion() {
    let api = FakeApi::new(&["abc"]);
    api.script(
        "abc",
        vec![progress(r#"{"status":"completed","progress":1.0}"#)],
    );
    let (controller, mut rx) = setup(api, Arc::new(MemoryStore::new()));

    assert!(matches!(
        controller.search("gradient").await,
        Err(AppError::Validation(ValidationError::NoActiveJob))
    ));

    assert_ok!(controller.upload(video(), None).await);
    assert_eq!(controller.join_polling().await, Some(PollState::Completed));

    assert!(matches!(
        controller.search("   ").await,
        Err(AppError::Validation(ValidationError::EmptyQuery))
    ));
    let hits = assert_ok!(controller.search("gradient").await);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].highlights, vec![0..8]);

    let deck = assert_ok!(controller.create_flashcards());
    assert_eq!(deck.len(), 1);

    let mut rng = rand::rng();
    let quiz = assert_ok!(controller.generate_quiz(&mut rng));
    assert!(!quiz.is_empty());

    drain(&mut rx);
}

#[tokio::test]
async fn test_demo_mode_probe_emits_event() {
    let (controller, mut rx) = setup(FakeApi::new(&[]), Arc::new(MemoryStore::new()));

    let config = controller.check_demo_mode().await.unwrap();
    assert!(config.demo_mode);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, UiEvent::DemoMode { setup_url: Some(_) })));
}

#[tokio::test]
async fn test_save_export_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        export_dir: dir.path().to_string_lossy().to_string(),
        ..Config::default()
    };
    let (ui, _rx) = UiChannel::new();
    let api = FakeApi::new(&[]);
    let controller = Controller::new(api, Arc::new(MemoryStore::new()), ui, config);

    controller.session().start_job("abc");
    controller.session().cache_result("abc", sample_result(), |_| {});

    let path = assert_ok!(controller.save_export(ExportFormat::StudyNotes).await);
    assert_eq!(path, dir.path().join("lecture01_study_notes.md"));
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.contains("## Full Transcript"));
}

// ========== 被取代的请求 ==========

#[tokio::test(start_paused = true)]
async fn test_superseded_upload_releases_its_server_job() {
    let api = FakeApi::new(&["job-a", "job-b"]);
    api.upload_gate.arm();
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.upload(video(), None).await }
    });
    api.upload_gate.entered.notified().await;

    assert_eq!(assert_ok!(controller.upload(video(), None).await), "job-b");
    drain(&mut rx);

    api.upload_gate.release.notify_one();
    let err = assert_err!(first.await.unwrap());
    assert!(err.is_aborted());

    assert_eq!(*api.deleted.lock().unwrap(), vec!["job-a".to_string()]);
    assert_eq!(controller.current_job().as_deref(), Some("job-b"));
    let events = drain(&mut rx);
    assert!(!events.contains(&UiEvent::Reset));
    assert!(notification_titles(&events).is_empty());
}

#[tokio::test]
async fn test_export_for_replaced_job_is_dropped() {
    let api = FakeApi::new(&[]);
    api.export_gate.arm();
    let (controller, mut rx) = setup(api.clone(), Arc::new(MemoryStore::new()));
    controller.session().start_job("abc");
    controller.session().cache_result("abc", sample_result(), |_| {});

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.export(ExportFormat::Markdown).await }
    });
    api.export_gate.entered.notified().await;

    controller.session().start_job("other");
    api.export_gate.release.notify_one();

    let err = assert_err!(pending.await.unwrap());
    assert!(err.is_aborted());
    assert!(notification_titles(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_note_keeps_hour_timestamp() {
    let (controller, _rx) = setup(FakeApi::new(&[]), Arc::new(MemoryStore::new()));
    controller.session().start_job("abc");

    let note = assert_ok!(controller.add_note(
        "1:02:03",
        "Derivation of the update rule",
        Default::default()
    ));
    assert_eq!(note.timestamp, 3723.0);
    assert_eq!(note.timestamp_formatted, "1:02:03");
    assert_eq!(
        controller.annotations_view().notes[0].timestamp_formatted,
        "1:02:03"
    );

    let err = assert_err!(controller.add_note(
        "307445734561825861:00",
        "Too far",
        Default::default()
    ));
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::InvalidTimestamp { .. })
    ));
}
