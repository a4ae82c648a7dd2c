//! 本地标注存储
//!
//! 书签、困惑标记、笔记与困惑投票按任务 id 归档，生命周期独立于处理任务。
//! 每次修改后立即持久化；持久化失败只记录日志，不回滚内存中的修改。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::infrastructure::KeyValueStore;
use crate::models::{
    Annotation, Bookmark, BookmarkType, ConfusionMarker, ConfusionVote, Note, Theme,
};
use crate::utils::{format_duration, format_duration_full};

// ========== id 时钟 ==========

/// 单调递增的毫秒时钟，保证同一毫秒内创建的记录 id 仍不重复
#[derive(Debug, Default)]
struct IdClock {
    last: i64,
}

impl IdClock {
    fn observe(&mut self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.last = self.last.max(value);
        }
    }

    fn next(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last
    }
}

fn ensure_timestamp(timestamp: f64) -> Result<f64, ValidationError> {
    if timestamp.is_finite() && timestamp >= 0.0 {
        Ok(timestamp)
    } else {
        Err(ValidationError::InvalidTimestamp {
            value: timestamp.to_string(),
        })
    }
}

fn load_raw(kv: &dyn KeyValueStore, key: &str) -> Option<String> {
    match kv.get(key) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("⚠️ 读取 {} 失败，按空集合处理: {}", key, e);
            None
        }
    }
}

fn persist_json<S: serde::Serialize>(kv: &dyn KeyValueStore, key: &str, value: &S) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("⚠️ 序列化 {} 失败: {}", key, e);
            return;
        }
    };
    if let Err(e) = kv.set(key, &raw) {
        warn!("⚠️ 保存 {} 失败: {}", key, e);
    }
}

// ========== 通用集合 ==========

/// 只增删、不原地修改的标注集合
#[derive(Debug)]
pub struct AnnotationCollection<T: Annotation> {
    records: Vec<T>,
}

impl<T: Annotation> Default for AnnotationCollection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Annotation> AnnotationCollection<T> {
    /// 读取集合；缺失或损坏的数据视为空集合
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        let Some(raw) = load_raw(kv, T::STORAGE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(records) => {
                debug!("加载 {} 条记录 ({})", records.len(), T::STORAGE_KEY);
                Self { records }
            }
            Err(e) => {
                warn!("⚠️ {} 数据损坏，按空集合处理: {}", T::STORAGE_KEY, e);
                Self::default()
            }
        }
    }

    pub fn persist(&self, kv: &dyn KeyValueStore) {
        persist_json(kv, T::STORAGE_KEY, &self.records);
    }

    pub fn add(&mut self, record: T) {
        self.records.push(record);
    }

    /// 按 id 删除，返回是否删除了记录
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        self.records.len() != before
    }

    /// 某任务的记录，按时间戳升序
    pub fn list_for_job(&self, job_id: &str) -> Vec<T> {
        let mut items: Vec<T> = self
            .records
            .iter()
            .filter(|r| r.job_id() == job_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        items
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id())
    }
}

// ========== 困惑投票 ==========

/// 困惑投票表：任务 id -> 时间戳键 -> 投票
#[derive(Debug, Default)]
pub struct VoteBook {
    votes: BTreeMap<String, BTreeMap<String, ConfusionVote>>,
}

impl VoteBook {
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        let Some(raw) = load_raw(kv, ConfusionVote::STORAGE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(votes) => Self { votes },
            Err(e) => {
                warn!("⚠️ 困惑投票数据损坏，按空集合处理: {}", e);
                Self::default()
            }
        }
    }

    pub fn persist(&self, kv: &dyn KeyValueStore) {
        persist_json(kv, ConfusionVote::STORAGE_KEY, &self.votes);
    }

    /// 切换投票，返回切换后是否处于"已标记"状态
    pub fn toggle(&mut self, job_id: &str, timestamp: f64, voted_at: i64) -> bool {
        let key = ConfusionVote::key_for(timestamp);
        let job_votes = self.votes.entry(job_id.to_string()).or_default();

        let marked = if job_votes.remove(&key).is_some() {
            false
        } else {
            job_votes.insert(
                key,
                ConfusionVote {
                    timestamp,
                    timestamp_formatted: format_duration(timestamp),
                    voted_at,
                },
            );
            true
        };

        if job_votes.is_empty() {
            self.votes.remove(job_id);
        }
        marked
    }

    pub fn is_confusing(&self, job_id: &str, timestamp: f64) -> bool {
        self.votes
            .get(job_id)
            .is_some_and(|v| v.contains_key(&ConfusionVote::key_for(timestamp)))
    }

    /// 最近投票的困惑时刻，按投票时间降序
    pub fn top_confusing(&self, job_id: &str, limit: usize) -> Vec<ConfusionVote> {
        let mut votes: Vec<ConfusionVote> = self
            .votes
            .get(job_id)
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default();
        votes.sort_by(|a, b| b.voted_at.cmp(&a.voted_at));
        votes.truncate(limit);
        votes
    }

    pub fn count_for_job(&self, job_id: &str) -> usize {
        self.votes.get(job_id).map_or(0, BTreeMap::len)
    }
}

// ========== 存储门面 ==========

/// 所有本地标注的统一入口
pub struct AnnotationStore {
    kv: Arc<dyn KeyValueStore>,
    clock: IdClock,
    bookmarks: AnnotationCollection<Bookmark>,
    markers: AnnotationCollection<ConfusionMarker>,
    notes: AnnotationCollection<Note>,
    votes: VoteBook,
}

impl AnnotationStore {
    /// 从键值存储中加载全部标注
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Self {
        let bookmarks = AnnotationCollection::<Bookmark>::load(kv.as_ref());
        let markers = AnnotationCollection::<ConfusionMarker>::load(kv.as_ref());
        let notes = AnnotationCollection::<Note>::load(kv.as_ref());
        let votes = VoteBook::load(kv.as_ref());

        let mut clock = IdClock::default();
        bookmarks
            .ids()
            .chain(markers.ids())
            .chain(notes.ids())
            .for_each(|id| clock.observe(id));

        Self {
            kv,
            clock,
            bookmarks,
            markers,
            notes,
            votes,
        }
    }

    fn next_id(&mut self) -> String {
        self.clock.next().to_string()
    }

    // ---------- 书签 ----------

    pub fn add_bookmark(
        &mut self,
        job_id: &str,
        timestamp: f64,
        kind: BookmarkType,
        note: Option<String>,
    ) -> Result<Bookmark, ValidationError> {
        let timestamp = ensure_timestamp(timestamp)?;
        let bookmark = Bookmark {
            id: self.next_id(),
            job_id: job_id.to_string(),
            timestamp,
            kind,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: Utc::now(),
        };
        self.bookmarks.add(bookmark.clone());
        self.bookmarks.persist(self.kv.as_ref());
        debug!("添加书签 {} @ {}", bookmark.id, format_duration(timestamp));
        Ok(bookmark)
    }

    pub fn remove_bookmark(&mut self, id: &str) -> bool {
        let removed = self.bookmarks.remove(id);
        if removed {
            self.bookmarks.persist(self.kv.as_ref());
        }
        removed
    }

    pub fn bookmarks_for(&self, job_id: &str) -> Vec<Bookmark> {
        self.bookmarks.list_for_job(job_id)
    }

    // ---------- 困惑标记 ----------

    pub fn add_marker(
        &mut self,
        job_id: &str,
        timestamp: f64,
        note: Option<String>,
    ) -> Result<ConfusionMarker, ValidationError> {
        let timestamp = ensure_timestamp(timestamp)?;
        let marker = ConfusionMarker {
            id: self.next_id(),
            job_id: job_id.to_string(),
            timestamp,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: Utc::now(),
        };
        self.markers.add(marker.clone());
        self.markers.persist(self.kv.as_ref());
        Ok(marker)
    }

    pub fn remove_marker(&mut self, id: &str) -> bool {
        let removed = self.markers.remove(id);
        if removed {
            self.markers.persist(self.kv.as_ref());
        }
        removed
    }

    pub fn markers_for(&self, job_id: &str) -> Vec<ConfusionMarker> {
        self.markers.list_for_job(job_id)
    }

    // ---------- 困惑投票 ----------

    /// 切换某时刻的困惑投票，返回切换后的状态
    pub fn toggle_vote(&mut self, job_id: &str, timestamp: f64) -> Result<bool, ValidationError> {
        let timestamp = ensure_timestamp(timestamp)?;
        let voted_at = self.clock.next();
        let marked = self.votes.toggle(job_id, timestamp, voted_at);
        self.votes.persist(self.kv.as_ref());
        Ok(marked)
    }

    pub fn is_confusing(&self, job_id: &str, timestamp: f64) -> bool {
        self.votes.is_confusing(job_id, timestamp)
    }

    pub fn top_confusing(&self, job_id: &str, limit: usize) -> Vec<ConfusionVote> {
        self.votes.top_confusing(job_id, limit)
    }

    pub fn vote_count(&self, job_id: &str) -> usize {
        self.votes.count_for_job(job_id)
    }

    // ---------- 笔记 ----------

    /// 添加笔记
    ///
    /// # 参数
    /// - `timestamp`: 秒
    /// - `label`: 用户输入的时间戳原文，为空时按 `h:mm:ss` 生成
    pub fn add_note(
        &mut self,
        job_id: &str,
        timestamp: f64,
        label: &str,
        content: &str,
        tags: BTreeSet<String>,
    ) -> Result<Note, ValidationError> {
        let timestamp = ensure_timestamp(timestamp)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyNoteContent);
        }
        let note = Note {
            id: self.next_id(),
            job_id: job_id.to_string(),
            timestamp,
            timestamp_formatted: match label.trim() {
                "" => format_duration_full(timestamp),
                label => label.to_string(),
            },
            content: content.to_string(),
            tags: tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            created_at: Utc::now(),
        };
        self.notes.add(note.clone());
        self.notes.persist(self.kv.as_ref());
        Ok(note)
    }

    pub fn remove_note(&mut self, id: &str) -> bool {
        let removed = self.notes.remove(id);
        if removed {
            self.notes.persist(self.kv.as_ref());
        }
        removed
    }

    pub fn notes_for(&self, job_id: &str) -> Vec<Note> {
        self.notes.list_for_job(job_id)
    }

    // ---------- 主题 ----------

    pub fn theme(&self) -> Theme {
        load_raw(self.kv.as_ref(), Theme::STORAGE_KEY)
            .and_then(|raw| Theme::parse(&raw))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        if let Err(e) = self.kv.set(Theme::STORAGE_KEY, theme.as_str()) {
            warn!("⚠️ 保存主题失败: {}", e);
        }
    }

    pub fn toggle_theme(&self) -> Theme {
        let theme = self.theme().toggled();
        self.set_theme(theme);
        theme
    }
}
