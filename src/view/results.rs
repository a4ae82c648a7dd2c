//! 结果、标注与搜索的视图模型
//!
//! 纯函数映射，不持有状态，不做 IO。

use std::ops::Range;

use regex::RegexBuilder;
use serde::Serialize;

use crate::models::{
    Bookmark, BookmarkType, ConfusionMarker, ConfusionVote, Note, ProcessingResult,
    SearchResultItem,
};
use crate::utils::format_duration;

// ========== 处理结果 ==========

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfoView {
    pub filename: String,
    pub duration: String,
    pub resolution: String,
    pub fps: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventView {
    /// 从 1 开始
    pub index: usize,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub confidence_percent: u8,
    pub confusing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptView {
    pub start: f64,
    pub time_range: String,
    pub text: String,
    pub confusing: bool,
}

/// 任务完成后展示的结果快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub job_id: String,
    pub info: VideoInfoView,
    pub events: Vec<EventView>,
    pub transcript: Vec<TranscriptView>,
    pub annotations: AnnotationsView,
}

impl ResultsView {
    /// # 参数
    /// - `is_confusing`: 判断某时间点是否已被投票为困惑
    pub fn build(
        job_id: &str,
        result: &ProcessingResult,
        annotations: AnnotationsView,
        is_confusing: impl Fn(f64) -> bool,
    ) -> Self {
        let meta = &result.metadata;
        let info = VideoInfoView {
            filename: meta.filename.clone(),
            duration: format_duration(meta.duration),
            resolution: format!("{}x{}", meta.width, meta.height),
            fps: format!("{:.1} fps", meta.fps),
        };

        let events = result
            .events
            .iter()
            .enumerate()
            .map(|(i, event)| EventView {
                index: i + 1,
                timestamp: event.timestamp,
                timestamp_formatted: event.timestamp_formatted.clone(),
                confidence_percent: super::progress::percent_of(event.confidence),
                confusing: is_confusing(event.timestamp),
            })
            .collect();

        let transcript = result
            .transcript
            .iter()
            .map(|chunk| TranscriptView {
                start: chunk.start,
                time_range: format!("{} - {}", chunk.start_formatted, chunk.end_formatted),
                text: chunk.text.clone(),
                confusing: is_confusing(chunk.start),
            })
            .collect();

        Self {
            job_id: job_id.to_string(),
            info,
            events,
            transcript,
            annotations,
        }
    }
}

// ========== 标注 ==========

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkView {
    pub id: String,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub kind: BookmarkType,
    pub icon: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub text: String,
}

impl From<&Bookmark> for BookmarkView {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.clone(),
            timestamp: bookmark.timestamp,
            timestamp_formatted: format_duration(bookmark.timestamp),
            kind: bookmark.kind,
            icon: bookmark.kind.icon(),
            label: bookmark.kind.label(),
            color: bookmark.kind.color(),
            text: bookmark.display_text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub id: String,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub note: Option<String>,
}

impl From<&ConfusionMarker> for MarkerView {
    fn from(marker: &ConfusionMarker) -> Self {
        Self {
            id: marker.id.clone(),
            timestamp: marker.timestamp,
            timestamp_formatted: format_duration(marker.timestamp),
            note: marker.note.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteView {
    pub id: String,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl From<&Note> for NoteView {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            timestamp: note.timestamp,
            timestamp_formatted: note.timestamp_formatted.clone(),
            content: note.content.clone(),
            tags: note.tags.iter().cloned().collect(),
        }
    }
}

/// 当前任务的全部标注
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AnnotationsView {
    pub job_id: String,
    pub bookmarks: Vec<BookmarkView>,
    pub markers: Vec<MarkerView>,
    pub notes: Vec<NoteView>,
    /// 最近的困惑时刻
    pub top_confusing: Vec<ConfusionVote>,
}

impl AnnotationsView {
    pub fn build(
        job_id: &str,
        bookmarks: &[Bookmark],
        markers: &[ConfusionMarker],
        notes: &[Note],
        top_confusing: Vec<ConfusionVote>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            bookmarks: bookmarks.iter().map(BookmarkView::from).collect(),
            markers: markers.iter().map(MarkerView::from).collect(),
            notes: notes.iter().map(NoteView::from).collect(),
            top_confusing,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
            && self.markers.is_empty()
            && self.notes.is_empty()
            && self.top_confusing.is_empty()
    }
}

// ========== 搜索 ==========

/// 一条搜索结果，`highlights` 为文本中匹配关键词的字节区间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub result_type: String,
    pub text: String,
    pub highlights: Vec<Range<usize>>,
}

impl SearchHit {
    pub fn build(item: &SearchResultItem, query: &str) -> Self {
        Self {
            timestamp: item.timestamp,
            timestamp_formatted: item.timestamp_formatted.clone(),
            result_type: item.result_type.clone(),
            text: item.text.clone(),
            highlights: highlight_ranges(&item.text, query),
        }
    }
}

/// 忽略大小写地查找关键词出现的位置
pub fn highlight_ranges(text: &str, query: &str) -> Vec<Range<usize>> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.find_iter(text).map(|m| m.range()).collect(),
        Err(_) => Vec::new(),
    }
}
