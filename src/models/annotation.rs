//! 用户标注：书签、困惑投票、困惑标记、笔记
//!
//! 存储格式沿用前端 localStorage 的 camelCase 字段名。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 可按任务过滤、按 id 删除的标注记录
pub trait Annotation: Clone + Serialize + for<'de> Deserialize<'de> {
    /// 持久化使用的存储键
    const STORAGE_KEY: &'static str;

    fn id(&self) -> &str;
    fn job_id(&self) -> &str;
    fn timestamp(&self) -> f64;
}

/// 书签类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkType {
    Question,
    Insight,
    Todo,
    /// 未知类型按 important 处理；`serde(other)` 只能放在最后一个变体
    #[serde(other)]
    Important,
}

impl BookmarkType {
    pub const ALL: [BookmarkType; 4] = [
        BookmarkType::Important,
        BookmarkType::Question,
        BookmarkType::Insight,
        BookmarkType::Todo,
    ];

    pub fn icon(self) -> &'static str {
        match self {
            BookmarkType::Important => "\u{2B50}",
            BookmarkType::Question => "\u{2753}",
            BookmarkType::Insight => "\u{1F4A1}",
            BookmarkType::Todo => "\u{1F4DD}",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BookmarkType::Important => "Important",
            BookmarkType::Question => "Question",
            BookmarkType::Insight => "Insight",
            BookmarkType::Todo => "Todo",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            BookmarkType::Important => "yellow",
            BookmarkType::Question => "blue",
            BookmarkType::Insight => "green",
            BookmarkType::Todo => "orange",
        }
    }

    /// 快捷键 1-4
    pub fn shortcut_key(self) -> char {
        match self {
            BookmarkType::Important => '1',
            BookmarkType::Question => '2',
            BookmarkType::Insight => '3',
            BookmarkType::Todo => '4',
        }
    }

    pub fn from_shortcut(key: char) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.shortcut_key() == key)
    }
}

/// 书签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub job_id: String,
    /// 秒
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: BookmarkType,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// 备注为空时显示类型名
    pub fn display_text(&self) -> &str {
        match self.note.as_deref() {
            Some(note) if !note.is_empty() => note,
            _ => self.kind.label(),
        }
    }
}

impl Annotation for Bookmark {
    const STORAGE_KEY: &'static str = "lectureMind_bookmarks";

    fn id(&self) -> &str {
        &self.id
    }
    fn job_id(&self) -> &str {
        &self.job_id
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// 困惑投票（一键标记），以 (job_id, 时间戳字符串) 为键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionVote {
    pub timestamp: f64,
    pub timestamp_formatted: String,
    /// 毫秒时间戳
    pub voted_at: i64,
}

impl ConfusionVote {
    pub const STORAGE_KEY: &'static str = "lectureMind_confusionVotes";

    /// 时间戳转成投票键，与前端 `String(timestamp)` 一致（12.0 -> "12"）
    pub fn key_for(timestamp: f64) -> String {
        format!("{}", timestamp)
    }
}

/// 困惑标记（带备注）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionMarker {
    pub id: String,
    pub job_id: String,
    pub timestamp: f64,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Annotation for ConfusionMarker {
    const STORAGE_KEY: &'static str = "lectureMind_confusionMarkers";

    fn id(&self) -> &str {
        &self.id
    }
    fn job_id(&self) -> &str {
        &self.job_id
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// 学习笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub job_id: String,
    pub timestamp: f64,
    pub timestamp_formatted: String,
    pub content: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Annotation for Note {
    const STORAGE_KEY: &'static str = "lectureMind_notes";

    fn id(&self) -> &str {
        &self.id
    }
    fn job_id(&self) -> &str {
        &self.job_id
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// 主题偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const STORAGE_KEY: &'static str = "theme";

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}
