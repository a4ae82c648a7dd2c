/// 学习笔记导出
///
/// 根据处理结果和当前任务的书签、困惑标记生成 Markdown 笔记
use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::models::{Bookmark, ConfusionMarker, ProcessingResult};
use crate::utils::{format_duration_full, timestamp_link};

/// 预览截断长度（字符）
pub const PREVIEW_CHARS: usize = 1000;

/// 生成完整的学习笔记 Markdown
///
/// # 参数
/// - `result`: 处理结果
/// - `bookmarks`: 当前任务的书签
/// - `markers`: 当前任务的困惑标记
/// - `generated_at`: 生成时间
pub fn render_study_notes(
    result: &ProcessingResult,
    bookmarks: &[Bookmark],
    markers: &[ConfusionMarker],
    generated_at: DateTime<Local>,
) -> String {
    let meta = &result.metadata;
    let mut md = String::new();

    // write! 写入 String 不会失败
    let _ = writeln!(md, "# Study Notes: {}\n", meta.filename);
    let _ = writeln!(
        md,
        "> Generated on {} at {}\n",
        generated_at.format("%Y-%m-%d"),
        generated_at.format("%H:%M:%S")
    );

    md.push_str("## Video Information\n\n");
    md.push_str("| Property | Value |\n");
    md.push_str("|----------|-------|\n");
    let _ = writeln!(md, "| **Filename** | {} |", meta.filename);
    let _ = writeln!(md, "| **Duration** | {} |", format_duration_full(meta.duration));
    let _ = writeln!(md, "| **Resolution** | {}x{} |", meta.width, meta.height);
    let _ = writeln!(md, "| **Frame Rate** | {:.1} fps |\n", meta.fps);

    if !result.events.is_empty() {
        md.push_str("## Table of Contents\n\n");
        md.push_str("*Detected events and slide changes:*\n\n");
        for (i, event) in result.events.iter().enumerate() {
            let confidence = (event.confidence * 100.0).round();
            let _ = writeln!(
                md,
                "{}. {} - Event ({}% confidence)",
                i + 1,
                timestamp_link(event.timestamp),
                confidence
            );
        }
        md.push('\n');
    }

    if !bookmarks.is_empty() {
        md.push_str("## Your Bookmarks\n\n");
        let mut sorted: Vec<&Bookmark> = bookmarks.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        for bookmark in sorted {
            let _ = writeln!(
                md,
                "### {} {} - {}\n",
                bookmark.kind.icon(),
                timestamp_link(bookmark.timestamp),
                bookmark.kind.label()
            );
            if let Some(note) = bookmark.note.as_deref().filter(|n| !n.is_empty()) {
                let _ = writeln!(md, "{}\n", note);
            }
        }
    }

    if !markers.is_empty() {
        md.push_str("## Moments to Review\n\n");
        md.push_str("*These sections were marked as confusing:*\n\n");
        let mut sorted: Vec<&ConfusionMarker> = markers.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        for marker in sorted {
            let _ = write!(md, "- {}", timestamp_link(marker.timestamp));
            if let Some(note) = marker.note.as_deref().filter(|n| !n.is_empty()) {
                let _ = write!(md, " - {}", note);
            }
            md.push('\n');
        }
        md.push('\n');
    }

    if !result.transcript.is_empty() {
        md.push_str("## Full Transcript\n\n");
        for chunk in &result.transcript {
            let _ = writeln!(md, "**{}**\n", timestamp_link(chunk.start));
            let _ = writeln!(md, "{}\n", chunk.text);
            md.push_str("---\n\n");
        }
    }

    md.push_str("\n---\n\n");
    md.push_str("*Generated by Lecture Mind - AI-powered lecture analysis*\n");
    md
}

/// 导出文件名：`<去掉扩展名的视频名>_study_notes.md`
pub fn study_notes_filename(video_filename: &str) -> String {
    let base = match video_filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => video_filename,
    };
    let base = if base.trim().is_empty() { "lecture" } else { base };
    format!("{}_study_notes.md", base)
}

/// 预览：超过 1000 字符时截断并追加省略号
pub fn preview(markdown: &str) -> String {
    if markdown.chars().count() > PREVIEW_CHARS {
        markdown.chars().take(PREVIEW_CHARS).collect::<String>() + "\n\n..."
    } else {
        markdown.to_string()
    }
}
