//! 视图层：状态到视图模型的纯映射，以及推送给渲染方的事件通道

pub mod events;
pub mod progress;
pub mod results;

pub use events::{Notification, Severity, UiChannel, UiEvent};
pub use progress::{percent_of, ProgressView};
pub use results::{
    highlight_ranges, AnnotationsView, BookmarkView, EventView, MarkerView, NoteView,
    ResultsView, SearchHit, TranscriptView, VideoInfoView,
};
