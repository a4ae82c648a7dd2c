pub mod annotation;
pub mod job;
pub mod result;
pub mod search;
pub mod upload;

pub use annotation::{
    Annotation, Bookmark, BookmarkType, ConfusionMarker, ConfusionVote, Note, Theme,
};
pub use job::{Job, JobStatus, ProcessingStage, StatusPayload};
pub use result::{EventItem, ProcessingResult, ResultsPayload, TranscriptChunk, VideoMetadata};
pub use search::{
    ErrorPayload, ExportFormat, ExportPayload, SearchPayload, SearchRequest, SearchResultItem,
    ServerConfig, UploadPayload,
};
pub use upload::{validate_video, VideoUpload, SUPPORTED_VIDEO_TYPES};
