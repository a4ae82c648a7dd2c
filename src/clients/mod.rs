pub mod lecture_client;

pub use lecture_client::{JobApi, LectureClient, StatusReply};
