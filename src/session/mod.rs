pub mod job_session;
pub mod preview;
pub mod result_cache;

pub use job_session::{JobSession, UploadTicket};
pub use preview::{FilePreview, MediaPreview};
pub use result_cache::ResultCache;
