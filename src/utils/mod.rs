pub mod format;
pub mod logging;

pub use format::{format_duration, format_duration_full, parse_timestamp, timestamp_link};
pub use logging::truncate_text;
