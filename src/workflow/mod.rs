pub mod polling;

pub use polling::{PollState, PollingEngine, DEFAULT_FAILURE_MESSAGE};
