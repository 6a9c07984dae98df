//! Download queue: persisted job state machine and the serial runner that
//! advances `None -> Downloading -> Post -> Done | DeezerError | Error`.

pub mod db;
pub mod fetcher;
pub mod job;
pub mod worker;


pub use db::QueueDb;
pub use fetcher::{FetchOutcome, Fetcher, ProgressSink};
pub use job::{Job, JobId, JobSpec, JobState, ProgressEntry};
