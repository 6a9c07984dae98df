//! Job model: persisted state enum, enqueue spec, and full row.

use serde::{Deserialize, Serialize};

/// Job identifier (sqlite rowid).
pub type JobId = i64;

/// Persisted job state, stored as its integer value.
///
/// The numeric ordering is load-bearing: "terminal" means `state >= Done`,
/// and predicate deletes compare on the raw integer. Do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i64)]
pub enum JobState {
    None = 0,
    Downloading = 1,
    Post = 2,
    Done = 3,
    DeezerError = 4,
    Error = 5,
}

impl JobState {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(JobState::None),
            1 => Some(JobState::Downloading),
            2 => Some(JobState::Post),
            3 => Some(JobState::Done),
            4 => Some(JobState::DeezerError),
            5 => Some(JobState::Error),
            _ => None,
        }
    }

    /// Terminal states can only be left via explicit retry or re-enqueue.
    pub fn is_terminal(self) -> bool {
        self.as_i64() >= JobState::Done.as_i64()
    }

    /// Error-terminal states, the ones `retry_all` resets.
    pub fn is_error(self) -> bool {
        matches!(self, JobState::DeezerError | JobState::Error)
    }
}

/// Everything needed to enqueue one download. The provenance fields are
/// carried opaque for the fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub source_id: String,
    pub target_path: String,
    #[serde(default)]
    pub quality: i64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub origin_checksum: Option<String>,
    #[serde(default)]
    pub version_tag: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub art_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub stream_source_id: Option<String>,
    #[serde(default)]
    pub is_episode: bool,
    #[serde(default)]
    pub direct_url: Option<String>,
}

/// Full persisted job row.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source_id: String,
    pub target_path: String,
    pub quality: i64,
    pub private: bool,
    pub state: JobState,
    pub origin_checksum: Option<String>,
    pub version_tag: Option<String>,
    pub title: Option<String>,
    pub art_url: Option<String>,
    pub access_token: Option<String>,
    pub stream_source_id: Option<String>,
    pub is_episode: bool,
    pub direct_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    /// A leading `-` marks a user-supplied, non-catalog item. Informational
    /// only; nothing in the queue treats these differently.
    pub fn is_user_supplied(&self) -> bool {
        self.source_id.starts_with('-')
    }
}

/// One entry of a `Progress` event: transient counters plus the fields the
/// controller renders without a DB round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: JobId,
    pub state: i64,
    pub received: u64,
    pub filesize: u64,
    pub quality: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ordering_is_preserved() {
        let expected = [
            (JobState::None, 0),
            (JobState::Downloading, 1),
            (JobState::Post, 2),
            (JobState::Done, 3),
            (JobState::DeezerError, 4),
            (JobState::Error, 5),
        ];
        for (state, value) in expected {
            assert_eq!(state.as_i64(), value);
            assert_eq!(JobState::from_i64(value), Some(state));
        }
        assert_eq!(JobState::from_i64(6), None);
        assert_eq!(JobState::from_i64(-1), None);
    }

    #[test]
    fn terminal_means_done_or_later() {
        assert!(!JobState::None.is_terminal());
        assert!(!JobState::Downloading.is_terminal());
        assert!(!JobState::Post.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::DeezerError.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn error_states_exclude_done() {
        assert!(JobState::Error.is_error());
        assert!(JobState::DeezerError.is_error());
        assert!(!JobState::Done.is_error());
        assert!(!JobState::Downloading.is_error());
    }

    #[test]
    fn user_supplied_marker() {
        let mut job = Job {
            id: 1,
            source_id: "-42".into(),
            target_path: "/x".into(),
            quality: 0,
            private: false,
            state: JobState::None,
            origin_checksum: None,
            version_tag: None,
            title: None,
            art_url: None,
            access_token: None,
            stream_source_id: None,
            is_episode: false,
            direct_url: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(job.is_user_supplied());
        job.source_id = "42".into();
        assert!(!job.is_user_supplied());
    }
}
