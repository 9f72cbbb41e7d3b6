use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DiscussionError;

/// Days a student has to complete a discussion once it is created.
pub const DISCUSSION_DUE_DAYS: i64 = 10;

/// An audio discussion attached to a task comment.
///
/// The staff member records one or more audio prompts, the student opens the
/// discussion, records a reply and finishes it. Prompt and reply audio live
/// on disk (see [`crate::paths`]); only the lifecycle is stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscussionComment {
    pub id: Uuid,
    /// Owning task comment. Required; a discussion without one is never persisted.
    pub task_comment_id: Uuid,
    pub state: DiscussionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscussionComment {
    pub fn status(&self) -> DiscussionStatus {
        self.state.status()
    }

    /// When the discussion is due: exactly ten days after creation.
    pub fn due_date(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(DISCUSSION_DUE_DAYS)
    }

    pub fn time_started(&self) -> Option<DateTime<Utc>> {
        self.state.started_at()
    }

    pub fn time_completed(&self) -> Option<DateTime<Utc>> {
        self.state.completed_at()
    }
}

/// Where a discussion is in its lifecycle.
///
/// A completion time can only exist alongside the start time that preceded it
/// (or no start at all, for discussions finished without being opened), so a
/// completed-before-started discussion cannot be constructed through
/// [`DiscussionState::start`] and [`DiscussionState::finish`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DiscussionState {
    #[default]
    NotStarted,
    Opened {
        started_at: DateTime<Utc>,
    },
    Complete {
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    },
}

impl DiscussionState {
    /// Rebuild the state from the two stored timestamps.
    ///
    /// A completion time wins regardless of whether a start time was recorded.
    pub fn from_timestamps(
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        match (started_at, completed_at) {
            (started_at, Some(completed_at)) => Self::Complete {
                started_at,
                completed_at,
            },
            (Some(started_at), None) => Self::Opened { started_at },
            (None, None) => Self::NotStarted,
        }
    }

    pub fn status(&self) -> DiscussionStatus {
        match self {
            Self::NotStarted => DiscussionStatus::NotStarted,
            Self::Opened { .. } => DiscussionStatus::Opened,
            Self::Complete { .. } => DiscussionStatus::Complete,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::NotStarted => None,
            Self::Opened { started_at } => Some(*started_at),
            Self::Complete { started_at, .. } => *started_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Complete { completed_at, .. } => Some(*completed_at),
            _ => None,
        }
    }

    /// Open the discussion at `now`.
    ///
    /// Starting an already opened discussion moves the start time forward.
    /// Starting a completed discussion is rejected.
    pub fn start(self, now: DateTime<Utc>) -> Result<Self, DiscussionError> {
        match self {
            Self::NotStarted | Self::Opened { .. } => Ok(Self::Opened { started_at: now }),
            Self::Complete { .. } => Err(DiscussionError::InvalidTransition {
                from: self.status(),
                action: "start",
            }),
        }
    }

    /// Complete the discussion at `now`.
    ///
    /// Finishing a discussion that was never started is allowed; finishing a
    /// completed one overwrites the completion time.
    pub fn finish(self, now: DateTime<Utc>) -> Self {
        Self::Complete {
            started_at: self.started_at(),
            completed_at: now,
        }
    }
}

/// Derived status of a discussion. Never stored, always recomputed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    NotStarted,
    Opened,
    Complete,
}

impl DiscussionStatus {
    /// Status from the two nullable lifecycle timestamps.
    pub fn from_timestamps<T>(started_at: Option<T>, completed_at: Option<T>) -> Self {
        match (started_at, completed_at) {
            (None, None) => Self::NotStarted,
            (Some(_), None) => Self::Opened,
            (_, Some(_)) => Self::Complete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Opened => "opened",
            Self::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "opened" => Some(Self::Opened),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscussionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discussion as returned by the API, with its derived fields filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionResponse {
    pub id: Uuid,
    pub task_comment_id: Uuid,
    pub status: DiscussionStatus,
    pub time_started: Option<DateTime<Utc>>,
    pub time_completed: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DiscussionComment> for DiscussionResponse {
    fn from(d: DiscussionComment) -> Self {
        Self {
            id: d.id,
            task_comment_id: d.task_comment_id,
            status: d.status(),
            time_started: d.time_started(),
            time_completed: d.time_completed(),
            due_date: d.due_date(),
            created_at: d.created_at,
        }
    }
}

/// Prompt files found for a discussion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptListing {
    pub files: Vec<String>,
    /// Files that exist beyond a gap in the numbering and are not served.
    pub stranded: Vec<String>,
}

/// Returned after an uploaded recording was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioUploadResponse {
    pub discussion_id: Uuid,
    pub file_name: String,
}
