use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A comment left on a student's task.
///
/// Task comments own discussion comments: a discussion is always created by
/// annotating an existing task comment, and it can never outlive the
/// reference to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskComment {
    pub id: Uuid,
    /// The task this comment was left on. Discussion files are grouped per task.
    pub task_id: Uuid,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskCommentInput {
    pub task_id: Uuid,
    pub author: String,
    #[serde(default)]
    pub content: String,
}
