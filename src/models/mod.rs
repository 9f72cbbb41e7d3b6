//! Domain models.
//!
//! - [`TaskComment`]: a comment on a student's task. Owns at most one discussion.
//! - [`DiscussionComment`]: an audio discussion hanging off a task comment, with
//!   a lifecycle of [`DiscussionState`] and a derived [`DiscussionStatus`].

mod discussion;
mod task_comment;

pub use discussion::*;
pub use task_comment::*;
