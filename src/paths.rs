//! File naming scheme for discussion audio.
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/discussion/<task_id>/<task_comment_id>_<count>.wav              prompts
//! <root>/discussion/<task_id>/<task_comment_id>_reply_<discussion_id>.wav replies
//! <root>/discussion/<task_id>_prompts.zip                                 packaged prompts
//! ```
//!
//! These names are read back by other tools, so they must not change.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::TaskComment;

pub const AUDIO_EXTENSION: &str = "wav";

/// Maps comment and task identities to file-system paths.
///
/// Implementations must be pure: the same identity always resolves to the
/// same path, and distinct identities never collide.
pub trait PathResolver: Send + Sync {
    /// Directory holding all discussion audio for one task.
    fn discussion_dir(&self, task_id: Uuid) -> PathBuf;

    /// Where the packaged prompts for a task are written.
    fn prompt_archive_path(&self, task_id: Uuid) -> PathBuf;

    /// Common prefix of every prompt file for a comment, without index or extension.
    fn prompt_prefix(&self, comment: &TaskComment) -> PathBuf {
        self.discussion_dir(comment.task_id)
            .join(comment.id.to_string())
    }

    fn prompt_path(&self, comment: &TaskComment, count: u32) -> PathBuf {
        indexed_prompt_path(&self.prompt_prefix(comment), count)
    }

    fn reply_path(&self, comment: &TaskComment, discussion_id: Uuid) -> PathBuf {
        self.discussion_dir(comment.task_id).join(format!(
            "{}_reply_{}.{}",
            comment.id, discussion_id, AUDIO_EXTENSION
        ))
    }
}

/// `"{prefix}_{index}.wav"`.
///
/// The index is appended to the prefix string rather than joined as a path
/// component, so a prefix of `dir/abc` gives `dir/abc_0.wav`.
pub fn indexed_prompt_path(prefix: &Path, index: u32) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_{}.{}", index, AUDIO_EXTENSION));
    PathBuf::from(name)
}

/// Resolves paths under a single student-work root directory.
#[derive(Debug, Clone)]
pub struct StudentWorkDirs {
    root: PathBuf,
}

impl StudentWorkDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathResolver for StudentWorkDirs {
    fn discussion_dir(&self, task_id: Uuid) -> PathBuf {
        self.root.join("discussion").join(task_id.to_string())
    }

    fn prompt_archive_path(&self, task_id: Uuid) -> PathBuf {
        self.root
            .join("discussion")
            .join(format!("{}_prompts.zip", task_id))
    }
}
