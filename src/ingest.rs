//! Upload ingestion for discussion audio.
//!
//! Every upload goes through the same steps: normalize into a temporary file
//! next to the target, rename it over the target, then bump the owning
//! discussion's `updated_at`. The rename happens before the record update so
//! an updated discussion never points at audio that is not there yet. Only
//! `updated_at` is written, so lifecycle changes made while an upload is in
//! flight survive it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Span;

use crate::audio::AudioProcessor;
use crate::db::Database;
use crate::error::{DiscussionError, IngestError};
use crate::locks::PathLocks;
use crate::models::{DiscussionComment, TaskComment};
use crate::paths::PathResolver;

/// Result of an ingestion that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The upload was normalized and stored at `path`.
    Stored { path: PathBuf },
    /// Audio processing refused the upload. Nothing was written or saved.
    Rejected,
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// What an upload is for. Only the target path and temp file name differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Prompt { count: u32 },
    Reply,
}

impl UploadKind {
    fn temp_prefix(&self) -> &'static str {
        match self {
            Self::Prompt { .. } => "discussion_comment",
            Self::Reply => "discussion_comment_reply",
        }
    }
}

/// Stores uploaded prompt and reply audio for discussions.
#[derive(Clone)]
pub struct AudioIngestor {
    resolver: Arc<dyn PathResolver>,
    processor: Arc<dyn AudioProcessor>,
    locks: PathLocks,
    span: Span,
}

impl AudioIngestor {
    pub fn new(
        resolver: Arc<dyn PathResolver>,
        processor: Arc<dyn AudioProcessor>,
        span: Span,
    ) -> Self {
        Self {
            resolver,
            processor,
            locks: PathLocks::new(),
            span,
        }
    }

    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    /// Store an initial prompt recording as prompt number `count`.
    pub fn add_prompt(
        &self,
        db: &Database,
        discussion: &DiscussionComment,
        upload: &Path,
        count: u32,
    ) -> Result<IngestOutcome, IngestError> {
        self.add_audio(db, discussion, upload, UploadKind::Prompt { count })
    }

    /// Store the student's reply recording.
    pub fn add_reply(
        &self,
        db: &Database,
        discussion: &DiscussionComment,
        upload: &Path,
    ) -> Result<IngestOutcome, IngestError> {
        self.add_audio(db, discussion, upload, UploadKind::Reply)
    }

    fn add_audio(
        &self,
        db: &Database,
        discussion: &DiscussionComment,
        upload: &Path,
        kind: UploadKind,
    ) -> Result<IngestOutcome, IngestError> {
        let comment = owning_comment(db, discussion)?;
        let target = match kind {
            UploadKind::Prompt { count } => self.resolver.prompt_path(&comment, count),
            UploadKind::Reply => self.resolver.reply_path(&comment, discussion.id),
        };

        self.ingest(upload, &target, kind, || {
            db.touch_discussion(discussion.id).map(|_| ())
        })
    }

    /// Normalize `upload` into `target` and run `persist` once it is in place.
    ///
    /// Returns [`IngestOutcome::Rejected`] without touching `target` when audio
    /// processing fails. Any existing file at `target` is replaced.
    pub fn ingest<F>(
        &self,
        upload: &Path,
        target: &Path,
        kind: UploadKind,
        persist: F,
    ) -> Result<IngestOutcome, IngestError>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;

        self.locks
            .run(target, || self.ingest_locked(upload, target, dir, kind, persist))
    }

    fn ingest_locked<F>(
        &self,
        upload: &Path,
        target: &Path,
        dir: &Path,
        kind: UploadKind,
        persist: F,
    ) -> Result<IngestOutcome, IngestError>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        let temp = tempfile::Builder::new()
            .prefix(kind.temp_prefix())
            .suffix(".wav")
            .tempfile_in(dir)
            .map_err(|e| IngestError::io(dir, e))?;

        if !self.processor.process_audio(upload, temp.path()) {
            return Ok(IngestOutcome::Rejected);
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| IngestError::io(temp.path(), e))?;
        temp.persist(target)
            .map_err(|e| IngestError::io(target, e.error))?;

        persist().map_err(IngestError::Persistence)?;

        tracing::info!(parent: &self.span, "Saved discussion audio to {}", target.display());

        Ok(IngestOutcome::Stored {
            path: target.to_path_buf(),
        })
    }
}

fn owning_comment(
    db: &Database,
    discussion: &DiscussionComment,
) -> Result<TaskComment, IngestError> {
    db.get_task_comment(discussion.task_comment_id)
        .map_err(IngestError::Persistence)?
        .ok_or_else(|| {
            IngestError::Persistence(
                DiscussionError::Validation("discussion has no task comment".to_string()).into(),
            )
        })
}
