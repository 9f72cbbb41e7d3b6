//! Discovery and packaging of discussion prompt files.
//!
//! Prompts for a comment are numbered from zero. [`PromptFileCollector`] finds
//! the contiguous run of them and [`PromptArchiver`] packs that run into the
//! task's prompt archive.

mod archiver;
mod collector;

use std::sync::Arc;

use tracing::Span;

pub use archiver::*;
pub use collector::*;

use crate::error::PromptError;
use crate::locks::PathLocks;
use crate::models::TaskComment;
use crate::paths::PathResolver;

/// Collector and archiver wired to a path scheme.
#[derive(Clone)]
pub struct DiscussionPrompts {
    resolver: Arc<dyn PathResolver>,
    locks: PathLocks,
    span: Span,
}

impl DiscussionPrompts {
    pub fn new(resolver: Arc<dyn PathResolver>, span: Span) -> Self {
        Self {
            resolver,
            locks: PathLocks::new(),
            span,
        }
    }

    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    /// The prompt files recorded for `comment`.
    pub fn list(&self, comment: &TaskComment) -> Result<CollectedPrompts, PromptError> {
        PromptFileCollector::new(self.span.clone()).collect(&self.resolver.prompt_prefix(comment))
    }

    /// Collect the prompts for `comment` and pack them into its task's archive.
    ///
    /// Comments of one task share the archive path, so packaging is serialized
    /// per path and the returned archive reads from its own handle.
    pub fn package(&self, comment: &TaskComment) -> Result<PromptArchive, PromptError> {
        let destination = self.resolver.prompt_archive_path(comment.task_id);
        self.locks.run(&destination, || {
            let collected = self.list(comment)?;
            PromptArchiver::new(self.span.clone()).archive(&collected.files, &destination)
        })
    }
}
