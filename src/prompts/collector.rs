use std::path::{Path, PathBuf};

use tracing::Span;

use crate::error::PromptError;
use crate::paths::indexed_prompt_path;

/// How many indices past the end of a run are probed for stranded files.
pub const GAP_PROBE_WINDOW: u32 = 8;

/// Prompt files discovered for one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedPrompts {
    /// The contiguous run `_0.wav, _1.wav, ...`, in index order.
    pub files: Vec<PathBuf>,
    /// Files found past the first missing index. Never part of `files`.
    pub stranded: Vec<PathBuf>,
}

impl CollectedPrompts {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Finds the prompt files recorded for a comment.
pub struct PromptFileCollector {
    span: Span,
}

impl PromptFileCollector {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Scan `"{prefix}_{i}.wav"` from `i = 0` and stop at the first missing index.
    ///
    /// A gap truncates the run. Anything found within [`GAP_PROBE_WINDOW`]
    /// indices after the gap is reported in `stranded` and logged, but not
    /// collected.
    pub fn collect(&self, prefix: &Path) -> Result<CollectedPrompts, PromptError> {
        let mut files = Vec::new();
        let mut index = 0u32;

        loop {
            let path = indexed_prompt_path(prefix, index);
            if !exists(&path)? {
                break;
            }
            files.push(path);
            index += 1;
        }

        let mut stranded = Vec::new();
        for probe in (index + 1)..=(index + GAP_PROBE_WINDOW) {
            let path = indexed_prompt_path(prefix, probe);
            if exists(&path)? {
                stranded.push(path);
            }
        }

        if !stranded.is_empty() {
            tracing::warn!(
                parent: &self.span,
                gap = index,
                stranded = stranded.len(),
                "Prompt files exist past a gap at {} and will not be collected",
                indexed_prompt_path(prefix, index).display()
            );
        }

        tracing::debug!(parent: &self.span, count = files.len(), "Collected prompt files");

        Ok(CollectedPrompts { files, stranded })
    }
}

fn exists(path: &Path) -> Result<bool, PromptError> {
    path.try_exists().map_err(|e| PromptError::io(path, e))
}
