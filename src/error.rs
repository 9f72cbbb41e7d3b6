//! Error taxonomy.
//!
//! Database plumbing returns [`anyhow::Result`]; domain failures that callers
//! need to tell apart are wrapped in one of the enums below so the API layer
//! can downcast them.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DiscussionStatus;

/// Lifecycle and persistence-rule violations.
#[derive(Debug, Error)]
pub enum DiscussionError {
    /// A record failed validation and was not persisted.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Cannot {action} a discussion that is {from}")]
    InvalidTransition {
        from: DiscussionStatus,
        action: &'static str,
    },
}

/// Failures while discovering or packaging prompt files.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PromptError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures after an upload was accepted by audio processing.
///
/// A rejected upload is not an error; see [`crate::ingest::IngestOutcome`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist discussion: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
