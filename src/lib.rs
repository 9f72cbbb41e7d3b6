//! Audio discussions on task comments.
//!
//! A tutor annotates a task comment as a discussion and records numbered
//! audio prompts; the student opens the discussion, records a reply and
//! finishes it. This crate tracks that lifecycle, stores the uploaded audio
//! under a fixed naming scheme, and packages a comment's prompts into a zip.

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod locks;
pub mod models;
pub mod paths;
pub mod prompts;
