mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::audio::{AudioProcessor, WavNormalizer};
use crate::db::Database;
use crate::ingest::AudioIngestor;
use crate::paths::{PathResolver, StudentWorkDirs};
use crate::prompts::DiscussionPrompts;

/// Largest audio upload accepted, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub prompts: DiscussionPrompts,
    pub ingestor: AudioIngestor,
}

impl AppState {
    /// State storing audio under `data_dir` and normalizing uploads as WAV.
    pub fn new(db: Database, data_dir: impl Into<PathBuf>) -> Self {
        let normalizer = WavNormalizer::new(tracing::info_span!("audio"));
        Self::with_processor(db, data_dir, Arc::new(normalizer))
    }

    pub fn with_processor(
        db: Database,
        data_dir: impl Into<PathBuf>,
        processor: Arc<dyn AudioProcessor>,
    ) -> Self {
        let resolver: Arc<dyn PathResolver> = Arc::new(StudentWorkDirs::new(data_dir));
        Self {
            db,
            prompts: DiscussionPrompts::new(resolver.clone(), tracing::info_span!("prompts")),
            ingestor: AudioIngestor::new(resolver, processor, tracing::info_span!("ingest")),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Task comments
        .route("/task-comments", post(handlers::create_task_comment))
        .route("/task-comments/{id}", get(handlers::get_task_comment))
        .route("/task-comments/{id}/discussion", post(handlers::create_discussion))
        // Discussions
        .route("/discussions/{id}", get(handlers::get_discussion))
        .route("/discussions/{id}/start", post(handlers::start_discussion))
        .route("/discussions/{id}/finish", post(handlers::finish_discussion))
        .route("/discussions/{id}/prompts", get(handlers::list_prompts))
        .route("/discussions/{id}/prompts.zip", get(handlers::download_prompts))
        .route("/discussions/{id}/prompts/{count}", put(handlers::upload_prompt))
        .route("/discussions/{id}/reply", put(handlers::upload_reply))
        // Tasks
        .route("/tasks/{id}/discussions", get(handlers::list_task_discussions))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
