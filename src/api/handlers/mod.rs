use std::io::Write;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::error::{DiscussionError, IngestError, PromptError};
use crate::ingest::{IngestOutcome, UploadKind};
use crate::models::*;

type ApiError = (StatusCode, String);

// ============================================================
// Error Handling
// ============================================================

/// Map an error to a response, exposing only domain errors to the client.
///
/// The full error is logged server-side. Anything that is not a
/// [`DiscussionError`] becomes a generic 500.
fn internal_error(e: anyhow::Error) -> ApiError {
    if let Some(err) = e.downcast_ref::<DiscussionError>() {
        let status = match err {
            DiscussionError::Validation(_) => StatusCode::BAD_REQUEST,
            DiscussionError::NotFound(_) => StatusCode::NOT_FOUND,
            DiscussionError::InvalidTransition { .. } => StatusCode::CONFLICT,
        };
        tracing::warn!("Request rejected: {}", err);
        return (status, err.to_string());
    }

    tracing::error!("Internal error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn prompt_error(e: PromptError) -> ApiError {
    tracing::error!("Prompt file error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn ingest_error(e: IngestError) -> ApiError {
    match e {
        IngestError::Persistence(e) => internal_error(e),
        IngestError::Io { .. } => {
            tracing::error!("Upload storage error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    internal_error(anyhow::Error::new(e))
}

fn discussion_not_found() -> ApiError {
    (StatusCode::NOT_FOUND, "Discussion not found".to_string())
}

/// Load a discussion together with the task comment that owns it.
fn load_discussion(state: &AppState, id: Uuid) -> Result<(DiscussionComment, TaskComment), ApiError> {
    let discussion = state
        .db
        .get_discussion_comment(id)
        .map_err(internal_error)?
        .ok_or_else(discussion_not_found)?;

    let comment = state
        .db
        .get_task_comment(discussion.task_comment_id)
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "Task comment not found".to_string(),
        ))?;

    Ok((discussion, comment))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Task comments
// ============================================================

pub async fn create_task_comment(
    State(state): State<AppState>,
    Json(input): Json<CreateTaskCommentInput>,
) -> Result<(StatusCode, Json<TaskComment>), ApiError> {
    state
        .db
        .create_task_comment(input)
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(internal_error)
}

pub async fn get_task_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskComment>, ApiError> {
    state
        .db
        .get_task_comment(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Task comment not found".to_string()))
}

pub async fn create_discussion(
    State(state): State<AppState>,
    Path(task_comment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<DiscussionResponse>), ApiError> {
    state
        .db
        .create_discussion_comment(task_comment_id)
        .map(|d| (StatusCode::CREATED, Json(d.into())))
        .map_err(internal_error)
}

// ============================================================
// Discussions
// ============================================================

pub async fn get_discussion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DiscussionResponse>, ApiError> {
    state
        .db
        .get_discussion_comment(id)
        .map_err(internal_error)?
        .map(|d| Json(d.into()))
        .ok_or_else(discussion_not_found)
}

pub async fn start_discussion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DiscussionResponse>, ApiError> {
    state
        .db
        .start_discussion(id)
        .map_err(internal_error)?
        .map(|d| Json(d.into()))
        .ok_or_else(discussion_not_found)
}

pub async fn finish_discussion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DiscussionResponse>, ApiError> {
    state
        .db
        .finish_discussion(id)
        .map_err(internal_error)?
        .map(|d| Json(d.into()))
        .ok_or_else(discussion_not_found)
}

pub async fn list_task_discussions(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Vec<DiscussionResponse>>, ApiError> {
    let discussions = state
        .db
        .get_discussions_by_task(task_id)
        .map_err(internal_error)?;

    Ok(Json(discussions.into_iter().map(Into::into).collect()))
}

// ============================================================
// Prompt files
// ============================================================

pub async fn list_prompts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromptListing>, ApiError> {
    let (_, comment) = load_discussion(&state, id)?;

    let collected = tokio::task::spawn_blocking(move || state.prompts.list(&comment))
        .await
        .map_err(join_error)?
        .map_err(prompt_error)?;

    let names = |paths: Vec<std::path::PathBuf>| -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    };

    Ok(Json(PromptListing {
        files: names(collected.files),
        stranded: names(collected.stranded),
    }))
}

pub async fn download_prompts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, comment) = load_discussion(&state, id)?;

    let bytes = tokio::task::spawn_blocking(move || {
        state
            .prompts
            .package(&comment)
            .and_then(|archive| archive.into_bytes())
    })
    .await
    .map_err(join_error)?
    .map_err(prompt_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_prompts.zip\"", id),
            ),
        ],
        bytes,
    ))
}

pub async fn upload_prompt(
    State(state): State<AppState>,
    Path((id, count)): Path<(Uuid, u32)>,
    body: Bytes,
) -> Result<(StatusCode, Json<AudioUploadResponse>), ApiError> {
    store_upload(state, id, body, UploadKind::Prompt { count }).await
}

pub async fn upload_reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<AudioUploadResponse>), ApiError> {
    store_upload(state, id, body, UploadKind::Reply).await
}

/// Stage the request body in a temp file and run it through the ingestor.
async fn store_upload(
    state: AppState,
    id: Uuid,
    body: Bytes,
    kind: UploadKind,
) -> Result<(StatusCode, Json<AudioUploadResponse>), ApiError> {
    let (discussion, _) = load_discussion(&state, id)?;

    let outcome = tokio::task::spawn_blocking(move || -> Result<IngestOutcome, IngestError> {
        let mut upload = tempfile::Builder::new()
            .prefix("upload")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| IngestError::io(std::env::temp_dir(), e))?;
        upload
            .write_all(&body)
            .and_then(|_| upload.flush())
            .map_err(|e| IngestError::io(upload.path(), e))?;

        match kind {
            UploadKind::Prompt { count } => {
                state
                    .ingestor
                    .add_prompt(&state.db, &discussion, upload.path(), count)
            }
            UploadKind::Reply => state.ingestor.add_reply(&state.db, &discussion, upload.path()),
        }
    })
    .await
    .map_err(join_error)?
    .map_err(ingest_error)?;

    match outcome {
        IngestOutcome::Stored { path } => Ok((
            StatusCode::CREATED,
            Json(AudioUploadResponse {
                discussion_id: id,
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            }),
        )),
        IngestOutcome::Rejected => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Audio could not be processed".to_string(),
        )),
    }
}
