//! Story job handlers.
//!
//! Provides REST API endpoints for:
//! - Submitting a document for story generation
//! - Polling story status and single scenes
//! - Deleting a story and its media

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use storyreel_models::{SceneView, StoryId, StoryOptions, StoryStatus, StoryStatusView};
use storyreel_storage::story_prefix;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body of `POST /api/jobs`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    /// Extracted document text
    #[validate(length(min = 1, message = "document_text must not be empty"))]
    pub document_text: String,
    /// Keeps this title instead of the generated one
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub grade_level: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub voice: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub style: Option<String>,
}

impl CreateJobRequest {
    fn options(&self) -> StoryOptions {
        let defaults = StoryOptions::default();
        StoryOptions {
            grade_level: self.grade_level.clone().unwrap_or(defaults.grade_level),
            voice: self.voice.clone().unwrap_or(defaults.voice),
            style: self.style.clone().unwrap_or(defaults.style),
        }
    }
}

/// Response of `POST /api/jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub story_id: StoryId,
    pub status: StoryStatus,
}

/// Submit a document; generation continues in the background.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let text = request.document_text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("document_text must not be blank".to_string()));
    }
    let chars = text.chars().count();
    if chars > state.config.max_document_chars {
        return Err(ApiError::Validation(format!(
            "document_text has {} characters; the limit is {}",
            chars, state.config.max_document_chars
        )));
    }

    let story_id = state
        .pipeline
        .submit(
            text.to_string(),
            request.title.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
            request.options(),
        )
        .await?;
    info!(story_id = %story_id, chars = chars, "Story submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            story_id,
            status: StoryStatus::Pending,
        }),
    ))
}

/// Full status of a story with all scenes in order.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> ApiResult<Json<StoryStatusView>> {
    let story_id = parse_story_id(&story_id)?;
    Ok(Json(state.status.get_status(&story_id).await?))
}

/// One scene of a story.
pub async fn get_job_scene(
    State(state): State<AppState>,
    Path((story_id, index)): Path<(String, u32)>,
) -> ApiResult<Json<SceneView>> {
    let story_id = parse_story_id(&story_id)?;
    Ok(Json(state.status.get_scene(&story_id, index).await?))
}

/// Delete a story and its stored media.
///
/// Generation still in flight for the story finishes and is discarded.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> ApiResult<StatusCode> {
    let story_id = parse_story_id(&story_id)?;
    state.store.delete_story(&story_id).await?;

    match state.blobs.delete_prefix(&story_prefix(story_id.as_str())).await {
        Ok(removed) => info!(story_id = %story_id, removed = removed, "Story media deleted"),
        Err(e) => warn!(story_id = %story_id, error = %e, "Failed to delete story media"),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Reject IDs that could not have been issued by the store.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
fn parse_story_id(id: &str) -> ApiResult<StoryId> {
    if is_valid_story_id(id) {
        Ok(StoryId::from_string(id))
    } else {
        Err(ApiError::bad_request("Invalid story ID format"))
    }
}

fn is_valid_story_id(id: &str) -> bool {
    (8..=64).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
