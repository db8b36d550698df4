use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{read_upload_form, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::reviews::{self, Review};
use crate::state::AppState;
use crate::submissions::service::{self, NewSubmission};
use crate::submissions::{Submission, Verdict};

#[derive(Debug, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub keyword_list: Vec<String>,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub verdict: Verdict,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub reviewer_id: i32,
}

/// Multipart fields: `title`, `abstract`, `keywords` and the `file` itself.
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(conference_id): Path<i32>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Submission>)> {
    let form = read_upload_form(multipart).await?;
    let details = NewSubmission {
        title: form.text("title"),
        abstract_text: form.text("abstract"),
        keywords: form.text("keywords"),
    };
    let upload = form
        .file
        .ok_or_else(|| AppError::Validation("missing file field".to_string()))?;

    let submission = service::create(
        state.repo.as_ref(),
        state.files.as_ref(),
        user.id,
        conference_id,
        upload,
        details,
        Utc::now().date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<SubmissionView>> {
    let submission = state
        .repo
        .get_submission(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", id)))?;
    let reviews = state.repo.list_reviews(id).await?;

    Ok(Json(SubmissionView {
        keyword_list: submission.keywords_list(),
        submission,
        reviews,
    }))
}

pub async fn decide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<Submission>> {
    let submission = service::decide(state.repo.as_ref(), id, req.verdict).await?;
    Ok(Json(submission))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    service::delete(state.repo.as_ref(), state.files.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_reviewer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<AssignRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = reviews::service::assign(
        state.repo.as_ref(),
        req.reviewer_id,
        id,
        Utc::now().date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
