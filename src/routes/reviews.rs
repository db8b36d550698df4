use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::AuthenticatedUser;
use crate::error::AppResult;
use crate::reviews::{service, Review};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub grade: Option<String>,
    #[serde(default)]
    pub comments: String,
}

pub async fn accept(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Review>> {
    let review = service::accept(state.repo.as_ref(), user.id, id).await?;
    Ok(Json(review))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<Review>> {
    let review = service::submit(
        state.repo.as_ref(),
        user.id,
        id,
        req.grade.as_deref(),
        &req.comments,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(review))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    service::withdraw(state.repo.as_ref(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
