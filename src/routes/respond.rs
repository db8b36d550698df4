//! Handlers behind an invitee's personal link.
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::Response,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::read_upload_form;
use crate::error::{AppError, AppResult};
use crate::invitations::{secret, service, AnyInvitation, InvitationStatus};
use crate::state::AppState;

/// What the invitee sees: the invitation plus its derived status.
#[derive(Debug, Serialize)]
pub struct InvitationView {
    #[serde(flatten)]
    pub invitation: AnyInvitation,
    pub status: InvitationStatus,
}

impl From<AnyInvitation> for InvitationView {
    fn from(invitation: AnyInvitation) -> Self {
        let status = invitation.invitation().status();
        Self { invitation, status }
    }
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<InvitationView>> {
    let invitation = secret::resolve(state.repo.as_ref(), &token).await?;
    Ok(Json(invitation.into()))
}

pub async fn accept(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<InvitationView>> {
    let invitation = secret::resolve(state.repo.as_ref(), &token).await?;
    let today = Utc::now().date_naive();
    let saved = service::accept(state.repo.as_ref(), invitation, today).await?;
    Ok(Json(saved.into()))
}

pub async fn decline(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<InvitationView>> {
    let invitation = secret::resolve(state.repo.as_ref(), &token).await?;
    let saved = service::decline(state.repo.as_ref(), invitation).await?;
    Ok(Json(saved.into()))
}

pub async fn upload_content(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<InvitationView>> {
    let invitation = secret::resolve(state.repo.as_ref(), &token).await?;
    let form = read_upload_form(multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| AppError::Validation("missing file field".to_string()))?;

    let today = Utc::now().date_naive();
    let saved = service::attach_any(
        state.repo.as_ref(),
        state.files.as_ref(),
        invitation,
        upload,
        today,
    )
    .await?;
    Ok(Json(saved.into()))
}

pub async fn download_content(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let invitation = secret::resolve(state.repo.as_ref(), &token).await?;
    let filename = invitation
        .filename()
        .ok_or_else(|| AppError::NotFound("no content attached".to_string()))?;
    let dir = invitation.content_dir()?;

    let content = state
        .files
        .read(&dir, filename)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file {}", filename)))?;

    let mime = mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream");

    Response::builder()
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_DISPOSITION, attachment_disposition(filename))
        .body(Body::from(content))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// `Content-Disposition` value for a download; characters that could end
/// the quoted name or break the header become `_`.
fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && !matches!(c, '"' | '\\')) {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
