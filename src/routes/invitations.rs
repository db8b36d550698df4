//! Organizer endpoints for issuing and cleaning up invitations.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::invitations::service::{self, InvitationTarget, Invitee};
use crate::invitations::{AnyInvitation, Prospect};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChairRequest {
    pub submission_id: i32,
    pub user_id: Option<i32>,
    pub prospect: Option<Prospect>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub submission_id: i32,
    pub title: Option<String>,
    pub user_id: Option<i32>,
    pub prospect: Option<Prospect>,
}

#[derive(Debug, Deserialize)]
pub struct PaperRequest {
    pub conference_id: i32,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub user_id: Option<i32>,
    pub prospect: Option<Prospect>,
}

/// The secret itself never appears in invitation JSON; the organizer gets
/// the link to forward instead.
#[derive(Debug, Serialize)]
pub struct CreatedInvitation {
    pub invitation: AnyInvitation,
    pub link: String,
}

async fn create(
    state: &AppState,
    target: InvitationTarget,
    invitee: Invitee,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    let today = Utc::now().date_naive();
    let invitation = service::invite(state.repo.as_ref(), target, invitee, today).await?;
    let link = format!(
        "{}/respond/{}",
        state.config.base_url.trim_end_matches('/'),
        invitation.invitation().secret()
    );
    Ok((StatusCode::CREATED, Json(CreatedInvitation { invitation, link })))
}

pub async fn invite_chair(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChairRequest>,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    create(
        &state,
        InvitationTarget::Chair {
            submission_id: req.submission_id,
        },
        Invitee {
            user_id: req.user_id,
            prospect: req.prospect,
        },
    )
    .await
}

pub async fn invite_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    create(
        &state,
        InvitationTarget::Comment {
            submission_id: req.submission_id,
            title: req.title,
        },
        Invitee {
            user_id: req.user_id,
            prospect: req.prospect,
        },
    )
    .await
}

pub async fn invite_paper(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaperRequest>,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    create(
        &state,
        InvitationTarget::Paper {
            conference_id: req.conference_id,
            title: req.title,
            abstract_text: req.abstract_text,
        },
        Invitee {
            user_id: req.user_id,
            prospect: req.prospect,
        },
    )
    .await
}

pub async fn remove_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let invitation = state
        .repo
        .get_invitation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("invitation {}", id)))?;

    service::remove_content(state.repo.as_ref(), state.files.as_ref(), invitation).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::db::memory::MemoryRepository;
    use crate::db::Repository;
    use crate::submissions::{Submission, SubmissionStatus};
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn submission(repo: &MemoryRepository, author: i32) -> i32 {
        repo.insert_submission(Submission {
            id: 0,
            user_id: author,
            conference_id: 1,
            date_submitted: Utc::now().date_naive(),
            title: "Modular forms".into(),
            keywords: String::new(),
            abstract_text: String::new(),
            file_extension: Some("pdf".into()),
            status: SubmissionStatus::Submitted,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_comment_lifecycle_and_removal() {
        let repo = Arc::new(MemoryRepository::new());
        let dir = tempdir().unwrap();
        let app = app(repo.clone(), dir.path().to_path_buf());
        let author = repo.add_user("author@example.org", "Au", "Thor");
        let discussant = repo.add_user("disc@example.org", "Dis", "Cussant");
        let sid = submission(&repo, author.id).await;

        let created = send(
            &app,
            json_request(
                "POST",
                "/invitations/comment",
                None,
                json!({"submission_id": sid, "user_id": discussant.id, "title": "Discussion"}),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = body_json(created).await;
        let id = created["invitation"]["id"].as_i64().unwrap() as i32;
        let path = created["link"]
            .as_str()
            .unwrap()
            .trim_start_matches("https://society.example")
            .to_string();

        send(&app, empty_request("POST", &format!("{}/accept", path), None)).await;
        let body = multipart_body(&[], Some(("../../comment.docx", &b"PK\x03\x04"[..])));
        let uploaded = send(
            &app,
            multipart_request(&format!("{}/content", path), None, body),
        )
        .await;
        assert_eq!(uploaded.status(), StatusCode::OK);
        let stored = dir
            .path()
            .join(format!("comments/user{}/{}/comment.docx", discussant.id, sid));
        assert!(stored.is_file());

        let removed = send(
            &app,
            empty_request("DELETE", &format!("/invitations/{}/content", id), None),
        )
        .await;
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);
        assert!(!stored.exists());
        assert!(repo.get_invitation(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_comment_invitation_is_duplicate() {
        let repo = Arc::new(MemoryRepository::new());
        let dir = tempdir().unwrap();
        let app = app(repo.clone(), dir.path().to_path_buf());
        let author = repo.add_user("author@example.org", "Au", "Thor");
        let discussant = repo.add_user("disc@example.org", "Dis", "Cussant");
        let sid = submission(&repo, author.id).await;
        let request = json!({"submission_id": sid, "user_id": discussant.id});

        let first = send(&app, json_request("POST", "/invitations/comment", None, request.clone())).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = send(&app, json_request("POST", "/invitations/comment", None, request)).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"], "Duplicate");
    }

    #[tokio::test]
    async fn test_chair_accept_counts_as_submission() {
        let repo = Arc::new(MemoryRepository::new());
        let dir = tempdir().unwrap();
        let app = app(repo.clone(), dir.path().to_path_buf());
        let author = repo.add_user("author@example.org", "Au", "Thor");
        let chair = repo.add_user("chair@example.org", "Cha", "Ir");
        let sid = submission(&repo, author.id).await;

        let created = body_json(
            send(
                &app,
                json_request(
                    "POST",
                    "/invitations/chair",
                    None,
                    json!({"submission_id": sid, "user_id": chair.id}),
                ),
            )
            .await,
        )
        .await;
        let path = created["link"]
            .as_str()
            .unwrap()
            .trim_start_matches("https://society.example")
            .to_string();

        let accepted = body_json(
            send(&app, empty_request("POST", &format!("{}/accept", path), None)).await,
        )
        .await;
        assert_eq!(accepted["kind"], "chair");
        assert!(accepted["invitation"]["date_submitted"].is_string());
    }

    #[tokio::test]
    async fn test_invitation_without_invitee_is_rejected() {
        let repo = Arc::new(MemoryRepository::new());
        let dir = tempdir().unwrap();
        let app = app(repo, dir.path().to_path_buf());

        let response = send(
            &app,
            json_request("POST", "/invitations/paper", None, json!({"conference_id": 1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
