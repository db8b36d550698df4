use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Multipart,
    routing::{delete, get, post},
    Router,
};

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::Upload;

pub mod auth;
pub mod invitations;
pub mod respond;
pub mod reviews;
pub mod submissions;

pub use auth::AuthenticatedUser;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/respond/:secret", get(respond::show))
        .route("/respond/:secret/accept", post(respond::accept))
        .route("/respond/:secret/decline", post(respond::decline))
        .route(
            "/respond/:secret/content",
            post(respond::upload_content).get(respond::download_content),
        )
        .route("/invitations/chair", post(invitations::invite_chair))
        .route("/invitations/comment", post(invitations::invite_comment))
        .route("/invitations/paper", post(invitations::invite_paper))
        .route("/invitations/:id/content", delete(invitations::remove_content))
        .route("/conferences/:id/submissions", post(submissions::create))
        .route(
            "/submissions/:id",
            get(submissions::show).delete(submissions::delete),
        )
        .route("/submissions/:id/decision", post(submissions::decide))
        .route("/submissions/:id/reviews", post(submissions::assign_reviewer))
        .route("/reviews/:id", delete(reviews::withdraw))
        .route("/reviews/:id/accept", post(reviews::accept))
        .route("/reviews/:id/submit", post(reviews::submit))
        .with_state(state)
}

/// Multipart form split into the uploaded `file` field and text fields.
pub(crate) struct UploadForm {
    pub file: Option<Upload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

pub(crate) async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm {
        file: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
            form.file = Some(Upload {
                bytes: bytes.to_vec(),
                filename,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read {}: {}", name, e)))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryRepository;
    use crate::jobs::ReminderPeriod;
    use crate::storage::DiskFileStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    pub const BOUNDARY: &str = "XsymposiumX";

    pub fn test_config(upload_folder: PathBuf) -> Config {
        Config {
            database_url: String::new(),
            upload_folder,
            host: "127.0.0.1".to_string(),
            port: 5001,
            base_url: "https://society.example".to_string(),
            smtp_url: None,
            mail_from: "noreply@society.example".to_string(),
            invitation_reminder_cap: 3,
            submission_reminder_cap: 3,
            review_reminder_cap: 3,
            reminder_interval_days: 7,
            submission_deadline_days: 60,
            review_deadline_days: 30,
            reminder_period: ReminderPeriod::Daily,
            reminder_job_interval: Duration::from_secs(86400),
        }
    }

    pub fn app(repo: Arc<MemoryRepository>, root: PathBuf) -> Router {
        router(Arc::new(AppState {
            repo,
            files: Arc::new(DiskFileStore::new(root.clone())),
            config: Arc::new(test_config(root)),
        }))
    }

    /// Builds a multipart body with text fields and an optional `file` part.
    pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn multipart_request(uri: &str, user: Option<i32>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(id) = user {
            builder = builder.header(auth::USER_HEADER, id.to_string());
        }
        builder.body(Body::from(body)).unwrap()
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        user: Option<i32>,
        json: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(id) = user {
            builder = builder.header(auth::USER_HEADER, id.to_string());
        }
        builder.body(Body::from(json.to_string())).unwrap()
    }

    pub fn empty_request(method: &str, uri: &str, user: Option<i32>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            builder = builder.header(auth::USER_HEADER, id.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }
}
