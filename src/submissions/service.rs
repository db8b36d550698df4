use chrono::NaiveDate;
use serde::Deserialize;

use super::{file_dir, file_name, Submission, SubmissionStatus, Verdict};
use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::storage::{extension_of, sanitize_filename, FileStore, Upload};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubmission {
    pub title: String,
    pub abstract_text: String,
    pub keywords: String,
}

pub async fn create(
    repo: &dyn Repository,
    files: &dyn FileStore,
    user_id: i32,
    conference_id: i32,
    upload: Upload,
    details: NewSubmission,
    today: NaiveDate,
) -> AppResult<Submission> {
    let title = details.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("a title is required".to_string()));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    let original = sanitize_filename(&upload.filename)?;
    let extension = extension_of(&original).ok_or_else(|| {
        AppError::Validation(format!("{} has no file extension", original))
    })?;

    if repo.find_submission(user_id, conference_id).await?.is_some() {
        return Err(AppError::Duplicate(format!(
            "user {} already submitted to conference {}",
            user_id, conference_id
        )));
    }

    let dir = file_dir(user_id, conference_id);
    let stored_name = file_name(&extension);
    let staged = files.stage(upload.bytes, &dir).await?;

    let submission = Submission {
        id: 0,
        user_id,
        conference_id,
        date_submitted: today,
        title,
        keywords: details.keywords,
        abstract_text: details.abstract_text,
        file_extension: Some(extension),
        status: SubmissionStatus::Submitted,
    };

    let saved = match repo.insert_submission(submission).await {
        Ok(saved) => saved,
        Err(e) => {
            if !matches!(e, AppError::Duplicate(_)) {
                tracing::error!("Failed to record submission: {}", e);
            }
            if let Err(cleanup) = files.remove(&dir, &staged).await {
                tracing::error!("Orphaned submission file {} left behind: {}", staged, cleanup);
            }
            return Err(e);
        }
    };

    files.promote(&dir, &staged, &stored_name).await?;
    tracing::info!(
        "Submission {} by user {} to conference {}",
        saved.id,
        user_id,
        conference_id
    );
    Ok(saved)
}

pub async fn decide(repo: &dyn Repository, id: i32, verdict: Verdict) -> AppResult<Submission> {
    let mut submission = repo
        .get_submission(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", id)))?;

    submission.decide(verdict);
    repo.update_submission(&submission).await?;
    tracing::info!("Submission {} decided: {}", id, submission.status().as_str());
    Ok(submission)
}

/// Deletes a submission and its file. Submissions that already have reviews
/// are kept; their reviews must be withdrawn first.
pub async fn delete(repo: &dyn Repository, files: &dyn FileStore, id: i32) -> AppResult<()> {
    let submission = repo
        .get_submission(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", id)))?;

    let reviews = repo.list_reviews(id).await?;
    if !reviews.is_empty() {
        return Err(AppError::InvalidState(format!(
            "submission {} has {} review(s)",
            id,
            reviews.len()
        )));
    }

    repo.delete_submission(id).await?;
    if let Some(name) = submission.file_name() {
        if let Err(e) = files.remove(&submission.file_dir(), &name).await {
            tracing::warn!("Submission {} deleted but its file remains: {}", id, e);
        }
    }
    Ok(())
}
