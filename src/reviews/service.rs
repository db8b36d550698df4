use chrono::NaiveDate;

use super::{Grade, Review, ReviewStatus};
use crate::db::Repository;
use crate::error::{AppError, AppResult};

async fn load_own(repo: &dyn Repository, actor: i32, id: i32) -> AppResult<Review> {
    let review = repo
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("review {}", id)))?;

    if review.user_id != actor {
        return Err(AppError::Forbidden(format!(
            "review {} belongs to another reviewer",
            id
        )));
    }
    Ok(review)
}

/// Assigns a reviewer to a submission.
pub async fn assign(
    repo: &dyn Repository,
    reviewer_id: i32,
    submission_id: i32,
    today: NaiveDate,
) -> AppResult<Review> {
    let submission = repo
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", submission_id)))?;
    if repo.get_user(reviewer_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", reviewer_id)));
    }
    if submission.user_id == reviewer_id {
        return Err(AppError::Validation(
            "authors cannot review their own submission".to_string(),
        ));
    }

    let review = repo
        .insert_review(Review::new(reviewer_id, submission_id, today))
        .await?;
    tracing::info!(
        "Review {} assigned to user {} for submission {}",
        review.id,
        reviewer_id,
        submission_id
    );
    Ok(review)
}

pub async fn accept(repo: &dyn Repository, actor: i32, id: i32) -> AppResult<Review> {
    let mut review = load_own(repo, actor, id).await?;
    review.accept()?;
    let saved = repo.update_review(&review).await?;
    tracing::debug!("Review {} accepted", id);
    Ok(saved)
}

pub async fn submit(
    repo: &dyn Repository,
    actor: i32,
    id: i32,
    grade: Option<&str>,
    comments: &str,
    today: NaiveDate,
) -> AppResult<Review> {
    let mut review = load_own(repo, actor, id).await?;
    // The state check in `submit` comes before any complaint about the grade.
    let grade = if review.status() == ReviewStatus::Accepted {
        grade.map(str::parse::<Grade>).transpose()?
    } else {
        None
    };
    review.submit(grade, comments, today)?;
    let saved = repo.update_review(&review).await?;
    tracing::info!("Review {} submitted", id);
    Ok(saved)
}

/// A reviewer stepping back removes the review; submitted reviews stay.
pub async fn withdraw(repo: &dyn Repository, actor: i32, id: i32) -> AppResult<()> {
    let review = load_own(repo, actor, id).await?;
    if review.status() == ReviewStatus::Submitted {
        return Err(AppError::InvalidState(format!(
            "review {} was already submitted",
            id
        )));
    }
    repo.delete_review(id).await?;
    tracing::info!("Review {} withdrawn", id);
    Ok(())
}
