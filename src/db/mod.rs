mod models;
mod postgres;

#[cfg(test)]
pub mod memory;

pub use models::*;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::AppResult;
use crate::invitations::{AnyInvitation, Prospect};
use crate::reviews::Review;
use crate::submissions::Submission;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Persistence for invitations, submissions and reviews.
///
/// Inserts ignore the `id`/`version` of the value passed in and return the
/// stored record. Updates of versioned records fail with
/// `AppError::Conflict` when the stored version moved on, and return the
/// record with its new version.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: i32) -> AppResult<Option<User>>;
    /// Looks the prospect up by email, creating the account when missing.
    async fn find_or_create_user(&self, prospect: &Prospect) -> AppResult<User>;

    async fn insert_invitation(&self, invitation: AnyInvitation) -> AppResult<AnyInvitation>;
    async fn get_invitation(&self, id: i32) -> AppResult<Option<AnyInvitation>>;
    async fn find_invitation_by_secret(&self, secret: &str) -> AppResult<Option<AnyInvitation>>;
    /// Invitations that are pending or accepted but not yet submitted.
    async fn list_open_invitations(&self) -> AppResult<Vec<AnyInvitation>>;
    async fn update_invitation(&self, invitation: &AnyInvitation) -> AppResult<AnyInvitation>;
    async fn delete_invitation(&self, id: i32) -> AppResult<()>;

    async fn insert_submission(&self, submission: Submission) -> AppResult<Submission>;
    async fn get_submission(&self, id: i32) -> AppResult<Option<Submission>>;
    async fn find_submission(
        &self,
        user_id: i32,
        conference_id: i32,
    ) -> AppResult<Option<Submission>>;
    async fn update_submission(&self, submission: &Submission) -> AppResult<()>;
    async fn delete_submission(&self, id: i32) -> AppResult<()>;

    async fn insert_review(&self, review: Review) -> AppResult<Review>;
    async fn get_review(&self, id: i32) -> AppResult<Option<Review>>;
    async fn list_reviews(&self, submission_id: i32) -> AppResult<Vec<Review>>;
    /// Reviews that are pending or accepted.
    async fn list_open_reviews(&self) -> AppResult<Vec<Review>>;
    async fn update_review(&self, review: &Review) -> AppResult<Review>;
    async fn delete_review(&self, id: i32) -> AppResult<()>;

    /// Records that the reminder pass for `period` has started. Returns
    /// `false` when that period was already claimed.
    async fn claim_reminder_period(&self, period: &str) -> AppResult<bool>;
    /// Drops a claim so the period can be run again.
    async fn release_reminder_period(&self, period: &str) -> AppResult<()>;
    /// The latest claimed period of the same granularity before `current`.
    async fn previous_reminder_period(&self, current: &str) -> AppResult<Option<String>>;
}

/// Source of members whose dues run out, owned by the membership component.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn lapsing_members(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<LapsingMember>>;
}
