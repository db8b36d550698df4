use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    DbPool, InvitationRow, LapsingMember, LapsingMemberRow, MembershipDirectory, Repository,
    ReviewRow, SubmissionRow, User,
};
use crate::error::{AppError, AppResult};
use crate::invitations::{AnyInvitation, Prospect};
use crate::reviews::Review;
use crate::submissions::Submission;

#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Maps constraint violations onto the lifecycle error taxonomy.
fn classify(e: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return AppError::Duplicate(format!(
                "{} already exists ({})",
                what,
                db.constraint().unwrap_or("unique constraint")
            ));
        }
        if db.is_foreign_key_violation() {
            return AppError::NotFound(format!(
                "{} refers to a missing record ({})",
                what,
                db.constraint().unwrap_or("foreign key")
            ));
        }
    }
    AppError::Database(e)
}

fn stale(what: &str, id: i32) -> AppError {
    AppError::Conflict(format!("{} {} was modified concurrently", what, id))
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(user)
    }

    async fn find_or_create_user(&self, prospect: &Prospect) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, firstname, lastname)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING *
            "#,
        )
        .bind(prospect.email.trim().to_lowercase())
        .bind(&prospect.firstname)
        .bind(&prospect.lastname)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(user)
    }

    async fn insert_invitation(&self, invitation: AnyInvitation) -> AppResult<AnyInvitation> {
        let row = InvitationRow::from(&invitation);
        let stored = sqlx::query_as::<_, InvitationRow>(
            r#"
            INSERT INTO invitations (
                kind, submission_id, conference_id, user_id, date_invitation_sent, secret,
                accepted, invitation_reminder_emails, date_last_invitation_reminder_sent,
                submission_reminder_emails, date_last_submission_reminder_sent, date_submitted,
                firstname, lastname, email, title, abstract_text, filename
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(&row.kind)
        .bind(row.submission_id)
        .bind(row.conference_id)
        .bind(row.user_id)
        .bind(row.date_invitation_sent)
        .bind(&row.secret)
        .bind(row.accepted)
        .bind(row.invitation_reminder_emails)
        .bind(row.date_last_invitation_reminder_sent)
        .bind(row.submission_reminder_emails)
        .bind(row.date_last_submission_reminder_sent)
        .bind(row.date_submitted)
        .bind(&row.firstname)
        .bind(&row.lastname)
        .bind(&row.email)
        .bind(&row.title)
        .bind(&row.abstract_text)
        .bind(&row.filename)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| classify(e, "invitation"))?;

        stored.try_into()
    }

    async fn get_invitation(&self, id: i32) -> AppResult<Option<AnyInvitation>> {
        sqlx::query_as::<_, InvitationRow>("SELECT * FROM invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(AnyInvitation::try_from)
            .transpose()
    }

    async fn find_invitation_by_secret(&self, secret: &str) -> AppResult<Option<AnyInvitation>> {
        sqlx::query_as::<_, InvitationRow>("SELECT * FROM invitations WHERE secret = $1")
            .bind(secret)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(AnyInvitation::try_from)
            .transpose()
    }

    async fn list_open_invitations(&self) -> AppResult<Vec<AnyInvitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT * FROM invitations
            WHERE date_submitted IS NULL AND (accepted IS NULL OR accepted)
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(AnyInvitation::try_from).collect()
    }

    async fn update_invitation(&self, invitation: &AnyInvitation) -> AppResult<AnyInvitation> {
        let row = InvitationRow::from(invitation);
        let stored = sqlx::query_as::<_, InvitationRow>(
            r#"
            UPDATE invitations SET
                version = version + 1,
                user_id = $3,
                accepted = $4,
                invitation_reminder_emails = $5,
                date_last_invitation_reminder_sent = $6,
                submission_reminder_emails = $7,
                date_last_submission_reminder_sent = $8,
                date_submitted = $9,
                title = $10,
                abstract_text = $11,
                filename = $12
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(row.version)
        .bind(row.user_id)
        .bind(row.accepted)
        .bind(row.invitation_reminder_emails)
        .bind(row.date_last_invitation_reminder_sent)
        .bind(row.submission_reminder_emails)
        .bind(row.date_last_submission_reminder_sent)
        .bind(row.date_submitted)
        .bind(&row.title)
        .bind(&row.abstract_text)
        .bind(&row.filename)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| classify(e, "invitation"))?;

        match stored {
            Some(stored) => stored.try_into(),
            None => Err(stale("invitation", row.id)),
        }
    }

    async fn delete_invitation(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("invitation {}", id)));
        }
        Ok(())
    }

    async fn insert_submission(&self, submission: Submission) -> AppResult<Submission> {
        let stored = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions (
                user_id, conference_id, date_submitted, title, keywords, abstract_text,
                file_extension, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(submission.user_id)
        .bind(submission.conference_id)
        .bind(submission.date_submitted)
        .bind(&submission.title)
        .bind(&submission.keywords)
        .bind(&submission.abstract_text)
        .bind(&submission.file_extension)
        .bind(submission.status().as_str())
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| classify(e, "submission"))?;

        stored.try_into()
    }

    async fn get_submission(&self, id: i32) -> AppResult<Option<Submission>> {
        sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Submission::try_from)
            .transpose()
    }

    async fn find_submission(
        &self,
        user_id: i32,
        conference_id: i32,
    ) -> AppResult<Option<Submission>> {
        sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE user_id = $1 AND conference_id = $2",
        )
        .bind(user_id)
        .bind(conference_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Submission::try_from)
        .transpose()
    }

    async fn update_submission(&self, submission: &Submission) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET title = $2, keywords = $3, abstract_text = $4, file_extension = $5, status = $6
            WHERE id = $1
            "#,
        )
        .bind(submission.id)
        .bind(&submission.title)
        .bind(&submission.keywords)
        .bind(&submission.abstract_text)
        .bind(&submission.file_extension)
        .bind(submission.status().as_str())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("submission {}", submission.id)));
        }
        Ok(())
    }

    async fn delete_submission(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| match classify(e, "submission") {
                AppError::NotFound(_) => AppError::InvalidState(format!(
                    "submission {} still has reviews",
                    id
                )),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("submission {}", id)));
        }
        Ok(())
    }

    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        let stored = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO reviews (user_id, submission_id, status, date_created)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(review.user_id)
        .bind(review.submission_id)
        .bind(review.status().as_str())
        .bind(review.date_created())
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| classify(e, "review"))?;

        stored.try_into()
    }

    async fn get_review(&self, id: i32) -> AppResult<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Review::try_from)
            .transpose()
    }

    async fn list_reviews(&self, submission_id: i32) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT * FROM reviews WHERE submission_id = $1 ORDER BY id",
        )
        .bind(submission_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Review::try_from).collect()
    }

    async fn list_open_reviews(&self) -> AppResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT * FROM reviews WHERE status IN ('pending', 'accepted') ORDER BY id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Review::try_from).collect()
    }

    async fn update_review(&self, review: &Review) -> AppResult<Review> {
        let stored = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews SET
                version = version + 1,
                status = $3,
                date_submitted = $4,
                grade = $5,
                comments = $6,
                reminder_emails = $7,
                date_last_reminder_sent = $8
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(review.id)
        .bind(review.version)
        .bind(review.status().as_str())
        .bind(review.date_submitted())
        .bind(review.grade().map(|g| g.as_str()))
        .bind(review.comments())
        .bind(review.reminder_emails())
        .bind(review.date_last_reminder_sent())
        .fetch_optional(self.pool.as_ref())
        .await?;

        match stored {
            Some(stored) => stored.try_into(),
            None => Err(stale("review", review.id)),
        }
    }

    async fn delete_review(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("review {}", id)));
        }
        Ok(())
    }

    async fn claim_reminder_period(&self, period: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO reminder_runs (period) VALUES ($1) ON CONFLICT (period) DO NOTHING",
        )
        .bind(period)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_reminder_period(&self, period: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM reminder_runs WHERE period = $1")
            .bind(period)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn previous_reminder_period(&self, current: &str) -> AppResult<Option<String>> {
        let previous: Option<String> = sqlx::query_scalar(
            "SELECT max(period) FROM reminder_runs \
             WHERE period < $1 AND char_length(period) = char_length($1)",
        )
        .bind(current)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(previous)
    }
}

#[async_trait]
impl MembershipDirectory for PgRepository {
    async fn lapsing_members(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<LapsingMember>> {
        let rows = sqlx::query_as::<_, LapsingMemberRow>(
            r#"
            SELECT u.id, u.email, u.firstname, u.lastname, m.paid_until
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.paid_until BETWEEN $1 AND $2
            ORDER BY u.id
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(LapsingMember::from).collect())
    }
}
