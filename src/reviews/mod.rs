//! One reviewer's graded evaluation of one submission.
//!
//! Reviews move strictly forward: `pending -> accepted -> submitted`.

pub mod service;

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Submitted,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Accepted => "accepted",
            ReviewStatus::Submitted => "submitted",
        }
    }

    fn next(&self) -> Option<ReviewStatus> {
        match self {
            ReviewStatus::Pending => Some(ReviewStatus::Accepted),
            ReviewStatus::Accepted => Some(ReviewStatus::Submitted),
            ReviewStatus::Submitted => None,
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "accepted" => Ok(ReviewStatus::Accepted),
            "submitted" => Ok(ReviewStatus::Submitted),
            other => Err(AppError::Internal(format!("unknown review status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            other => Err(AppError::Validation(format!(
                "grade must be one of A, B, C, D (got {:?})",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: i32,
    pub version: i32,
    pub user_id: i32,
    pub submission_id: i32,
    pub(crate) status: ReviewStatus,
    pub(crate) date_created: NaiveDate,
    pub(crate) date_submitted: Option<NaiveDate>,
    pub(crate) grade: Option<Grade>,
    pub(crate) comments: Option<String>,
    pub(crate) reminder_emails: i32,
    pub(crate) date_last_reminder_sent: Option<NaiveDate>,
}

impl Review {
    pub fn new(user_id: i32, submission_id: i32, today: NaiveDate) -> Self {
        Self {
            id: 0,
            version: 0,
            user_id,
            submission_id,
            status: ReviewStatus::Pending,
            date_created: today,
            date_submitted: None,
            grade: None,
            comments: None,
            reminder_emails: 0,
            date_last_reminder_sent: None,
        }
    }

    fn transition(&mut self, to: ReviewStatus) -> AppResult<()> {
        if self.status.next() != Some(to) {
            return Err(AppError::InvalidState(format!(
                "review cannot move from {} to {}",
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn accept(&mut self) -> AppResult<()> {
        self.transition(ReviewStatus::Accepted)
    }

    pub fn submit(
        &mut self,
        grade: Option<Grade>,
        comments: &str,
        today: NaiveDate,
    ) -> AppResult<()> {
        if self.status.next() != Some(ReviewStatus::Submitted) {
            return Err(AppError::InvalidState(format!(
                "review must be accepted before it is submitted (currently {})",
                self.status.as_str()
            )));
        }
        let grade = grade
            .ok_or_else(|| AppError::Validation("a grade is required".to_string()))?;
        if comments.trim().is_empty() {
            return Err(AppError::Validation("comments must not be empty".to_string()));
        }

        self.transition(ReviewStatus::Submitted)?;
        self.grade = Some(grade);
        self.comments = Some(comments.to_string());
        self.date_submitted = Some(today);
        Ok(())
    }

    pub fn register_reminder(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.status == ReviewStatus::Submitted {
            return Err(AppError::InvalidState(
                "submitted reviews are not reminded".to_string(),
            ));
        }
        self.reminder_emails += 1;
        self.date_last_reminder_sent = Some(today);
        Ok(())
    }

    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    pub fn date_created(&self) -> NaiveDate {
        self.date_created
    }

    pub fn date_submitted(&self) -> Option<NaiveDate> {
        self.date_submitted
    }

    pub fn grade(&self) -> Option<Grade> {
        self.grade
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn reminder_emails(&self) -> i32 {
        self.reminder_emails
    }

    pub fn date_last_reminder_sent(&self) -> Option<NaiveDate> {
        self.date_last_reminder_sent
    }
}
