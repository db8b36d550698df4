//! Papers submitted to a conference and their editorial decision.

pub mod service;

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(SubmissionStatus::Submitted),
            "accepted" => Ok(SubmissionStatus::Accepted),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(AppError::Internal(format!("unknown submission status {}", other))),
        }
    }
}

/// Outcome of an editorial decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: i32,
    pub user_id: i32,
    pub conference_id: i32,
    pub date_submitted: NaiveDate,
    pub title: String,
    pub keywords: String,
    pub abstract_text: String,
    pub file_extension: Option<String>,
    pub(crate) status: SubmissionStatus,
}

impl Submission {
    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Decisions may be revised at any time.
    pub fn decide(&mut self, verdict: Verdict) {
        self.status = match verdict {
            Verdict::Accepted => SubmissionStatus::Accepted,
            Verdict::Rejected => SubmissionStatus::Rejected,
        };
    }

    pub fn keywords_list(&self) -> Vec<String> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn file_dir(&self) -> PathBuf {
        file_dir(self.user_id, self.conference_id)
    }

    pub fn file_name(&self) -> Option<String> {
        self.file_extension.as_ref().map(|ext| file_name(ext))
    }
}

pub(crate) fn file_dir(user_id: i32, conference_id: i32) -> PathBuf {
    PathBuf::from("submissions")
        .join(format!("user{}", user_id))
        .join(conference_id.to_string())
}

pub(crate) fn file_name(extension: &str) -> String {
    format!("paper.{}", extension)
}
