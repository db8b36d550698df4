use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::invitations::{
    AnyInvitation, ChairInvitation, CommentInvitation, Invitation, InvitationKind,
    PaperInvitation, Prospect,
};
use crate::reviews::{Grade, Review};
use crate::submissions::Submission;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapsingMember {
    pub user: User,
    pub paid_until: NaiveDate,
}

#[derive(Debug, FromRow)]
pub struct LapsingMemberRow {
    pub id: i32,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub paid_until: NaiveDate,
}

impl From<LapsingMemberRow> for LapsingMember {
    fn from(row: LapsingMemberRow) -> Self {
        LapsingMember {
            user: User {
                id: row.id,
                email: row.email,
                firstname: row.firstname,
                lastname: row.lastname,
            },
            paid_until: row.paid_until,
        }
    }
}

/// One row of the `invitations` table, shared by all variants.
#[derive(Debug, Clone, Default, FromRow)]
pub struct InvitationRow {
    pub id: i32,
    pub version: i32,
    pub kind: String,
    pub submission_id: Option<i32>,
    pub conference_id: Option<i32>,
    pub user_id: Option<i32>,
    pub date_invitation_sent: NaiveDate,
    pub secret: String,
    pub accepted: Option<bool>,
    pub invitation_reminder_emails: i32,
    pub date_last_invitation_reminder_sent: Option<NaiveDate>,
    pub submission_reminder_emails: i32,
    pub date_last_submission_reminder_sent: Option<NaiveDate>,
    pub date_submitted: Option<NaiveDate>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub filename: Option<String>,
}

fn missing(column: &str, id: i32) -> AppError {
    AppError::Internal(format!("invitation {} has no {}", id, column))
}

impl TryFrom<InvitationRow> for AnyInvitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let kind: InvitationKind = row.kind.parse()?;
        let prospect = match (row.firstname, row.lastname, row.email) {
            (Some(firstname), Some(lastname), Some(email)) => Some(Prospect {
                firstname,
                lastname,
                email,
            }),
            _ => None,
        };
        let invitation = Invitation {
            date_invitation_sent: row.date_invitation_sent,
            secret: row.secret,
            accepted: row.accepted,
            invitation_reminder_emails: row.invitation_reminder_emails,
            date_last_invitation_reminder_sent: row.date_last_invitation_reminder_sent,
            submission_reminder_emails: row.submission_reminder_emails,
            date_last_submission_reminder_sent: row.date_last_submission_reminder_sent,
            date_submitted: row.date_submitted,
            prospect,
        };

        Ok(match kind {
            InvitationKind::Chair => AnyInvitation::Chair(ChairInvitation {
                id: row.id,
                version: row.version,
                invitation,
                submission_id: row.submission_id.ok_or_else(|| missing("submission", row.id))?,
                user_id: row.user_id,
            }),
            InvitationKind::Comment => AnyInvitation::Comment(CommentInvitation {
                id: row.id,
                version: row.version,
                invitation,
                submission_id: row.submission_id.ok_or_else(|| missing("submission", row.id))?,
                user_id: row.user_id,
                title: row.title,
                filename: row.filename,
            }),
            InvitationKind::Paper => AnyInvitation::Paper(PaperInvitation {
                id: row.id,
                version: row.version,
                invitation,
                conference_id: row.conference_id.ok_or_else(|| missing("conference", row.id))?,
                user_id: row.user_id,
                title: row.title,
                abstract_text: row.abstract_text,
                filename: row.filename,
            }),
        })
    }
}

impl From<&AnyInvitation> for InvitationRow {
    fn from(any: &AnyInvitation) -> Self {
        let inv = any.invitation();
        let prospect = inv.prospect.as_ref();
        let mut row = InvitationRow {
            id: any.id(),
            version: any.version(),
            kind: any.kind().as_str().to_string(),
            user_id: any.user_id(),
            date_invitation_sent: inv.date_invitation_sent,
            secret: inv.secret.clone(),
            accepted: inv.accepted,
            invitation_reminder_emails: inv.invitation_reminder_emails,
            date_last_invitation_reminder_sent: inv.date_last_invitation_reminder_sent,
            submission_reminder_emails: inv.submission_reminder_emails,
            date_last_submission_reminder_sent: inv.date_last_submission_reminder_sent,
            date_submitted: inv.date_submitted,
            firstname: prospect.map(|p| p.firstname.clone()),
            lastname: prospect.map(|p| p.lastname.clone()),
            email: prospect.map(|p| p.email.clone()),
            ..Default::default()
        };
        match any {
            AnyInvitation::Chair(c) => {
                row.submission_id = Some(c.submission_id);
            }
            AnyInvitation::Comment(c) => {
                row.submission_id = Some(c.submission_id);
                row.title = c.title.clone();
                row.filename = c.filename.clone();
            }
            AnyInvitation::Paper(p) => {
                row.conference_id = Some(p.conference_id);
                row.title = p.title.clone();
                row.abstract_text = p.abstract_text.clone();
                row.filename = p.filename.clone();
            }
        }
        row
    }
}

#[derive(Debug, FromRow)]
pub struct SubmissionRow {
    pub id: i32,
    pub user_id: i32,
    pub conference_id: i32,
    pub date_submitted: NaiveDate,
    pub title: String,
    pub keywords: String,
    pub abstract_text: String,
    pub file_extension: Option<String>,
    pub status: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: row.id,
            user_id: row.user_id,
            conference_id: row.conference_id,
            date_submitted: row.date_submitted,
            title: row.title,
            keywords: row.keywords,
            abstract_text: row.abstract_text,
            file_extension: row.file_extension,
            status: row.status.parse()?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ReviewRow {
    pub id: i32,
    pub version: i32,
    pub user_id: i32,
    pub submission_id: i32,
    pub status: String,
    pub date_created: NaiveDate,
    pub date_submitted: Option<NaiveDate>,
    pub grade: Option<String>,
    pub comments: Option<String>,
    pub reminder_emails: i32,
    pub date_last_reminder_sent: Option<NaiveDate>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let grade = row.grade.as_deref().map(str::parse::<Grade>).transpose()?;
        Ok(Review {
            id: row.id,
            version: row.version,
            user_id: row.user_id,
            submission_id: row.submission_id,
            status: row.status.parse()?,
            date_created: row.date_created,
            date_submitted: row.date_submitted,
            grade,
            comments: row.comments,
            reminder_emails: row.reminder_emails,
            date_last_reminder_sent: row.date_last_reminder_sent,
        })
    }
}
