//! Shared invitation state: acceptance, reminder counters, submission date.
//!
//! Each invitation variant (chair, comment, paper) embeds an [`Invitation`]
//! and adds its own target and content fields, see [`variants`].

pub mod secret;
pub mod service;
pub mod variants;

pub use variants::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Submitted,
}

/// Contact details for an invitee who has no account yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub(crate) date_invitation_sent: NaiveDate,
    #[serde(skip_serializing)]
    pub(crate) secret: String,
    pub(crate) accepted: Option<bool>,
    pub(crate) invitation_reminder_emails: i32,
    pub(crate) date_last_invitation_reminder_sent: Option<NaiveDate>,
    pub(crate) submission_reminder_emails: i32,
    pub(crate) date_last_submission_reminder_sent: Option<NaiveDate>,
    pub(crate) date_submitted: Option<NaiveDate>,
    pub(crate) prospect: Option<Prospect>,
}

impl Invitation {
    pub fn new(today: NaiveDate, secret: String, prospect: Option<Prospect>) -> Self {
        Self {
            date_invitation_sent: today,
            secret,
            accepted: None,
            invitation_reminder_emails: 0,
            date_last_invitation_reminder_sent: None,
            submission_reminder_emails: 0,
            date_last_submission_reminder_sent: None,
            date_submitted: None,
            prospect,
        }
    }

    pub fn status(&self) -> InvitationStatus {
        if self.date_submitted.is_some() {
            InvitationStatus::Submitted
        } else {
            match self.accepted {
                Some(true) => InvitationStatus::Accepted,
                Some(false) => InvitationStatus::Declined,
                None => InvitationStatus::Pending,
            }
        }
    }

    /// Re-accepting is a no-op flip; accepting a declined invitation is allowed.
    pub fn accept(&mut self) {
        self.accepted = Some(true);
    }

    /// Declining after content has arrived is refused.
    pub fn decline(&mut self) -> AppResult<()> {
        if self.date_submitted.is_some() {
            return Err(AppError::InvalidState(
                "cannot decline an invitation whose content was already submitted".to_string(),
            ));
        }
        self.accepted = Some(false);
        Ok(())
    }

    pub fn record_submission(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.accepted != Some(true) {
            return Err(AppError::InvalidState(format!(
                "cannot record a submission on a {:?} invitation",
                self.status()
            )));
        }
        self.date_submitted = Some(today);
        Ok(())
    }

    pub fn register_invitation_reminder(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.status() != InvitationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "invitation reminders only apply to pending invitations, not {:?}",
                self.status()
            )));
        }
        self.invitation_reminder_emails += 1;
        self.date_last_invitation_reminder_sent = Some(today);
        Ok(())
    }

    pub fn register_submission_reminder(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.status() != InvitationStatus::Accepted {
            return Err(AppError::InvalidState(format!(
                "submission reminders only apply to accepted invitations, not {:?}",
                self.status()
            )));
        }
        self.submission_reminder_emails += 1;
        self.date_last_submission_reminder_sent = Some(today);
        Ok(())
    }

    pub fn date_invitation_sent(&self) -> NaiveDate {
        self.date_invitation_sent
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn accepted(&self) -> Option<bool> {
        self.accepted
    }

    pub fn invitation_reminder_emails(&self) -> i32 {
        self.invitation_reminder_emails
    }

    pub fn date_last_invitation_reminder_sent(&self) -> Option<NaiveDate> {
        self.date_last_invitation_reminder_sent
    }

    pub fn submission_reminder_emails(&self) -> i32 {
        self.submission_reminder_emails
    }

    pub fn date_last_submission_reminder_sent(&self) -> Option<NaiveDate> {
        self.date_last_submission_reminder_sent
    }

    pub fn date_submitted(&self) -> Option<NaiveDate> {
        self.date_submitted
    }

    pub fn prospect(&self) -> Option<&Prospect> {
        self.prospect.as_ref()
    }
}
