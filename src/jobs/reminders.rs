//! Periodic reminder pass over lapsing members, open invitations and reviews.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tera::Context;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::db::{LapsingMember, MembershipDirectory, Repository};
use crate::error::{AppError, AppResult};
use crate::invitations::{AnyInvitation, Invitation, InvitationKind, InvitationStatus};
use crate::mailer::{EmailTemplate, Mailer, Recipient};
use crate::reviews::Review;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPeriod {
    Daily,
    Monthly,
}

impl ReminderPeriod {
    /// Key under which a run is claimed; one run per key.
    pub fn key(&self, today: NaiveDate) -> String {
        match self {
            ReminderPeriod::Daily => today.format("%Y-%m-%d").to_string(),
            ReminderPeriod::Monthly => today.format("%Y-%m").to_string(),
        }
    }

    /// First and last day of the period containing `today`.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            ReminderPeriod::Daily => (today, today),
            ReminderPeriod::Monthly => {
                let first = today.with_day(1).unwrap_or(today);
                let next_month = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                };
                let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(today);
                (first, last)
            }
        }
    }

    /// First day after the period claimed under `key`, if the key parses.
    pub fn resume_after(&self, key: &str) -> Option<NaiveDate> {
        match self {
            ReminderPeriod::Daily => NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?.succ_opt(),
            ReminderPeriod::Monthly => {
                let first = NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok()?;
                self.bounds(first).1.succ_opt()
            }
        }
    }
}

impl FromStr for ReminderPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(ReminderPeriod::Daily),
            "monthly" => Ok(ReminderPeriod::Monthly),
            other => Err(AppError::Validation(format!(
                "reminder period must be daily or monthly, not {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    pub invitation_cap: i32,
    pub submission_cap: i32,
    pub review_cap: i32,
    /// Minimum days between two reminders of the same kind.
    pub interval_days: i64,
    /// Days after the invitation was sent by which content is expected.
    pub submission_deadline_days: i64,
    /// Days after a review was assigned by which it is expected.
    pub review_deadline_days: i64,
    pub period: ReminderPeriod,
    pub base_url: String,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            invitation_cap: 3,
            submission_cap: 3,
            review_cap: 3,
            interval_days: 7,
            submission_deadline_days: 60,
            review_deadline_days: 30,
            period: ReminderPeriod::Daily,
            base_url: "http://localhost:5001".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub membership_recipients: usize,
    pub membership_reminders: usize,
    pub invitations_scanned: usize,
    pub invitation_reminders: usize,
    pub submission_reminders: usize,
    pub reviews_scanned: usize,
    pub review_reminders: usize,
    pub at_cap: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped(String),
}

/// Everything one pass works through, loaded before any mail goes out.
struct Batch {
    lapsing: Vec<LapsingMember>,
    invitations: Vec<AnyInvitation>,
    reviews: Vec<Review>,
}

#[derive(Debug, PartialEq, Eq)]
enum Due {
    Invitation,
    Submission,
    Review,
    AtCap,
    NotYet,
}

pub struct ReminderScheduler {
    repo: Arc<dyn Repository>,
    members: Arc<dyn MembershipDirectory>,
    mailer: Arc<dyn Mailer>,
    policy: ReminderPolicy,
    running: Mutex<()>,
}

fn days_since(from: NaiveDate, today: NaiveDate) -> i64 {
    (today - from).num_days()
}

fn task_of(kind: InvitationKind) -> &'static str {
    match kind {
        InvitationKind::Chair => "chair a session",
        InvitationKind::Comment => "comment on a paper",
        InvitationKind::Paper => "present a paper",
    }
}

impl ReminderScheduler {
    pub fn new(
        repo: Arc<dyn Repository>,
        members: Arc<dyn MembershipDirectory>,
        mailer: Arc<dyn Mailer>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            repo,
            members,
            mailer,
            policy,
            running: Mutex::new(()),
        }
    }

    /// Runs one reminder pass. A pass that is already running, or one for a
    /// period that was already processed, is skipped.
    pub async fn run(&self, today: NaiveDate) -> AppResult<RunOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Reminder pass already in progress, skipping");
            return Ok(RunOutcome::Skipped("a reminder pass is already running".to_string()));
        };

        let period = self.policy.period.key(today);
        if !self.repo.claim_reminder_period(&period).await? {
            info!("Reminders for period {} were already sent", period);
            return Ok(RunOutcome::Skipped(format!("period {} already processed", period)));
        }

        // Nothing has been sent yet, so a failed load hands the period back.
        let batch = match self.load(today, &period).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Reminder pass {} could not load its work: {}", period, e);
                if let Err(release) = self.repo.release_reminder_period(&period).await {
                    error!("Failed to release reminder period {}: {}", period, release);
                }
                return Err(e);
            }
        };

        let mut summary = RunSummary::default();
        self.remind_lapsing_members(batch.lapsing, &mut summary).await;
        self.remind_invitations(batch.invitations, today, &mut summary).await;
        self.remind_reviews(batch.reviews, today, &mut summary).await;

        info!(
            "Reminder pass {} done: {} membership ({} recipients), {} invitation, {} submission, {} review reminders; {} at cap, {} failed",
            period,
            summary.membership_reminders,
            summary.membership_recipients,
            summary.invitation_reminders,
            summary.submission_reminders,
            summary.review_reminders,
            summary.at_cap,
            summary.failures
        );
        Ok(RunOutcome::Completed(summary))
    }

    async fn load(&self, today: NaiveDate, period: &str) -> AppResult<Batch> {
        let (from, until) = self.lapsing_window(today, period).await?;
        Ok(Batch {
            lapsing: self.members.lapsing_members(from, until).await?,
            invitations: self.repo.list_open_invitations().await?,
            reviews: self.repo.list_open_reviews().await?,
        })
    }

    /// The current period, widened back to the day after the last claimed
    /// one so dues that ran out while no pass ran are still reported.
    async fn lapsing_window(
        &self,
        today: NaiveDate,
        period: &str,
    ) -> AppResult<(NaiveDate, NaiveDate)> {
        let (from, until) = self.policy.period.bounds(today);
        let resume = self
            .repo
            .previous_reminder_period(period)
            .await?
            .and_then(|key| self.policy.period.resume_after(&key));
        Ok(match resume {
            Some(resume) if resume < from => (resume, until),
            _ => (from, until),
        })
    }

    fn link(&self, path: &str) -> String {
        format!("{}/{}", self.policy.base_url.trim_end_matches('/'), path)
    }

    fn interval_elapsed(&self, last: Option<NaiveDate>, since: NaiveDate, today: NaiveDate) -> bool {
        days_since(last.unwrap_or(since), today) >= self.policy.interval_days
    }

    fn submission_deadline(&self, invitation: &Invitation) -> NaiveDate {
        invitation.date_invitation_sent() + Duration::days(self.policy.submission_deadline_days)
    }

    fn due(&self, kind: InvitationKind, invitation: &Invitation, today: NaiveDate) -> Due {
        match invitation.status() {
            InvitationStatus::Pending => {
                if invitation.invitation_reminder_emails() >= self.policy.invitation_cap {
                    Due::AtCap
                } else if self.interval_elapsed(
                    invitation.date_last_invitation_reminder_sent(),
                    invitation.date_invitation_sent(),
                    today,
                ) {
                    Due::Invitation
                } else {
                    Due::NotYet
                }
            }
            // Chair invitations have nothing to upload.
            InvitationStatus::Accepted if kind != InvitationKind::Chair => {
                let deadline = self.submission_deadline(invitation);
                if today <= deadline {
                    Due::NotYet
                } else if invitation.submission_reminder_emails() >= self.policy.submission_cap {
                    Due::AtCap
                } else if self.interval_elapsed(
                    invitation.date_last_submission_reminder_sent(),
                    deadline,
                    today,
                ) {
                    Due::Submission
                } else {
                    Due::NotYet
                }
            }
            _ => Due::NotYet,
        }
    }

    async fn invitation_recipient(&self, invitation: &AnyInvitation) -> AppResult<Option<Recipient>> {
        if let Some(user_id) = invitation.user_id() {
            return Ok(self.repo.get_user(user_id).await?.map(|u| Recipient {
                name: u.display_name(),
                email: u.email,
            }));
        }
        Ok(invitation.invitation().prospect().map(|p| Recipient {
            email: p.email.clone(),
            name: format!("{} {}", p.firstname, p.lastname).trim().to_string(),
        }))
    }

    async fn remind_lapsing_members(&self, lapsing: Vec<LapsingMember>, summary: &mut RunSummary) {
        summary.membership_recipients = lapsing.len();

        for member in lapsing {
            let to = Recipient {
                name: member.user.display_name(),
                email: member.user.email.clone(),
            };
            let mut vars = Context::new();
            vars.insert("name", &to.name);
            vars.insert("paid_until", &member.paid_until.to_string());
            vars.insert("link", &self.link("membership"));

            match self.mailer.send(EmailTemplate::MembershipLapse, &to, &vars).await {
                Ok(()) => summary.membership_reminders += 1,
                Err(e) => {
                    warn!("Membership reminder to {} failed: {}", to.email, e);
                    summary.failures += 1;
                }
            }
        }
    }

    async fn remind_invitations(
        &self,
        open: Vec<AnyInvitation>,
        today: NaiveDate,
        summary: &mut RunSummary,
    ) {
        summary.invitations_scanned = open.len();

        for mut invitation in open {
            let (template, cap, sent_so_far) = match self.due(invitation.kind(), invitation.invitation(), today) {
                Due::Invitation => (
                    EmailTemplate::InvitationReminder,
                    self.policy.invitation_cap,
                    invitation.invitation().invitation_reminder_emails(),
                ),
                Due::Submission => (
                    EmailTemplate::SubmissionReminder,
                    self.policy.submission_cap,
                    invitation.invitation().submission_reminder_emails(),
                ),
                Due::AtCap => {
                    summary.at_cap += 1;
                    continue;
                }
                Due::NotYet | Due::Review => continue,
            };

            let to = match self.invitation_recipient(&invitation).await {
                Ok(Some(to)) => to,
                Ok(None) => {
                    warn!("Invitation {} has nobody to remind", invitation.id());
                    summary.failures += 1;
                    continue;
                }
                Err(e) => {
                    error!(
                        "Failed to look up the invitee of invitation {}: {}",
                        invitation.id(),
                        e
                    );
                    summary.failures += 1;
                    continue;
                }
            };

            let mut vars = Context::new();
            vars.insert("name", &to.name);
            vars.insert("task", task_of(invitation.kind()));
            if let Some(title) = invitation.title() {
                vars.insert("title", title);
            }
            vars.insert(
                "date_invited",
                &invitation.invitation().date_invitation_sent().to_string(),
            );
            vars.insert(
                "deadline",
                &self.submission_deadline(invitation.invitation()).to_string(),
            );
            vars.insert(
                "link",
                &self.link(&format!("respond/{}", invitation.invitation().secret())),
            );
            vars.insert("reminder_number", &(sent_so_far + 1));
            vars.insert("reminder_cap", &cap);

            if let Err(e) = self.mailer.send(template, &to, &vars).await {
                warn!("Reminder for invitation {} to {} failed: {}", invitation.id(), to.email, e);
                summary.failures += 1;
                continue;
            }

            let registered = match template {
                EmailTemplate::InvitationReminder => {
                    invitation.invitation_mut().register_invitation_reminder(today)
                }
                _ => invitation.invitation_mut().register_submission_reminder(today),
            };
            let saved = match registered {
                Ok(()) => self.repo.update_invitation(&invitation).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match saved {
                Ok(()) => match template {
                    EmailTemplate::InvitationReminder => summary.invitation_reminders += 1,
                    _ => summary.submission_reminders += 1,
                },
                Err(e) => {
                    warn!(
                        "Reminder sent but not recorded for invitation {}: {}",
                        invitation.id(),
                        e
                    );
                    summary.failures += 1;
                }
            }
        }
    }

    fn review_due(&self, review: &Review, today: NaiveDate) -> Due {
        let deadline = review.date_created() + Duration::days(self.policy.review_deadline_days);
        if today <= deadline {
            Due::NotYet
        } else if review.reminder_emails() >= self.policy.review_cap {
            Due::AtCap
        } else if self.interval_elapsed(review.date_last_reminder_sent(), deadline, today) {
            Due::Review
        } else {
            Due::NotYet
        }
    }

    async fn remind_reviews(&self, open: Vec<Review>, today: NaiveDate, summary: &mut RunSummary) {
        summary.reviews_scanned = open.len();

        for mut review in open {
            match self.review_due(&review, today) {
                Due::AtCap => {
                    summary.at_cap += 1;
                    continue;
                }
                Due::NotYet | Due::Invitation | Due::Submission => continue,
                Due::Review => {}
            }

            let reviewer = match self.repo.get_user(review.user_id).await {
                Ok(Some(reviewer)) => reviewer,
                Ok(None) => {
                    warn!("Review {} has no reviewer account", review.id);
                    summary.failures += 1;
                    continue;
                }
                Err(e) => {
                    error!("Failed to look up the reviewer of review {}: {}", review.id, e);
                    summary.failures += 1;
                    continue;
                }
            };
            let title = match self.repo.get_submission(review.submission_id).await {
                Ok(submission) => submission.map(|s| s.title).unwrap_or_default(),
                Err(e) => {
                    error!(
                        "Failed to load submission {} for review {}: {}",
                        review.submission_id, review.id, e
                    );
                    summary.failures += 1;
                    continue;
                }
            };
            let to = Recipient {
                name: reviewer.display_name(),
                email: reviewer.email,
            };
            let deadline = review.date_created() + Duration::days(self.policy.review_deadline_days);

            let mut vars = Context::new();
            vars.insert("name", &to.name);
            vars.insert("title", &title);
            vars.insert("deadline", &deadline.to_string());
            vars.insert("status", review.status().as_str());
            vars.insert("link", &self.link(&format!("reviews/{}", review.id)));

            if let Err(e) = self.mailer.send(EmailTemplate::ReviewReminder, &to, &vars).await {
                warn!("Reminder for review {} to {} failed: {}", review.id, to.email, e);
                summary.failures += 1;
                continue;
            }

            let saved = match review.register_reminder(today) {
                Ok(()) => self.repo.update_review(&review).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match saved {
                Ok(()) => summary.review_reminders += 1,
                Err(e) => {
                    warn!("Reminder sent but not recorded for review {}: {}", review.id, e);
                    summary.failures += 1;
                }
            }
        }
    }
}
