//! In-memory `Repository` for tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{LapsingMember, MembershipDirectory, Repository, User};
use crate::error::{AppError, AppResult};
use crate::invitations::{AnyInvitation, InvitationKind, Prospect};
use crate::reviews::{Review, ReviewStatus};
use crate::submissions::Submission;

#[derive(Default)]
struct State {
    next_id: i32,
    users: Vec<User>,
    members: Vec<LapsingMember>,
    invitations: BTreeMap<i32, AnyInvitation>,
    submissions: BTreeMap<i32, Submission>,
    reviews: BTreeMap<i32, Review>,
    periods: BTreeSet<String>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
    fail_invitation_updates: AtomicBool,
    fail_open_invitation_listing: AtomicBool,
    unreadable_users: Mutex<HashSet<i32>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, firstname: &str, lastname: &str) -> User {
        let mut state = self.state.lock().unwrap();
        let user = User {
            id: state.next_id(),
            email: email.to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn add_lapsing_member(&self, user: User, paid_until: NaiveDate) {
        self.state
            .lock()
            .unwrap()
            .members
            .push(LapsingMember { user, paid_until });
    }

    /// Makes every following `update_invitation` fail, as a lost database would.
    pub fn fail_invitation_updates(&self, fail: bool) {
        self.fail_invitation_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_open_invitation_listing(&self, fail: bool) {
        self.fail_open_invitation_listing.store(fail, Ordering::SeqCst);
    }

    /// Makes `get_user` fail for this id.
    pub fn fail_user_lookups_for(&self, id: i32) {
        self.unreadable_users.lock().unwrap().insert(id);
    }

    pub fn claim_period(&self, period: &str) {
        self.state.lock().unwrap().periods.insert(period.to_string());
    }

    pub fn invitation(&self, id: i32) -> AnyInvitation {
        self.state.lock().unwrap().invitations[&id].clone()
    }

    pub fn review(&self, id: i32) -> Review {
        self.state.lock().unwrap().reviews[&id].clone()
    }
}

fn same_slot(a: &AnyInvitation, b: &AnyInvitation) -> bool {
    a.kind() == b.kind()
        && a.kind() != InvitationKind::Chair
        && a.target_id() == b.target_id()
        && a.user_id().is_some()
        && a.user_id() == b.user_id()
}

fn check_invitation_unique(state: &State, candidate: &AnyInvitation) -> AppResult<()> {
    for other in state.invitations.values() {
        if other.id() == candidate.id() {
            continue;
        }
        if other.invitation().secret() == candidate.invitation().secret() {
            return Err(AppError::Duplicate("invitation secret".to_string()));
        }
        if same_slot(other, candidate) {
            return Err(AppError::Duplicate(format!(
                "{} invitation for this user",
                candidate.kind().as_str()
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        if self.unreadable_users.lock().unwrap().contains(&id) {
            return Err(AppError::Internal(format!("user {} could not be read", id)));
        }
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_or_create_user(&self, prospect: &Prospect) -> AppResult<User> {
        let mut state = self.state.lock().unwrap();
        let email = prospect.email.trim().to_lowercase();
        if let Some(user) = state.users.iter().find(|u| u.email == email) {
            return Ok(user.clone());
        }
        let user = User {
            id: state.next_id(),
            email,
            firstname: prospect.firstname.clone(),
            lastname: prospect.lastname.clone(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn insert_invitation(&self, mut invitation: AnyInvitation) -> AppResult<AnyInvitation> {
        let mut state = self.state.lock().unwrap();
        invitation.set_identity(0, 0);
        check_invitation_unique(&state, &invitation)?;
        let id = state.next_id();
        invitation.set_identity(id, 0);
        state.invitations.insert(id, invitation.clone());
        Ok(invitation)
    }

    async fn get_invitation(&self, id: i32) -> AppResult<Option<AnyInvitation>> {
        Ok(self.state.lock().unwrap().invitations.get(&id).cloned())
    }

    async fn find_invitation_by_secret(&self, secret: &str) -> AppResult<Option<AnyInvitation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .invitations
            .values()
            .find(|i| i.invitation().secret() == secret)
            .cloned())
    }

    async fn list_open_invitations(&self) -> AppResult<Vec<AnyInvitation>> {
        if self.fail_open_invitation_listing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("database unavailable".to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .invitations
            .values()
            .filter(|i| {
                let inv = i.invitation();
                inv.date_submitted().is_none() && inv.accepted() != Some(false)
            })
            .cloned()
            .collect())
    }

    async fn update_invitation(&self, invitation: &AnyInvitation) -> AppResult<AnyInvitation> {
        if self.fail_invitation_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("database unavailable".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let current = state
            .invitations
            .get(&invitation.id())
            .ok_or_else(|| AppError::NotFound(format!("invitation {}", invitation.id())))?;
        if current.version() != invitation.version() {
            return Err(AppError::Conflict(format!(
                "invitation {} was modified concurrently",
                invitation.id()
            )));
        }
        check_invitation_unique(&state, invitation)?;
        let mut stored = invitation.clone();
        stored.set_identity(invitation.id(), invitation.version() + 1);
        state.invitations.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn delete_invitation(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .invitations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("invitation {}", id)))
    }

    async fn insert_submission(&self, mut submission: Submission) -> AppResult<Submission> {
        let mut state = self.state.lock().unwrap();
        if state.submissions.values().any(|s| {
            s.user_id == submission.user_id && s.conference_id == submission.conference_id
        }) {
            return Err(AppError::Duplicate("submission for this conference".to_string()));
        }
        submission.id = state.next_id();
        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn get_submission(&self, id: i32) -> AppResult<Option<Submission>> {
        Ok(self.state.lock().unwrap().submissions.get(&id).cloned())
    }

    async fn find_submission(
        &self,
        user_id: i32,
        conference_id: i32,
    ) -> AppResult<Option<Submission>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .submissions
            .values()
            .find(|s| s.user_id == user_id && s.conference_id == conference_id)
            .cloned())
    }

    async fn update_submission(&self, submission: &Submission) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.submissions.get_mut(&submission.id) {
            Some(slot) => {
                *slot = submission.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("submission {}", submission.id))),
        }
    }

    async fn delete_submission(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.reviews.values().any(|r| r.submission_id == id) {
            return Err(AppError::InvalidState(format!(
                "submission {} still has reviews",
                id
            )));
        }
        state
            .submissions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("submission {}", id)))
    }

    async fn insert_review(&self, mut review: Review) -> AppResult<Review> {
        let mut state = self.state.lock().unwrap();
        if state
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.submission_id == review.submission_id)
        {
            return Err(AppError::Duplicate("review by this reviewer".to_string()));
        }
        review.id = state.next_id();
        review.version = 0;
        state.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn get_review(&self, id: i32) -> AppResult<Option<Review>> {
        Ok(self.state.lock().unwrap().reviews.get(&id).cloned())
    }

    async fn list_reviews(&self, submission_id: i32) -> AppResult<Vec<Review>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn list_open_reviews(&self) -> AppResult<Vec<Review>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .values()
            .filter(|r| r.status() != ReviewStatus::Submitted)
            .cloned()
            .collect())
    }

    async fn update_review(&self, review: &Review) -> AppResult<Review> {
        let mut state = self.state.lock().unwrap();
        let current = state
            .reviews
            .get(&review.id)
            .ok_or_else(|| AppError::NotFound(format!("review {}", review.id)))?;
        if current.version != review.version {
            return Err(AppError::Conflict(format!(
                "review {} was modified concurrently",
                review.id
            )));
        }
        let mut stored = review.clone();
        stored.version += 1;
        state.reviews.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_review(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .reviews
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("review {}", id)))
    }

    async fn claim_reminder_period(&self, period: &str) -> AppResult<bool> {
        Ok(self.state.lock().unwrap().periods.insert(period.to_string()))
    }

    async fn release_reminder_period(&self, period: &str) -> AppResult<()> {
        self.state.lock().unwrap().periods.remove(period);
        Ok(())
    }

    async fn previous_reminder_period(&self, current: &str) -> AppResult<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .periods
            .range::<str, _>((std::ops::Bound::Unbounded, std::ops::Bound::Excluded(current)))
            .filter(|p| p.len() == current.len())
            .next_back()
            .cloned())
    }
}

#[async_trait]
impl MembershipDirectory for MemoryRepository {
    async fn lapsing_members(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<LapsingMember>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .filter(|m| m.paid_until >= from && m.paid_until <= until)
            .cloned()
            .collect())
    }
}
