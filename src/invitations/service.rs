//! Organizer and invitee actions on invitations.

use chrono::NaiveDate;
use serde::Deserialize;

use super::{
    secret, AnyInvitation, ChairInvitation, CommentInvitation, ContentBearing, Invitation,
    PaperInvitation, Prospect,
};
use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::storage::{sanitize_filename, FileStore, Upload};

/// What the invitee is asked to do.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InvitationTarget {
    Chair {
        submission_id: i32,
    },
    Comment {
        submission_id: i32,
        title: Option<String>,
    },
    Paper {
        conference_id: i32,
        title: Option<String>,
        abstract_text: Option<String>,
    },
}

/// Who is invited: an existing user, or a person to provision on acceptance.
#[derive(Debug, Clone, Deserialize)]
pub struct Invitee {
    pub user_id: Option<i32>,
    pub prospect: Option<Prospect>,
}

pub async fn invite(
    repo: &dyn Repository,
    target: InvitationTarget,
    invitee: Invitee,
    today: NaiveDate,
) -> AppResult<AnyInvitation> {
    match (&invitee.user_id, &invitee.prospect) {
        (None, None) => {
            return Err(AppError::Validation(
                "an invitation needs a user or contact details".to_string(),
            ))
        }
        (Some(id), _) => {
            if repo.get_user(*id).await?.is_none() {
                return Err(AppError::NotFound(format!("user {}", id)));
            }
        }
        (None, Some(p)) => {
            if p.email.trim().is_empty() || !p.email.contains('@') {
                return Err(AppError::Validation(format!(
                    "invalid email address {:?}",
                    p.email
                )));
            }
        }
    }

    if let InvitationTarget::Chair { submission_id } | InvitationTarget::Comment { submission_id, .. } =
        &target
    {
        if repo.get_submission(*submission_id).await?.is_none() {
            return Err(AppError::NotFound(format!("submission {}", submission_id)));
        }
    }

    let secret = secret::mint_unique(repo).await?;
    let prospect = if invitee.user_id.is_none() {
        invitee.prospect
    } else {
        None
    };
    let base = Invitation::new(today, secret, prospect);
    let user_id = invitee.user_id;

    let invitation = match target {
        InvitationTarget::Chair { submission_id } => {
            AnyInvitation::Chair(ChairInvitation::new(base, submission_id, user_id))
        }
        InvitationTarget::Comment {
            submission_id,
            title,
        } => AnyInvitation::Comment(CommentInvitation::new(base, submission_id, user_id, title)),
        InvitationTarget::Paper {
            conference_id,
            title,
            abstract_text,
        } => AnyInvitation::Paper(PaperInvitation::new(
            base,
            conference_id,
            user_id,
            title,
            abstract_text,
        )),
    };

    let stored = repo.insert_invitation(invitation).await?;
    tracing::info!(
        "Created {} invitation {} for target {}",
        stored.kind().as_str(),
        stored.id(),
        stored.target_id()
    );
    Ok(stored)
}

/// Accepts the invitation, provisioning the invitee's account when needed.
/// Agreeing to chair is itself the chair invitation's submission.
pub async fn accept(
    repo: &dyn Repository,
    mut invitation: AnyInvitation,
    today: NaiveDate,
) -> AppResult<AnyInvitation> {
    if invitation.user_id().is_none() {
        if let Some(prospect) = invitation.invitation().prospect().cloned() {
            let user = repo.find_or_create_user(&prospect).await?;
            tracing::info!(
                "Linked invitation {} to user {} on acceptance",
                invitation.id(),
                user.id
            );
            invitation.set_user_id(user.id);
        }
    }

    invitation.invitation_mut().accept();
    if matches!(invitation, AnyInvitation::Chair(_))
        && invitation.invitation().date_submitted().is_none()
    {
        invitation.invitation_mut().record_submission(today)?;
    }

    let saved = repo.update_invitation(&invitation).await?;
    tracing::debug!("Invitation {} accepted", saved.id());
    Ok(saved)
}

pub async fn decline(
    repo: &dyn Repository,
    mut invitation: AnyInvitation,
) -> AppResult<AnyInvitation> {
    invitation.invitation_mut().decline()?;
    let saved = repo.update_invitation(&invitation).await?;
    tracing::debug!("Invitation {} declined", saved.id());
    Ok(saved)
}

/// Stores the uploaded content and marks the invitation submitted.
///
/// The file is written first and the record committed second; if the commit
/// fails the new file is removed again and the stored invitation is left as
/// it was.
pub async fn attach_content<I: ContentBearing>(
    repo: &dyn Repository,
    files: &dyn FileStore,
    mut invitation: I,
    upload: Upload,
    today: NaiveDate,
) -> AppResult<AnyInvitation> {
    if invitation.invitation().accepted() != Some(true) {
        return Err(AppError::InvalidState(
            "content can only be attached to an accepted invitation".to_string(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    let filename = sanitize_filename(&upload.filename)?;
    let dir = invitation.content_dir()?;
    let previous = invitation.filename().map(str::to_string);

    invitation.set_filename(filename.clone());
    invitation.invitation_mut().record_submission(today)?;

    let staged = files.stage(upload.bytes, &dir).await?;

    let saved = match repo.update_invitation(&invitation.into_any()).await {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!("Failed to record content {}: {}", filename, e);
            if let Err(cleanup) = files.remove(&dir, &staged).await {
                tracing::error!("Orphaned file {} left behind: {}", staged, cleanup);
            }
            return Err(e);
        }
    };

    if let Err(e) = files.promote(&dir, &staged, &filename).await {
        tracing::error!(
            "Invitation {} recorded {} but the file was not moved into place: {}",
            saved.id(),
            filename,
            e
        );
        return Err(e);
    }
    if let Some(previous) = previous.filter(|p| *p != filename) {
        if let Err(e) = files.remove(&dir, &previous).await {
            tracing::warn!("Failed to remove replaced file {}: {}", previous, e);
        }
    }
    tracing::info!("Invitation {} received content {}", saved.id(), filename);
    Ok(saved)
}

/// Dispatches an upload to the variant's content handling.
pub async fn attach_any(
    repo: &dyn Repository,
    files: &dyn FileStore,
    invitation: AnyInvitation,
    upload: Upload,
    today: NaiveDate,
) -> AppResult<AnyInvitation> {
    match invitation {
        AnyInvitation::Chair(_) => Err(AppError::InvalidState(
            "chair invitations carry no content".to_string(),
        )),
        AnyInvitation::Comment(c) => attach_content(repo, files, c, upload, today).await,
        AnyInvitation::Paper(p) => attach_content(repo, files, p, upload, today).await,
    }
}

/// Deletes the stored file, then the invitation record.
pub async fn remove_content(
    repo: &dyn Repository,
    files: &dyn FileStore,
    invitation: AnyInvitation,
) -> AppResult<()> {
    if matches!(invitation, AnyInvitation::Chair(_)) {
        return Err(AppError::InvalidState(
            "chair invitations carry no content".to_string(),
        ));
    }
    if let Some(filename) = invitation.filename() {
        let dir = invitation.content_dir()?;
        files.remove(&dir, filename).await?;
    }
    repo.delete_invitation(invitation.id()).await?;
    tracing::info!("Removed invitation {} and its content", invitation.id());
    Ok(())
}
