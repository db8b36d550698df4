use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Invitation;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationKind {
    Chair,
    Comment,
    Paper,
}

impl InvitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationKind::Chair => "chair",
            InvitationKind::Comment => "comment",
            InvitationKind::Paper => "paper",
        }
    }
}

impl FromStr for InvitationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chair" => Ok(InvitationKind::Chair),
            "comment" => Ok(InvitationKind::Comment),
            "paper" => Ok(InvitationKind::Paper),
            other => Err(AppError::Internal(format!("unknown invitation kind {}", other))),
        }
    }
}

/// Invitation to chair the session in which a submission is presented.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChairInvitation {
    pub id: i32,
    pub version: i32,
    pub invitation: Invitation,
    pub(crate) submission_id: i32,
    pub(crate) user_id: Option<i32>,
}

/// Invitation to write a comment (discussion) on a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentInvitation {
    pub id: i32,
    pub version: i32,
    pub invitation: Invitation,
    pub(crate) submission_id: i32,
    pub(crate) user_id: Option<i32>,
    pub title: Option<String>,
    pub(crate) filename: Option<String>,
}

/// Invitation to present a paper at a conference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperInvitation {
    pub id: i32,
    pub version: i32,
    pub invitation: Invitation,
    pub(crate) conference_id: i32,
    pub(crate) user_id: Option<i32>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub(crate) filename: Option<String>,
}

impl ChairInvitation {
    pub fn new(invitation: Invitation, submission_id: i32, user_id: Option<i32>) -> Self {
        Self {
            id: 0,
            version: 0,
            invitation,
            submission_id,
            user_id,
        }
    }
}

impl CommentInvitation {
    pub fn new(
        invitation: Invitation,
        submission_id: i32,
        user_id: Option<i32>,
        title: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            version: 0,
            invitation,
            submission_id,
            user_id,
            title,
            filename: None,
        }
    }
}

impl PaperInvitation {
    pub fn new(
        invitation: Invitation,
        conference_id: i32,
        user_id: Option<i32>,
        title: Option<String>,
        abstract_text: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            version: 0,
            invitation,
            conference_id,
            user_id,
            title,
            abstract_text,
            filename: None,
        }
    }
}

/// Variants that carry an uploaded file.
pub trait ContentBearing: Clone + Send + Sync {
    fn invitation(&self) -> &Invitation;
    fn invitation_mut(&mut self) -> &mut Invitation;
    fn filename(&self) -> Option<&str>;
    fn set_filename(&mut self, filename: String);
    /// Directory of the stored file, relative to the upload root.
    fn content_dir(&self) -> AppResult<PathBuf>;
    fn into_any(self) -> AnyInvitation;
}

fn require_user(user_id: Option<i32>) -> AppResult<i32> {
    user_id.ok_or_else(|| {
        AppError::InvalidState("invitation has no invited user to file content under".to_string())
    })
}

impl ContentBearing for CommentInvitation {
    fn invitation(&self) -> &Invitation {
        &self.invitation
    }

    fn invitation_mut(&mut self) -> &mut Invitation {
        &mut self.invitation
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn set_filename(&mut self, filename: String) {
        self.filename = Some(filename);
    }

    fn content_dir(&self) -> AppResult<PathBuf> {
        let user = require_user(self.user_id)?;
        Ok(PathBuf::from("comments")
            .join(format!("user{}", user))
            .join(self.submission_id.to_string()))
    }

    fn into_any(self) -> AnyInvitation {
        AnyInvitation::Comment(self)
    }
}

impl ContentBearing for PaperInvitation {
    fn invitation(&self) -> &Invitation {
        &self.invitation
    }

    fn invitation_mut(&mut self) -> &mut Invitation {
        &mut self.invitation
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn set_filename(&mut self, filename: String) {
        self.filename = Some(filename);
    }

    fn content_dir(&self) -> AppResult<PathBuf> {
        let user = require_user(self.user_id)?;
        Ok(PathBuf::from("papers")
            .join(format!("user{}", user))
            .join(self.conference_id.to_string()))
    }

    fn into_any(self) -> AnyInvitation {
        AnyInvitation::Paper(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnyInvitation {
    Chair(ChairInvitation),
    Comment(CommentInvitation),
    Paper(PaperInvitation),
}

impl AnyInvitation {
    pub fn kind(&self) -> InvitationKind {
        match self {
            AnyInvitation::Chair(_) => InvitationKind::Chair,
            AnyInvitation::Comment(_) => InvitationKind::Comment,
            AnyInvitation::Paper(_) => InvitationKind::Paper,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            AnyInvitation::Chair(c) => c.id,
            AnyInvitation::Comment(c) => c.id,
            AnyInvitation::Paper(p) => p.id,
        }
    }

    pub fn version(&self) -> i32 {
        match self {
            AnyInvitation::Chair(c) => c.version,
            AnyInvitation::Comment(c) => c.version,
            AnyInvitation::Paper(p) => p.version,
        }
    }

    pub(crate) fn set_identity(&mut self, id: i32, version: i32) {
        let (slot_id, slot_version) = match self {
            AnyInvitation::Chair(c) => (&mut c.id, &mut c.version),
            AnyInvitation::Comment(c) => (&mut c.id, &mut c.version),
            AnyInvitation::Paper(p) => (&mut p.id, &mut p.version),
        };
        *slot_id = id;
        *slot_version = version;
    }

    pub fn invitation(&self) -> &Invitation {
        match self {
            AnyInvitation::Chair(c) => &c.invitation,
            AnyInvitation::Comment(c) => &c.invitation,
            AnyInvitation::Paper(p) => &p.invitation,
        }
    }

    pub fn invitation_mut(&mut self) -> &mut Invitation {
        match self {
            AnyInvitation::Chair(c) => &mut c.invitation,
            AnyInvitation::Comment(c) => &mut c.invitation,
            AnyInvitation::Paper(p) => &mut p.invitation,
        }
    }

    pub fn user_id(&self) -> Option<i32> {
        match self {
            AnyInvitation::Chair(c) => c.user_id,
            AnyInvitation::Comment(c) => c.user_id,
            AnyInvitation::Paper(p) => p.user_id,
        }
    }

    pub fn set_user_id(&mut self, user_id: i32) {
        match self {
            AnyInvitation::Chair(c) => c.user_id = Some(user_id),
            AnyInvitation::Comment(c) => c.user_id = Some(user_id),
            AnyInvitation::Paper(p) => p.user_id = Some(user_id),
        }
    }

    /// Submission id for chair/comment invitations, conference id for paper invitations.
    pub fn target_id(&self) -> i32 {
        match self {
            AnyInvitation::Chair(c) => c.submission_id,
            AnyInvitation::Comment(c) => c.submission_id,
            AnyInvitation::Paper(p) => p.conference_id,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            AnyInvitation::Chair(_) => None,
            AnyInvitation::Comment(c) => c.filename.as_deref(),
            AnyInvitation::Paper(p) => p.filename.as_deref(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            AnyInvitation::Chair(_) => None,
            AnyInvitation::Comment(c) => c.title.as_deref(),
            AnyInvitation::Paper(p) => p.title.as_deref(),
        }
    }

    pub fn content_dir(&self) -> AppResult<PathBuf> {
        match self {
            AnyInvitation::Chair(_) => Err(AppError::InvalidState(
                "chair invitations carry no content".to_string(),
            )),
            AnyInvitation::Comment(c) => c.content_dir(),
            AnyInvitation::Paper(p) => p.content_dir(),
        }
    }
}
