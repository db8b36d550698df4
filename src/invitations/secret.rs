//! Unguessable tokens that let an invitee act on an invitation without a session.

use rand::Rng;
use subtle::ConstantTimeEq;

use super::AnyInvitation;
use crate::db::Repository;
use crate::error::{AppError, AppResult};

pub const SECRET_LEN: usize = 16;
const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MINT_ATTEMPTS: usize = 5;

/// 16 characters drawn uniformly from `[0-9a-z]`.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

pub fn is_well_formed(secret: &str) -> bool {
    secret.len() == SECRET_LEN
        && secret
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Generates a secret not yet held by any stored invitation.
pub async fn mint_unique(repo: &dyn Repository) -> AppResult<String> {
    for _ in 0..MINT_ATTEMPTS {
        let secret = generate();
        if repo.find_invitation_by_secret(&secret).await?.is_none() {
            return Ok(secret);
        }
        tracing::warn!("Secret collision while minting an invitation link, regenerating");
    }
    Err(AppError::Internal(
        "could not mint a unique invitation secret".to_string(),
    ))
}

fn secrets_match(stored: &str, presented: &str) -> bool {
    bool::from(stored.as_bytes().ct_eq(presented.as_bytes()))
}

/// Finds the invitation holding exactly this secret.
pub async fn resolve(repo: &dyn Repository, secret: &str) -> AppResult<AnyInvitation> {
    let not_found = || AppError::NotFound("invitation link".to_string());

    if !is_well_formed(secret) {
        return Err(not_found());
    }

    let invitation = repo
        .find_invitation_by_secret(secret)
        .await?
        .ok_or_else(not_found)?;

    if !secrets_match(invitation.invitation().secret(), secret) {
        return Err(not_found());
    }
    Ok(invitation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryRepository;
    use crate::invitations::{ChairInvitation, Invitation};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    #[test]
    fn test_generate_shape() {
        for _ in 0..50 {
            let secret = generate();
            assert_eq!(secret.len(), SECRET_LEN);
            assert!(is_well_formed(&secret), "{}", secret);
        }
    }

    #[test]
    fn test_generated_secrets_differ() {
        let secrets: HashSet<String> = (0..200).map(|_| generate()).collect();
        assert_eq!(secrets.len(), 200);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("0123456789abcdef"));
        assert!(!is_well_formed("0123456789ABCDEF"));
        assert!(!is_well_formed("0123456789abcde"));
        assert!(!is_well_formed("0123456789abcdef0"));
        assert!(!is_well_formed("0123456789abcde-"));
    }

    #[tokio::test]
    async fn test_resolve_exact_match_only() {
        let repo = MemoryRepository::new();
        let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let stored = repo
            .insert_invitation(AnyInvitation::Chair(ChairInvitation::new(
                Invitation::new(today, "k3y0000000000042".to_string(), None),
                1,
                None,
            )))
            .await
            .unwrap();

        let found = resolve(&repo, "k3y0000000000042").await.unwrap();
        assert_eq!(found.id(), stored.id());

        for near_miss in [
            "k3y0000000000043",
            "j3y0000000000042",
            "K3y0000000000042",
            "k3y000000000004",
            "k3y0000000000042 ",
        ] {
            assert!(
                matches!(resolve(&repo, near_miss).await, Err(AppError::NotFound(_))),
                "{:?} resolved",
                near_miss
            );
        }
    }

    #[tokio::test]
    async fn test_mint_unique_avoids_stored_secrets() {
        let repo = MemoryRepository::new();
        let secret = mint_unique(&repo).await.unwrap();
        assert!(is_well_formed(&secret));
        assert!(repo.find_invitation_by_secret(&secret).await.unwrap().is_none());
    }

    #[test]
    fn test_secrets_match_is_exact() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("abc", "abcd"));
    }
}
