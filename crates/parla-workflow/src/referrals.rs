//! Referral codes.
//!
//! Two kinds of code lead to a sponsor:
//!
//! - a user's permanent `referral_code`, reusable, placed with `auto` preference;
//! - a single-use invite, carrying the leg the sponsor asked for and expiring
//!   after `invite_ttl_secs`.
//!
//! Both are 11-character URL-safe base64 strings over 8 random bytes, compared
//! case-insensitively.

use base64::Engine;
use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::referrals::{self, InviteRow};
use parla_db::queries::users;
use parla_db::DbError;
use parla_types::account::UserSummary;
use parla_types::projections::UsedInvite;
use parla_types::tree::PlacementPreference;
use parla_types::UserId;

use crate::config::WorkflowConfig;
use crate::{require_user, ReferralProblem, Result, WorkflowError};

const CODE_ATTEMPTS: usize = 8;

/// Invite as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invite {
    pub code: String,
    pub preference: PlacementPreference,
    pub created_at: u64,
    pub expires_at: u64,
}

impl From<InviteRow> for Invite {
    fn from(row: InviteRow) -> Self {
        Self {
            code: row.code,
            preference: row.preference,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Answer to "is this code usable?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralCheck {
    pub valid: bool,
    pub sponsor_name: Option<String>,
    pub problem: Option<ReferralProblem>,
}

/// A code resolved to the sponsor it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReferral {
    pub sponsor: UserSummary,
    pub preference: PlacementPreference,
    /// Set when the code is a single-use invite that must be consumed.
    pub invite_code: Option<String>,
}

fn random_code() -> String {
    let mut bytes = [0u8; 8];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// A fresh code not used by any user or invite.
pub(crate) fn unique_code(conn: &Connection) -> Result<String> {
    for _ in 0..CODE_ATTEMPTS {
        let code = random_code();
        if !users::referral_code_taken(conn, &code)? {
            return Ok(code);
        }
    }
    Err(DbError::Constraint("could not allocate a unique referral code".into()).into())
}

/// Resolve a code to its sponsor, refusing expired or consumed invites.
pub(crate) fn resolve(conn: &Connection, code: &str, now: u64) -> Result<ResolvedReferral> {
    let code = code.trim();
    if let Some(invite) = referrals::find(conn, code)? {
        if invite.is_used() {
            return Err(WorkflowError::ReferralInvalid(ReferralProblem::AlreadyUsed));
        }
        if invite.is_expired(now) {
            return Err(WorkflowError::ReferralInvalid(ReferralProblem::Expired));
        }
        let sponsor = users::get(conn, invite.owner_id)?;
        return Ok(ResolvedReferral {
            sponsor,
            preference: invite.preference,
            invite_code: Some(invite.code),
        });
    }
    match users::find_by_referral_code(conn, code)? {
        Some(sponsor) => Ok(ResolvedReferral {
            sponsor,
            preference: PlacementPreference::Auto,
            invite_code: None,
        }),
        None => Err(WorkflowError::ReferralInvalid(ReferralProblem::Unknown)),
    }
}

/// Report whether `code` can be used to register, without consuming it.
pub fn validate_referral_code(conn: &Connection, code: &str, now: u64) -> Result<ReferralCheck> {
    match resolve(conn, code, now) {
        Ok(resolved) => Ok(ReferralCheck {
            valid: true,
            sponsor_name: Some(resolved.sponsor.name),
            problem: None,
        }),
        Err(WorkflowError::ReferralInvalid(problem)) => Ok(ReferralCheck {
            valid: false,
            sponsor_name: None,
            problem: Some(problem),
        }),
        Err(e) => Err(e),
    }
}

/// Create a new single-use invite for `owner`.
pub fn generate_invite(
    conn: &mut Connection,
    config: &WorkflowConfig,
    owner: UserId,
    preference: PlacementPreference,
    now: u64,
) -> Result<Invite> {
    parla_db::immediate(conn, |tx| insert_invite(tx, config, owner, preference, now))
}

/// Return `owner`'s newest active invite, creating one if none is left.
pub fn ensure_invite(
    conn: &mut Connection,
    config: &WorkflowConfig,
    owner: UserId,
    preference: PlacementPreference,
    now: u64,
) -> Result<Invite> {
    parla_db::immediate(conn, |tx| {
        require_user(tx, owner)?;
        match referrals::active_for_owner(tx, owner, now)? {
            Some(active) => Ok(Invite::from(active)),
            None => insert_invite(tx, config, owner, preference, now),
        }
    })
}

fn insert_invite(
    conn: &Connection,
    config: &WorkflowConfig,
    owner: UserId,
    preference: PlacementPreference,
    now: u64,
) -> Result<Invite> {
    require_user(conn, owner)?;
    let code = unique_code(conn)?;
    let expires_at = now.saturating_add(config.invite_ttl_secs);
    referrals::insert(conn, &code, owner, preference, now, expires_at)?;
    tracing::info!(owner = %owner, preference = %preference, expires_at, "invite generated");
    Ok(Invite {
        code,
        preference,
        created_at: now,
        expires_at,
    })
}

/// Consumed invites of `owner`, newest first.
pub fn used_invites(conn: &Connection, owner: UserId) -> Result<Vec<UsedInvite>> {
    require_user(conn, owner)?;
    Ok(referrals::used_by_owner(conn, owner)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, register, test_db, NOW};

    #[test]
    fn test_code_shape() {
        let code = random_code();
        assert_eq!(code.len(), 11);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_invite_lifecycle() {
        let mut conn = test_db();
        let cfg = config();
        let owner = register(&mut conn, "owner", None);

        let invite = generate_invite(&mut conn, &cfg, owner, PlacementPreference::Right, NOW)
            .expect("invite");
        assert_eq!(invite.expires_at, NOW + 600);

        let check = validate_referral_code(&conn, &invite.code, NOW + 10).expect("check");
        assert!(check.valid);
        assert_eq!(check.sponsor_name.as_deref(), Some("owner"));

        let upper = invite.code.to_uppercase();
        let resolved = resolve(&conn, &format!("  {upper} "), NOW + 10).expect("resolve");
        assert_eq!(resolved.sponsor.id, owner);
        assert_eq!(resolved.preference, PlacementPreference::Right);

        let expired = validate_referral_code(&conn, &invite.code, NOW + 600).expect("check");
        assert_eq!(expired.problem, Some(ReferralProblem::Expired));

        let joined = register(&mut conn, "joined", Some(&invite.code));
        let used = validate_referral_code(&conn, &invite.code, NOW + 20).expect("check");
        assert_eq!(used.problem, Some(ReferralProblem::AlreadyUsed));

        let history = used_invites(&conn, owner).expect("used");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].used_by, joined);
    }

    #[test]
    fn test_permanent_code() {
        let mut conn = test_db();
        let owner = register(&mut conn, "owner", None);
        let code = users::get(&conn, owner).expect("owner").referral_code;

        let resolved = resolve(&conn, &code, NOW).expect("resolve");
        assert_eq!(resolved.sponsor.id, owner);
        assert_eq!(resolved.preference, PlacementPreference::Auto);
        assert!(resolved.invite_code.is_none());
    }

    #[test]
    fn test_unknown_code() {
        let conn = test_db();
        let check = validate_referral_code(&conn, "nope", NOW).expect("check");
        assert!(!check.valid);
        assert_eq!(check.problem, Some(ReferralProblem::Unknown));
    }

    #[test]
    fn test_ensure_reuses_active() {
        let mut conn = test_db();
        let cfg = config();
        let owner = register(&mut conn, "owner", None);

        let first = ensure_invite(&mut conn, &cfg, owner, PlacementPreference::Auto, NOW)
            .expect("first");
        let again = ensure_invite(&mut conn, &cfg, owner, PlacementPreference::Auto, NOW + 5)
            .expect("again");
        assert_eq!(first.code, again.code);

        let later = ensure_invite(&mut conn, &cfg, owner, PlacementPreference::Auto, NOW + 601)
            .expect("later");
        assert_ne!(first.code, later.code);
    }
}
