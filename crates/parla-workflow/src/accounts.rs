//! Accounts: registration, login, admin promotion and deletion.

use rusqlite::Connection;
use serde::Serialize;
use zeroize::Zeroizing;

use parla_db::queries::{investments, ledger, referrals as invites, tree, users, volumes, withdrawals};
use parla_db::queries::users::NewUser;
use parla_db::DbError;
use parla_types::account::UserSummary;
use parla_types::tree::PlacementPreference;
use parla_types::UserId;

use crate::config::WorkflowConfig;
use crate::password::{self, MIN_PASSWORD_LEN};
use crate::referrals;
use crate::{require_admin, require_user, ReferralProblem, Result, WorkflowError};

/// Registration input. The password is wiped from memory on drop.
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password: Zeroizing<String>,
    pub referral_code: Option<String>,
}

/// A freshly created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registered {
    pub user: UserSummary,
    pub sponsor: Option<UserSummary>,
    pub sponsor_preference: Option<PlacementPreference>,
    /// The single-use invite consumed by this registration.
    pub invite_used: Option<String>,
}

/// A removed account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedUser {
    pub user_id: UserId,
    pub email: String,
    pub pending_investments_removed: u64,
    pub pending_withdrawals_removed: u64,
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(WorkflowError::Validation(format!("invalid email address: {email:?}")))
    }
}

/// Create an account, optionally under the sponsor named by a referral code.
///
/// The account is not placed in the tree; placement happens on the first
/// approved investment or through [`crate::placement::join_network`].
///
/// # Errors
///
/// - [`WorkflowError::Validation`] for a malformed email, an empty name or a short password
/// - [`WorkflowError::EmailTaken`] if the email is registered
/// - [`WorkflowError::ReferralInvalid`] for an unknown, expired or used code
pub fn register(
    conn: &mut Connection,
    config: &WorkflowConfig,
    account: &NewAccount,
    now: u64,
) -> Result<Registered> {
    let email = account.email.trim().to_lowercase();
    validate_email(&email)?;
    let name = account.name.trim().to_string();
    if name.is_empty() {
        return Err(WorkflowError::Validation("name must not be empty".into()));
    }
    if account.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WorkflowError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let referral_code = account
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let password_hash = password::hash_password(&account.password, &config.hashing)?;

    parla_db::immediate(conn, |tx| {
        if users::find_credentials(tx, &email)?.is_some() {
            return Err(WorkflowError::EmailTaken);
        }
        let resolved = referral_code
            .map(|code| referrals::resolve(tx, code, now))
            .transpose()?;
        let first_account = users::count(tx)? == 0;

        let id = users::insert(
            tx,
            &NewUser {
                email: email.clone(),
                name: name.clone(),
                password_hash: password_hash.clone(),
                referral_code: referrals::unique_code(tx)?,
                sponsor_id: resolved.as_ref().map(|r| r.sponsor.id),
                sponsor_preference: resolved.as_ref().map(|r| r.preference),
                created_at: now,
            },
        )
        .map_err(|e| match e {
            DbError::Constraint(_) => WorkflowError::EmailTaken,
            other => other.into(),
        })?;
        volumes::insert_empty(tx, id)?;

        let invite_used = resolved.as_ref().and_then(|r| r.invite_code.clone());
        if let Some(code) = &invite_used {
            if !invites::mark_used(tx, code, id, now)? {
                return Err(WorkflowError::ReferralInvalid(ReferralProblem::AlreadyUsed));
            }
        }

        if first_account && config.first_user_is_admin {
            users::set_admin(tx, id)?;
            tracing::info!(user = %id, "first account granted admin");
        }

        let user = users::get(tx, id)?;
        tracing::info!(
            user = %id,
            sponsor = ?resolved.as_ref().map(|r| r.sponsor.id),
            invite = invite_used.is_some(),
            "user registered"
        );

        Ok(Registered {
            user,
            sponsor_preference: resolved.as_ref().map(|r| r.preference),
            sponsor: resolved.map(|r| r.sponsor),
            invite_used,
        })
    })
}

/// Check credentials and stamp `last_login_at`.
///
/// # Errors
///
/// - [`WorkflowError::InvalidCredentials`] for an unknown email or a wrong password
pub fn login(conn: &Connection, email: &str, password: &str, now: u64) -> Result<UserSummary> {
    let Some((mut user, hash)) = users::find_credentials(conn, email.trim())? else {
        return Err(WorkflowError::InvalidCredentials);
    };
    if !password::verify_password(password, &hash)? {
        tracing::debug!(user = %user.id, "login refused");
        return Err(WorkflowError::InvalidCredentials);
    }
    users::set_last_login(conn, user.id, now)?;
    user.last_login_at = Some(now);
    tracing::info!(user = %user.id, "user logged in");
    Ok(user)
}

/// Grant the admin flag to `target`. Granting it twice is not an error.
pub fn make_admin(conn: &mut Connection, actor: UserId, target: UserId) -> Result<UserSummary> {
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        require_user(tx, target)?;
        if users::set_admin(tx, target)? {
            tracing::info!(actor = %actor, user = %target, "admin granted");
        }
        Ok(users::get(tx, target)?)
    })
}

/// Remove an account that left no trace in the network or the ledger.
///
/// # Errors
///
/// - [`WorkflowError::Forbidden`] if `actor` is not an admin or `target` is one
/// - [`WorkflowError::HasDescendants`] if anyone is placed under `target`
/// - [`WorkflowError::HasHistory`] if `target` has ledger entries
pub fn delete_user(conn: &mut Connection, actor: UserId, target: UserId) -> Result<DeletedUser> {
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        require_user(tx, target)?;
        if users::is_admin(tx, target)? {
            return Err(WorkflowError::Forbidden(format!(
                "user {target} is an admin and cannot be deleted"
            )));
        }
        if tree::count_children(tx, target)? > 0 {
            return Err(WorkflowError::HasDescendants(target));
        }
        if ledger::has_history(tx, target)? {
            return Err(WorkflowError::HasHistory(target));
        }

        let email = users::get(tx, target)?.email;
        let pending_investments_removed = investments::delete_pending_for_user(tx, target)?;
        let pending_withdrawals_removed = withdrawals::delete_pending_for_user(tx, target)?;
        tree::delete(tx, target)?;
        users::delete(tx, target)?;

        tracing::info!(actor = %actor, user = %target, "user deleted");
        Ok(DeletedUser {
            user_id: target,
            email,
            pending_investments_removed,
            pending_withdrawals_removed,
        })
    })
}
