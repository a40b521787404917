//! # parla-workflow
//!
//! Request/approval workflows and account management over the ledger store.
//! Every mutating operation runs inside one `BEGIN IMMEDIATE` transaction, so
//! a failure anywhere in a fan-out leaves no partial state behind.
//!
//! ## Modules
//!
//! - [`accounts`] — Registration, login, admin promotion, deletion
//! - [`referrals`] — Single-use invites and permanent referral codes
//! - [`investments`] — Investment submission and the approval fan-out
//! - [`withdrawals`] — Withdrawal submission and balance-checked approval
//! - [`placement`] — Admin placement and self-service network joining
//! - [`dashboard`] — Read projections for users, admins and the public
//! - [`admin`] — Weekly distribution trigger and volume reconciliation
//! - [`password`] — Argon2id credential hashing
//! - [`config`] — Workflow tunables

pub mod accounts;
pub mod admin;
pub mod config;
pub mod dashboard;
pub mod investments;
pub mod password;
pub mod placement;
pub mod referrals;
pub mod withdrawals;

use rusqlite::Connection;

use parla_db::queries::users;
use parla_db::DbError;
use parla_network::NetworkError;
use parla_payout::PayoutError;
use parla_types::requests::RequestStatus;
use parla_types::{Money, UserId};

pub use config::{HashingParams, WorkflowConfig};

/// Why a referral code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralProblem {
    Unknown,
    Expired,
    AlreadyUsed,
}

impl std::fmt::Display for ReferralProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReferralProblem::Unknown => "unknown referral code",
            ReferralProblem::Expired => "referral code has expired",
            ReferralProblem::AlreadyUsed => "referral code has already been used",
        })
    }
}

/// Error types for workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Input rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("email is already registered")]
    EmailTaken,

    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    ReferralInvalid(ReferralProblem),

    /// The acting user lacks the admin flag, or the target is protected.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A request is no longer pending.
    #[error("{what} is {status}, not pending")]
    InvalidTransition { what: String, status: RequestStatus },

    #[error("insufficient balance: {required} requested, {available} available")]
    InsufficientBalance { required: Money, available: Money },

    #[error("user {0} still has users placed under them")]
    HasDescendants(UserId),

    #[error("user {0} has ledger history")]
    HasHistory(UserId),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Convenience result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Coarse classification used by callers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    InsufficientBalance,
    Placement,
    Transition,
    Conflict,
    Consistency,
    Internal,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) | WorkflowError::InvalidCredentials => {
                ErrorKind::Validation
            }
            WorkflowError::EmailTaken
            | WorkflowError::ReferralInvalid(_)
            | WorkflowError::HasDescendants(_)
            | WorkflowError::HasHistory(_) => ErrorKind::Conflict,
            WorkflowError::Forbidden(_) => ErrorKind::Forbidden,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::InvalidTransition { .. } => ErrorKind::Transition,
            WorkflowError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            WorkflowError::Hashing(_) => ErrorKind::Internal,
            WorkflowError::Network(e) => network_kind(e),
            WorkflowError::Payout(e) => match e {
                PayoutError::Network(inner) => network_kind(inner),
                PayoutError::Db(inner) => db_kind(inner),
                PayoutError::InvalidPolicy(_) | PayoutError::InvalidTimestamp(_) => {
                    ErrorKind::Validation
                }
                PayoutError::RatchetConflict(_) => ErrorKind::Conflict,
                PayoutError::Overflow => ErrorKind::Internal,
            },
            WorkflowError::Db(e) => db_kind(e),
        }
    }
}

fn network_kind(err: &NetworkError) -> ErrorKind {
    match err {
        NetworkError::UserNotFound(_) => ErrorKind::NotFound,
        NetworkError::SelfPlacement(_)
        | NetworkError::CyclicPlacement { .. }
        | NetworkError::SlotOccupied { .. }
        | NetworkError::AlreadyPlaced(_)
        | NetworkError::NotPlaced(_) => ErrorKind::Placement,
        NetworkError::Corrupted(_) => ErrorKind::Consistency,
        NetworkError::Overflow => ErrorKind::Internal,
        NetworkError::Db(inner) => db_kind(inner),
    }
}

fn db_kind(err: &DbError) -> ErrorKind {
    match err {
        DbError::NotFound(_) => ErrorKind::NotFound,
        DbError::Constraint(_) => ErrorKind::Conflict,
        _ => ErrorKind::Internal,
    }
}

/// Fail unless `actor` exists and holds the admin flag.
pub fn require_admin(conn: &Connection, actor: UserId) -> Result<()> {
    if !users::exists(conn, actor)? {
        return Err(WorkflowError::NotFound(format!("user {actor}")));
    }
    if !users::is_admin(conn, actor)? {
        tracing::warn!(actor = %actor, "admin action refused");
        return Err(WorkflowError::Forbidden(format!("user {actor} is not an admin")));
    }
    Ok(())
}

/// Fail unless `user` exists.
pub(crate) fn require_user(conn: &Connection, user: UserId) -> Result<()> {
    if users::exists(conn, user)? {
        Ok(())
    } else {
        Err(WorkflowError::NotFound(format!("user {user}")))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by workflow tests.

    use rusqlite::Connection;
    use zeroize::Zeroizing;

    use parla_types::UserId;

    use crate::accounts::{self, NewAccount};
    use crate::config::{HashingParams, WorkflowConfig};

    pub const NOW: u64 = 1_760_000_000;

    pub fn test_db() -> Connection {
        parla_db::open_memory().expect("open test db")
    }

    /// Cheap Argon2 parameters so tests stay fast. Admins are granted explicitly.
    pub fn config() -> WorkflowConfig {
        WorkflowConfig {
            hashing: HashingParams {
                m_cost: 256,
                t_cost: 1,
                p_cost: 1,
            },
            first_user_is_admin: false,
            ..WorkflowConfig::default()
        }
    }

    pub fn account(name: &str, referral_code: Option<&str>) -> NewAccount {
        NewAccount {
            email: format!("{name}@example.com"),
            name: name.to_string(),
            password: Zeroizing::new(format!("{name}-password")),
            referral_code: referral_code.map(str::to_string),
        }
    }

    pub fn register(conn: &mut Connection, name: &str, referral_code: Option<&str>) -> UserId {
        accounts::register(conn, &config(), &account(name, referral_code), NOW)
            .expect("register")
            .user
            .id
    }

    /// Register a user and grant the admin flag directly.
    pub fn admin(conn: &mut Connection, name: &str) -> UserId {
        let id = register(conn, name, None);
        parla_db::queries::users::set_admin(conn, id).expect("set admin");
        id
    }
}
