//! Withdrawal requests.
//!
//! The available balance is checked twice: when the request is filed, and
//! again inside the approval transaction, since payouts or other withdrawals
//! may have landed in between.

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::withdrawals::{self, NewWithdrawal};
use parla_db::queries::ledger;
use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::projections::WithdrawalRow;
use parla_types::requests::{DestinationKind, RequestStatus, WithdrawalRequest};
use parla_types::{Money, UserId, WithdrawalId};

use crate::{require_admin, require_user, Result, WorkflowError};

/// Withdrawal request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitWithdrawal {
    pub amount: Money,
    pub destination: String,
    pub destination_kind: DestinationKind,
    pub full_name: String,
}

/// An approved withdrawal and the ledger debit it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalApproval {
    pub request: WithdrawalRequest,
    pub entry: LedgerEntry,
    /// Available balance after the debit.
    pub remaining: Money,
}

/// Normalise and check a payout destination.
fn normalize_destination(kind: DestinationKind, raw: &str) -> Result<String> {
    match kind {
        DestinationKind::Iban => {
            let iban: String = raw
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase();
            let well_formed = (15..=34).contains(&iban.len())
                && iban.chars().take(2).all(|c| c.is_ascii_alphabetic())
                && iban.chars().skip(2).take(2).all(|c| c.is_ascii_digit())
                && iban.chars().all(|c| c.is_ascii_alphanumeric());
            if well_formed {
                Ok(iban)
            } else {
                Err(WorkflowError::Validation(format!("malformed IBAN: {raw:?}")))
            }
        }
        DestinationKind::Crypto => {
            let address = raw.trim();
            let well_formed = (26..=64).contains(&address.len())
                && address.chars().all(|c| c.is_ascii_alphanumeric());
            if well_formed {
                Ok(address.to_string())
            } else {
                Err(WorkflowError::Validation(format!("malformed wallet address: {raw:?}")))
            }
        }
    }
}

fn ensure_covered(required: Money, available: Money) -> Result<()> {
    if required > available {
        return Err(WorkflowError::InsufficientBalance {
            required,
            available,
        });
    }
    Ok(())
}

/// File a withdrawal request.
///
/// # Errors
///
/// - [`WorkflowError::Validation`] for a non-positive amount, a blank name or a
///   malformed destination
/// - [`WorkflowError::InsufficientBalance`] if the amount exceeds the available balance
pub fn submit_withdrawal(
    conn: &mut Connection,
    user: UserId,
    request: &SubmitWithdrawal,
    now: u64,
) -> Result<WithdrawalRequest> {
    if !request.amount.is_positive() {
        return Err(WorkflowError::Validation("amount must be positive".into()));
    }
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(WorkflowError::Validation("full name must not be empty".into()));
    }
    let destination = normalize_destination(request.destination_kind, &request.destination)?;

    parla_db::immediate(conn, |tx| {
        require_user(tx, user)?;
        ensure_covered(request.amount, ledger::available(tx, user)?)?;
        let id = withdrawals::insert(
            tx,
            &NewWithdrawal {
                user_id: user,
                amount: request.amount,
                destination: destination.clone(),
                destination_kind: request.destination_kind,
                full_name: full_name.to_string(),
                created_at: now,
            },
        )?;
        tracing::info!(user = %user, withdrawal = %id, amount = %request.amount, "withdrawal submitted");
        Ok(withdrawals::get(tx, id)?)
    })
}

fn pending_withdrawal(conn: &Connection, id: WithdrawalId) -> Result<WithdrawalRequest> {
    let request = withdrawals::get(conn, id)?;
    if request.status != RequestStatus::Pending {
        return Err(WorkflowError::InvalidTransition {
            what: format!("withdrawal {id}"),
            status: request.status,
        });
    }
    Ok(request)
}

/// Approve a pending withdrawal, debiting the ledger.
///
/// # Errors
///
/// - [`WorkflowError::InsufficientBalance`] if the balance no longer covers the
///   amount; the request stays pending
pub fn approve_withdrawal(
    conn: &mut Connection,
    actor: UserId,
    id: WithdrawalId,
    now: u64,
) -> Result<WithdrawalApproval> {
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        let request = pending_withdrawal(tx, id)?;
        let available = ledger::available(tx, request.user_id)?;
        if let Err(e) = ensure_covered(request.amount, available) {
            tracing::warn!(
                withdrawal = %id,
                required = %request.amount,
                available = %available,
                "withdrawal no longer covered"
            );
            return Err(e);
        }

        let debit = request
            .amount
            .checked_neg()
            .ok_or_else(|| WorkflowError::Validation("amount out of range".into()))?;
        let entry = ledger::append(
            tx,
            &NewEntry {
                user_id: request.user_id,
                kind: EntryKind::Withdrawal,
                amount: debit,
                description: format!("Withdrawal to {}", request.destination_kind),
                reference: Some(format!("withdrawal:{id}")),
                created_at: now,
            },
        )?;
        if !withdrawals::decide(tx, id, RequestStatus::Approved, now)? {
            return Err(WorkflowError::InvalidTransition {
                what: format!("withdrawal {id}"),
                status: withdrawals::get(tx, id)?.status,
            });
        }

        let remaining = ledger::available(tx, request.user_id)?;
        tracing::info!(
            actor = %actor,
            withdrawal = %id,
            user = %request.user_id,
            amount = %request.amount,
            remaining = %remaining,
            "withdrawal approved"
        );
        Ok(WithdrawalApproval {
            request: withdrawals::get(tx, id)?,
            entry,
            remaining,
        })
    })
}

/// Reject a pending withdrawal. The ledger is untouched.
pub fn reject_withdrawal(
    conn: &mut Connection,
    actor: UserId,
    id: WithdrawalId,
    now: u64,
) -> Result<WithdrawalRequest> {
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        pending_withdrawal(tx, id)?;
        if !withdrawals::decide(tx, id, RequestStatus::Rejected, now)? {
            return Err(WorkflowError::InvalidTransition {
                what: format!("withdrawal {id}"),
                status: withdrawals::get(tx, id)?.status,
            });
        }
        tracing::info!(actor = %actor, withdrawal = %id, "withdrawal rejected");
        Ok(withdrawals::get(tx, id)?)
    })
}

pub fn my_withdrawals(conn: &Connection, user: UserId) -> Result<Vec<WithdrawalRequest>> {
    require_user(conn, user)?;
    Ok(withdrawals::list_for_user(conn, user)?)
}

pub fn list_withdrawal_requests(
    conn: &Connection,
    actor: UserId,
    status: Option<RequestStatus>,
) -> Result<Vec<WithdrawalRow>> {
    require_admin(conn, actor)?;
    Ok(withdrawals::list_with_users(conn, status)?)
}
