//! Withdrawal request query functions.

use rusqlite::Connection;

use parla_types::projections::WithdrawalRow;
use parla_types::requests::{DestinationKind, RequestStatus, WithdrawalRequest};
use parla_types::{Money, UserId, WithdrawalId};

use crate::{not_found, parse_col, DbError, Result};

const WITHDRAWAL_COLUMNS: &str = "w.id, w.user_id, w.amount, w.destination, w.destination_kind,
    w.full_name, w.status, w.created_at, w.decided_at";

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: UserId,
    pub amount: Money,
    pub destination: String,
    pub destination_kind: DestinationKind,
    pub full_name: String,
    pub created_at: u64,
}

fn map_withdrawal(row: &rusqlite::Row<'_>) -> rusqlite::Result<WithdrawalRequest> {
    Ok(WithdrawalRequest {
        id: WithdrawalId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        amount: Money::from_cents(row.get(2)?),
        destination: row.get(3)?,
        destination_kind: parse_col(row, 4)?,
        full_name: row.get(5)?,
        status: parse_col(row, 6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        decided_at: row.get::<_, Option<i64>>(8)?.map(|t| t as u64),
    })
}

pub fn insert(conn: &Connection, new: &NewWithdrawal) -> Result<WithdrawalId> {
    conn.execute(
        "INSERT INTO withdrawal_requests
             (user_id, amount, destination, destination_kind, full_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            new.user_id.0,
            new.amount.cents(),
            new.destination,
            new.destination_kind.as_str(),
            new.full_name,
            new.created_at as i64,
        ],
    )?;
    Ok(WithdrawalId(conn.last_insert_rowid()))
}

pub fn get(conn: &Connection, id: WithdrawalId) -> Result<WithdrawalRequest> {
    conn.query_row(
        &format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests w WHERE w.id = ?1"),
        [id.0],
        map_withdrawal,
    )
    .map_err(|e| not_found(e, format!("withdrawal {id}")))
}

/// Move a pending withdrawal to a terminal status. Returns `false` if it was no
/// longer pending.
pub fn decide(
    conn: &Connection,
    id: WithdrawalId,
    status: RequestStatus,
    now: u64,
) -> Result<bool> {
    if !RequestStatus::Pending.can_transition_to(status) {
        return Err(DbError::Constraint(format!(
            "withdrawal {id} cannot move to {status}"
        )));
    }
    let updated = conn.execute(
        "UPDATE withdrawal_requests SET status = ?2, decided_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        rusqlite::params![id.0, status.as_str(), now as i64],
    )?;
    Ok(updated == 1)
}

/// A user's withdrawal requests, newest first.
pub fn list_for_user(conn: &Connection, user: UserId) -> Result<Vec<WithdrawalRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests w
         WHERE w.user_id = ?1 ORDER BY w.created_at DESC, w.id DESC"
    ))?;
    let rows = stmt
        .query_map([user.0], map_withdrawal)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All withdrawal requests joined with their owners, optionally filtered by status.
pub fn list_with_users(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> Result<Vec<WithdrawalRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WITHDRAWAL_COLUMNS}, u.name, u.email
         FROM withdrawal_requests w JOIN users u ON u.id = w.user_id
         WHERE ?1 IS NULL OR w.status = ?1
         ORDER BY w.created_at DESC, w.id DESC"
    ))?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], |row| {
            Ok(WithdrawalRow {
                withdrawal: map_withdrawal(row)?,
                user_name: row.get(9)?,
                user_email: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_by_status(conn: &Connection, status: RequestStatus) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM withdrawal_requests WHERE status = ?1",
        [status.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

pub fn delete_pending_for_user(conn: &Connection, user: UserId) -> Result<u64> {
    let n = conn.execute(
        "DELETE FROM withdrawal_requests WHERE user_id = ?1 AND status = 'pending'",
        [user.0],
    )?;
    Ok(n as u64)
}
