//! Investment request query functions.

use rusqlite::{Connection, OptionalExtension};

use parla_types::package::PackageTier;
use parla_types::projections::InvestmentRow;
use parla_types::requests::{Investment, PayerDetails, PaymentPlatform, RequestStatus};
use parla_types::{InvestmentId, Money, UserId};

use crate::{not_found, parse_col, DbError, Result};

const INVESTMENT_COLUMNS: &str = "i.id, i.user_id, i.tier, i.amount, i.status, i.platform,
    i.payer_full_name, i.payer_username, i.payer_contact, i.submitted_at, i.decided_at,
    i.processed";

#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub user_id: UserId,
    pub tier: PackageTier,
    pub amount: Money,
    pub platform: PaymentPlatform,
    pub payer: PayerDetails,
    pub submitted_at: u64,
}

fn map_investment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: InvestmentId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        tier: parse_col(row, 2)?,
        amount: Money::from_cents(row.get(3)?),
        status: parse_col(row, 4)?,
        platform: parse_col(row, 5)?,
        payer: PayerDetails {
            full_name: row.get(6)?,
            username: row.get(7)?,
            contact: row.get(8)?,
        },
        submitted_at: row.get::<_, i64>(9)? as u64,
        decided_at: row.get::<_, Option<i64>>(10)?.map(|t| t as u64),
        processed: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, new: &NewInvestment) -> Result<InvestmentId> {
    conn.execute(
        "INSERT INTO investments (user_id, tier, amount, platform, payer_full_name,
                                  payer_username, payer_contact, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            new.user_id.0,
            new.tier.as_str(),
            new.amount.cents(),
            new.platform.as_str(),
            new.payer.full_name,
            new.payer.username,
            new.payer.contact,
            new.submitted_at as i64,
        ],
    )?;
    Ok(InvestmentId(conn.last_insert_rowid()))
}

pub fn get(conn: &Connection, id: InvestmentId) -> Result<Investment> {
    conn.query_row(
        &format!("SELECT {INVESTMENT_COLUMNS} FROM investments i WHERE i.id = ?1"),
        [id.0],
        map_investment,
    )
    .map_err(|e| not_found(e, format!("investment {id}")))
}

/// Move a pending investment to a terminal status.
///
/// The `WHERE status = 'pending'` guard makes this the compare-and-set that
/// prevents a second approval. `processed` is set together with `approved`.
/// Returns `false` if the investment was no longer pending.
pub fn decide(
    conn: &Connection,
    id: InvestmentId,
    status: RequestStatus,
    now: u64,
) -> Result<bool> {
    if !RequestStatus::Pending.can_transition_to(status) {
        return Err(DbError::Constraint(format!(
            "investment {id} cannot move to {status}"
        )));
    }
    let updated = conn.execute(
        "UPDATE investments
         SET status = ?2, decided_at = ?3, processed = (?2 = 'approved')
         WHERE id = ?1 AND status = 'pending'",
        rusqlite::params![id.0, status.as_str(), now as i64],
    )?;
    Ok(updated == 1)
}

/// A user's investments, newest first.
pub fn list_for_user(conn: &Connection, user: UserId) -> Result<Vec<Investment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INVESTMENT_COLUMNS} FROM investments i
         WHERE i.user_id = ?1 ORDER BY i.submitted_at DESC, i.id DESC"
    ))?;
    let rows = stmt
        .query_map([user.0], map_investment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All investments joined with their owners, optionally filtered by status.
pub fn list_with_users(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> Result<Vec<InvestmentRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INVESTMENT_COLUMNS}, u.name, u.email
         FROM investments i JOIN users u ON u.id = i.user_id
         WHERE ?1 IS NULL OR i.status = ?1
         ORDER BY i.submitted_at DESC, i.id DESC"
    ))?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], |row| {
            Ok(InvestmentRow {
                investment: map_investment(row)?,
                user_name: row.get(12)?,
                user_email: row.get(13)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The tier of the user's most recently approved investment.
pub fn active_package(conn: &Connection, user: UserId) -> Result<Option<PackageTier>> {
    let tier: Option<String> = conn
        .query_row(
            "SELECT tier FROM investments
             WHERE user_id = ?1 AND status = 'approved'
             ORDER BY decided_at DESC, id DESC LIMIT 1",
            [user.0],
            |row| row.get(0),
        )
        .optional()?;
    tier.map(|t| t.parse().map_err(|e: parla_types::ParseError| DbError::Serialization(e.to_string())))
        .transpose()
}

pub fn count_by_status(conn: &Connection, status: RequestStatus) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM investments WHERE status = ?1",
        [status.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Sum of all approved investment amounts.
pub fn total_approved(conn: &Connection) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM investments WHERE status = 'approved'",
        [],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Sum of a single user's approved investment amounts.
pub fn approved_for_user(conn: &Connection, user: UserId) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM investments
         WHERE user_id = ?1 AND status = 'approved'",
        [user.0],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

pub fn delete_pending_for_user(conn: &Connection, user: UserId) -> Result<u64> {
    let n = conn.execute(
        "DELETE FROM investments WHERE user_id = ?1 AND status = 'pending'",
        [user.0],
    )?;
    Ok(n as u64)
}
