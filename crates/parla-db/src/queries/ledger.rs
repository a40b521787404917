//! Ledger query functions.
//!
//! The ledger is append-only: there is no update or delete here. Balances are
//! always sums over completed entries.

use rusqlite::{Connection, OptionalExtension};

use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::projections::KindTotal;
use parla_types::{EntryId, Money, UserId};

use crate::{constraint, not_found, parse_col, Result};

const ENTRY_COLUMNS: &str =
    "id, user_id, kind, amount, status, description, reference, created_at";

/// Kinds that make up the withdrawable balance.
const AVAILABLE_KINDS: &str =
    "('weekly_profit', 'commission', 'binary_match', 'career_reward', 'withdrawal')";

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: EntryId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        kind: parse_col(row, 2)?,
        amount: Money::from_cents(row.get(3)?),
        status: parse_col(row, 4)?,
        description: row.get(5)?,
        reference: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

/// Append a completed entry. A repeated `(user, kind, reference)` is a
/// [`DbError::Constraint`](crate::DbError::Constraint).
pub fn append(conn: &Connection, entry: &NewEntry) -> Result<LedgerEntry> {
    conn.execute(
        "INSERT INTO ledger_entries (user_id, kind, amount, status, description, reference, created_at)
         VALUES (?1, ?2, ?3, 'completed', ?4, ?5, ?6)",
        rusqlite::params![
            entry.user_id.0,
            entry.kind.as_str(),
            entry.amount.cents(),
            entry.description,
            entry.reference,
            entry.created_at as i64,
        ],
    )
    .map_err(|e| {
        constraint(
            e,
            format!(
                "{} entry {:?} already recorded for user {}",
                entry.kind, entry.reference, entry.user_id
            ),
        )
    })?;
    get(conn, EntryId(conn.last_insert_rowid()))
}

/// Append unless an entry with the same `(user, kind, reference)` exists.
/// Returns `None` when the key was already taken.
pub fn append_if_absent(conn: &Connection, entry: &NewEntry) -> Result<Option<LedgerEntry>> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO ledger_entries
             (user_id, kind, amount, status, description, reference, created_at)
         VALUES (?1, ?2, ?3, 'completed', ?4, ?5, ?6)",
        rusqlite::params![
            entry.user_id.0,
            entry.kind.as_str(),
            entry.amount.cents(),
            entry.description,
            entry.reference,
            entry.created_at as i64,
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    get(conn, EntryId(conn.last_insert_rowid())).map(Some)
}

pub fn get(conn: &Connection, id: EntryId) -> Result<LedgerEntry> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = ?1"),
        [id.0],
        map_entry,
    )
    .map_err(|e| not_found(e, format!("ledger entry {id}")))
}

pub fn has_reference(
    conn: &Connection,
    user: UserId,
    kind: EntryKind,
    reference: &str,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM ledger_entries WHERE user_id = ?1 AND kind = ?2 AND reference = ?3",
            rusqlite::params![user.0, kind.as_str(), reference],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Sum of a user's completed entries of one kind.
pub fn total_of_kind(conn: &Connection, user: UserId, kind: EntryKind) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
         WHERE user_id = ?1 AND kind = ?2 AND status = 'completed'",
        rusqlite::params![user.0, kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Principal: completed `investment` entries.
pub fn principal(conn: &Connection, user: UserId) -> Result<Money> {
    total_of_kind(conn, user, EntryKind::Investment)
}

/// Withdrawable balance: every completed non-principal entry, withdrawals
/// included as negatives.
pub fn available(conn: &Connection, user: UserId) -> Result<Money> {
    let cents: i64 = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
             WHERE user_id = ?1 AND status = 'completed' AND kind IN {AVAILABLE_KINDS}"
        ),
        [user.0],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Users with positive principal and id greater than `after`, ascending, at most
/// `limit` rows. Drives batched distribution.
pub fn principals_after(
    conn: &Connection,
    after: Option<UserId>,
    limit: u32,
) -> Result<Vec<(UserId, Money)>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, SUM(amount) AS principal FROM ledger_entries
         WHERE kind = 'investment' AND status = 'completed' AND user_id > ?1
         GROUP BY user_id
         HAVING principal > 0
         ORDER BY user_id
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![after.map_or(0, |id| id.0), limit], |row| {
            Ok((UserId(row.get(0)?), Money::from_cents(row.get(1)?)))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A user's most recent entries, newest first.
pub fn recent_for_user(conn: &Connection, user: UserId, limit: u32) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![user.0, limit], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most recent entries across all users.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Completed totals per kind, one row per kind in [`EntryKind::ALL`] order.
pub fn totals_by_kind(conn: &Connection) -> Result<Vec<KindTotal>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
         WHERE kind = ?1 AND status = 'completed'",
    )?;
    EntryKind::ALL
        .iter()
        .map(|&kind| -> Result<KindTotal> {
            let cents: i64 = stmt.query_row([kind.as_str()], |row| row.get(0))?;
            Ok(KindTotal {
                kind,
                total: Money::from_cents(cents),
            })
        })
        .collect()
}

/// Number of entries of one kind carrying `reference`, across users.
pub fn count_with_reference(conn: &Connection, kind: EntryKind, reference: &str) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ledger_entries WHERE kind = ?1 AND reference = ?2",
        rusqlite::params![kind.as_str(), reference],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

pub fn has_history(conn: &Connection, user: UserId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM ledger_entries WHERE user_id = ?1 LIMIT 1",
            [user.0],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
