//! Volume aggregate query functions.
//!
//! `volume_aggregates` is a cache. Leg volumes can always be recomputed with
//! [`subtree_volume`]; the two ratchets (`paid_match_units`, `career_level`) only
//! move forward and are guarded in SQL.

use rusqlite::Connection;

use parla_types::account::VolumeAggregate;
use parla_types::career::CareerLevel;
use parla_types::{Money, UserId};

use crate::{not_found, parse_col, DbError, Result};

fn map_aggregate(row: &rusqlite::Row<'_>) -> rusqlite::Result<VolumeAggregate> {
    Ok(VolumeAggregate {
        user_id: UserId(row.get(0)?),
        left_volume: Money::from_cents(row.get(1)?),
        right_volume: Money::from_cents(row.get(2)?),
        paid_match_units: row.get(3)?,
        binary_earnings: Money::from_cents(row.get(4)?),
        total_commissions: Money::from_cents(row.get(5)?),
        career_level: parse_col(row, 6)?,
        career_rewards: Money::from_cents(row.get(7)?),
    })
}

const AGGREGATE_COLUMNS: &str = "user_id, left_volume, right_volume, paid_match_units,
    binary_earnings, total_commissions, career_level, career_rewards";

fn overflow(user: UserId, field: &str) -> DbError {
    DbError::Constraint(format!("{field} overflow for user {user}"))
}

/// Create the all-zero aggregate row for a new user.
pub fn insert_empty(conn: &Connection, user: UserId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO volume_aggregates (user_id) VALUES (?1)",
        [user.0],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, user: UserId) -> Result<VolumeAggregate> {
    conn.query_row(
        &format!("SELECT {AGGREGATE_COLUMNS} FROM volume_aggregates WHERE user_id = ?1"),
        [user.0],
        map_aggregate,
    )
    .map_err(|e| not_found(e, format!("volume aggregate for user {user}")))
}

/// Every aggregate, ordered by user id.
pub fn all(conn: &Connection) -> Result<Vec<VolumeAggregate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AGGREGATE_COLUMNS} FROM volume_aggregates ORDER BY user_id"
    ))?;
    let rows = stmt
        .query_map([], map_aggregate)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Overwrite both leg volumes.
pub fn set_legs(conn: &Connection, user: UserId, left: Money, right: Money) -> Result<()> {
    let updated = conn.execute(
        "UPDATE volume_aggregates SET left_volume = ?2, right_volume = ?3 WHERE user_id = ?1",
        rusqlite::params![user.0, left.cents(), right.cents()],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("volume aggregate for user {user}")));
    }
    Ok(())
}

/// Raise the binary-match watermark to `units` and add `payout` to
/// `binary_earnings`. Returns `false` (and writes nothing) if the watermark is
/// already at or above `units`.
pub fn record_match(conn: &Connection, user: UserId, units: i64, payout: Money) -> Result<bool> {
    let current = get(conn, user)?;
    if current.paid_match_units >= units {
        return Ok(false);
    }
    let earnings = current
        .binary_earnings
        .checked_add(payout)
        .ok_or_else(|| overflow(user, "binary_earnings"))?;
    let updated = conn.execute(
        "UPDATE volume_aggregates SET paid_match_units = ?2, binary_earnings = ?3
         WHERE user_id = ?1 AND paid_match_units < ?2",
        rusqlite::params![user.0, units, earnings.cents()],
    )?;
    Ok(updated == 1)
}

/// Add a commission to `total_commissions`.
pub fn add_commission(conn: &Connection, user: UserId, amount: Money) -> Result<()> {
    let current = get(conn, user)?;
    let total = current
        .total_commissions
        .checked_add(amount)
        .ok_or_else(|| overflow(user, "total_commissions"))?;
    conn.execute(
        "UPDATE volume_aggregates SET total_commissions = ?2 WHERE user_id = ?1",
        rusqlite::params![user.0, total.cents()],
    )?;
    Ok(())
}

/// Ratchet the career level from `from` to `to` and add `reward` to
/// `career_rewards`. Returns `false` if the stored level was no longer `from`.
pub fn advance_career(
    conn: &Connection,
    user: UserId,
    from: CareerLevel,
    to: CareerLevel,
    reward: Money,
) -> Result<bool> {
    if to <= from {
        return Err(DbError::Constraint(format!(
            "career level for user {user} cannot move from {from} to {to}"
        )));
    }
    let current = get(conn, user)?;
    let rewards = current
        .career_rewards
        .checked_add(reward)
        .ok_or_else(|| overflow(user, "career_rewards"))?;
    let updated = conn.execute(
        "UPDATE volume_aggregates SET career_level = ?3, career_rewards = ?4
         WHERE user_id = ?1 AND career_level = ?2",
        rusqlite::params![user.0, from.as_str(), to.as_str(), rewards.cents()],
    )?;
    Ok(updated == 1)
}

/// Approved investment volume of the subtree rooted at `root`, `root` included.
///
/// `root` counts as depth 1; nodes deeper than `depth_limit` are ignored. The
/// limit also bounds the recursion, so callers pass at most the node count when
/// they want the whole subtree.
pub fn subtree_volume(conn: &Connection, root: UserId, depth_limit: u64) -> Result<Money> {
    let limit = i64::try_from(depth_limit).unwrap_or(i64::MAX);
    let cents: i64 = conn.query_row(
        "WITH RECURSIVE subtree(user_id, depth) AS (
             SELECT ?1, 1
             UNION ALL
             SELECT t.user_id, s.depth + 1
             FROM tree_nodes t JOIN subtree s ON t.upline_id = s.user_id
             WHERE s.depth < ?2
         )
         SELECT COALESCE(SUM(i.amount), 0)
         FROM subtree s
         JOIN investments i ON i.user_id = s.user_id AND i.status = 'approved'",
        rusqlite::params![root.0, limit],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Members of the subtree rooted at `root`, `root` included, in breadth-first order.
pub fn subtree_members(conn: &Connection, root: UserId, depth_limit: u64) -> Result<Vec<UserId>> {
    let limit = i64::try_from(depth_limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(user_id, depth) AS (
             SELECT ?1, 1
             UNION ALL
             SELECT t.user_id, s.depth + 1
             FROM tree_nodes t JOIN subtree s ON t.upline_id = s.user_id
             WHERE s.depth < ?2
         )
         SELECT user_id FROM subtree ORDER BY depth, user_id",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![root.0, limit], |row| {
            Ok(UserId(row.get(0)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
