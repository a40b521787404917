//! Career ladder evaluation.
//!
//! Levels ratchet upward one rung per step. Both cumulative legs must meet the
//! next rung's threshold. Each rung's reward is written once, keyed by the
//! level name; Crown is non-cash and lands as a $0 entry.

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::{ledger, volumes};
use parla_types::career::{CareerLevel, CareerReward};
use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::UserId;

use crate::{PayoutError, Result};

/// One rung climbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CareerAdvance {
    pub user_id: UserId,
    pub from: CareerLevel,
    pub to: CareerLevel,
    pub reward: CareerReward,
    pub entry: LedgerEntry,
}

/// Advance `user` by at most one level.
///
/// # Errors
///
/// - [`PayoutError::RatchetConflict`] if the stored level changed during evaluation
pub fn evaluate_career_level(
    conn: &Connection,
    user: UserId,
    now: u64,
) -> Result<Option<CareerAdvance>> {
    let agg = volumes::get(conn, user)?;
    let Some(next) = agg.career_level.next() else {
        return Ok(None);
    };
    if !next.qualifies(agg.left_volume, agg.right_volume) {
        return Ok(None);
    }

    let reward = next.reward();
    let amount = reward.cash_amount();
    if !volumes::advance_career(conn, user, agg.career_level, next, amount)? {
        return Err(PayoutError::RatchetConflict(user));
    }

    let description = match reward {
        CareerReward::NonCash(prize) => format!("Career level {next} reached: {prize}"),
        _ => format!("Career level {next} reached"),
    };
    let entry = ledger::append(
        conn,
        &NewEntry {
            user_id: user,
            kind: EntryKind::CareerReward,
            amount,
            description,
            reference: Some(next.as_str().to_string()),
            created_at: now,
        },
    )?;

    tracing::info!(
        user = %user,
        from = %agg.career_level,
        to = %next,
        reward = %amount,
        "career level reached"
    );

    Ok(Some(CareerAdvance {
        user_id: user,
        from: agg.career_level,
        to: next,
        reward,
        entry,
    }))
}

/// Climb until the legs no longer qualify for the next rung. A multi-level jump
/// pays every rung crossed.
pub fn evaluate_until_stable(
    conn: &Connection,
    user: UserId,
    now: u64,
) -> Result<Vec<CareerAdvance>> {
    let mut advances = Vec::new();
    while let Some(advance) = evaluate_career_level(conn, user, now)? {
        advances.push(advance);
    }
    Ok(advances)
}
