//! Weekly profit distribution.
//!
//! Every user with principal receives `principal × weekly_profit_bps` once per
//! ISO week. The ledger's `(user, kind, reference)` unique key, with the week as
//! reference, makes a repeated run for the same week a no-op. Users are
//! credited in id order, one IMMEDIATE transaction per batch.

use chrono::{DateTime, Datelike};
use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::{ledger, settings};
use parla_types::ledger::{EntryKind, NewEntry};
use parla_types::{Money, UserId};

use crate::{PayoutError, PayoutPolicy, Result};

/// Result of one distribution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyDistribution {
    /// ISO week key, e.g. `2026-W42`.
    pub week: String,
    /// Users credited by this run.
    pub distributed_to: u64,
    /// Sum credited by this run.
    pub total_amount: Money,
    /// Eligible users skipped because the week was already paid to them.
    pub already_paid: u64,
    /// Transactions committed.
    pub batches: u64,
}

#[derive(Default)]
struct BatchOutcome {
    last: Option<UserId>,
    seen: usize,
    credited: u64,
    skipped: u64,
    total: Money,
}

/// ISO week key for a UNIX timestamp.
///
/// # Errors
///
/// - [`PayoutError::InvalidTimestamp`] if `as_of` is outside chrono's range
pub fn week_key(as_of: u64) -> Result<String> {
    let secs = i64::try_from(as_of).map_err(|_| PayoutError::InvalidTimestamp(as_of))?;
    let at = DateTime::from_timestamp(secs, 0).ok_or(PayoutError::InvalidTimestamp(as_of))?;
    let week = at.iso_week();
    Ok(format!("{}-W{:02}", week.year(), week.week()))
}

/// Credit the weekly profit for the ISO week containing `as_of`.
///
/// A failed batch rolls back alone; batches committed before it stay, and a
/// re-run completes the week without double-crediting.
pub fn distribute_weekly_profit(
    conn: &mut Connection,
    as_of: u64,
    policy: &PayoutPolicy,
) -> Result<WeeklyDistribution> {
    policy.validate()?;
    let week = week_key(as_of)?;
    let batch_size = policy.weekly_batch_size;

    let mut result = WeeklyDistribution {
        week: week.clone(),
        distributed_to: 0,
        total_amount: Money::ZERO,
        already_paid: 0,
        batches: 0,
    };

    let mut after = None;
    loop {
        let outcome = parla_db::immediate(conn, |tx| {
            credit_batch(tx, after, batch_size, &week, as_of, policy)
        })?;
        result.batches += 1;
        result.distributed_to += outcome.credited;
        result.already_paid += outcome.skipped;
        result.total_amount = result
            .total_amount
            .checked_add(outcome.total)
            .ok_or(PayoutError::Overflow)?;

        tracing::debug!(
            week = %week,
            batch = result.batches,
            credited = outcome.credited,
            skipped = outcome.skipped,
            "weekly batch committed"
        );

        if outcome.seen < batch_size as usize || outcome.last.is_none() {
            break;
        }
        after = outcome.last;
    }

    parla_db::immediate(conn, |tx| -> Result<()> {
        let runs = settings::get_u64(tx, settings::WEEKLY_DISTRIBUTION_RUNS, 0)?;
        settings::set(tx, settings::LAST_WEEKLY_DISTRIBUTION, &week)?;
        settings::set(tx, settings::WEEKLY_DISTRIBUTION_RUNS, &(runs + 1).to_string())?;
        Ok(())
    })?;

    tracing::info!(
        week = %result.week,
        distributed_to = result.distributed_to,
        already_paid = result.already_paid,
        total = %result.total_amount,
        batches = result.batches,
        "weekly profit distributed"
    );

    Ok(result)
}

fn credit_batch(
    conn: &Connection,
    after: Option<UserId>,
    limit: u32,
    week: &str,
    now: u64,
    policy: &PayoutPolicy,
) -> Result<BatchOutcome> {
    let rows = ledger::principals_after(conn, after, limit)?;
    let mut outcome = BatchOutcome {
        seen: rows.len(),
        ..BatchOutcome::default()
    };

    for (user, principal) in rows {
        outcome.last = Some(user);
        let amount = principal
            .apply_bps(policy.weekly_profit_bps)
            .ok_or(PayoutError::Overflow)?;
        if !amount.is_positive() {
            continue;
        }
        let credited = ledger::append_if_absent(
            conn,
            &NewEntry {
                user_id: user,
                kind: EntryKind::WeeklyProfit,
                amount,
                description: format!("Weekly profit {week} on principal {principal}"),
                reference: Some(week.to_string()),
                created_at: now,
            },
        )?;
        match credited {
            Some(_) => {
                outcome.credited += 1;
                outcome.total = outcome
                    .total
                    .checked_add(amount)
                    .ok_or(PayoutError::Overflow)?;
            }
            None => outcome.skipped += 1,
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{principal, test_db, user};
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32) -> u64 {
        let ts = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
            .and_utc()
            .timestamp();
        u64::try_from(ts).expect("after epoch")
    }

    #[test]
    fn test_week_key() {
        assert_eq!(week_key(at(2026, 10, 14)).expect("key"), "2026-W42");
        assert_eq!(week_key(at(2026, 10, 21)).expect("key"), "2026-W43");
        // ISO years straddle the calendar boundary.
        assert_eq!(week_key(at(2027, 1, 1)).expect("key"), "2026-W53");
    }

    #[test]
    fn test_idempotent_per_week() {
        let mut conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let _idle = user(&conn, "idle");
        principal(&conn, a, Money::from_dollars(1_000), "investment:1");
        principal(&conn, b, Money::from_dollars(250), "investment:2");
        let policy = PayoutPolicy::default();

        let first = distribute_weekly_profit(&mut conn, at(2026, 10, 14), &policy).expect("run");
        assert_eq!(first.week, "2026-W42");
        assert_eq!(first.distributed_to, 2);
        assert_eq!(first.total_amount, Money::from_cents(6_250));
        assert_eq!(first.already_paid, 0);

        let again = distribute_weekly_profit(&mut conn, at(2026, 10, 15), &policy).expect("rerun");
        assert_eq!(again.distributed_to, 0);
        assert_eq!(again.already_paid, 2);
        assert!(again.total_amount.is_zero());
        assert_eq!(
            ledger::total_of_kind(&conn, a, EntryKind::WeeklyProfit).expect("total"),
            Money::from_dollars(50)
        );

        let next = distribute_weekly_profit(&mut conn, at(2026, 10, 21), &policy).expect("next");
        assert_eq!(next.distributed_to, 2);
        assert_eq!(
            ledger::total_of_kind(&conn, a, EntryKind::WeeklyProfit).expect("total"),
            Money::from_dollars(100)
        );

        assert_eq!(
            settings::get_opt(&conn, settings::LAST_WEEKLY_DISTRIBUTION).expect("setting"),
            Some("2026-W43".to_string())
        );
        assert_eq!(
            settings::get_u64(&conn, settings::WEEKLY_DISTRIBUTION_RUNS, 0).expect("runs"),
            3
        );
    }

    #[test]
    fn test_batches_cover_everyone() {
        let mut conn = test_db();
        for i in 0..7 {
            let u = user(&conn, &format!("u{i}"));
            principal(&conn, u, Money::from_dollars(500), &format!("investment:{i}"));
        }
        let policy = PayoutPolicy {
            weekly_batch_size: 3,
            ..PayoutPolicy::default()
        };

        let run = distribute_weekly_profit(&mut conn, at(2026, 10, 14), &policy).expect("run");
        assert_eq!(run.distributed_to, 7);
        assert_eq!(run.batches, 3);
        assert_eq!(run.total_amount, Money::from_dollars(175));
    }

    #[test]
    fn test_nobody_eligible() {
        let mut conn = test_db();
        user(&conn, "a");
        let run = distribute_weekly_profit(&mut conn, at(2026, 10, 14), &PayoutPolicy::default())
            .expect("run");
        assert_eq!(run.distributed_to, 0);
        assert_eq!(run.batches, 1);
    }
}
