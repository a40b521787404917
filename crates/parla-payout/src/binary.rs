//! Binary-match payouts.
//!
//! A node earns one match unit for every `match_unit` of volume present on
//! *both* binary legs. A binary leg is the approved volume of one child's
//! subtree, counted at most `max_binary_depth` levels below the node, so the
//! legs follow from the tree alone and not from the order of events. Leg volume
//! is never consumed; instead `paid_match_units` is a watermark, and each
//! evaluation pays only the units above it.

use rusqlite::Connection;

use parla_db::queries::{ledger, tree, volumes};
use parla_network::index;
use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::{Money, UserId};

use crate::{PayoutError, PayoutPolicy, Result};

/// Match units earned by the given legs.
pub fn earned_units(left: Money, right: Money, unit: Money) -> i64 {
    left.min(right).whole_units(unit)
}

/// `(left, right)` volume within `max_binary_depth` levels below `node`.
///
/// Also capped by the aggregation depth, so volume that never reaches the
/// node's cached legs never counts for matching either.
pub fn binary_legs(
    conn: &Connection,
    node: UserId,
    policy: &PayoutPolicy,
) -> Result<(Money, Money)> {
    let cap = u64::from(policy.max_binary_depth).min(tree::count(conn)?);
    let limit = policy.aggregation_depth.subtree_limit(cap);
    if limit == 0 {
        return Ok((Money::ZERO, Money::ZERO));
    }
    let leg = |child: Option<UserId>| -> Result<Money> {
        match child {
            Some(child) => Ok(volumes::subtree_volume(conn, child, limit)?),
            None => Ok(Money::ZERO),
        }
    };
    let (left, right) = tree::children(conn, node)?;
    Ok((leg(left)?, leg(right)?))
}

/// Pay any unpaid match units for `node`.
///
/// Returns `None` when the watermark already covers the node's legs.
///
/// # Errors
///
/// - [`PayoutError::Overflow`] if the payout overflows
/// - [`PayoutError::RatchetConflict`] if the watermark moved concurrently
pub fn evaluate_node(
    conn: &Connection,
    node: UserId,
    policy: &PayoutPolicy,
    now: u64,
) -> Result<Option<LedgerEntry>> {
    let agg = volumes::get(conn, node)?;
    let (left, right) = binary_legs(conn, node, policy)?;
    let units = earned_units(left, right, policy.match_unit());
    let new_units = units - agg.paid_match_units;
    if new_units <= 0 {
        return Ok(None);
    }

    let payout = policy
        .match_payout()
        .checked_mul(new_units)
        .ok_or(PayoutError::Overflow)?;

    if !volumes::record_match(conn, node, units, payout)? {
        return Err(PayoutError::RatchetConflict(node));
    }

    let from = agg.paid_match_units + 1;
    let entry = ledger::append(
        conn,
        &NewEntry {
            user_id: node,
            kind: EntryKind::BinaryMatch,
            amount: payout,
            description: format!("Binary match: {new_units} unit(s) ({from}..={units})"),
            reference: Some(format!("units:{from}-{units}")),
            created_at: now,
        },
    )?;

    tracing::info!(
        user = %node,
        units = new_units,
        watermark = units,
        left = %left,
        right = %right,
        amount = %payout,
        "binary match paid"
    );

    Ok(Some(entry))
}

/// Evaluate every ancestor of `origin` within `max_binary_depth`.
pub fn evaluate_matches(
    conn: &Connection,
    origin: UserId,
    policy: &PayoutPolicy,
    now: u64,
) -> Result<Vec<LedgerEntry>> {
    let mut paid = Vec::new();
    for ancestor in index::ancestors(conn, origin)? {
        if ancestor.depth > policy.max_binary_depth {
            break;
        }
        if let Some(entry) = evaluate_node(conn, ancestor.user_id, policy, now)? {
            paid.push(entry);
        }
    }
    Ok(paid)
}

/// Nodes whose binary legs a move of `moved` can change: the ancestors within
/// `max_depth` on the chain it left (via `previous_upline`) and on the chain it
/// joined, old chain first, without repeats.
pub fn within_reach(
    conn: &Connection,
    moved: UserId,
    previous_upline: Option<UserId>,
    max_depth: u32,
) -> Result<Vec<UserId>> {
    if max_depth == 0 {
        return Ok(Vec::new());
    }
    let mut nodes: Vec<UserId> = Vec::new();
    let mut push = |id: UserId| {
        if !nodes.contains(&id) {
            nodes.push(id);
        }
    };
    if let Some(old) = previous_upline {
        push(old);
        for ancestor in index::ancestors(conn, old)? {
            if ancestor.depth >= max_depth {
                break;
            }
            push(ancestor.user_id);
        }
    }
    for ancestor in index::ancestors(conn, moved)? {
        if ancestor.depth > max_depth {
            break;
        }
        push(ancestor.user_id);
    }
    Ok(nodes)
}

/// Evaluate the nodes a completed move of `moved` can have affected.
pub fn evaluate_moved(
    conn: &Connection,
    moved: UserId,
    previous_upline: Option<UserId>,
    policy: &PayoutPolicy,
    now: u64,
) -> Result<Vec<LedgerEntry>> {
    let nodes = within_reach(conn, moved, previous_upline, policy.max_binary_depth)?;
    evaluate_nodes(conn, &nodes, policy, now)
}

/// Evaluate an explicit node list, e.g. the nodes a volume repair corrected.
pub fn evaluate_nodes(
    conn: &Connection,
    nodes: &[UserId],
    policy: &PayoutPolicy,
    now: u64,
) -> Result<Vec<LedgerEntry>> {
    let mut paid = Vec::new();
    for node in nodes {
        if let Some(entry) = evaluate_node(conn, *node, policy, now)? {
            paid.push(entry);
        }
    }
    Ok(paid)
}
