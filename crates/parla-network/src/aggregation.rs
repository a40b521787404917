//! Volume aggregation.
//!
//! Approved investment volume flows upward: each ancestor adds the amount to
//! the leg the investor sits under. The per-user leg totals in
//! `volume_aggregates` are a cache over two replayable facts, the tree rows and
//! the approved investments, so they can be recomputed at any time.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::{tree, volumes};
use parla_types::tree::Position;
use parla_types::{Money, UserId};

use crate::index::{self, Ancestor};
use crate::{AggregationDepth, NetworkError, Result};

/// An ancestor whose leg volume was raised by an approval.
pub type TouchedAncestor = Ancestor;

/// Cached legs that disagree with the recomputed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeDrift {
    pub user_id: UserId,
    pub cached_left: Money,
    pub cached_right: Money,
    pub expected_left: Money,
    pub expected_right: Money,
}

/// Propagate a freshly approved investment up the investor's ancestor chain.
///
/// Must run exactly once per approval, in the transaction that marks the
/// investment processed.
///
/// # Errors
///
/// - [`NetworkError::Overflow`] if a leg total would overflow
/// - [`NetworkError::Corrupted`] if the ancestor chain is broken
pub fn on_investment_approved(
    conn: &Connection,
    user: UserId,
    amount: Money,
    depth: AggregationDepth,
) -> Result<Vec<TouchedAncestor>> {
    let mut touched = Vec::new();
    for ancestor in index::ancestors(conn, user)? {
        if !depth.reaches(ancestor.depth) {
            break;
        }
        let agg = volumes::get(conn, ancestor.user_id)?;
        let (left, right) = match ancestor.leg {
            Position::Left => (
                agg.left_volume
                    .checked_add(amount)
                    .ok_or(NetworkError::Overflow)?,
                agg.right_volume,
            ),
            Position::Right => (
                agg.left_volume,
                agg.right_volume
                    .checked_add(amount)
                    .ok_or(NetworkError::Overflow)?,
            ),
        };
        volumes::set_legs(conn, ancestor.user_id, left, right)?;
        touched.push(ancestor);
    }

    tracing::debug!(
        user = %user,
        amount = %amount,
        ancestors = touched.len(),
        "volume propagated"
    );

    Ok(touched)
}

/// Leg volumes of `node` as they should be, computed from the subtree.
pub fn expected_legs(
    conn: &Connection,
    node: UserId,
    depth: AggregationDepth,
) -> Result<(Money, Money)> {
    let cap = tree::count(conn)?;
    let limit = depth.subtree_limit(cap);
    let (left, right) = tree::children(conn, node)?;
    let leg = |child: Option<UserId>| -> Result<Money> {
        match child {
            Some(child) if limit > 0 => Ok(volumes::subtree_volume(conn, child, limit)?),
            _ => Ok(Money::ZERO),
        }
    };
    Ok((leg(left)?, leg(right)?))
}

/// Recompute one node's legs from its subtree. Returns whether they changed.
pub fn recompute_node(conn: &Connection, node: UserId, depth: AggregationDepth) -> Result<bool> {
    let (left, right) = expected_legs(conn, node, depth)?;
    let agg = volumes::get(conn, node)?;
    if agg.left_volume == left && agg.right_volume == right {
        return Ok(false);
    }
    volumes::set_legs(conn, node, left, right)?;
    Ok(true)
}

/// Recompute `from` and every ancestor of `from`. Returns the nodes whose legs
/// changed, nearest first.
pub fn recompute_chain(
    conn: &Connection,
    from: UserId,
    depth: AggregationDepth,
) -> Result<Vec<UserId>> {
    let mut chain = vec![from];
    chain.extend(index::ancestors(conn, from)?.into_iter().map(|a| a.user_id));

    let mut changed = Vec::new();
    for node in chain {
        if recompute_node(conn, node, depth)? {
            changed.push(node);
        }
    }
    Ok(changed)
}

/// Recompute every cached aggregate. Returns the number of rows corrected.
pub fn rebuild_all(conn: &Connection, depth: AggregationDepth) -> Result<u64> {
    let mut corrected = 0;
    for agg in volumes::all(conn)? {
        if recompute_node(conn, agg.user_id, depth)? {
            corrected += 1;
        }
    }
    tracing::info!(corrected, "volume aggregates rebuilt");
    Ok(corrected)
}

/// Compare every cached aggregate against its recomputed value without writing.
pub fn verify(conn: &Connection, depth: AggregationDepth) -> Result<Vec<VolumeDrift>> {
    let mut drift = Vec::new();
    for agg in volumes::all(conn)? {
        let (expected_left, expected_right) = expected_legs(conn, agg.user_id, depth)?;
        if agg.left_volume != expected_left || agg.right_volume != expected_right {
            drift.push(VolumeDrift {
                user_id: agg.user_id,
                cached_left: agg.left_volume,
                cached_right: agg.right_volume,
                expected_left,
                expected_right,
            });
        }
    }
    if !drift.is_empty() {
        tracing::warn!(nodes = drift.len(), "volume aggregates drifted");
    }
    Ok(drift)
}

/// Union of node lists, preserving first-seen order.
pub(crate) fn merge_unique(lists: impl IntoIterator<Item = Vec<UserId>>) -> Vec<UserId> {
    let mut seen = BTreeSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|id| seen.insert(*id))
        .collect()
}
