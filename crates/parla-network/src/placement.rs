//! Placement engine.
//!
//! All slot writes go through the partial UNIQUE index on `(upline_id, position)`,
//! so a concurrent writer that slips past the occupancy check still fails with
//! [`NetworkError::SlotOccupied`] instead of double-occupying a slot.

use std::collections::VecDeque;

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::{tree, users, volumes};
use parla_db::DbError;
use parla_types::tree::{PlacementPreference, Position, TreeNode};
use parla_types::{Money, UserId};

use crate::aggregation::{self, merge_unique};
use crate::index;
use crate::{AggregationDepth, NetworkError, Result};

/// Whether a placement may move an already placed user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// The user must not have a tree node yet.
    Initial,
    /// Vacate the user's current slot first; the whole subtree moves along.
    Replace,
}

/// What a placement did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementOutcome {
    pub user_id: UserId,
    pub upline_id: UserId,
    pub position: Position,
    /// The node before the move, if the user was already placed.
    pub previous: Option<TreeNode>,
    /// Approved volume carried by the moved subtree.
    pub moved_volume: Money,
    /// Nodes whose leg volumes were recomputed and changed, old chain first.
    pub reaggregated: Vec<UserId>,
}

/// Place `user` into `upline`'s `position` slot.
///
/// An unplaced `upline` is made a root first. When the moved subtree carries
/// approved volume, both the old and the new ancestor chains are recomputed
/// from the tree rather than patched.
///
/// # Errors
///
/// Checked in order:
/// - [`NetworkError::UserNotFound`] if either user does not exist
/// - [`NetworkError::SelfPlacement`] if `user == upline`
/// - [`NetworkError::CyclicPlacement`] if `upline` is inside `user`'s subtree
/// - [`NetworkError::SlotOccupied`] if the slot has another occupant
/// - [`NetworkError::AlreadyPlaced`] in [`PlacementMode::Initial`] for a placed user,
///   or in [`PlacementMode::Replace`] when the user already occupies the slot
pub fn place(
    conn: &Connection,
    user: UserId,
    upline: UserId,
    position: Position,
    mode: PlacementMode,
    depth: AggregationDepth,
    now: u64,
) -> Result<PlacementOutcome> {
    if !users::exists(conn, user)? {
        return Err(NetworkError::UserNotFound(user));
    }
    if !users::exists(conn, upline)? {
        return Err(NetworkError::UserNotFound(upline));
    }
    if user == upline {
        return Err(NetworkError::SelfPlacement(user));
    }
    if index::is_ancestor(conn, user, upline)? {
        return Err(NetworkError::CyclicPlacement { user, upline });
    }
    match tree::child(conn, upline, position)? {
        Some(occupant) if occupant == user => return Err(NetworkError::AlreadyPlaced(user)),
        Some(_) => return Err(NetworkError::SlotOccupied { upline, position }),
        None => {}
    }

    let previous = tree::get(conn, user)?;
    if previous.is_some() && mode == PlacementMode::Initial {
        return Err(NetworkError::AlreadyPlaced(user));
    }

    if tree::get(conn, upline)?.is_none() {
        tree::insert_root(conn, upline, now)?;
        tracing::info!(user = %upline, "upline placed as root");
    }

    let write = match previous {
        Some(_) => tree::move_node(conn, user, upline, position, now),
        None => tree::insert_child(conn, user, upline, position, now),
    };
    write.map_err(|e| match e {
        DbError::Constraint(_) => NetworkError::SlotOccupied { upline, position },
        other => NetworkError::Db(other),
    })?;

    let cap = tree::count(conn)?;
    let moved_volume = volumes::subtree_volume(conn, user, depth.subtree_limit(cap))?;

    let mut reaggregated = Vec::new();
    if moved_volume.is_positive() {
        let old_chain = match previous.and_then(|node| node.upline_id) {
            Some(old_upline) => aggregation::recompute_chain(conn, old_upline, depth)?,
            None => Vec::new(),
        };
        let new_chain = aggregation::recompute_chain(conn, upline, depth)?;
        reaggregated = merge_unique([old_chain, new_chain]);
    }

    tracing::info!(
        user = %user,
        upline = %upline,
        position = %position,
        replaced = previous.is_some(),
        moved_volume = %moved_volume,
        reaggregated = reaggregated.len(),
        "user placed"
    );

    Ok(PlacementOutcome {
        user_id: user,
        upline_id: upline,
        position,
        previous,
        moved_volume,
        reaggregated,
    })
}

/// Make an unplaced user a root.
///
/// # Errors
///
/// - [`NetworkError::UserNotFound`] if the user does not exist
/// - [`NetworkError::AlreadyPlaced`] if the user has a tree node
pub fn place_root(conn: &Connection, user: UserId, now: u64) -> Result<()> {
    if !users::exists(conn, user)? {
        return Err(NetworkError::UserNotFound(user));
    }
    if tree::get(conn, user)?.is_some() {
        return Err(NetworkError::AlreadyPlaced(user));
    }
    tree::insert_root(conn, user, now).map_err(|e| match e {
        DbError::Constraint(_) => NetworkError::AlreadyPlaced(user),
        other => NetworkError::Db(other),
    })?;
    tracing::info!(user = %user, "user placed as root");
    Ok(())
}

/// First free slot under `sponsor` for the given preference.
///
/// `left`/`right` follow the sponsor's outer edge on that side; `auto` searches
/// level by level, left before right.
pub fn find_free_slot(
    conn: &Connection,
    sponsor: UserId,
    preference: PlacementPreference,
) -> Result<(UserId, Position)> {
    let cap = tree::count(conn)?;
    let corrupted = || {
        tracing::error!(sponsor = %sponsor, "spillover search exceeded node count");
        NetworkError::Corrupted(format!("spillover search under user {sponsor} does not terminate"))
    };

    match preference.position() {
        Some(side) => {
            let mut current = sponsor;
            for _ in 0..=cap {
                match tree::child(conn, current, side)? {
                    None => return Ok((current, side)),
                    Some(next) => current = next,
                }
            }
            Err(corrupted())
        }
        None => {
            let mut queue = VecDeque::from([sponsor]);
            let mut visited: u64 = 0;
            while let Some(current) = queue.pop_front() {
                visited += 1;
                if visited > cap + 1 {
                    return Err(corrupted());
                }
                for side in Position::BOTH {
                    match tree::child(conn, current, side)? {
                        None => return Ok((current, side)),
                        Some(child) => queue.push_back(child),
                    }
                }
            }
            Err(corrupted())
        }
    }
}

/// Place an unplaced `user` in the first free slot under `sponsor`.
///
/// An unplaced sponsor is made a root first.
pub fn auto_place(
    conn: &Connection,
    user: UserId,
    sponsor: UserId,
    preference: PlacementPreference,
    depth: AggregationDepth,
    now: u64,
) -> Result<PlacementOutcome> {
    if !users::exists(conn, sponsor)? {
        return Err(NetworkError::UserNotFound(sponsor));
    }
    if tree::get(conn, sponsor)?.is_none() {
        place_root(conn, sponsor, now)?;
    }
    let (upline, position) = find_free_slot(conn, sponsor, preference)?;
    place(conn, user, upline, position, PlacementMode::Initial, depth, now)
}
