//! Ancestor walks over the binary tree.
//!
//! Every walk is capped at the number of placed nodes. Hitting the cap means the
//! stored uplines form a cycle, which is reported as [`NetworkError::Corrupted`].

use rusqlite::Connection;

use parla_db::queries::tree;
use parla_types::tree::Position;
use parla_types::UserId;

use crate::{NetworkError, Result};

/// One step of an upward walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestor {
    pub user_id: UserId,
    /// Which of the ancestor's legs the walk arrived through.
    pub leg: Position,
    /// 1 for the direct upline.
    pub depth: u32,
}

/// Ancestors of `user`, nearest first. Empty for a root or an unplaced user.
pub fn ancestors(conn: &Connection, user: UserId) -> Result<Vec<Ancestor>> {
    let cap = tree::count(conn)?;
    let mut chain = Vec::new();
    let mut current = user;
    let mut depth: u32 = 0;

    while let Some(node) = tree::get(conn, current)? {
        let Some((upline, leg)) = node.slot() else {
            break;
        };
        depth += 1;
        if u64::from(depth) > cap {
            tracing::error!(user = %user, cap, "upline chain exceeds node count");
            return Err(NetworkError::Corrupted(format!(
                "upline chain of user {user} does not terminate"
            )));
        }
        chain.push(Ancestor {
            user_id: upline,
            leg,
            depth,
        });
        current = upline;
    }

    if let Some(last) = chain.last() {
        if tree::get(conn, last.user_id)?.is_none() {
            tracing::error!(user = %user, upline = %last.user_id, "dangling upline");
            return Err(NetworkError::Corrupted(format!(
                "upline {} on the chain of user {user} is not placed",
                last.user_id
            )));
        }
    }

    Ok(chain)
}

/// Whether `ancestor` appears on the upline chain of `descendant`.
pub fn is_ancestor(conn: &Connection, ancestor: UserId, descendant: UserId) -> Result<bool> {
    Ok(ancestors(conn, descendant)?
        .iter()
        .any(|a| a.user_id == ancestor))
}

/// The leg of `ancestor` under which `descendant` sits, if any.
pub fn leg_of(conn: &Connection, ancestor: UserId, descendant: UserId) -> Result<Option<Position>> {
    Ok(ancestors(conn, descendant)?
        .into_iter()
        .find(|a| a.user_id == ancestor)
        .map(|a| a.leg))
}

/// The root of the tree containing `user`, or `None` if `user` is unplaced.
pub fn root_of(conn: &Connection, user: UserId) -> Result<Option<UserId>> {
    if tree::get(conn, user)?.is_none() {
        return Ok(None);
    }
    Ok(Some(
        ancestors(conn, user)?
            .last()
            .map_or(user, |a| a.user_id),
    ))
}
