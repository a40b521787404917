//! Recursive left/right projection of the network for display.

use rusqlite::Connection;

use parla_db::queries::{investments, tree, users, volumes};
use parla_types::projections::NetworkNode;
use parla_types::UserId;

use crate::Result;

/// Build the tree rooted at `root`, `levels` deep (1 = just the root).
///
/// An unplaced `root` is returned as a single node.
pub fn network_tree(conn: &Connection, root: UserId, levels: u32) -> Result<NetworkNode> {
    build(conn, root, 0, levels.max(1))
}

fn build(conn: &Connection, user: UserId, level: u32, levels: u32) -> Result<NetworkNode> {
    let summary = users::get(conn, user)?;
    let agg = volumes::get(conn, user)?;
    let position = tree::get(conn, user)?.and_then(|node| node.position);

    let (left, right) = if level + 1 < levels {
        let (left, right) = tree::children(conn, user)?;
        (
            left.map(|id| build(conn, id, level + 1, levels))
                .transpose()?
                .map(Box::new),
            right
                .map(|id| build(conn, id, level + 1, levels))
                .transpose()?
                .map(Box::new),
        )
    } else {
        (None, None)
    };

    Ok(NetworkNode {
        user_id: user,
        name: summary.name,
        email: summary.email,
        position,
        package: investments::active_package(conn, user)?,
        left_volume: agg.left_volume,
        right_volume: agg.right_volume,
        career_level: agg.career_level,
        left,
        right,
    })
}
