//! Binary tree index query functions.
//!
//! Children are never stored on the parent; they are found by querying
//! `upline_id = X AND position = P`. The partial UNIQUE index on
//! `(upline_id, position)` makes every slot write an atomic check-and-set.

use rusqlite::{Connection, OptionalExtension};

use parla_types::tree::{Position, TreeNode};
use parla_types::UserId;

use crate::{constraint, parse_opt_col, DbError, Result};

fn map_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreeNode> {
    Ok(TreeNode {
        user_id: UserId(row.get(0)?),
        upline_id: row.get::<_, Option<i64>>(1)?.map(UserId),
        position: parse_opt_col(row, 2)?,
        placed_at: row.get::<_, i64>(3)? as u64,
    })
}

/// Get a user's tree node, or `None` if they are unplaced.
pub fn get(conn: &Connection, user: UserId) -> Result<Option<TreeNode>> {
    let node = conn
        .query_row(
            "SELECT user_id, upline_id, position, placed_at FROM tree_nodes WHERE user_id = ?1",
            [user.0],
            map_node,
        )
        .optional()?;
    Ok(node)
}

/// Insert a root node.
pub fn insert_root(conn: &Connection, user: UserId, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO tree_nodes (user_id, upline_id, position, placed_at) VALUES (?1, NULL, NULL, ?2)",
        rusqlite::params![user.0, now as i64],
    )
    .map_err(|e| constraint(e, format!("user {user} is already placed")))?;
    Ok(())
}

/// Insert a node into an empty slot. An occupied slot is a [`DbError::Constraint`].
pub fn insert_child(
    conn: &Connection,
    user: UserId,
    upline: UserId,
    position: Position,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tree_nodes (user_id, upline_id, position, placed_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user.0, upline.0, position.as_str(), now as i64],
    )
    .map_err(|e| constraint(e, format!("slot {upline}/{position} is occupied")))?;
    Ok(())
}

/// Move an existing node (and implicitly its subtree) into another slot.
pub fn move_node(
    conn: &Connection,
    user: UserId,
    upline: UserId,
    position: Position,
    now: u64,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE tree_nodes SET upline_id = ?2, position = ?3, placed_at = ?4 WHERE user_id = ?1",
            rusqlite::params![user.0, upline.0, position.as_str(), now as i64],
        )
        .map_err(|e| constraint(e, format!("slot {upline}/{position} is occupied")))?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("tree node {user}")));
    }
    Ok(())
}

/// The occupant of a slot.
pub fn child(conn: &Connection, upline: UserId, position: Position) -> Result<Option<UserId>> {
    let id = conn
        .query_row(
            "SELECT user_id FROM tree_nodes WHERE upline_id = ?1 AND position = ?2",
            rusqlite::params![upline.0, position.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id.map(UserId))
}

/// Both children of a node as `(left, right)`.
pub fn children(conn: &Connection, upline: UserId) -> Result<(Option<UserId>, Option<UserId>)> {
    Ok((
        child(conn, upline, Position::Left)?,
        child(conn, upline, Position::Right)?,
    ))
}

pub fn count_children(conn: &Connection, upline: UserId) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tree_nodes WHERE upline_id = ?1",
        [upline.0],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Every placed node, ordered by user id.
pub fn all(conn: &Connection) -> Result<Vec<TreeNode>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, upline_id, position, placed_at FROM tree_nodes ORDER BY user_id",
    )?;
    let rows = stmt
        .query_map([], map_node)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM tree_nodes", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Remove a leaf node. A node with children is a [`DbError::Constraint`].
pub fn delete(conn: &Connection, user: UserId) -> Result<()> {
    conn.execute("DELETE FROM tree_nodes WHERE user_id = ?1", [user.0])
        .map_err(|e| constraint(e, format!("tree node {user} has children")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{test_db, user};

    #[test]
    fn test_root_and_children() {
        let conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let c = user(&conn, "c");

        insert_root(&conn, a, 10).expect("root");
        insert_child(&conn, b, a, Position::Left, 11).expect("left");
        insert_child(&conn, c, a, Position::Right, 12).expect("right");

        assert_eq!(children(&conn, a).expect("children"), (Some(b), Some(c)));
        assert_eq!(count_children(&conn, a).expect("count"), 2);

        let node = get(&conn, b).expect("get").expect("placed");
        assert_eq!(node.slot(), Some((a, Position::Left)));
        assert!(get(&conn, a).expect("get").expect("root").is_root());
    }

    #[test]
    fn test_slot_is_unique() {
        let conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let c = user(&conn, "c");
        insert_root(&conn, a, 0).expect("root");
        insert_child(&conn, b, a, Position::Left, 0).expect("first");

        let result = insert_child(&conn, c, a, Position::Left, 0);
        assert!(matches!(result, Err(DbError::Constraint(_))));
        assert!(get(&conn, c).expect("get").is_none());
    }

    #[test]
    fn test_move_into_occupied_slot_fails() {
        let conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let c = user(&conn, "c");
        insert_root(&conn, a, 0).expect("root");
        insert_child(&conn, b, a, Position::Left, 0).expect("b");
        insert_child(&conn, c, a, Position::Right, 0).expect("c");

        let result = move_node(&conn, c, a, Position::Left, 5);
        assert!(matches!(result, Err(DbError::Constraint(_))));

        move_node(&conn, c, b, Position::Left, 5).expect("move under b");
        assert_eq!(child(&conn, b, Position::Left).expect("child"), Some(c));
        assert_eq!(child(&conn, a, Position::Right).expect("child"), None);
    }

    #[test]
    fn test_upline_must_be_placed() {
        let conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let result = insert_child(&conn, b, a, Position::Left, 0);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_delete_with_children_fails() {
        let conn = test_db();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        insert_root(&conn, a, 0).expect("root");
        insert_child(&conn, b, a, Position::Left, 0).expect("b");

        assert!(matches!(delete(&conn, a), Err(DbError::Constraint(_))));
        delete(&conn, b).expect("delete leaf");
        delete(&conn, a).expect("delete root");
        assert_eq!(count(&conn).expect("count"), 0);
    }
}
