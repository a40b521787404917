//! User account query functions.

use rusqlite::{Connection, OptionalExtension};

use parla_types::account::UserSummary;
use parla_types::tree::PlacementPreference;
use parla_types::UserId;

use crate::{constraint, not_found, parse_opt_col, Result};

const USER_COLUMNS: &str = "id, email, name, is_admin, referral_code, sponsor_id,
    sponsor_preference, created_at, last_login_at";

/// Fields of a user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Stored lowercased.
    pub email: String,
    pub name: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub referral_code: String,
    pub sponsor_id: Option<UserId>,
    pub sponsor_preference: Option<PlacementPreference>,
    pub created_at: u64,
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get(3)?,
        referral_code: row.get(4)?,
        sponsor_id: row.get::<_, Option<i64>>(5)?.map(UserId),
        sponsor_preference: parse_opt_col(row, 6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        last_login_at: row.get::<_, Option<i64>>(8)?.map(|t| t as u64),
    })
}

/// Insert a user. A duplicate email or referral code is a
/// [`DbError::Constraint`](crate::DbError::Constraint).
pub fn insert(conn: &Connection, user: &NewUser) -> Result<UserId> {
    conn.execute(
        "INSERT INTO users (email, name, password_hash, referral_code, sponsor_id,
                            sponsor_preference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            user.email.to_lowercase(),
            user.name,
            user.password_hash,
            user.referral_code,
            user.sponsor_id.map(|id| id.0),
            user.sponsor_preference.map(|p| p.as_str()),
            user.created_at as i64,
        ],
    )
    .map_err(|e| constraint(e, format!("user {} already exists", user.email)))?;
    Ok(UserId(conn.last_insert_rowid()))
}

/// Get a user by id.
pub fn get(conn: &Connection, id: UserId) -> Result<UserSummary> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id.0],
        map_user,
    )
    .map_err(|e| not_found(e, format!("user {id}")))
}

pub fn exists(conn: &Connection, id: UserId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id.0], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn is_admin(conn: &Connection, id: UserId) -> Result<bool> {
    conn.query_row("SELECT is_admin FROM users WHERE id = ?1", [id.0], |row| {
        row.get(0)
    })
    .map_err(|e| not_found(e, format!("user {id}")))
}

/// Look up a user and their password hash by email (case-insensitive).
pub fn find_credentials(conn: &Connection, email: &str) -> Result<Option<(UserSummary, String)>> {
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            [email.to_lowercase()],
            |row| Ok((map_user(row)?, row.get::<_, String>(9)?)),
        )
        .optional()?;
    Ok(found)
}

/// Look up a user by their permanent referral code (case-insensitive).
pub fn find_by_referral_code(conn: &Connection, code: &str) -> Result<Option<UserSummary>> {
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?1"),
            [code],
            map_user,
        )
        .optional()?;
    Ok(found)
}

pub fn referral_code_taken(conn: &Connection, code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE referral_code = ?1
             UNION ALL
             SELECT 1 FROM referral_invites WHERE code = ?1
             LIMIT 1",
            [code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn set_last_login(conn: &Connection, id: UserId, at: u64) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        rusqlite::params![at as i64, id.0],
    )?;
    Ok(())
}

/// Grant the admin flag. Returns `false` if the user was already an admin.
pub fn set_admin(conn: &Connection, id: UserId) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET is_admin = 1 WHERE id = ?1 AND is_admin = 0",
        [id.0],
    )?;
    Ok(updated == 1)
}

/// List all users, newest first.
pub fn list(conn: &Connection) -> Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map([], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Users who registered with `sponsor`'s code, oldest first.
pub fn sponsored_by(conn: &Connection, sponsor: UserId) -> Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE sponsor_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt
        .query_map([sponsor.0], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Physically delete a user. Cascades to the tree node, aggregate, requests and
/// invites; fails with a constraint error if ledger entries or children remain.
pub fn delete(conn: &Connection, id: UserId) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM users WHERE id = ?1", [id.0])
        .map_err(|e| constraint(e, format!("user {id} is still referenced")))?;
    if deleted == 0 {
        return Err(crate::DbError::NotFound(format!("user {id}")));
    }
    Ok(())
}
