//! Single-use referral invite query functions.

use rusqlite::{Connection, OptionalExtension};

use parla_types::projections::UsedInvite;
use parla_types::tree::PlacementPreference;
use parla_types::UserId;

use crate::{constraint, parse_col, Result};

/// A raw invite row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRow {
    pub code: String,
    pub owner_id: UserId,
    pub preference: PlacementPreference,
    pub created_at: u64,
    pub expires_at: u64,
    pub used_by: Option<UserId>,
    pub used_at: Option<u64>,
}

impl InviteRow {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

fn map_invite(row: &rusqlite::Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        code: row.get(0)?,
        owner_id: UserId(row.get(1)?),
        preference: parse_col(row, 2)?,
        created_at: row.get::<_, i64>(3)? as u64,
        expires_at: row.get::<_, i64>(4)? as u64,
        used_by: row.get::<_, Option<i64>>(5)?.map(UserId),
        used_at: row.get::<_, Option<i64>>(6)?.map(|t| t as u64),
    })
}

const INVITE_COLUMNS: &str =
    "code, owner_id, preference, created_at, expires_at, used_by, used_at";

pub fn insert(
    conn: &Connection,
    code: &str,
    owner: UserId,
    preference: PlacementPreference,
    created_at: u64,
    expires_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO referral_invites (code, owner_id, preference, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            code,
            owner.0,
            preference.as_str(),
            created_at as i64,
            expires_at as i64,
        ],
    )
    .map_err(|e| constraint(e, format!("invite code {code} already exists")))?;
    Ok(())
}

/// Find an invite by code (case-insensitive).
pub fn find(conn: &Connection, code: &str) -> Result<Option<InviteRow>> {
    let invite = conn
        .query_row(
            &format!("SELECT {INVITE_COLUMNS} FROM referral_invites WHERE code = ?1"),
            [code],
            map_invite,
        )
        .optional()?;
    Ok(invite)
}

/// The owner's newest unused, unexpired invite.
pub fn active_for_owner(conn: &Connection, owner: UserId, now: u64) -> Result<Option<InviteRow>> {
    let invite = conn
        .query_row(
            &format!(
                "SELECT {INVITE_COLUMNS} FROM referral_invites
                 WHERE owner_id = ?1 AND used_at IS NULL AND expires_at > ?2
                 ORDER BY created_at DESC LIMIT 1"
            ),
            rusqlite::params![owner.0, now as i64],
            map_invite,
        )
        .optional()?;
    Ok(invite)
}

/// Consume an invite. The guard makes this a compare-and-set: returns `false` if
/// the invite was already used or has expired.
pub fn mark_used(conn: &Connection, code: &str, used_by: UserId, now: u64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE referral_invites SET used_by = ?2, used_at = ?3
         WHERE code = ?1 AND used_at IS NULL AND expires_at > ?3",
        rusqlite::params![code, used_by.0, now as i64],
    )?;
    Ok(updated == 1)
}

/// Invites of `owner` that have been consumed, joined with the referred users.
pub fn used_by_owner(conn: &Connection, owner: UserId) -> Result<Vec<UsedInvite>> {
    let mut stmt = conn.prepare(
        "SELECT r.code, r.preference, u.id, u.name, u.email, r.used_at
         FROM referral_invites r JOIN users u ON u.id = r.used_by
         WHERE r.owner_id = ?1 AND r.used_at IS NOT NULL
         ORDER BY r.used_at DESC",
    )?;
    let rows = stmt
        .query_map([owner.0], |row| {
            Ok(UsedInvite {
                code: row.get(0)?,
                preference: parse_col(row, 1)?,
                used_by: UserId(row.get(2)?),
                used_by_name: row.get(3)?,
                used_by_email: row.get(4)?,
                used_at: row.get::<_, i64>(5)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{test_db, user};
    use crate::DbError;

    #[test]
    fn test_invite_lifecycle() {
        let conn = test_db();
        let owner = user(&conn, "owner");
        let guest = user(&conn, "guest");
        insert(&conn, "AbCdEf", owner, PlacementPreference::Left, 100, 700).expect("insert");

        let found = find(&conn, "abcdef").expect("find").expect("exists");
        assert_eq!(found.owner_id, owner);
        assert!(!found.is_used());
        assert!(!found.is_expired(699));
        assert!(found.is_expired(700));

        assert_eq!(
            active_for_owner(&conn, owner, 200).expect("active").map(|i| i.code),
            Some("AbCdEf".to_string())
        );

        assert!(mark_used(&conn, "ABCDEF", guest, 300).expect("use"));
        assert!(!mark_used(&conn, "abcdef", guest, 301).expect("reuse"));
        assert!(active_for_owner(&conn, owner, 302).expect("active").is_none());

        let used = used_by_owner(&conn, owner).expect("used");
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].used_by, guest);
        assert_eq!(used[0].preference, PlacementPreference::Left);
    }

    #[test]
    fn test_expired_invite_cannot_be_used() {
        let conn = test_db();
        let owner = user(&conn, "owner");
        let guest = user(&conn, "guest");
        insert(&conn, "late", owner, PlacementPreference::Auto, 0, 600).expect("insert");
        assert!(!mark_used(&conn, "late", guest, 600).expect("use"));
        assert!(active_for_owner(&conn, owner, 600).expect("active").is_none());
    }

    #[test]
    fn test_duplicate_code() {
        let conn = test_db();
        let owner = user(&conn, "owner");
        insert(&conn, "same", owner, PlacementPreference::Auto, 0, 600).expect("insert");
        assert!(matches!(
            insert(&conn, "SAME", owner, PlacementPreference::Auto, 0, 600),
            Err(DbError::Constraint(_))
        ));
    }
}
