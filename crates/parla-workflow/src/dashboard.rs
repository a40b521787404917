//! Read projections for users, admins and the public landing page.

use rusqlite::Connection;

use parla_db::queries::{investments, ledger, stats, tree, users, volumes};
use parla_network::view;
use parla_types::account::UserSummary;
use parla_types::ledger::{EntryKind, LedgerEntry};
use parla_types::package::{self, PackageInfo};
use parla_types::projections::{
    AdminOverview, ChildSummary, Dashboard, NetworkNode, PublicStats, SponsoredUser,
};
use parla_types::{UserId, RECENT_ENTRIES_LIMIT};

use crate::config::WorkflowConfig;
use crate::{require_admin, require_user, Result};

fn child_summary(conn: &Connection, child: Option<UserId>) -> Result<Option<ChildSummary>> {
    let Some(id) = child else {
        return Ok(None);
    };
    let user = users::get(conn, id)?;
    Ok(Some(ChildSummary {
        user_id: id,
        name: user.name,
        package: investments::active_package(conn, id)?,
    }))
}

/// Everything the member dashboard shows, in one read.
pub fn dashboard(conn: &Connection, user: UserId) -> Result<Dashboard> {
    require_user(conn, user)?;
    let summary = users::get(conn, user)?;
    let aggregate = volumes::get(conn, user)?;

    let (left, right) = tree::children(conn, user)?;
    let sponsored = users::sponsored_by(conn, user)?
        .into_iter()
        .map(|member| {
            Ok(SponsoredUser {
                placed: tree::get(conn, member.id)?.is_some(),
                user_id: member.id,
                name: member.name,
                email: member.email,
                preference: member.sponsor_preference,
                created_at: member.created_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Dashboard {
        career_points: aggregate.career_points(),
        next_career_level: aggregate.career_level.next(),
        principal: ledger::principal(conn, user)?,
        available: ledger::available(conn, user)?,
        weekly_earnings: ledger::total_of_kind(conn, user, EntryKind::WeeklyProfit)?,
        left_child: child_summary(conn, left)?,
        right_child: child_summary(conn, right)?,
        sponsored,
        recent_entries: ledger::recent_for_user(conn, user, RECENT_ENTRIES_LIMIT)?,
        active_package: investments::active_package(conn, user)?,
        user: summary,
        aggregate,
    })
}

/// Tree rooted at `user`, at most `tree_view_depth` levels deep.
pub fn network_tree(
    conn: &Connection,
    config: &WorkflowConfig,
    user: UserId,
    levels: Option<u32>,
) -> Result<NetworkNode> {
    require_user(conn, user)?;
    let cap = config.tree_view_depth.max(1);
    let levels = levels.unwrap_or(cap).clamp(1, cap);
    Ok(view::network_tree(conn, user, levels)?)
}

pub fn admin_overview(conn: &Connection, actor: UserId) -> Result<AdminOverview> {
    require_admin(conn, actor)?;
    Ok(stats::admin_overview(conn)?)
}

pub fn list_users(conn: &Connection, actor: UserId) -> Result<Vec<UserSummary>> {
    require_admin(conn, actor)?;
    Ok(users::list(conn)?)
}

/// Most recent ledger entries across all users.
pub fn list_transactions(conn: &Connection, actor: UserId, limit: u32) -> Result<Vec<LedgerEntry>> {
    require_admin(conn, actor)?;
    Ok(ledger::recent(conn, limit)?)
}

pub fn public_stats(conn: &Connection) -> Result<PublicStats> {
    Ok(stats::public_stats(conn)?)
}

pub fn packages() -> Vec<PackageInfo> {
    package::catalogue()
}
