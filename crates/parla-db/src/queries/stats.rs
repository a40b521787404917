//! Cross-table aggregates for the admin console and public landing stats.

use rusqlite::Connection;

use parla_types::projections::{AdminOverview, PublicStats};
use parla_types::requests::RequestStatus;

use crate::queries::{investments, ledger, settings, users, withdrawals};
use crate::Result;

pub fn admin_overview(conn: &Connection) -> Result<AdminOverview> {
    Ok(AdminOverview {
        total_users: users::count(conn)?,
        active_investments: investments::count_by_status(conn, RequestStatus::Approved)?,
        total_volume: investments::total_approved(conn)?,
        pending_investments: investments::count_by_status(conn, RequestStatus::Pending)?,
        pending_withdrawals: withdrawals::count_by_status(conn, RequestStatus::Pending)?,
        totals_by_kind: ledger::totals_by_kind(conn)?,
        last_weekly_distribution: settings::get_opt(conn, settings::LAST_WEEKLY_DISTRIBUTION)?,
    })
}

pub fn public_stats(conn: &Connection) -> Result<PublicStats> {
    Ok(PublicStats {
        total_users: users::count(conn)?,
        total_volume: investments::total_approved(conn)?,
    })
}
