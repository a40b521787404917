//! Direct-referral commission.
//!
//! The investor's tree parent earns `amount × rate`, where the rate is keyed by
//! the investor's package tier: silver 5%, gold 10%, platinum 15%.

use rusqlite::Connection;

use parla_db::queries::{ledger, tree, volumes};
use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::requests::Investment;
use parla_types::Money;

use crate::{PayoutError, Result};

/// Commission owed for an investment.
///
/// # Errors
///
/// - [`PayoutError::Overflow`] if the product overflows
pub fn commission_for(investment: &Investment) -> Result<Money> {
    investment
        .amount
        .apply_bps(investment.tier.commission_bps())
        .ok_or(PayoutError::Overflow)
}

/// Idempotency key for payouts derived from an investment.
pub fn investment_reference(investment: &Investment) -> String {
    format!("investment:{}", investment.id)
}

/// Credit the investor's direct upline.
///
/// Returns `None` without error when the investor is a root (or unplaced), or
/// when this investment's commission is already on the ledger.
pub fn pay_direct_commission(
    conn: &Connection,
    investment: &Investment,
    now: u64,
) -> Result<Option<LedgerEntry>> {
    let upline = tree::get(conn, investment.user_id)?.and_then(|node| node.upline_id);
    let Some(upline) = upline else {
        tracing::debug!(investor = %investment.user_id, "root investor, no commission");
        return Ok(None);
    };

    let reference = investment_reference(investment);
    if ledger::has_reference(conn, upline, EntryKind::Commission, &reference)? {
        tracing::warn!(investment = %investment.id, "commission already paid");
        return Ok(None);
    }

    let amount = commission_for(investment)?;
    let entry = ledger::append(
        conn,
        &NewEntry {
            user_id: upline,
            kind: EntryKind::Commission,
            amount,
            description: format!(
                "Direct commission on {} investment of user {}",
                investment.tier.display_name(),
                investment.user_id
            ),
            reference: Some(reference),
            created_at: now,
        },
    )?;
    volumes::add_commission(conn, upline, amount)?;

    tracing::info!(
        upline = %upline,
        investor = %investment.user_id,
        tier = %investment.tier,
        amount = %amount,
        "direct commission paid"
    );

    Ok(Some(entry))
}
