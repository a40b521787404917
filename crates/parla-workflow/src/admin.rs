//! Admin-triggered batch operations.

use rusqlite::Connection;
use serde::Serialize;

use parla_network::aggregation::{self, VolumeDrift};
use parla_payout::binary;
use parla_payout::career::{self, CareerAdvance};
use parla_payout::weekly::{self, WeeklyDistribution};
use parla_types::ledger::LedgerEntry;
use parla_types::UserId;

use crate::config::WorkflowConfig;
use crate::{require_admin, Result};

/// Result of a volume consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Cached legs that disagreed with the replayed tree, as found.
    pub drift: Vec<VolumeDrift>,
    /// Rows rewritten; always zero without `repair`.
    pub corrected: u64,
    /// Matches the repaired legs unlocked.
    pub binary_matches: Vec<LedgerEntry>,
    /// Career levels the repaired legs unlocked.
    pub career_advances: Vec<CareerAdvance>,
}

/// Credit this week's profit share on behalf of an admin.
///
/// Batches commit independently, so this does not hold one transaction.
pub fn distribute_weekly(
    conn: &mut Connection,
    config: &WorkflowConfig,
    actor: UserId,
    as_of: u64,
) -> Result<WeeklyDistribution> {
    require_admin(conn, actor)?;
    let outcome = weekly::distribute_weekly_profit(conn, as_of, &config.payout)?;
    tracing::info!(
        actor = %actor,
        week = %outcome.week,
        users = outcome.distributed_to,
        total = %outcome.total_amount,
        "weekly distribution triggered"
    );
    Ok(outcome)
}

/// Compare cached leg volumes with a full replay, rebuilding them if `repair`.
///
/// A repair re-evaluates binary matches and career levels on every drifted
/// node, so volume that was missing from the cache pays out as it would have.
pub fn reconcile_volumes(
    conn: &mut Connection,
    config: &WorkflowConfig,
    actor: UserId,
    repair: bool,
    now: u64,
) -> Result<Reconciliation> {
    let depth = config.payout.aggregation_depth;
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        let drift = aggregation::verify(tx, depth)?;
        let mut report = Reconciliation {
            drift,
            corrected: 0,
            binary_matches: Vec::new(),
            career_advances: Vec::new(),
        };
        if repair && !report.drift.is_empty() {
            report.corrected = aggregation::rebuild_all(tx, depth)?;
            let nodes: Vec<UserId> = report.drift.iter().map(|d| d.user_id).collect();
            report.binary_matches = binary::evaluate_nodes(tx, &nodes, &config.payout, now)?;
            for node in &nodes {
                report
                    .career_advances
                    .extend(career::evaluate_until_stable(tx, *node, now)?);
            }
        }
        tracing::info!(
            actor = %actor,
            drift = report.drift.len(),
            corrected = report.corrected,
            matches = report.binary_matches.len(),
            advances = report.career_advances.len(),
            repair,
            "volumes reconciled"
        );
        Ok(report)
    })
}
