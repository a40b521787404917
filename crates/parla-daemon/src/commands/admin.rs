//! Admin batch command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use parla_types::events::EventType;
use parla_types::UserId;
use parla_workflow::admin;

use super::{parse, to_json, Result};
use crate::{emit, unix_now, DaemonState};

#[derive(Deserialize)]
struct DistributeParams {
    actor_id: UserId,
    /// Timestamp inside the week to pay; defaults to now.
    #[serde(default)]
    as_of: Option<u64>,
}

#[derive(Deserialize)]
struct ReconcileParams {
    actor_id: UserId,
    #[serde(default)]
    repair: bool,
}

/// Credit the weekly profit share now instead of waiting for the scheduler.
pub async fn distribute_weekly_profit(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: DistributeParams = parse(params)?;
    let as_of = params.as_of.unwrap_or_else(unix_now);
    let outcome = {
        let mut db = state.db.lock().await;
        admin::distribute_weekly(&mut db, &state.workflow, params.actor_id, as_of)?
    };
    emit(state, EventType::WeeklyProfitDistributed, &outcome);
    to_json(&outcome)
}

/// Verify cached volumes, rebuilding them when `repair` is set.
pub async fn reconcile_volumes(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: ReconcileParams = parse(params)?;
    let report = {
        let mut db = state.db.lock().await;
        admin::reconcile_volumes(
            &mut db,
            &state.workflow,
            params.actor_id,
            params.repair,
            unix_now(),
        )?
    };
    emit(
        state,
        EventType::VolumesReconciled,
        &serde_json::json!({
            "actor_id": params.actor_id,
            "drifted": report.drift.len(),
            "corrected": report.corrected,
        }),
    );
    for entry in &report.binary_matches {
        emit(state, EventType::BinaryMatchPaid, entry);
    }
    for advance in &report.career_advances {
        emit(state, EventType::CareerLevelReached, advance);
    }
    to_json(&report)
}
