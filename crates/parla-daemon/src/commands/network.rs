//! Network placement command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use parla_types::events::EventType;
use parla_types::tree::Position;
use parla_types::UserId;
use parla_workflow::placement::{self, PlacementReport};
use parla_workflow::dashboard;

use super::{parse, to_json, Result};
use crate::{emit, unix_now, DaemonState};

#[derive(Deserialize)]
struct PlaceParams {
    actor_id: UserId,
    user_id: UserId,
    upline_id: UserId,
    position: Position,
    /// Move an already placed user together with their subtree.
    #[serde(default)]
    replace: bool,
}

#[derive(Deserialize)]
struct TreeParams {
    user_id: UserId,
    #[serde(default)]
    depth: Option<u32>,
}

#[derive(Deserialize)]
struct JoinParams {
    user_id: UserId,
}

fn emit_report(state: &DaemonState, report: &PlacementReport) {
    emit(state, EventType::UserPlaced, &report.placement);
    for entry in &report.binary_matches {
        emit(state, EventType::BinaryMatchPaid, entry);
    }
    for advance in &report.career_advances {
        emit(state, EventType::CareerLevelReached, advance);
    }
}

/// Admin placement, optionally moving a placed user.
pub async fn place_user(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: PlaceParams = parse(params)?;
    let report = {
        let mut db = state.db.lock().await;
        placement::place_user(
            &mut db,
            &state.workflow,
            params.actor_id,
            params.user_id,
            params.upline_id,
            params.position,
            params.replace,
            unix_now(),
        )?
    };
    emit_report(state, &report);
    to_json(&report)
}

/// Self-service placement under the caller's sponsor.
pub async fn join_network(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: JoinParams = parse(params)?;
    let joined = {
        let mut db = state.db.lock().await;
        placement::join_network(&mut db, &state.workflow, params.user_id, unix_now())?
    };
    match &joined.report {
        Some(report) => emit_report(state, report),
        None => emit(state, EventType::UserPlaced, &joined.node),
    }
    to_json(&joined)
}

pub async fn get_network_tree(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: TreeParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&dashboard::network_tree(&db, &state.workflow, params.user_id, params.depth)?)
}
