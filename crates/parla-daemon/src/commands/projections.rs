//! Dashboard, admin console and event backlog handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use parla_types::UserId;
use parla_workflow::dashboard;

use super::{parse, to_json, ActorParams, Result, UserParams};
use crate::events::EventFilter;
use crate::DaemonState;

const DEFAULT_TRANSACTION_LIMIT: u32 = 100;
const DEFAULT_EVENT_LIMIT: usize = 100;

#[derive(Deserialize)]
struct TransactionParams {
    actor_id: UserId,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct EventParams {
    #[serde(flatten)]
    filter: EventFilter,
    #[serde(default)]
    limit: Option<usize>,
}

pub async fn get_dashboard(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: UserParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&dashboard::dashboard(&db, params.user_id)?)
}

pub async fn get_admin_overview(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: ActorParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&dashboard::admin_overview(&db, params.actor_id)?)
}

pub async fn list_users(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: ActorParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&dashboard::list_users(&db, params.actor_id)?)
}

pub async fn list_transactions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: TransactionParams = parse(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT);
    let db = state.db.lock().await;
    to_json(&dashboard::list_transactions(&db, params.actor_id, limit)?)
}

pub async fn get_public_stats(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    to_json(&dashboard::public_stats(&db)?)
}

/// Buffered events, oldest first.
pub async fn get_recent_events(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: EventParams = parse(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    to_json(&state.event_bus.recent(&params.filter, limit))
}
