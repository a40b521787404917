//! Withdrawal command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use parla_types::events::EventType;
use parla_types::requests::{DestinationKind, RequestStatus};
use parla_types::{Money, UserId, WithdrawalId};
use parla_workflow::withdrawals::{self, SubmitWithdrawal};

use super::{parse, to_json, Result, UserParams};
use crate::{emit, unix_now, DaemonState};

#[derive(Deserialize)]
struct SubmitParams {
    user_id: UserId,
    /// Cents.
    amount: Money,
    destination: String,
    destination_kind: DestinationKind,
    full_name: String,
}

#[derive(Deserialize)]
struct DecisionParams {
    actor_id: UserId,
    withdrawal_id: WithdrawalId,
}

#[derive(Deserialize)]
struct ListParams {
    actor_id: UserId,
    #[serde(default)]
    status: Option<RequestStatus>,
}

pub async fn submit_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: SubmitParams = parse(params)?;
    let request = SubmitWithdrawal {
        amount: params.amount,
        destination: params.destination,
        destination_kind: params.destination_kind,
        full_name: params.full_name,
    };
    let withdrawal = {
        let mut db = state.db.lock().await;
        withdrawals::submit_withdrawal(&mut db, params.user_id, &request, unix_now())?
    };
    emit(
        state,
        EventType::WithdrawalSubmitted,
        &serde_json::json!({
            "withdrawal_id": withdrawal.id,
            "user_id": withdrawal.user_id,
            "amount": withdrawal.amount,
        }),
    );
    to_json(&withdrawal)
}

pub async fn get_my_withdrawals(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: UserParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&withdrawals::my_withdrawals(&db, params.user_id)?)
}

/// Approve after rechecking the balance inside the transaction.
pub async fn approve_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: DecisionParams = parse(params)?;
    let approval = {
        let mut db = state.db.lock().await;
        withdrawals::approve_withdrawal(&mut db, params.actor_id, params.withdrawal_id, unix_now())?
    };
    emit(
        state,
        EventType::WithdrawalApproved,
        &serde_json::json!({
            "withdrawal_id": approval.request.id,
            "user_id": approval.request.user_id,
            "amount": approval.request.amount,
            "remaining": approval.remaining,
        }),
    );
    to_json(&approval)
}

pub async fn reject_withdrawal(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: DecisionParams = parse(params)?;
    let withdrawal = {
        let mut db = state.db.lock().await;
        withdrawals::reject_withdrawal(&mut db, params.actor_id, params.withdrawal_id, unix_now())?
    };
    emit(
        state,
        EventType::WithdrawalRejected,
        &serde_json::json!({"withdrawal_id": withdrawal.id, "user_id": withdrawal.user_id}),
    );
    to_json(&withdrawal)
}

pub async fn list_withdrawal_requests(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: ListParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&withdrawals::list_withdrawal_requests(&db, params.actor_id, params.status)?)
}
