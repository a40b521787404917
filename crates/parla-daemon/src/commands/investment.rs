//! Investment command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use parla_types::events::EventType;
use parla_types::package::PackageTier;
use parla_types::requests::{PayerDetails, PaymentPlatform, RequestStatus};
use parla_types::{InvestmentId, Money, UserId};
use parla_workflow::dashboard;
use parla_workflow::investments::{self, ApprovalOutcome, SubmitInvestment};

use super::{parse, to_json, Result, UserParams};
use crate::{emit, unix_now, DaemonState};

#[derive(Deserialize)]
struct SubmitParams {
    user_id: UserId,
    tier: PackageTier,
    /// Cents; defaults to the tier price.
    #[serde(default)]
    amount: Option<Money>,
    platform: PaymentPlatform,
    #[serde(default)]
    payer: PayerDetails,
}

#[derive(Deserialize)]
struct DecisionParams {
    actor_id: UserId,
    investment_id: InvestmentId,
}

#[derive(Deserialize)]
struct ListParams {
    actor_id: UserId,
    #[serde(default)]
    status: Option<RequestStatus>,
}

/// The package catalogue.
pub async fn get_packages(_state: &Arc<DaemonState>) -> Result {
    to_json(&dashboard::packages())
}

pub async fn submit_investment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: SubmitParams = parse(params)?;
    let request = SubmitInvestment {
        tier: params.tier,
        amount: params.amount,
        platform: params.platform,
        payer: params.payer,
    };
    let investment = {
        let mut db = state.db.lock().await;
        investments::submit_investment(&mut db, params.user_id, &request, unix_now())?
    };
    emit(state, EventType::InvestmentSubmitted, &investment);
    to_json(&investment)
}

pub async fn get_my_investments(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: UserParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&investments::my_investments(&db, params.user_id)?)
}

/// Approve and run the payout fan-out.
pub async fn approve_investment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: DecisionParams = parse(params)?;
    let outcome = {
        let mut db = state.db.lock().await;
        investments::approve_investment(
            &mut db,
            &state.workflow,
            params.actor_id,
            params.investment_id,
            unix_now(),
        )?
    };
    emit_approval(state, &outcome);
    to_json(&outcome)
}

fn emit_approval(state: &DaemonState, outcome: &ApprovalOutcome) {
    emit(
        state,
        EventType::InvestmentApproved,
        &serde_json::json!({
            "investment_id": outcome.investment.id,
            "user_id": outcome.investment.user_id,
            "tier": outcome.investment.tier,
            "amount": outcome.investment.amount,
            "touched": outcome.touched,
        }),
    );
    if let Some(placement) = &outcome.placement {
        emit(state, EventType::UserPlaced, placement);
    }
    if let Some(entry) = &outcome.commission {
        emit(state, EventType::CommissionPaid, entry);
    }
    for entry in &outcome.binary_matches {
        emit(state, EventType::BinaryMatchPaid, entry);
    }
    for advance in &outcome.career_advances {
        emit(state, EventType::CareerLevelReached, advance);
    }
}

pub async fn reject_investment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: DecisionParams = parse(params)?;
    let investment = {
        let mut db = state.db.lock().await;
        investments::reject_investment(&mut db, params.actor_id, params.investment_id, unix_now())?
    };
    emit(state, EventType::InvestmentRejected, &investment);
    to_json(&investment)
}

pub async fn list_investment_requests(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: ListParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&investments::list_investment_requests(&db, params.actor_id, params.status)?)
}
