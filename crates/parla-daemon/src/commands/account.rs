//! Account and referral command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use zeroize::Zeroizing;

use parla_types::events::EventType;
use parla_types::tree::PlacementPreference;
use parla_types::UserId;
use parla_workflow::accounts::{self, NewAccount};
use parla_workflow::referrals;

use super::{parse, to_json, Result, UserParams};
use crate::{emit, unix_now, DaemonState};

#[derive(Deserialize)]
struct RegisterParams {
    email: String,
    name: String,
    password: String,
    #[serde(default)]
    referral_code: Option<String>,
}

#[derive(Deserialize)]
struct LoginParams {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct CodeParams {
    code: String,
}

#[derive(Deserialize)]
struct InviteParams {
    user_id: UserId,
    #[serde(default)]
    preference: PlacementPreference,
    /// Return the active invite instead of minting another one.
    #[serde(default)]
    reuse: bool,
}

#[derive(Deserialize)]
struct TargetParams {
    actor_id: UserId,
    user_id: UserId,
}

/// Create an account.
pub async fn register(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: RegisterParams = parse(params)?;
    let account = NewAccount {
        email: params.email,
        name: params.name,
        password: Zeroizing::new(params.password),
        referral_code: params.referral_code,
    };

    let registered = {
        let mut db = state.db.lock().await;
        accounts::register(&mut db, &state.workflow, &account, unix_now())?
    };

    emit(
        state,
        EventType::UserRegistered,
        &serde_json::json!({
            "user_id": registered.user.id,
            "sponsor_id": registered.user.sponsor_id,
            "is_admin": registered.user.is_admin,
        }),
    );
    to_json(&registered)
}

/// Check credentials.
pub async fn login(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: LoginParams = parse(params)?;
    let password = Zeroizing::new(params.password);
    let user = {
        let db = state.db.lock().await;
        accounts::login(&db, &params.email, &password, unix_now())?
    };
    info!(user = %user.id, "login");
    to_json(&user)
}

/// Resolve a referral code without consuming it.
pub async fn validate_referral_code(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: CodeParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&referrals::validate_referral_code(&db, &params.code, unix_now())?)
}

/// Mint (or with `reuse`, fetch) a single-use invite.
pub async fn generate_invite(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: InviteParams = parse(params)?;
    let invite = {
        let mut db = state.db.lock().await;
        if params.reuse {
            referrals::ensure_invite(&mut db, &state.workflow, params.user_id, params.preference, unix_now())?
        } else {
            referrals::generate_invite(&mut db, &state.workflow, params.user_id, params.preference, unix_now())?
        }
    };
    emit(
        state,
        EventType::InviteGenerated,
        &serde_json::json!({
            "user_id": params.user_id,
            "preference": invite.preference,
            "expires_at": invite.expires_at,
        }),
    );
    to_json(&invite)
}

pub async fn get_used_invites(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: UserParams = parse(params)?;
    let db = state.db.lock().await;
    to_json(&referrals::used_invites(&db, params.user_id)?)
}

/// Grant the admin flag.
pub async fn make_admin(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: TargetParams = parse(params)?;
    let user = {
        let mut db = state.db.lock().await;
        accounts::make_admin(&mut db, params.actor_id, params.user_id)?
    };
    emit(
        state,
        EventType::AdminGranted,
        &serde_json::json!({"actor_id": params.actor_id, "user_id": user.id}),
    );
    to_json(&user)
}

/// Remove an account without ledger history or descendants.
pub async fn delete_user(state: &Arc<DaemonState>, params: &Value) -> Result {
    let params: TargetParams = parse(params)?;
    let deleted = {
        let mut db = state.db.lock().await;
        accounts::delete_user(&mut db, params.actor_id, params.user_id)?
    };
    emit(state, EventType::UserDeleted, &deleted);
    to_json(&deleted)
}
