//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category. Handlers
//! take the whole params object, deserialize it into a typed struct and
//! hold the database lock only for the workflow call.

pub mod account;
pub mod admin;
pub mod investment;
pub mod network;
pub mod projections;
pub mod withdrawal;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use parla_types::UserId;

use crate::rpc::RpcError;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Deserialize `params`; a missing params member reads as `{}`.
pub(crate) fn parse<T: DeserializeOwned>(params: &Value) -> std::result::Result<T, RpcError> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&format!("serialize: {e}")))
}

/// Params naming only the calling user.
#[derive(Debug, Deserialize)]
pub(crate) struct UserParams {
    pub user_id: UserId,
}

/// Params naming only the acting admin.
#[derive(Debug, Deserialize)]
pub(crate) struct ActorParams {
    pub actor_id: UserId,
}
