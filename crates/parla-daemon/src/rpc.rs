//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use parla_workflow::{ErrorKind, WorkflowError};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    #[serde(default)]
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn with_detail(code: i32, message: &str, detail: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(-32603, "INTERNAL_ERROR", detail)
    }

    // Domain errors

    /// Not found (-32020).
    pub fn not_found(detail: &str) -> Self {
        Self::with_detail(-32020, "NOT_FOUND", detail)
    }

    /// Forbidden (-32030).
    pub fn forbidden(detail: &str) -> Self {
        Self::with_detail(-32030, "FORBIDDEN", detail)
    }

    /// Insufficient balance (-32040). Amounts are in cents.
    pub fn insufficient_balance(required: i64, available: i64) -> Self {
        Self {
            code: -32040,
            message: "INSUFFICIENT_BALANCE".to_string(),
            data: Some(serde_json::json!({"required": required, "available": available})),
        }
    }

    /// Placement rule violated (-32050).
    pub fn placement(detail: &str) -> Self {
        Self::with_detail(-32050, "PLACEMENT_REJECTED", detail)
    }

    /// Request not pending (-32051).
    pub fn invalid_transition(detail: &str) -> Self {
        Self::with_detail(-32051, "INVALID_TRANSITION", detail)
    }

    /// Conflicting state (-32052).
    pub fn conflict(detail: &str) -> Self {
        Self::with_detail(-32052, "CONFLICT", detail)
    }

    /// Stored network inconsistent (-32099).
    pub fn consistency(detail: &str) -> Self {
        Self::with_detail(-32099, "CONSISTENCY_FAILURE", detail)
    }
}

impl From<WorkflowError> for RpcError {
    fn from(err: WorkflowError) -> Self {
        if let WorkflowError::InsufficientBalance {
            required,
            available,
        } = err
        {
            return RpcError::insufficient_balance(required.cents(), available.cents());
        }
        let detail = err.to_string();
        match err.kind() {
            ErrorKind::Validation => RpcError::invalid_params(&detail),
            ErrorKind::NotFound => RpcError::not_found(&detail),
            ErrorKind::Forbidden => RpcError::forbidden(&detail),
            ErrorKind::InsufficientBalance => RpcError::conflict(&detail),
            ErrorKind::Placement => RpcError::placement(&detail),
            ErrorKind::Transition => RpcError::invalid_transition(&detail),
            ErrorKind::Conflict => RpcError::conflict(&detail),
            ErrorKind::Consistency => {
                error!(error = %detail, "consistency failure surfaced to client");
                RpcError::consistency(&detail)
            }
            ErrorKind::Internal => {
                error!(error = %detail, "internal error");
                RpcError::internal_error(&detail)
            }
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = ?self.socket_path, "IPC server listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!(error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&state, &line).await;
        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse one request line and dispatch it.
pub async fn handle_line(state: &Arc<DaemonState>, line: &str) -> RpcResponse {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
    };
    let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
    match serde_json::from_value::<RpcRequest>(value) {
        Ok(request) if request.jsonrpc == "2.0" => dispatch_request(state, request).await,
        _ => RpcResponse::error(id, RpcError::invalid_request()),
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: &Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!(method, "dispatching RPC method");

    let result = match method {
        // Accounts
        "register" => commands::account::register(state, params).await,
        "login" => commands::account::login(state, params).await,
        "validate_referral_code" => commands::account::validate_referral_code(state, params).await,
        "generate_invite" => commands::account::generate_invite(state, params).await,
        "get_used_invites" => commands::account::get_used_invites(state, params).await,
        "make_admin" => commands::account::make_admin(state, params).await,
        "delete_user" => commands::account::delete_user(state, params).await,

        // Investments
        "get_packages" => commands::investment::get_packages(state).await,
        "submit_investment" => commands::investment::submit_investment(state, params).await,
        "get_my_investments" => commands::investment::get_my_investments(state, params).await,
        "approve_investment" => commands::investment::approve_investment(state, params).await,
        "reject_investment" => commands::investment::reject_investment(state, params).await,
        "list_investment_requests" => {
            commands::investment::list_investment_requests(state, params).await
        }

        // Withdrawals
        "submit_withdrawal" => commands::withdrawal::submit_withdrawal(state, params).await,
        "get_my_withdrawals" => commands::withdrawal::get_my_withdrawals(state, params).await,
        "approve_withdrawal" => commands::withdrawal::approve_withdrawal(state, params).await,
        "reject_withdrawal" => commands::withdrawal::reject_withdrawal(state, params).await,
        "list_withdrawal_requests" => {
            commands::withdrawal::list_withdrawal_requests(state, params).await
        }

        // Network
        "place_user" => commands::network::place_user(state, params).await,
        "join_network" => commands::network::join_network(state, params).await,
        "get_network_tree" => commands::network::get_network_tree(state, params).await,

        // Payouts and administration
        "distribute_weekly_profit" => commands::admin::distribute_weekly_profit(state, params).await,
        "reconcile_volumes" => commands::admin::reconcile_volumes(state, params).await,

        // Projections
        "get_dashboard" => commands::projections::get_dashboard(state, params).await,
        "get_admin_overview" => commands::projections::get_admin_overview(state, params).await,
        "list_users" => commands::projections::list_users(state, params).await,
        "list_transactions" => commands::projections::list_transactions(state, params).await,
        "get_public_stats" => commands::projections::get_public_stats(state).await,

        // Events
        "get_recent_events" => commands::projections::get_recent_events(state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => {
            debug!(method, code = err.code, "RPC call failed");
            RpcResponse::error(id, err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use parla_network::NetworkError;
    use parla_types::{Money, UserId};

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::insufficient_balance(100, 50);
        assert_eq!(err.code, -32040);

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_workflow_error_mapping() {
        let err = RpcError::from(WorkflowError::InsufficientBalance {
            required: Money::from_dollars(60),
            available: Money::from_dollars(40),
        });
        assert_eq!(err.code, -32040);
        assert_eq!(err.data, Some(serde_json::json!({"required": 6000, "available": 4000})));

        let err = RpcError::from(WorkflowError::Network(NetworkError::SlotOccupied {
            upline: UserId(1),
            position: parla_types::tree::Position::Left,
        }));
        assert_eq!(err.code, -32050);

        let err = RpcError::from(WorkflowError::Forbidden("nope".into()));
        assert_eq!(err.code, -32030);

        let err = RpcError::from(WorkflowError::Network(NetworkError::Corrupted("loop".into())));
        assert_eq!(err.code, -32099);

        let err = RpcError::from(WorkflowError::EmailTaken);
        assert_eq!(err.code, -32052);
    }

    #[tokio::test]
    async fn test_malformed_lines() {
        let state = test_state();
        let resp = handle_line(&state, "{not json").await;
        assert_eq!(resp.error.map(|e| e.code), Some(-32700));

        let resp = handle_line(&state, r#"{"jsonrpc":"1.0","id":7,"method":"login"}"#).await;
        assert_eq!(resp.id, serde_json::json!(7));
        assert_eq!(resp.error.map(|e| e.code), Some(-32600));

        let resp = handle_line(&state, r#"{"jsonrpc":"2.0","id":8,"method":"mint_money"}"#).await;
        assert_eq!(resp.error.map(|e| e.code), Some(-32601));
    }

    async fn call(state: &Arc<DaemonState>, method: &str, params: serde_json::Value) -> RpcResponse {
        let line = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
        .to_string();
        handle_line(state, &line).await
    }

    fn code(resp: RpcResponse) -> Option<i32> {
        resp.error.map(|e| e.code)
    }

    #[tokio::test]
    async fn test_approval_over_rpc() {
        let state = test_state();
        let boss = call(
            &state,
            "register",
            serde_json::json!({"email": "boss@example.com", "name": "boss", "password": "boss-password"}),
        )
        .await
        .result
        .expect("register boss");
        assert_eq!(boss["user"]["is_admin"], true);
        let boss_id = boss["user"]["id"].clone();

        let member = call(
            &state,
            "register",
            serde_json::json!({
                "email": "member@example.com",
                "name": "member",
                "password": "member-password",
                "referral_code": boss["user"]["referral_code"],
            }),
        )
        .await
        .result
        .expect("register member");
        assert_eq!(member["user"]["is_admin"], false);
        let member_id = member["user"]["id"].clone();

        let investment = call(
            &state,
            "submit_investment",
            serde_json::json!({"user_id": member_id, "tier": "gold", "platform": "iban"}),
        )
        .await
        .result
        .expect("submit");
        let investment_id = investment["id"].clone();

        let denied = call(
            &state,
            "approve_investment",
            serde_json::json!({"actor_id": member_id, "investment_id": investment_id}),
        )
        .await;
        assert_eq!(code(denied), Some(-32030));

        let approved = call(
            &state,
            "approve_investment",
            serde_json::json!({"actor_id": boss_id, "investment_id": investment_id}),
        )
        .await
        .result
        .expect("approve");
        assert_eq!(approved["commission"]["user_id"], boss_id);
        assert_eq!(approved["commission"]["amount"], 5_000);

        let again = call(
            &state,
            "approve_investment",
            serde_json::json!({"actor_id": boss_id, "investment_id": investment_id}),
        )
        .await;
        assert_eq!(code(again), Some(-32051));

        let events = call(
            &state,
            "get_recent_events",
            serde_json::json!({"categories": ["payout"]}),
        )
        .await
        .result
        .expect("events");
        let kinds: Vec<&str> = events
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|e| e["event_type"].as_str())
            .collect();
        assert_eq!(kinds, vec!["commission_paid"]);

        let missing = call(&state, "get_dashboard", serde_json::json!({"user_id": 99})).await;
        assert_eq!(code(missing), Some(-32020));
    }

    #[tokio::test]
    async fn test_public_calls() {
        let state = test_state();
        let resp = handle_line(&state, r#"{"jsonrpc":"2.0","id":1,"method":"get_packages"}"#).await;
        let packages = resp.result.expect("packages");
        assert_eq!(packages.as_array().map(Vec::len), Some(3));

        let resp =
            handle_line(&state, r#"{"jsonrpc":"2.0","id":2,"method":"get_public_stats"}"#).await;
        assert_eq!(resp.result.expect("stats")["total_users"], 0);
    }
}
