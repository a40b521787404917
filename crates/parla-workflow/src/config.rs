//! Workflow tunables.

use serde::{Deserialize, Serialize};

use parla_payout::PayoutPolicy;
use parla_types::{INVITE_TTL_SECS, TREE_VIEW_DEPTH};

/// Argon2id cost parameters for new password hashes. Existing hashes carry
/// their own parameters and keep verifying after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            m_cost: 19_456,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Everything the workflows need beyond the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub payout: PayoutPolicy,
    pub hashing: HashingParams,
    pub invite_ttl_secs: u64,
    pub tree_view_depth: u32,
    /// Grant the admin flag to the account registered into an empty database.
    pub first_user_is_admin: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            payout: PayoutPolicy::default(),
            hashing: HashingParams::default(),
            invite_ttl_secs: INVITE_TTL_SECS,
            tree_view_depth: TREE_VIEW_DEPTH,
            first_user_is_admin: true,
        }
    }
}
