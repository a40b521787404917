//! Event types for daemon notifications.

use serde::{Deserialize, Serialize};

/// Envelope for all daemon events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    /// Position in the daemon's emission order, starting at 1.
    pub sequence: u64,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Account events
    UserRegistered,
    InviteGenerated,
    AdminGranted,
    UserDeleted,

    // Request events
    InvestmentSubmitted,
    InvestmentApproved,
    InvestmentRejected,
    WithdrawalSubmitted,
    WithdrawalApproved,
    WithdrawalRejected,

    // Network events
    UserPlaced,
    VolumesReconciled,

    // Payout events
    CommissionPaid,
    BinaryMatchPaid,
    CareerLevelReached,
    WeeklyProfitDistributed,
}

string_enum!(EventType, "event type", {
    UserRegistered => "user_registered",
    InviteGenerated => "invite_generated",
    AdminGranted => "admin_granted",
    UserDeleted => "user_deleted",
    InvestmentSubmitted => "investment_submitted",
    InvestmentApproved => "investment_approved",
    InvestmentRejected => "investment_rejected",
    WithdrawalSubmitted => "withdrawal_submitted",
    WithdrawalApproved => "withdrawal_approved",
    WithdrawalRejected => "withdrawal_rejected",
    UserPlaced => "user_placed",
    VolumesReconciled => "volumes_reconciled",
    CommissionPaid => "commission_paid",
    BinaryMatchPaid => "binary_match_paid",
    CareerLevelReached => "career_level_reached",
    WeeklyProfitDistributed => "weekly_profit_distributed",
});

impl EventType {
    /// Category used by subscription filters: `account`, `request`, `network` or `payout`.
    pub fn category(self) -> &'static str {
        match self {
            EventType::UserRegistered
            | EventType::InviteGenerated
            | EventType::AdminGranted
            | EventType::UserDeleted => "account",
            EventType::InvestmentSubmitted
            | EventType::InvestmentApproved
            | EventType::InvestmentRejected
            | EventType::WithdrawalSubmitted
            | EventType::WithdrawalApproved
            | EventType::WithdrawalRejected => "request",
            EventType::UserPlaced | EventType::VolumesReconciled => "network",
            EventType::CommissionPaid
            | EventType::BinaryMatchPaid
            | EventType::CareerLevelReached
            | EventType::WeeklyProfitDistributed => "payout",
        }
    }
}
