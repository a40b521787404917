//! Ledger entries.
//!
//! The ledger is append-only. Every balance shown anywhere is a sum over entries.

use serde::{Deserialize, Serialize};

use crate::{EntryId, Money, UserId};

/// What produced a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    WeeklyProfit,
    Commission,
    BinaryMatch,
    CareerReward,
    Withdrawal,
    Investment,
}

string_enum!(EntryKind, "entry kind", {
    WeeklyProfit => "weekly_profit",
    Commission => "commission",
    BinaryMatch => "binary_match",
    CareerReward => "career_reward",
    Withdrawal => "withdrawal",
    Investment => "investment",
});

impl EntryKind {
    pub const ALL: [EntryKind; 6] = [
        EntryKind::WeeklyProfit,
        EntryKind::Commission,
        EntryKind::BinaryMatch,
        EntryKind::CareerReward,
        EntryKind::Withdrawal,
        EntryKind::Investment,
    ];

    /// Whether entries of this kind move the withdrawable balance. Principal
    /// (`Investment`) never does.
    pub fn affects_available(self) -> bool {
        !matches!(self, EntryKind::Investment)
    }
}

/// Settlement status of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Rejected,
}

string_enum!(EntryStatus, "entry status", {
    Pending => "pending",
    Completed => "completed",
    Rejected => "rejected",
});

/// One row of the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub kind: EntryKind,
    /// Signed: withdrawals are negative.
    pub amount: Money,
    pub status: EntryStatus,
    pub description: String,
    /// Idempotency key, unique per (user, kind).
    pub reference: Option<String>,
    pub created_at: u64,
}

/// Fields of an entry about to be appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    pub user_id: UserId,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: u64,
}
