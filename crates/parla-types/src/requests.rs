//! Investment and withdrawal requests.
//!
//! Both follow the same approval state machine:
//!
//! ```text
//! pending ──► approved
//!    │
//!    └─────► rejected
//! ```
//!
//! `approved` and `rejected` are terminal.

use serde::{Deserialize, Serialize};

use crate::package::PackageTier;
use crate::{InvestmentId, Money, UserId, WithdrawalId};

/// Approval status shared by investments and withdrawals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(RequestStatus, "request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Only `pending` may move, and only to a terminal state.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }
}

/// How an investor paid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlatform {
    TetherTrc20,
    EthereumErc20,
    Iban,
}

string_enum!(PaymentPlatform, "payment platform", {
    TetherTrc20 => "tether_trc20",
    EthereumErc20 => "ethereum_erc20",
    Iban => "iban",
});

/// Where a withdrawal is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Iban,
    Crypto,
}

string_enum!(DestinationKind, "destination kind", {
    Iban => "iban",
    Crypto => "crypto",
});

/// Free-form payer details captured with an investment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerDetails {
    pub full_name: String,
    pub username: String,
    pub contact: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub user_id: UserId,
    pub tier: PackageTier,
    pub amount: Money,
    pub status: RequestStatus,
    pub platform: PaymentPlatform,
    pub payer: PayerDetails,
    pub submitted_at: u64,
    pub decided_at: Option<u64>,
    /// Set once the approval fan-out has run.
    pub processed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount: Money,
    pub destination: String,
    pub destination_kind: DestinationKind,
    pub full_name: String,
    pub status: RequestStatus,
    pub created_at: u64,
    pub decided_at: Option<u64>,
}
