//! Read-only projections served to dashboards and the admin console.

use serde::{Deserialize, Serialize};

use crate::account::{UserSummary, VolumeAggregate};
use crate::career::CareerLevel;
use crate::ledger::{EntryKind, LedgerEntry};
use crate::package::PackageTier;
use crate::requests::{Investment, WithdrawalRequest};
use crate::tree::{PlacementPreference, Position};
use crate::{Money, UserId};

/// One node of the recursive network view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub position: Option<Position>,
    pub package: Option<PackageTier>,
    pub left_volume: Money,
    pub right_volume: Money,
    pub career_level: CareerLevel,
    pub left: Option<Box<NetworkNode>>,
    pub right: Option<Box<NetworkNode>>,
}

impl NetworkNode {
    /// Number of nodes in this projection, including self.
    pub fn count(&self) -> usize {
        1 + self.left.as_ref().map_or(0, |n| n.count()) + self.right.as_ref().map_or(0, |n| n.count())
    }
}

/// A direct child as shown on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub user_id: UserId,
    pub name: String,
    pub package: Option<PackageTier>,
}

/// A user who registered with someone's referral code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsoredUser {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub preference: Option<PlacementPreference>,
    pub placed: bool,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub user: UserSummary,
    pub aggregate: VolumeAggregate,
    pub career_points: Money,
    pub next_career_level: Option<CareerLevel>,
    pub principal: Money,
    pub available: Money,
    pub weekly_earnings: Money,
    pub left_child: Option<ChildSummary>,
    pub right_child: Option<ChildSummary>,
    pub sponsored: Vec<SponsoredUser>,
    pub recent_entries: Vec<LedgerEntry>,
    pub active_package: Option<PackageTier>,
}

/// Completed total for one entry kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotal {
    pub kind: EntryKind,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOverview {
    pub total_users: u64,
    pub active_investments: u64,
    pub total_volume: Money,
    pub pending_investments: u64,
    pub pending_withdrawals: u64,
    pub totals_by_kind: Vec<KindTotal>,
    pub last_weekly_distribution: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicStats {
    pub total_users: u64,
    pub total_volume: Money,
}

/// An investment request joined with its owner, for the admin list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentRow {
    #[serde(flatten)]
    pub investment: Investment,
    pub user_name: String,
    pub user_email: String,
}

/// A withdrawal request joined with its owner, for the admin list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRow {
    #[serde(flatten)]
    pub withdrawal: WithdrawalRequest,
    pub user_name: String,
    pub user_email: String,
}

/// A consumed single-use invite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedInvite {
    pub code: String,
    pub preference: PlacementPreference,
    pub used_by: UserId,
    pub used_by_name: String,
    pub used_by_email: String,
    pub used_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: i64) -> NetworkNode {
        NetworkNode {
            user_id: UserId(id),
            name: format!("user{id}"),
            email: format!("user{id}@example.com"),
            position: None,
            package: None,
            left_volume: Money::ZERO,
            right_volume: Money::ZERO,
            career_level: CareerLevel::None,
            left: None,
            right: None,
        }
    }

    #[test]
    fn test_node_count() {
        let mut root = leaf(1);
        let mut left = leaf(2);
        left.right = Some(Box::new(leaf(4)));
        root.left = Some(Box::new(left));
        root.right = Some(Box::new(leaf(3)));
        assert_eq!(root.count(), 4);
    }
}
