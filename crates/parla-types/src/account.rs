//! User accounts and their volume aggregates.

use serde::{Deserialize, Serialize};

use crate::career::CareerLevel;
use crate::tree::PlacementPreference;
use crate::{Money, UserId};

/// A user without credentials. Safe to serialize to any client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub referral_code: String,
    pub sponsor_id: Option<UserId>,
    pub sponsor_preference: Option<PlacementPreference>,
    pub created_at: u64,
    pub last_login_at: Option<u64>,
}

/// Materialized per-user aggregate. Rebuildable from tree rows and approved
/// investments, except for the ratchets (`paid_match_units`, `career_level`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAggregate {
    pub user_id: UserId,
    pub left_volume: Money,
    pub right_volume: Money,
    pub paid_match_units: i64,
    pub binary_earnings: Money,
    pub total_commissions: Money,
    pub career_level: CareerLevel,
    pub career_rewards: Money,
}

impl VolumeAggregate {
    /// An empty aggregate for a new account.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// The weaker leg, which is what matching and careers measure.
    pub fn career_points(&self) -> Money {
        self.left_volume.min(self.right_volume)
    }
}
