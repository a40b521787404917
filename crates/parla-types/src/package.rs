//! Investment package catalogue.
//!
//! | Tier     | Amount | Direct commission |
//! |----------|--------|-------------------|
//! | Silver   | $250   | 5%                |
//! | Gold     | $500   | 10%               |
//! | Platinum | $1000  | 15%               |

use serde::{Deserialize, Serialize};

use crate::{Money, WEEKLY_PROFIT_BPS};

/// Investment package tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PackageTier {
    Silver,
    Gold,
    Platinum,
}

string_enum!(PackageTier, "package tier", {
    Silver => "silver",
    Gold => "gold",
    Platinum => "platinum",
});

impl PackageTier {
    /// Every tier, cheapest first.
    pub const ALL: [PackageTier; 3] = [PackageTier::Silver, PackageTier::Gold, PackageTier::Platinum];

    /// Catalogue price, which is also the minimum investment for the tier.
    pub fn amount(self) -> Money {
        match self {
            PackageTier::Silver => Money::from_dollars(250),
            PackageTier::Gold => Money::from_dollars(500),
            PackageTier::Platinum => Money::from_dollars(1_000),
        }
    }

    /// Direct-referral commission rate paid to the investor's upline.
    pub fn commission_bps(self) -> u32 {
        match self {
            PackageTier::Silver => 500,
            PackageTier::Gold => 1_000,
            PackageTier::Platinum => 1_500,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PackageTier::Silver => "Silver",
            PackageTier::Gold => "Gold",
            PackageTier::Platinum => "Platinum",
        }
    }
}

/// A catalogue row as served to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub tier: PackageTier,
    pub name: String,
    pub amount: Money,
    pub commission_bps: u32,
    pub weekly_profit_bps: u32,
}

/// The full package catalogue.
pub fn catalogue() -> Vec<PackageInfo> {
    PackageTier::ALL
        .iter()
        .map(|&tier| PackageInfo {
            tier,
            name: tier.display_name().to_string(),
            amount: tier.amount(),
            commission_bps: tier.commission_bps(),
            weekly_profit_bps: WEEKLY_PROFIT_BPS,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue() {
        let packages = catalogue();
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[1].tier, PackageTier::Gold);
        assert_eq!(packages[1].amount, Money::from_dollars(500));
        assert_eq!(packages[1].commission_bps, 1_000);
    }

    #[test]
    fn test_parse_round_trip() {
        for tier in PackageTier::ALL {
            assert_eq!(tier.as_str().parse::<PackageTier>(), Ok(tier));
        }
        assert!("bronze".parse::<PackageTier>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&PackageTier::Platinum).expect("serialize");
        assert_eq!(json, "\"platinum\"");
    }
}
