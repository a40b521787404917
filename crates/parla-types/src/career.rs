//! Career ladder.
//!
//! A level is reached when both the left and the right cumulative leg volume meet
//! its threshold. Each level's reward is paid once, on entry.

use serde::{Deserialize, Serialize};

use crate::Money;

/// Career level, ordered from lowest to highest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ts_rs::TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CareerLevel {
    #[default]
    None,
    Amethyst,
    Sapphire,
    Ruby,
    Emerald,
    Diamond,
    Crown,
}

string_enum!(CareerLevel, "career level", {
    None => "none",
    Amethyst => "amethyst",
    Sapphire => "sapphire",
    Ruby => "ruby",
    Emerald => "emerald",
    Diamond => "diamond",
    Crown => "crown",
});

/// What a level pays on entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum CareerReward {
    Nothing,
    Cash(Money),
    NonCash(&'static str),
}

impl CareerReward {
    /// Amount credited to the ledger ($0 for non-cash prizes).
    pub fn cash_amount(self) -> Money {
        match self {
            CareerReward::Cash(amount) => amount,
            CareerReward::Nothing | CareerReward::NonCash(_) => Money::ZERO,
        }
    }
}

impl CareerLevel {
    /// The rewarded levels in ascending order.
    pub const LADDER: [CareerLevel; 6] = [
        CareerLevel::Amethyst,
        CareerLevel::Sapphire,
        CareerLevel::Ruby,
        CareerLevel::Emerald,
        CareerLevel::Diamond,
        CareerLevel::Crown,
    ];

    /// Volume required on each leg.
    pub fn threshold(self) -> Money {
        match self {
            CareerLevel::None => Money::ZERO,
            CareerLevel::Amethyst => Money::from_dollars(5_000),
            CareerLevel::Sapphire => Money::from_dollars(10_000),
            CareerLevel::Ruby => Money::from_dollars(20_000),
            CareerLevel::Emerald => Money::from_dollars(50_000),
            CareerLevel::Diamond => Money::from_dollars(100_000),
            CareerLevel::Crown => Money::from_dollars(300_000),
        }
    }

    pub fn reward(self) -> CareerReward {
        match self {
            CareerLevel::None => CareerReward::Nothing,
            CareerLevel::Amethyst => CareerReward::Cash(Money::from_dollars(500)),
            CareerLevel::Sapphire => CareerReward::Cash(Money::from_dollars(1_000)),
            CareerLevel::Ruby => CareerReward::Cash(Money::from_dollars(3_000)),
            CareerLevel::Emerald => CareerReward::Cash(Money::from_dollars(7_500)),
            CareerLevel::Diamond => CareerReward::Cash(Money::from_dollars(20_000)),
            CareerLevel::Crown => CareerReward::NonCash("zero-kilometre TOGG automobile"),
        }
    }

    /// The next rung, or `None` at the top of the ladder.
    pub fn next(self) -> Option<CareerLevel> {
        match self {
            CareerLevel::None => Some(CareerLevel::Amethyst),
            CareerLevel::Amethyst => Some(CareerLevel::Sapphire),
            CareerLevel::Sapphire => Some(CareerLevel::Ruby),
            CareerLevel::Ruby => Some(CareerLevel::Emerald),
            CareerLevel::Emerald => Some(CareerLevel::Diamond),
            CareerLevel::Diamond => Some(CareerLevel::Crown),
            CareerLevel::Crown => None,
        }
    }

    /// Whether both legs meet this level's threshold.
    pub fn qualifies(self, left: Money, right: Money) -> bool {
        let threshold = self.threshold();
        left >= threshold && right >= threshold
    }

    /// Highest level the given legs qualify for, ignoring history.
    pub fn for_volumes(left: Money, right: Money) -> CareerLevel {
        Self::LADDER
            .iter()
            .rev()
            .copied()
            .find(|level| level.qualifies(left, right))
            .unwrap_or(CareerLevel::None)
    }
}
