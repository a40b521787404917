//! # parla-types
//!
//! Shared domain types used across the Parla workspace: identifiers, fixed-point
//! money, the package catalogue, tree positions, the career ladder, ledger entries,
//! approval requests, read projections and daemon events.

use serde::{Deserialize, Serialize};

pub use money::Money;

/// Cents per dollar.
pub const CENTS_PER_DOLLAR: i64 = 100;

/// Denominator for basis-point rates (100% = 10,000 bps).
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Weekly fixed profit rate on principal (5%).
pub const WEEKLY_PROFIT_BPS: u32 = 500;

/// Volume each leg must accumulate for one binary match.
pub const DEFAULT_MATCH_UNIT: Money = Money::from_dollars(1_000);

/// Payout per binary match unit.
pub const DEFAULT_MATCH_PAYOUT: Money = Money::from_dollars(100);

/// Maximum ancestor depth eligible for binary-match payouts.
pub const MAX_BINARY_DEPTH: u32 = 11;

/// Lifetime of a single-use referral invite (10 minutes).
pub const INVITE_TTL_SECS: u64 = 10 * 60;

/// Default depth of the network tree projection.
pub const TREE_VIEW_DEPTH: u32 = 5;

/// Number of ledger entries shown on the dashboard.
pub const RECENT_ENTRIES_LIMIT: u32 = 10;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// A user account (and its tree node, which shares the id).
    UserId
);
row_id!(
    /// An investment request.
    InvestmentId
);
row_id!(
    /// A withdrawal request.
    WithdrawalId
);
row_id!(
    /// A ledger entry.
    EntryId
);

/// Errors produced when parsing wire or database representations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A string did not name any variant of the expected enum.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant {
        /// The enum being parsed.
        kind: &'static str,
        /// The offending input.
        value: String,
    },

    /// A monetary amount could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum from one table.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire and database representation.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::ParseError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod account;
pub mod career;
pub mod events;
pub mod ledger;
pub mod money;
pub mod package;
pub mod projections;
pub mod requests;
pub mod tree;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_display() {
        assert_eq!(UserId(42).to_string(), "42");
        assert_eq!(
            serde_json::to_string(&InvestmentId(7)).expect("serialize"),
            "7"
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DEFAULT_MATCH_UNIT.cents(), 100_000);
        assert_eq!(DEFAULT_MATCH_PAYOUT.cents(), 10_000);
        assert_eq!(MAX_BINARY_DEPTH, 11);
    }

    #[test]
    #[ignore] // Run manually to generate bindings
    fn export_ts_bindings() {
        use ts_rs::TS;
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bindings");
        std::fs::create_dir_all(&dir).expect("create bindings dir");
        crate::package::PackageTier::export_all_to(&dir).expect("export");
        crate::tree::Position::export_all_to(&dir).expect("export");
        crate::career::CareerLevel::export_all_to(&dir).expect("export");
        crate::ledger::EntryKind::export_all_to(&dir).expect("export");
        crate::requests::RequestStatus::export_all_to(&dir).expect("export");
        crate::events::EventType::export_all_to(&dir).expect("export");
    }
}
