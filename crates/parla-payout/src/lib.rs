//! # parla-payout
//!
//! Payout engines. Every payout is a ledger entry keyed so that it can be
//! written at most once.
//!
//! | Payout        | Reference key          | Trigger                     |
//! |---------------|------------------------|-----------------------------|
//! | Commission    | `investment:<id>`      | investment approval         |
//! | Binary match  | `units:<from>-<to>`    | ancestor leg volume change  |
//! | Career reward | level name             | both legs cross a threshold |
//! | Weekly profit | ISO week (`2026-W42`)  | admin trigger or scheduler  |
//!
//! ## Modules
//!
//! - [`commission`] — Direct-referral commission to the tree parent
//! - [`binary`] — Binary-match watermark payouts
//! - [`weekly`] — Batched, per-week idempotent profit distribution
//! - [`career`] — Career ladder evaluation

pub mod binary;
pub mod career;
pub mod commission;
pub mod weekly;

use serde::{Deserialize, Serialize};

use parla_db::DbError;
use parla_network::{AggregationDepth, NetworkError};
use parla_types::{
    Money, UserId, DEFAULT_MATCH_PAYOUT, DEFAULT_MATCH_UNIT, MAX_BINARY_DEPTH, WEEKLY_PROFIT_BPS,
};

/// Error types for payout operations.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// Arithmetic overflow.
    #[error("arithmetic overflow in payout calculation")]
    Overflow,

    /// A policy value is out of range.
    #[error("invalid payout policy: {0}")]
    InvalidPolicy(String),

    /// A ratchet column moved underneath the evaluator.
    #[error("aggregate for user {0} changed during evaluation")]
    RatchetConflict(UserId),

    /// The week key could not be derived from the timestamp.
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(u64),

    /// Tree walk failure.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Ledger store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Convenience result type for payout operations.
pub type Result<T> = std::result::Result<T, PayoutError>;

fn default_match_unit_cents() -> i64 {
    DEFAULT_MATCH_UNIT.cents()
}

fn default_match_payout_cents() -> i64 {
    DEFAULT_MATCH_PAYOUT.cents()
}

fn default_max_binary_depth() -> u32 {
    MAX_BINARY_DEPTH
}

fn default_weekly_profit_bps() -> u32 {
    WEEKLY_PROFIT_BPS
}

fn default_weekly_batch_size() -> u32 {
    100
}

/// Tunable payout parameters. Loaded from the `[payout]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPolicy {
    /// Volume each leg must accumulate per binary match.
    #[serde(default = "default_match_unit_cents")]
    pub match_unit_cents: i64,
    /// Payout per binary match unit.
    #[serde(default = "default_match_payout_cents")]
    pub match_payout_cents: i64,
    /// Levels below a node whose volume counts toward its binary legs.
    #[serde(default = "default_max_binary_depth")]
    pub max_binary_depth: u32,
    /// How far investment volume propagates.
    #[serde(default)]
    pub aggregation_depth: AggregationDepth,
    /// Weekly profit rate on principal.
    #[serde(default = "default_weekly_profit_bps")]
    pub weekly_profit_bps: u32,
    /// Users credited per weekly-distribution transaction.
    #[serde(default = "default_weekly_batch_size")]
    pub weekly_batch_size: u32,
}

impl Default for PayoutPolicy {
    fn default() -> Self {
        Self {
            match_unit_cents: default_match_unit_cents(),
            match_payout_cents: default_match_payout_cents(),
            max_binary_depth: default_max_binary_depth(),
            aggregation_depth: AggregationDepth::default(),
            weekly_profit_bps: default_weekly_profit_bps(),
            weekly_batch_size: default_weekly_batch_size(),
        }
    }
}

impl PayoutPolicy {
    pub fn match_unit(&self) -> Money {
        Money::from_cents(self.match_unit_cents)
    }

    pub fn match_payout(&self) -> Money {
        Money::from_cents(self.match_payout_cents)
    }

    /// Reject values that would make the engines misbehave.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidPolicy`] for a non-positive match unit or payout,
    ///   a zero batch size, or a weekly rate above 100%
    pub fn validate(&self) -> Result<()> {
        if self.match_unit_cents <= 0 {
            return Err(PayoutError::InvalidPolicy("match_unit_cents must be positive".into()));
        }
        if self.match_payout_cents <= 0 {
            return Err(PayoutError::InvalidPolicy("match_payout_cents must be positive".into()));
        }
        if self.weekly_batch_size == 0 {
            return Err(PayoutError::InvalidPolicy("weekly_batch_size must be at least 1".into()));
        }
        if i64::from(self.weekly_profit_bps) > parla_types::BPS_DENOMINATOR {
            return Err(PayoutError::InvalidPolicy(format!(
                "weekly_profit_bps {} exceeds 100%",
                self.weekly_profit_bps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = PayoutPolicy::default();
        assert_eq!(policy.match_unit(), Money::from_dollars(1_000));
        assert_eq!(policy.match_payout(), Money::from_dollars(100));
        assert_eq!(policy.max_binary_depth, 11);
        assert_eq!(policy.aggregation_depth, AggregationDepth::Unbounded);
        assert_eq!(policy.weekly_profit_bps, 500);
        assert_eq!(policy.weekly_batch_size, 100);
        policy.validate().expect("defaults are valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let policy: PayoutPolicy = toml::from_str(
            r#"
            weekly_batch_size = 25
            aggregation_depth = { limited = 20 }
            "#,
        )
        .expect("parse");
        assert_eq!(policy.weekly_batch_size, 25);
        assert_eq!(policy.aggregation_depth, AggregationDepth::Limited(20));
        assert_eq!(policy.match_unit_cents, 100_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_unit = PayoutPolicy {
            match_unit_cents: 0,
            ..PayoutPolicy::default()
        };
        assert!(matches!(zero_unit.validate(), Err(PayoutError::InvalidPolicy(_))));

        let greedy = PayoutPolicy {
            weekly_profit_bps: 10_001,
            ..PayoutPolicy::default()
        };
        assert!(greedy.validate().is_err());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the engine tests.

    use rusqlite::Connection;

    use parla_db::queries::investments::{self, NewInvestment};
    use parla_db::queries::ledger;
    use parla_db::queries::users::{self, NewUser};
    use parla_db::queries::volumes;
    use parla_types::ledger::{EntryKind, NewEntry};
    use parla_types::package::PackageTier;
    use parla_types::requests::{Investment, PayerDetails, PaymentPlatform, RequestStatus};
    use parla_types::{Money, UserId};

    pub fn test_db() -> Connection {
        parla_db::open_memory().expect("open test db")
    }

    pub fn user(conn: &Connection, name: &str) -> UserId {
        let id = users::insert(
            conn,
            &NewUser {
                email: format!("{name}@example.com"),
                name: name.to_string(),
                password_hash: "$argon2id$stub".to_string(),
                referral_code: format!("code-{name}"),
                sponsor_id: None,
                sponsor_preference: None,
                created_at: 1_000,
            },
        )
        .expect("insert user");
        volumes::insert_empty(conn, id).expect("insert aggregate");
        id
    }

    /// Insert an investment and mark it approved, without any fan-out.
    pub fn approved_investment(
        conn: &Connection,
        user_id: UserId,
        tier: PackageTier,
        amount: Money,
    ) -> Investment {
        let id = investments::insert(
            conn,
            &NewInvestment {
                user_id,
                tier,
                amount,
                platform: PaymentPlatform::TetherTrc20,
                payer: PayerDetails::default(),
                submitted_at: 1_000,
            },
        )
        .expect("insert investment");
        investments::decide(conn, id, RequestStatus::Approved, 1_000).expect("approve");
        investments::get(conn, id).expect("reload")
    }

    /// Record principal for `user_id` directly on the ledger.
    pub fn principal(conn: &Connection, user_id: UserId, amount: Money, reference: &str) {
        ledger::append(
            conn,
            &NewEntry {
                user_id,
                kind: EntryKind::Investment,
                amount,
                description: "principal".to_string(),
                reference: Some(reference.to_string()),
                created_at: 1_000,
            },
        )
        .expect("append principal");
    }
}
