//! # parla-network
//!
//! The binary placement network: who sits under whom, on which leg, and how
//! much approved volume each leg carries.
//!
//! ## Modules
//!
//! - [`index`] — Ancestor walks and leg lookup over `tree_nodes`
//! - [`placement`] — Placement, re-placement and spillover
//! - [`aggregation`] — Upward volume propagation, rebuild and verification
//! - [`view`] — Recursive tree projection for dashboards

pub mod aggregation;
pub mod index;
pub mod placement;
pub mod view;

use serde::{Deserialize, Serialize};

use parla_db::DbError;
use parla_types::tree::Position;
use parla_types::UserId;

/// Error types for network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A referenced user does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A user cannot be placed under themselves.
    #[error("user {0} cannot be placed under themselves")]
    SelfPlacement(UserId),

    /// The target upline sits inside the subtree being moved.
    #[error("placing user {user} under {upline} would create a cycle")]
    CyclicPlacement {
        /// The user being moved.
        user: UserId,
        /// The requested upline, a descendant of `user`.
        upline: UserId,
    },

    /// The slot already has an occupant.
    #[error("slot {position} under user {upline} is occupied")]
    SlotOccupied {
        /// Owner of the slot.
        upline: UserId,
        /// Which leg.
        position: Position,
    },

    /// Initial placement of a user who already has a tree node.
    #[error("user {0} is already placed")]
    AlreadyPlaced(UserId),

    /// The user has no tree node.
    #[error("user {0} is not placed")]
    NotPlaced(UserId),

    /// The stored tree violates an invariant (dangling upline, cycle).
    #[error("network corrupted: {0}")]
    Corrupted(String),

    /// Arithmetic overflow in volume accumulation.
    #[error("arithmetic overflow in volume aggregation")]
    Overflow,

    /// Ledger store failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Convenience result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// How far up the tree an investment's volume travels.
///
/// Depth 1 is the investor's direct upline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationDepth {
    /// Every ancestor up to the root.
    #[default]
    Unbounded,
    /// Only the first `n` ancestors.
    Limited(u32),
}

impl AggregationDepth {
    /// Whether an ancestor at `depth` receives volume.
    pub fn reaches(self, depth: u32) -> bool {
        match self {
            AggregationDepth::Unbounded => true,
            AggregationDepth::Limited(n) => depth <= n,
        }
    }

    /// Depth limit for a subtree query, where `cap` bounds the unbounded case.
    pub fn subtree_limit(self, cap: u64) -> u64 {
        match self {
            AggregationDepth::Unbounded => cap,
            AggregationDepth::Limited(n) => u64::from(n).min(cap),
        }
    }
}
