//! Database query functions organized by domain.

pub mod investments;
pub mod ledger;
pub mod referrals;
pub mod settings;
pub mod stats;
pub mod tree;
pub mod users;
pub mod volumes;
pub mod withdrawals;
