//! Integration test crate for the Parla ledger.
//!
//! This crate has no library code. It only holds integration tests that
//! drive the workflows end to end over an in-memory database, crossing the
//! network, payout and workflow crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p parla-integration-tests
//! ```
