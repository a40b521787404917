//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use rusqlite::Connection;
use zeroize::Zeroizing;

use parla_db::queries::users;
use parla_types::package::PackageTier;
use parla_types::requests::{PayerDetails, PaymentPlatform};
use parla_types::{Money, UserId};
use parla_workflow::accounts::{self, NewAccount, Registered};
use parla_workflow::investments::{self, ApprovalOutcome, SubmitInvestment};
use parla_workflow::{HashingParams, WorkflowConfig};

/// Wednesday 2026-10-14 12:00 UTC, ISO week `2026-W42`.
pub const NOW: u64 = 1_791_979_200;

pub const WEEK: u64 = 7 * 24 * 60 * 60;

pub fn dollars(d: i64) -> Money {
    Money::from_dollars(d)
}

/// Cheap Argon2 parameters. The first registered account becomes admin.
pub fn config() -> WorkflowConfig {
    WorkflowConfig {
        hashing: HashingParams {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        },
        ..WorkflowConfig::default()
    }
}

pub fn open() -> Connection {
    parla_db::open_memory().expect("open memory db")
}

pub fn account(name: &str, referral_code: Option<&str>) -> NewAccount {
    NewAccount {
        email: format!("{name}@example.com"),
        name: name.to_string(),
        password: Zeroizing::new(format!("{name}-password")),
        referral_code: referral_code.map(str::to_string),
    }
}

pub fn register_full(conn: &mut Connection, name: &str, referral_code: Option<&str>) -> Registered {
    accounts::register(conn, &config(), &account(name, referral_code), NOW).expect("register")
}

pub fn register(conn: &mut Connection, name: &str, referral_code: Option<&str>) -> UserId {
    register_full(conn, name, referral_code).user.id
}

pub fn referral_code(conn: &Connection, user: UserId) -> String {
    users::get(conn, user).expect("user").referral_code
}

/// Submit and approve an investment in one go.
pub fn invest(
    conn: &mut Connection,
    admin: UserId,
    user: UserId,
    tier: PackageTier,
    amount: Option<Money>,
) -> ApprovalOutcome {
    invest_with(conn, &config(), admin, user, tier, amount)
}

pub fn invest_with(
    conn: &mut Connection,
    cfg: &WorkflowConfig,
    admin: UserId,
    user: UserId,
    tier: PackageTier,
    amount: Option<Money>,
) -> ApprovalOutcome {
    let request = SubmitInvestment {
        tier,
        amount,
        platform: PaymentPlatform::TetherTrc20,
        payer: PayerDetails::default(),
    };
    let investment =
        investments::submit_investment(conn, user, &request, NOW).expect("submit investment");
    investments::approve_investment(conn, cfg, admin, investment.id, NOW)
        .expect("approve investment")
}
