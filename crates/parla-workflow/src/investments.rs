//! Investment requests and the approval fan-out.
//!
//! Approval is the only path by which volume enters the network. Everything it
//! triggers (principal, placement, aggregation, commission, binary matches,
//! career levels) commits together or not at all.

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::investments::{self, NewInvestment};
use parla_db::queries::{ledger, tree, users};
use parla_network::placement::{self, PlacementOutcome};
use parla_network::aggregation;
use parla_payout::career::{self, CareerAdvance};
use parla_payout::{binary, commission};
use parla_types::ledger::{EntryKind, LedgerEntry, NewEntry};
use parla_types::package::PackageTier;
use parla_types::projections::InvestmentRow;
use parla_types::requests::{Investment, PayerDetails, PaymentPlatform, RequestStatus};
use parla_types::{InvestmentId, Money, UserId};

use crate::config::WorkflowConfig;
use crate::{require_admin, require_user, Result, WorkflowError};

/// Investment request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitInvestment {
    pub tier: PackageTier,
    /// Defaults to the tier's catalogue amount; may be higher, never lower.
    pub amount: Option<Money>,
    pub platform: PaymentPlatform,
    pub payer: PayerDetails,
}

/// Everything an approval wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalOutcome {
    pub investment: Investment,
    pub principal: LedgerEntry,
    /// Set when the investor was placed by this approval.
    pub placement: Option<PlacementOutcome>,
    /// Ancestors whose leg volume rose, nearest first.
    pub touched: Vec<UserId>,
    pub commission: Option<LedgerEntry>,
    pub binary_matches: Vec<LedgerEntry>,
    pub career_advances: Vec<CareerAdvance>,
}

/// File an investment request for admin review.
///
/// # Errors
///
/// - [`WorkflowError::Validation`] if `amount` is below the tier's catalogue amount
pub fn submit_investment(
    conn: &mut Connection,
    user: UserId,
    request: &SubmitInvestment,
    now: u64,
) -> Result<Investment> {
    let minimum = request.tier.amount();
    let amount = request.amount.unwrap_or(minimum);
    if amount < minimum {
        return Err(WorkflowError::Validation(format!(
            "{} requires at least {minimum}, got {amount}",
            request.tier.display_name()
        )));
    }

    parla_db::immediate(conn, |tx| {
        require_user(tx, user)?;
        let id = investments::insert(
            tx,
            &NewInvestment {
                user_id: user,
                tier: request.tier,
                amount,
                platform: request.platform,
                payer: request.payer.clone(),
                submitted_at: now,
            },
        )?;
        tracing::info!(
            user = %user,
            investment = %id,
            tier = %request.tier,
            amount = %amount,
            "investment submitted"
        );
        Ok(investments::get(tx, id)?)
    })
}

fn pending_investment(conn: &Connection, id: InvestmentId) -> Result<Investment> {
    let investment = investments::get(conn, id)?;
    if investment.status != RequestStatus::Pending {
        return Err(WorkflowError::InvalidTransition {
            what: format!("investment {id}"),
            status: investment.status,
        });
    }
    Ok(investment)
}

/// Approve a pending investment and run the full payout fan-out.
///
/// # Errors
///
/// - [`WorkflowError::Forbidden`] if `actor` is not an admin
/// - [`WorkflowError::InvalidTransition`] if the investment is not pending
/// - any placement, aggregation or payout error, after which nothing is written
pub fn approve_investment(
    conn: &mut Connection,
    config: &WorkflowConfig,
    actor: UserId,
    id: InvestmentId,
    now: u64,
) -> Result<ApprovalOutcome> {
    let policy = config.payout;
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        let pending = pending_investment(tx, id)?;
        let investor = pending.user_id;

        // Placement runs before the status flip, so the new node carries no
        // approved volume yet and aggregation below stays incremental.
        let placement = match tree::get(tx, investor)? {
            Some(_) => None,
            None => {
                let user = users::get(tx, investor)?;
                match user.sponsor_id {
                    Some(sponsor) => Some(placement::auto_place(
                        tx,
                        investor,
                        sponsor,
                        user.sponsor_preference.unwrap_or_default(),
                        policy.aggregation_depth,
                        now,
                    )?),
                    None => {
                        placement::place_root(tx, investor, now)?;
                        None
                    }
                }
            }
        };

        if !investments::decide(tx, id, RequestStatus::Approved, now)? {
            let current = investments::get(tx, id)?;
            return Err(WorkflowError::InvalidTransition {
                what: format!("investment {id}"),
                status: current.status,
            });
        }
        let investment = investments::get(tx, id)?;

        let principal = ledger::append(
            tx,
            &NewEntry {
                user_id: investor,
                kind: EntryKind::Investment,
                amount: investment.amount,
                description: format!("{} package investment", investment.tier.display_name()),
                reference: Some(commission::investment_reference(&investment)),
                created_at: now,
            },
        )?;

        let touched: Vec<UserId> = aggregation::on_investment_approved(
            tx,
            investor,
            investment.amount,
            policy.aggregation_depth,
        )?
        .into_iter()
        .map(|ancestor| ancestor.user_id)
        .collect();

        let commission = commission::pay_direct_commission(tx, &investment, now)?;
        let binary_matches = binary::evaluate_matches(tx, investor, &policy, now)?;

        let mut career_advances = Vec::new();
        for ancestor in &touched {
            career_advances.extend(career::evaluate_until_stable(tx, *ancestor, now)?);
        }

        tracing::info!(
            actor = %actor,
            investment = %id,
            user = %investor,
            amount = %investment.amount,
            placed = placement.is_some(),
            ancestors = touched.len(),
            matches = binary_matches.len(),
            careers = career_advances.len(),
            "investment approved"
        );

        Ok(ApprovalOutcome {
            investment,
            principal,
            placement,
            touched,
            commission,
            binary_matches,
            career_advances,
        })
    })
}

/// Reject a pending investment. Nothing else changes.
pub fn reject_investment(
    conn: &mut Connection,
    actor: UserId,
    id: InvestmentId,
    now: u64,
) -> Result<Investment> {
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        pending_investment(tx, id)?;
        if !investments::decide(tx, id, RequestStatus::Rejected, now)? {
            let current = investments::get(tx, id)?;
            return Err(WorkflowError::InvalidTransition {
                what: format!("investment {id}"),
                status: current.status,
            });
        }
        tracing::info!(actor = %actor, investment = %id, "investment rejected");
        Ok(investments::get(tx, id)?)
    })
}

/// A user's own investment requests, newest first.
pub fn my_investments(conn: &Connection, user: UserId) -> Result<Vec<Investment>> {
    require_user(conn, user)?;
    Ok(investments::list_for_user(conn, user)?)
}

/// All investment requests with their owners, for the admin console.
pub fn list_investment_requests(
    conn: &Connection,
    actor: UserId,
    status: Option<RequestStatus>,
) -> Result<Vec<InvestmentRow>> {
    require_admin(conn, actor)?;
    Ok(investments::list_with_users(conn, status)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin, config, register, test_db, NOW};
    use parla_db::queries::volumes;
    use crate::referrals::generate_invite;
    use parla_types::career::CareerLevel;
    use parla_types::tree::{PlacementPreference, Position};

    fn gold() -> SubmitInvestment {
        SubmitInvestment {
            tier: PackageTier::Gold,
            amount: None,
            platform: PaymentPlatform::Iban,
            payer: PayerDetails::default(),
        }
    }

    #[test]
    fn test_submit_defaults_amount() {
        let mut conn = test_db();
        let u = register(&mut conn, "u", None);
        let inv = submit_investment(&mut conn, u, &gold(), NOW).expect("submit");
        assert_eq!(inv.amount, Money::from_dollars(500));
        assert_eq!(inv.status, RequestStatus::Pending);
        assert!(!inv.processed);

        let low = SubmitInvestment {
            amount: Some(Money::from_dollars(100)),
            ..gold()
        };
        assert!(matches!(
            submit_investment(&mut conn, u, &low, NOW),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_approval_fan_out() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let sponsor = register(&mut conn, "sponsor", None);
        let code = users::get(&conn, sponsor).expect("sponsor").referral_code;
        let joiner = register(&mut conn, "joiner", Some(&code));

        let inv = submit_investment(&mut conn, joiner, &gold(), NOW).expect("submit");
        let outcome = approve_investment(&mut conn, &cfg, boss, inv.id, NOW + 1).expect("approve");

        assert_eq!(outcome.investment.status, RequestStatus::Approved);
        assert!(outcome.investment.processed);
        assert_eq!(outcome.principal.amount, Money::from_dollars(500));

        let placed = outcome.placement.expect("placed under sponsor");
        assert_eq!(placed.upline_id, sponsor);
        assert_eq!(placed.position, Position::Left);
        assert!(tree::get(&conn, sponsor).expect("tree").expect("sponsor root").is_root());

        assert_eq!(outcome.touched, vec![sponsor]);
        let commission = outcome.commission.expect("commission");
        assert_eq!(commission.user_id, sponsor);
        assert_eq!(commission.amount, Money::from_dollars(50));
        assert!(outcome.binary_matches.is_empty());
        assert!(outcome.career_advances.is_empty());

        let agg = volumes::get(&conn, sponsor).expect("agg");
        assert_eq!(agg.left_volume, Money::from_dollars(500));
        assert_eq!(ledger::principal(&conn, joiner).expect("principal"), Money::from_dollars(500));
    }

    #[test]
    fn test_root_investor() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let solo = register(&mut conn, "solo", None);
        let inv = submit_investment(&mut conn, solo, &gold(), NOW).expect("submit");
        let outcome = approve_investment(&mut conn, &cfg, boss, inv.id, NOW).expect("approve");

        assert!(outcome.placement.is_none());
        assert!(tree::get(&conn, solo).expect("tree").expect("placed").is_root());
        assert!(outcome.commission.is_none());
        assert!(outcome.touched.is_empty());
    }

    #[test]
    fn test_double_approval_refused() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let u = register(&mut conn, "u", None);
        let inv = submit_investment(&mut conn, u, &gold(), NOW).expect("submit");
        approve_investment(&mut conn, &cfg, boss, inv.id, NOW).expect("approve");

        assert!(matches!(
            approve_investment(&mut conn, &cfg, boss, inv.id, NOW),
            Err(WorkflowError::InvalidTransition { status: RequestStatus::Approved, .. })
        ));
        assert!(matches!(
            reject_investment(&mut conn, boss, inv.id, NOW),
            Err(WorkflowError::InvalidTransition { .. })
        ));
        assert_eq!(ledger::principal(&conn, u).expect("principal"), Money::from_dollars(500));
    }

    #[test]
    fn test_non_admin_cannot_approve() {
        let mut conn = test_db();
        let cfg = config();
        let u = register(&mut conn, "u", None);
        let inv = submit_investment(&mut conn, u, &gold(), NOW).expect("submit");
        assert!(matches!(
            approve_investment(&mut conn, &cfg, u, inv.id, NOW),
            Err(WorkflowError::Forbidden(_))
        ));
        assert_eq!(
            investments::get(&conn, inv.id).expect("reload").status,
            RequestStatus::Pending
        );
        assert!(tree::get(&conn, u).expect("tree").is_none());
    }

    #[test]
    fn test_reject_changes_nothing_else() {
        let mut conn = test_db();
        let boss = admin(&mut conn, "boss");
        let u = register(&mut conn, "u", None);
        let inv = submit_investment(&mut conn, u, &gold(), NOW).expect("submit");
        let rejected = reject_investment(&mut conn, boss, inv.id, NOW + 3).expect("reject");
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.decided_at, Some(NOW + 3));
        assert!(!rejected.processed);
        assert!(ledger::principal(&conn, u).expect("principal").is_zero());
        assert!(tree::get(&conn, u).expect("tree").is_none());
    }

    #[test]
    fn test_career_reached_through_approvals() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let top = register(&mut conn, "top", None);

        // Five platinum investors down each outer edge: $5,000 per leg.
        for i in 0..10 {
            let side = if i % 2 == 0 {
                PlacementPreference::Left
            } else {
                PlacementPreference::Right
            };
            let invite = generate_invite(&mut conn, &cfg, top, side, NOW).expect("invite");
            let u = register(&mut conn, &format!("member{i}"), Some(&invite.code));
            let platinum = SubmitInvestment {
                tier: PackageTier::Platinum,
                ..gold()
            };
            let inv = submit_investment(&mut conn, u, &platinum, NOW).expect("submit");
            approve_investment(&mut conn, &cfg, boss, inv.id, NOW).expect("approve");
        }

        let agg = volumes::get(&conn, top).expect("agg");
        assert_eq!(agg.left_volume, Money::from_dollars(5_000));
        assert_eq!(agg.right_volume, Money::from_dollars(5_000));
        assert_eq!(agg.career_level, CareerLevel::Amethyst);
        assert_eq!(
            ledger::total_of_kind(&conn, top, EntryKind::CareerReward).expect("rewards"),
            Money::from_dollars(500)
        );
        assert_eq!(agg.paid_match_units, 5);
    }

    #[test]
    fn test_lists() {
        let mut conn = test_db();
        let boss = admin(&mut conn, "boss");
        let u = register(&mut conn, "u", None);
        submit_investment(&mut conn, u, &gold(), NOW).expect("first");
        submit_investment(&mut conn, u, &gold(), NOW + 1).expect("second");

        assert_eq!(my_investments(&conn, u).expect("mine").len(), 2);
        let rows = list_investment_requests(&conn, boss, Some(RequestStatus::Pending))
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_name, "u");
        assert!(matches!(
            list_investment_requests(&conn, u, None),
            Err(WorkflowError::Forbidden(_))
        ));
    }
}
