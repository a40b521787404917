//! Admin placement and self-service network joining.
//!
//! A placement that moves volume re-aggregates two ancestor chains. Binary
//! matches are then evaluated on every node within `max_binary_depth` of the
//! moved node on either chain, and career levels on every node whose cached
//! legs changed. Both only ratchet up, so a move that lowers a leg pays nothing
//! and claws nothing back.

use rusqlite::Connection;
use serde::Serialize;

use parla_db::queries::{tree, users};
use parla_network::placement::{self, PlacementMode, PlacementOutcome};
use parla_network::NetworkError;
use parla_payout::binary;
use parla_payout::career::{self, CareerAdvance};
use parla_types::ledger::LedgerEntry;
use parla_types::tree::{Position, TreeNode};
use parla_types::UserId;

use crate::config::WorkflowConfig;
use crate::{require_admin, require_user, Result};

/// A placement together with the payouts it unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementReport {
    pub placement: PlacementOutcome,
    pub binary_matches: Vec<LedgerEntry>,
    pub career_advances: Vec<CareerAdvance>,
}

/// Where a user landed after joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedNetwork {
    pub node: TreeNode,
    /// Absent when the user became a root.
    pub report: Option<PlacementReport>,
}

fn settle(
    conn: &Connection,
    config: &WorkflowConfig,
    placement: PlacementOutcome,
    now: u64,
) -> Result<PlacementReport> {
    let previous_upline = placement.previous.and_then(|node| node.upline_id);
    let binary_matches = binary::evaluate_moved(
        conn,
        placement.user_id,
        previous_upline,
        &config.payout,
        now,
    )?;
    let mut career_advances = Vec::new();
    for node in &placement.reaggregated {
        career_advances.extend(career::evaluate_until_stable(conn, *node, now)?);
    }
    Ok(PlacementReport {
        placement,
        binary_matches,
        career_advances,
    })
}

/// Place `user` into `upline`'s `position` slot on behalf of an admin.
///
/// With `replace` set an already placed user moves, taking their whole subtree
/// along; otherwise the user must be unplaced.
///
/// # Errors
///
/// - [`crate::WorkflowError::Forbidden`] if `actor` is not an admin
/// - [`crate::WorkflowError::Network`] for any placement rule violation
#[allow(clippy::too_many_arguments)]
pub fn place_user(
    conn: &mut Connection,
    config: &WorkflowConfig,
    actor: UserId,
    user: UserId,
    upline: UserId,
    position: Position,
    replace: bool,
    now: u64,
) -> Result<PlacementReport> {
    let mode = if replace {
        PlacementMode::Replace
    } else {
        PlacementMode::Initial
    };
    parla_db::immediate(conn, |tx| {
        require_admin(tx, actor)?;
        let outcome = placement::place(
            tx,
            user,
            upline,
            position,
            mode,
            config.payout.aggregation_depth,
            now,
        )?;
        let report = settle(tx, config, outcome, now)?;
        tracing::info!(
            actor = %actor,
            user = %user,
            upline = %upline,
            position = %position,
            replace,
            moved = %report.placement.moved_volume,
            matches = report.binary_matches.len(),
            "user placed by admin"
        );
        Ok(report)
    })
}

/// Auto-place an unplaced user under their sponsor, or as a root when they
/// have none.
///
/// # Errors
///
/// - [`NetworkError::AlreadyPlaced`] if the user already has a tree node
pub fn join_network(
    conn: &mut Connection,
    config: &WorkflowConfig,
    user: UserId,
    now: u64,
) -> Result<JoinedNetwork> {
    parla_db::immediate(conn, |tx| {
        require_user(tx, user)?;
        if tree::get(tx, user)?.is_some() {
            return Err(NetworkError::AlreadyPlaced(user).into());
        }
        let summary = users::get(tx, user)?;
        let report = match summary.sponsor_id {
            Some(sponsor) => {
                let outcome = placement::auto_place(
                    tx,
                    user,
                    sponsor,
                    summary.sponsor_preference.unwrap_or_default(),
                    config.payout.aggregation_depth,
                    now,
                )?;
                Some(settle(tx, config, outcome, now)?)
            }
            None => {
                placement::place_root(tx, user, now)?;
                None
            }
        };
        let node = tree::get(tx, user)?.ok_or_else(|| {
            NetworkError::Corrupted(format!("user {user} vanished after placement"))
        })?;
        tracing::info!(user = %user, upline = ?node.upline_id, "user joined network");
        Ok(JoinedNetwork { node, report })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investments::{approve_investment, submit_investment, SubmitInvestment};
    use crate::test_support::{admin, config, register, test_db, NOW};
    use crate::{ErrorKind, WorkflowError};
    use parla_db::queries::volumes;
    use parla_types::package::PackageTier;
    use parla_types::requests::{PayerDetails, PaymentPlatform};
    use parla_types::Money;

    fn invest(conn: &mut Connection, boss: UserId, user: UserId) {
        let request = SubmitInvestment {
            tier: PackageTier::Platinum,
            amount: None,
            platform: PaymentPlatform::Iban,
            payer: PayerDetails::default(),
        };
        let investment = submit_investment(conn, user, &request, NOW).expect("submit");
        approve_investment(conn, &config(), boss, investment.id, NOW).expect("approve");
    }

    #[test]
    fn test_replacement_pays_new_match() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let r = register(&mut conn, "r", None);
        let a = register(&mut conn, "a", None);
        let b = register(&mut conn, "b", None);

        place_user(&mut conn, &cfg, boss, a, r, Position::Left, false, NOW).expect("a");
        place_user(&mut conn, &cfg, boss, b, a, Position::Left, false, NOW).expect("b");
        invest(&mut conn, boss, a);
        invest(&mut conn, boss, b);

        let before = volumes::get(&conn, r).expect("r");
        assert_eq!(before.left_volume, Money::from_dollars(2_000));
        assert_eq!(before.right_volume, Money::ZERO);

        let moved = place_user(&mut conn, &cfg, boss, b, r, Position::Right, true, NOW + 1)
            .expect("move");
        assert_eq!(moved.placement.moved_volume, Money::from_dollars(1_000));
        assert!(moved.placement.reaggregated.contains(&a));
        assert!(moved.placement.reaggregated.contains(&r));
        assert_eq!(moved.binary_matches.len(), 1);
        assert_eq!(moved.binary_matches[0].user_id, r);
        assert_eq!(moved.binary_matches[0].amount, Money::from_dollars(100));

        let after = volumes::get(&conn, r).expect("r");
        assert_eq!(after.left_volume, Money::from_dollars(1_000));
        assert_eq!(after.right_volume, Money::from_dollars(1_000));
        assert_eq!(after.paid_match_units, 1);
        assert_eq!(volumes::get(&conn, a).expect("a").left_volume, Money::ZERO);
    }

    #[test]
    fn test_place_user_rules() {
        let mut conn = test_db();
        let cfg = config();
        let boss = admin(&mut conn, "boss");
        let r = register(&mut conn, "r", None);
        let a = register(&mut conn, "a", None);

        let denied = place_user(&mut conn, &cfg, a, a, r, Position::Left, false, NOW);
        assert!(matches!(denied, Err(WorkflowError::Forbidden(_))));
        assert!(tree::get(&conn, r).expect("tree").is_none());

        place_user(&mut conn, &cfg, boss, a, r, Position::Left, false, NOW).expect("place");
        let again = place_user(&mut conn, &cfg, boss, a, r, Position::Right, false, NOW);
        assert!(matches!(
            again,
            Err(WorkflowError::Network(NetworkError::AlreadyPlaced(_)))
        ));

        let cyclic = place_user(&mut conn, &cfg, boss, r, a, Position::Left, true, NOW)
            .expect_err("cycle");
        assert_eq!(cyclic.kind(), ErrorKind::Placement);
    }

    #[test]
    fn test_join_network() {
        let mut conn = test_db();
        let cfg = config();
        let sponsor = register(&mut conn, "sponsor", None);
        let code = users::get(&conn, sponsor).expect("sponsor").referral_code;
        let first = register(&mut conn, "first", Some(&code));
        let second = register(&mut conn, "second", Some(&code));

        let joined = join_network(&mut conn, &cfg, first, NOW).expect("join");
        assert_eq!(joined.node.upline_id, Some(sponsor));
        assert_eq!(joined.node.position, Some(Position::Left));
        assert!(tree::get(&conn, sponsor).expect("tree").is_some_and(|n| n.is_root()));

        let joined = join_network(&mut conn, &cfg, second, NOW).expect("join");
        assert_eq!(joined.node.position, Some(Position::Right));

        assert!(matches!(
            join_network(&mut conn, &cfg, first, NOW),
            Err(WorkflowError::Network(NetworkError::AlreadyPlaced(_)))
        ));
    }

    #[test]
    fn test_join_without_sponsor_becomes_root() {
        let mut conn = test_db();
        let loner = register(&mut conn, "loner", None);
        let joined = join_network(&mut conn, &config(), loner, NOW).expect("join");
        assert!(joined.node.is_root());
        assert!(joined.report.is_none());
    }
}
