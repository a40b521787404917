//! Background weekly profit distribution.
//!
//! The scheduler wakes every `check_interval_secs` and distributes once per
//! ISO week. Idempotence lives in the ledger, so a restart mid-week or an
//! admin-triggered run in the same week credits nobody twice.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use parla_db::queries::settings;
use parla_payout::weekly::{self, WeeklyDistribution};
use parla_payout::PayoutError;
use parla_types::events::EventType;

use crate::DaemonState;

/// Run forever; never returns when auto distribution is disabled either.
pub async fn run(state: Arc<DaemonState>) {
    let schedule = &state.config.schedule;
    if !schedule.auto_weekly_distribution {
        info!("automatic weekly distribution disabled");
        std::future::pending::<()>().await;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(schedule.check_interval_secs.max(1)));
    loop {
        ticker.tick().await;
        if let Err(e) = tick(&state, crate::unix_now()).await {
            warn!(error = %e, "scheduled weekly distribution failed");
        }
    }
}

/// Distribute if the week containing `now` has not been run yet.
pub async fn tick(
    state: &DaemonState,
    now: u64,
) -> Result<Option<WeeklyDistribution>, PayoutError> {
    let week = weekly::week_key(now)?;
    let mut db = state.db.lock().await;
    let last = settings::get_opt(&db, settings::LAST_WEEKLY_DISTRIBUTION)?;
    if last.as_deref() == Some(week.as_str()) {
        return Ok(None);
    }

    info!(week = %week, "running scheduled weekly distribution");
    let outcome = weekly::distribute_weekly_profit(&mut db, now, &state.config.payout)?;
    drop(db);
    crate::emit(state, EventType::WeeklyProfitDistributed, &outcome);
    Ok(Some(outcome))
}
