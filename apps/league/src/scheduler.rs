//! # Weekly Scheduler
//!
//! Background task that runs the reset shortly after every cycle boundary.
//!
//! Errors are logged and never propagate. A failed run is retried every
//! `RETRY_BACKOFF` until it succeeds or the reset marker shows the cycle
//! closed. Retries stop at the next boundary: the cohorts of a week that
//! never closed are left in place, and their members are self-healed into
//! the lowest tier on their next read.

use crate::api::AppState;
use chrono::{DateTime, Utc};
use league_core::{LeagueError, ResetReport, next_cycle_start};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delay after the boundary before the reset runs.
const RESET_GRACE: Duration = Duration::from_secs(1);

/// Delay between attempts after a failed run.
const RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Start the scheduler loop.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_cycle_start(&now);
            let wait = (next - now).to_std().unwrap_or_default() + RESET_GRACE;
            tracing::info!(next_reset = %next, wait_secs = wait.as_secs(), "Weekly reset scheduled");

            tokio::time::sleep(wait).await;
            run_with_retry(&state, next_cycle_start(&Utc::now())).await;
        }
    })
}

/// Attempt the reset until it is done or `deadline` would be passed.
async fn run_with_retry(state: &AppState, deadline: DateTime<Utc>) {
    let mut attempt: u32 = 1;
    loop {
        let outcome = trigger_reset(state).await;
        if matches!(outcome, Ok(_) | Err(LeagueError::AlreadyReset(_))) {
            return;
        }

        let retry_at = Utc::now()
            + chrono::Duration::from_std(RETRY_BACKOFF).unwrap_or_else(|_| chrono::Duration::zero());
        if retry_at >= deadline {
            tracing::error!(attempts = attempt, "Weekly reset abandoned until the next boundary");
            return;
        }
        tracing::warn!(
            attempt,
            retry_in_secs = RETRY_BACKOFF.as_secs(),
            "Weekly reset will be retried"
        );
        tokio::time::sleep(RETRY_BACKOFF).await;
        attempt = attempt.saturating_add(1);
    }
}

/// Run the reset for the boundary that just passed.
///
/// Failures are logged with context and handed back for the retry loop.
pub async fn trigger_reset(state: &AppState) -> Result<ResetReport, LeagueError> {
    let mut session = state.session.write().await;
    match session.run_reset(Utc::now()) {
        Ok(report) => {
            tracing::info!(
                closing_cycle = %report.closing_cycle,
                members = report.members_processed,
                promoted = report.promoted,
                demoted = report.demoted,
                locked_out = report.locked_out,
                readmitted = report.readmitted,
                "Scheduled weekly reset complete"
            );
            Ok(report)
        }
        Err(LeagueError::AlreadyReset(closed)) => {
            tracing::info!(closed = %closed, "Weekly reset already done");
            Err(LeagueError::AlreadyReset(closed))
        }
        Err(e) => {
            tracing::error!(error = %e, "Scheduled weekly reset failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use league_core::{Session, Tier};

    #[tokio::test]
    async fn failed_reset_is_reported_not_raised() {
        // no tiers seeded
        let state = AppState::new(Session::new());
        let err = trigger_reset(&state).await.expect_err("no tiers");
        assert!(matches!(err, LeagueError::NoTiers));
    }

    #[tokio::test]
    async fn second_trigger_in_same_cycle_is_refused() {
        let mut session = Session::new();
        session
            .seed_tiers(&[Tier::new("Bronze", "images/bronze.png", 0)])
            .expect("seed");
        let state = AppState::new(session);

        assert!(trigger_reset(&state).await.is_ok());
        let err = trigger_reset(&state).await.expect_err("already done");
        assert!(matches!(err, LeagueError::AlreadyReset(_)));
    }

    #[tokio::test]
    async fn retry_gives_up_at_the_deadline() {
        let state = AppState::new(Session::new());
        // deadline already inside the backoff window: one attempt, no sleep
        run_with_retry(&state, Utc::now()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_once_the_cycle_is_closed() {
        let state = AppState::new(Session::new());
        let deadline = Utc::now() + chrono::Duration::hours(1);
        let seeder = {
            let state = state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(RETRY_BACKOFF / 2).await;
                state
                    .session
                    .write()
                    .await
                    .seed_tiers(&[Tier::new("Bronze", "images/bronze.png", 0)])
                    .expect("seed");
            })
        };

        run_with_retry(&state, deadline).await;
        seeder.await.expect("seeder");

        let err = trigger_reset(&state).await.expect_err("closed by the retry");
        assert!(matches!(err, LeagueError::AlreadyReset(_)));
    }
}
