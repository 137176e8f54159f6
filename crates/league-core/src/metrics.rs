//! # League Metrics
//!
//! Counts for status reporting. Informational only: nothing in the engine
//! reads them back.

use crate::cycle::current_cycle_date;
use crate::store::LeagueStore;
use crate::LeagueError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the league state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueMetrics {
    pub tier_count: usize,
    pub user_count: usize,
    /// Users holding a tier.
    pub active_users: usize,
    pub locked_out_users: usize,
    /// Cohorts of the cycle containing `now`.
    pub current_cohorts: usize,
    /// Cohorts of any cycle still in the store.
    pub total_cohorts: usize,
    pub current_placements: usize,
    pub outcome_count: usize,
    pub current_cycle: NaiveDate,
    pub last_reset: Option<NaiveDate>,
}

impl LeagueMetrics {
    /// Compute metrics from a store at `now`.
    pub fn from_store(store: &dyn LeagueStore, now: DateTime<Utc>) -> Result<Self, LeagueError> {
        let current_cycle = current_cycle_date(&now);
        let users = store.users()?;
        let active_users = users.iter().filter(|u| !u.is_locked_out()).count();
        let cohorts = store.cohorts()?;

        let mut current_cohorts = 0;
        let mut current_placements = 0;
        for cohort in cohorts.iter().filter(|c| c.cycle_start == current_cycle) {
            current_cohorts += 1;
            current_placements += store.placement_count(cohort.id)?;
        }

        Ok(Self {
            tier_count: store.tiers()?.len(),
            user_count: users.len(),
            active_users,
            locked_out_users: users.len() - active_users,
            current_cohorts,
            total_cohorts: cohorts.len(),
            current_placements,
            outcome_count: store.outcome_count()?,
            current_cycle,
            last_reset: store.last_reset()?,
        })
    }

    /// Average members per current cohort, in thousandths (integer only).
    #[must_use]
    pub fn fill_per_thousand(&self) -> u64 {
        if self.current_cohorts == 0 {
            return 0;
        }
        (self.current_placements as u64).saturating_mul(1000) / (self.current_cohorts as u64)
    }
}
