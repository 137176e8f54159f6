//! # Standings
//!
//! On-demand ranked view of a user's current cohort.
//!
//! Reading standings may write: a user who has a tier but no placement in
//! the current cycle is self-healed into an open lowest-tier cohort, and a
//! placement whose experience lags behind the user's live counter is
//! repaired. A second read without new experience writes nothing and
//! returns the same view.

use crate::allocator::open_cohort;
use crate::cycle::{countdown_seconds, current_cycle_date};
use crate::store::LeagueStore;
use crate::{
    Cohort, CohortId, LeaderboardEntry, LeagueError, OutcomeSummary, Tier, TierCatalog, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Standings of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Standings {
    /// The user is not participating this cycle.
    LockedOut,
    /// The user holds a placement in the current cycle.
    Active(ActiveStandings),
}

/// Ranked view for a participating user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStandings {
    pub cohort: CohortId,
    pub cycle_start: NaiveDate,
    /// Name of the cohort's tier.
    pub current_tier: String,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Full tier catalog, lowest first.
    pub tiers: Vec<Tier>,
    /// Last outcome, zeroed if the user has none.
    pub outcome: OutcomeSummary,
    pub countdown_seconds: i64,
}

/// Compute the standings of `user` at `now`.
///
/// # Errors
///
/// - `LeagueError::NoTiers` if the tier table is empty (checked first)
/// - `LeagueError::UserNotFound` if the user is not registered
pub fn standings(
    store: &mut dyn LeagueStore,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Standings, LeagueError> {
    let catalog = store.catalog()?;
    let mut user = store.require_user(user_id)?;
    if user.is_locked_out() {
        return Ok(Standings::LockedOut);
    }

    let cycle_start = current_cycle_date(&now);
    let (cohort, placement) = match store.placement_in_cycle(user_id, cycle_start)? {
        Some(found) => found,
        None => {
            let lowest = catalog.lowest()?;
            let cohort_id = open_cohort(store, lowest, cycle_start)?;
            let placement = store.insert_placement(user_id, cohort_id, 0)?;
            user.tier.clone_from(&lowest.name);
            store.put_user(user.clone())?;
            tracing::info!(
                user_id = user_id.0,
                cohort_id = cohort_id.0,
                "Placed user without a current cohort"
            );
            let cohort = store
                .cohort(cohort_id)?
                .ok_or(LeagueError::CohortNotFound(cohort_id))?;
            (cohort, placement)
        }
    };

    if placement.experience != user.cycle_experience {
        store.set_placement_experience(user_id, cohort.id, user.cycle_experience)?;
    }

    let leaderboard = rank_cohort(store, cohort.id)?;
    let current_tier = tier_name(&catalog, &cohort)?;
    let outcome = store
        .outcome(user_id)?
        .as_ref()
        .map(OutcomeSummary::from)
        .unwrap_or_default();

    Ok(Standings::Active(ActiveStandings {
        cohort: cohort.id,
        cycle_start,
        current_tier,
        leaderboard,
        tiers: catalog.tiers().to_vec(),
        outcome,
        countdown_seconds: countdown_seconds(now),
    }))
}

/// Members of `cohort` ranked by stored experience, descending.
///
/// Ties keep insertion order.
pub(crate) fn rank_cohort(
    store: &dyn LeagueStore,
    cohort: CohortId,
) -> Result<Vec<LeaderboardEntry>, LeagueError> {
    let mut placements = store.placements(cohort)?;
    placements.sort_by(|a, b| b.experience.cmp(&a.experience));

    placements
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let user = store.require_user(p.user)?;
            Ok(LeaderboardEntry {
                user: p.user,
                username: user.username,
                experience: p.experience,
                rank: (index + 1) as u32,
            })
        })
        .collect()
}

/// Copy every member's live cycle experience into their placement.
/// Returns how many placements were stale.
pub(crate) fn refresh_cohort(
    store: &mut dyn LeagueStore,
    cohort: CohortId,
) -> Result<usize, LeagueError> {
    let mut repaired = 0;
    for placement in store.placements(cohort)? {
        let user = store.require_user(placement.user)?;
        if placement.experience != user.cycle_experience {
            store.set_placement_experience(placement.user, cohort, user.cycle_experience)?;
            repaired += 1;
        }
    }
    Ok(repaired)
}

pub(crate) fn tier_name(catalog: &TierCatalog, cohort: &Cohort) -> Result<String, LeagueError> {
    catalog
        .by_order(cohort.tier)
        .map(|t| t.name.clone())
        .ok_or_else(|| LeagueError::UnknownTier(format!("order {}", cohort.tier)))
}
