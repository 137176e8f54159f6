//! # Admission
//!
//! Places an individual locked-out user into the lowest tier once their
//! entry counter reaches `ENTRY_THRESHOLD`.

use crate::allocator::allocate;
use crate::cycle::{current_cycle_date, following_cycle_date};
use crate::store::LeagueStore;
use crate::{CohortId, LeagueError, Tier, UserId};
use chrono::{DateTime, NaiveDate, Utc};

/// Result of an admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Entry counter below the threshold; nothing was written.
    Ineligible { entry_counter: u64 },
    /// The user now holds a placement in `cohort` of `tier`.
    Placed { cohort: CohortId, tier: String },
    /// Locked out by the reset that opened this cycle. The counter is kept
    /// and the sweep opening `next_cycle` admits the user.
    Deferred {
        entry_counter: u64,
        next_cycle: NaiveDate,
    },
}

impl Admission {
    /// Whether a placement was created.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        matches!(self, Admission::Placed { .. })
    }
}

/// The tier with order 0.
///
/// Fails with `NoTiers` on an empty tier table and `LowestTierMissing` when
/// tiers exist but none has order 0.
pub(crate) fn lowest_tier(store: &dyn LeagueStore) -> Result<Tier, LeagueError> {
    let tiers = store.tiers()?;
    if tiers.is_empty() {
        return Err(LeagueError::NoTiers);
    }
    tiers
        .into_iter()
        .find(|t| t.order == 0)
        .ok_or(LeagueError::LowestTierMissing)
}

/// Admit `user` into the lowest tier of the cycle containing `now`, if their
/// entry counter allows it.
///
/// On success the counter is reset to 0, the user's tier points at the
/// lowest tier and their cycle experience is zeroed. A user whose last
/// outcome locked them out during this cycle is deferred to the next sweep.
pub fn admit_if_eligible(
    store: &mut dyn LeagueStore,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Admission, LeagueError> {
    admit_into_cycle(store, user, current_cycle_date(&now))
}

/// Admission into an explicit cycle. Used by the reset sweep, which admits
/// into the cycle it is opening.
pub(crate) fn admit_into_cycle(
    store: &mut dyn LeagueStore,
    user_id: UserId,
    cycle_start: NaiveDate,
) -> Result<Admission, LeagueError> {
    let user = store.require_user(user_id)?;
    if !user.is_entry_eligible() {
        return Ok(Admission::Ineligible {
            entry_counter: user.entry_counter,
        });
    }
    if locked_out_since(store, user_id, cycle_start)? {
        tracing::debug!(user_id = user_id.0, "Locked out this cycle, admission deferred");
        return Ok(Admission::Deferred {
            entry_counter: user.entry_counter,
            next_cycle: following_cycle_date(cycle_start),
        });
    }

    let lowest = lowest_tier(store).inspect_err(|e| {
        tracing::error!(user_id = user_id.0, error = %e, "Cannot admit user");
    })?;

    let allocation = allocate(store, &[user_id], &lowest, cycle_start)?;
    let cohort = allocation
        .touched
        .first()
        .copied()
        .ok_or_else(|| LeagueError::IoError("allocation placed nobody".to_string()))?;

    let mut user = store.require_user(user_id)?;
    user.entry_counter = 0;
    store.put_user(user)?;

    tracing::info!(
        user_id = user_id.0,
        cohort_id = cohort.0,
        tier = %lowest.name,
        "Admitted user"
    );

    Ok(Admission::Placed {
        cohort,
        tier: lowest.name,
    })
}

/// Whether the user's last outcome locked them out at or after the start
/// of `cycle_start`.
fn locked_out_since(
    store: &dyn LeagueStore,
    user_id: UserId,
    cycle_start: NaiveDate,
) -> Result<bool, LeagueError> {
    Ok(store.outcome(user_id)?.is_some_and(|outcome| {
        outcome.new_tier.is_empty() && current_cycle_date(&outcome.recorded_at) >= cycle_start
    }))
}
