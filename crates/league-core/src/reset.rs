//! # Weekly Reset
//!
//! Closes every cohort of the finished cycle and re-partitions its members
//! into fresh cohorts of the cycle that is opening.
//!
//! ## Steps
//!
//! 1. **Lockout sweep**: every user without a tier is either admitted into
//!    the lowest tier (entry counter at threshold) or has the counter zeroed.
//! 2. **Closing**: each closing cohort has its placements brought up to the
//!    members' live experience, is ranked, split into
//!    top / middle / bottom buckets and every member gets a target tier and
//!    an outcome record.
//! 3. **Re-allocation**: members are grouped by target tier and placed into
//!    the opening cycle, existing cohorts first.
//! 4. **Cleanup**: closing cohorts are deleted with their placements.
//!
//! The whole run is one store transaction (see [`crate::Session`]). A run
//! for a cycle that was already closed fails with `AlreadyReset`.

use crate::admission::{Admission, admit_into_cycle};
use crate::allocator::allocate;
use crate::cycle::{current_cycle_date, preceding_cycle_date};
use crate::primitives::{
    DEMOTED_COUNT, DEMOTION_MIN_COHORT, ENTRY_THRESHOLD, PROMOTED_COUNT, TOP_TIER_BONUS,
};
use crate::standings::refresh_cohort;
use crate::store::LeagueStore;
use crate::{LeagueError, TierCatalog, UserId, WeeklyOutcome};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// BUCKETS
// =============================================================================

/// Bucket sizes for a cohort of `n` ranked members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buckets {
    pub top: usize,
    pub middle: usize,
    pub bottom: usize,
}

/// Where a rank falls inside the buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Top,
    Middle,
    Bottom,
}

impl Buckets {
    /// Bucket of the member at 0-based `index`.
    #[must_use]
    pub fn bucket_of(&self, index: usize) -> Bucket {
        if index < self.top {
            Bucket::Top
        } else if index >= self.top + self.middle {
            Bucket::Bottom
        } else {
            Bucket::Middle
        }
    }
}

/// Split `n` members into buckets.
///
/// - `n < 7`: everyone is top
/// - `7 <= n < 24`: top 7, rest middle
/// - `n >= 24`: top 7, bottom 7, middle the rest
#[must_use]
pub fn partition(n: usize) -> Buckets {
    let top = n.min(PROMOTED_COUNT);
    let bottom = if n >= DEMOTION_MIN_COHORT {
        DEMOTED_COUNT
    } else {
        0
    };
    Buckets {
        top,
        middle: n - top - bottom,
        bottom,
    }
}

// =============================================================================
// DECISIONS
// =============================================================================

/// What happens to one member at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Moves one tier up.
    Promoted(u32),
    /// Keeps the tier; `rewarded` is set for top members of the highest tier.
    Retained { rewarded: bool },
    /// Moves one tier down.
    Demoted(u32),
    /// Leaves the ladder.
    LockedOut,
}

/// Decide the movement of a member of a cohort in tier `order`.
///
/// In the lowest tier, lockout takes precedence over every other bucket
/// for members with zero experience.
#[must_use]
pub fn decide(catalog: &TierCatalog, order: u32, bucket: Bucket, experience: u64) -> Movement {
    if catalog.is_lowest(order) && (bucket == Bucket::Bottom || experience == 0) {
        return Movement::LockedOut;
    }
    match bucket {
        Bucket::Top => match catalog.above(order) {
            Some(next) => Movement::Promoted(next.order),
            None => Movement::Retained { rewarded: true },
        },
        Bucket::Bottom => match catalog.below(order) {
            Some(prev) => Movement::Demoted(prev.order),
            None => Movement::LockedOut,
        },
        Bucket::Middle => Movement::Retained { rewarded: false },
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Summary of one reset run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub closing_cycle: NaiveDate,
    pub opening_cycle: NaiveDate,
    pub cohorts_closed: usize,
    pub members_processed: usize,
    pub promoted: usize,
    pub demoted: usize,
    pub retained: usize,
    pub rewarded: usize,
    pub locked_out: usize,
    pub readmitted: usize,
    pub cohorts_opened: usize,
}

impl ResetReport {
    fn new(closing_cycle: NaiveDate, opening_cycle: NaiveDate) -> Self {
        Self {
            closing_cycle,
            opening_cycle,
            cohorts_closed: 0,
            members_processed: 0,
            promoted: 0,
            demoted: 0,
            retained: 0,
            rewarded: 0,
            locked_out: 0,
            readmitted: 0,
            cohorts_opened: 0,
        }
    }
}

// =============================================================================
// RUN
// =============================================================================

/// Close the cycle before the one containing `now` and open the current one.
///
/// Must run inside one store transaction: on `Err` the caller discards
/// every write.
pub fn run_reset(
    store: &mut dyn LeagueStore,
    now: DateTime<Utc>,
) -> Result<ResetReport, LeagueError> {
    let opening = current_cycle_date(&now);
    let closing = preceding_cycle_date(opening);
    let mut report = ResetReport::new(closing, opening);

    if let Some(last) = store.last_reset()?
        && last >= closing
    {
        return Err(LeagueError::AlreadyReset(last));
    }

    let catalog = store.catalog().inspect_err(|e| {
        tracing::error!(error = %e, "Reset aborted: tier catalog unusable");
    })?;

    tracing::info!(closing = %closing, opening = %opening, "Starting weekly reset");
    let cohorts_before = store.cohorts_in_cycle(opening)?.len();

    // 1. Lockout sweep
    let mut excluded = BTreeSet::new();
    for user in store.users()? {
        if !user.is_locked_out() {
            continue;
        }
        excluded.insert(user.id);
        if user.is_entry_eligible() {
            if let Admission::Placed { .. } = admit_into_cycle(store, user.id, opening)? {
                report.readmitted += 1;
            }
        } else if user.entry_counter != 0 {
            let mut user = user;
            user.entry_counter = 0;
            store.put_user(user)?;
        }
    }

    // 2. Close cohorts, ascending id
    let closing_cohorts = store.cohorts_in_cycle(closing)?;
    let mut targets: BTreeMap<u32, Vec<UserId>> = BTreeMap::new();

    for cohort in &closing_cohorts {
        let tier = catalog
            .by_order(cohort.tier)
            .ok_or_else(|| LeagueError::UnknownTier(format!("order {}", cohort.tier)))?;

        let repaired = refresh_cohort(store, cohort.id)?;
        if repaired > 0 {
            tracing::debug!(
                cohort_id = cohort.id.0,
                repaired,
                "Refreshed stale placements before ranking"
            );
        }

        let mut members: Vec<_> = store
            .placements(cohort.id)?
            .into_iter()
            .filter(|p| !excluded.contains(&p.user))
            .collect();
        if members.is_empty() {
            continue;
        }
        // stable: insertion order breaks ties
        members.sort_by(|a, b| b.experience.cmp(&a.experience));

        let buckets = partition(members.len());
        for (index, placement) in members.iter().enumerate() {
            let movement = decide(&catalog, tier.order, buckets.bucket_of(index), placement.experience);
            let mut user = store.require_user(placement.user)?;

            let target = match movement {
                Movement::Promoted(order) => {
                    report.promoted += 1;
                    catalog.by_order(order)
                }
                Movement::Demoted(order) => {
                    report.demoted += 1;
                    catalog.by_order(order)
                }
                Movement::Retained { rewarded } => {
                    report.retained += 1;
                    if rewarded {
                        report.rewarded += 1;
                        user.reward_balance = user.reward_balance.saturating_add(TOP_TIER_BONUS);
                    }
                    Some(tier)
                }
                Movement::LockedOut => {
                    report.locked_out += 1;
                    None
                }
            };
            let new_tier = target.map(|t| t.name.clone()).unwrap_or_default();

            if new_tier != tier.name {
                tracing::info!(
                    user_id = user.id.0,
                    username = %user.username,
                    from = %tier.name,
                    to = %new_tier,
                    "User moved"
                );
            }

            if target.is_none() {
                user.tier.clear();
                user.cycle_experience = 0;
                user.entry_counter = ENTRY_THRESHOLD;
            }
            store.put_user(user)?;

            store.put_outcome(WeeklyOutcome {
                user: placement.user,
                finished_rank: (index + 1) as u32,
                old_tier: tier.name.clone(),
                new_tier,
                recorded_at: now,
            })?;

            // the reset is authoritative over anything placed early in the new cycle
            if let Some((early, _)) = store.placement_in_cycle(placement.user, opening)? {
                store.remove_placement(placement.user, early.id)?;
            }

            if let Some(target) = target {
                targets.entry(target.order).or_default().push(placement.user);
            }
            report.members_processed += 1;
        }
    }

    // 3. Re-allocate by target tier
    for (order, users) in &targets {
        let tier = catalog
            .by_order(*order)
            .ok_or_else(|| LeagueError::UnknownTier(format!("order {order}")))?;
        allocate(store, users, tier, opening)?;
    }

    // 4. Cleanup
    for cohort in &closing_cohorts {
        store.delete_cohort(cohort.id)?;
        report.cohorts_closed += 1;
    }

    store.set_last_reset(closing)?;
    report.cohorts_opened = store
        .cohorts_in_cycle(opening)?
        .len()
        .saturating_sub(cohorts_before);

    tracing::info!(
        closing = %closing,
        cohorts_closed = report.cohorts_closed,
        members = report.members_processed,
        promoted = report.promoted,
        demoted = report.demoted,
        locked_out = report.locked_out,
        readmitted = report.readmitted,
        cohorts_opened = report.cohorts_opened,
        "Weekly reset completed"
    );

    Ok(report)
}
