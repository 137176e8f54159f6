//! # League Storage
//!
//! The `LeagueStore` trait and its two backends:
//! - [`MemoryStore`]: `BTreeMap`-backed, deterministic, used for tests and
//!   the `memory` backend
//! - [`RedbStore`]: redb embedded database, one write transaction per
//!   operation
//!
//! The engine modules (`allocator`, `admission`, `reset`, `standings`,
//! `notifier`, `users`) only ever see `&mut dyn LeagueStore`, so an
//! operation cannot tell which backend it runs against. Atomicity is the
//! caller's job: see [`crate::Session`].

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{
    Cohort, CohortId, LeagueError, Placement, Tier, TierCatalog, User, UserId, WeeklyOutcome,
};
use chrono::NaiveDate;

// =============================================================================
// LEAGUESTORE TRAIT
// =============================================================================

/// Storage operations the league engine needs.
///
/// All fallible operations return `Result<T, LeagueError>` so the in-memory
/// and persistent backends behave uniformly. Listing methods return records
/// in ascending id order.
pub trait LeagueStore {
    /// All tiers, in no particular order.
    fn tiers(&self) -> Result<Vec<Tier>, LeagueError>;

    /// Insert or replace the tier at `tier.order`.
    fn put_tier(&mut self, tier: Tier) -> Result<(), LeagueError>;

    /// Lookup a user.
    fn user(&self, id: UserId) -> Result<Option<User>, LeagueError>;

    /// All users, ascending id.
    fn users(&self) -> Result<Vec<User>, LeagueError>;

    /// Insert or replace a user record.
    fn put_user(&mut self, user: User) -> Result<(), LeagueError>;

    /// Lookup a cohort.
    fn cohort(&self, id: CohortId) -> Result<Option<Cohort>, LeagueError>;

    /// All cohorts, ascending id.
    fn cohorts(&self) -> Result<Vec<Cohort>, LeagueError>;

    /// Create an empty cohort with the next monotonic id.
    fn create_cohort(&mut self, tier: u32, cycle_start: NaiveDate) -> Result<Cohort, LeagueError>;

    /// Delete a cohort together with its placements.
    /// Returns the number of placements removed.
    fn delete_cohort(&mut self, id: CohortId) -> Result<usize, LeagueError>;

    /// Placements of a cohort in insertion order.
    fn placements(&self, cohort: CohortId) -> Result<Vec<Placement>, LeagueError>;

    /// Number of placements in a cohort.
    fn placement_count(&self, cohort: CohortId) -> Result<usize, LeagueError>;

    /// All placements held by a user, ascending cohort id.
    fn user_placements(&self, user: UserId) -> Result<Vec<Placement>, LeagueError>;

    /// Create a placement.
    ///
    /// # Errors
    ///
    /// `LeagueError::DuplicatePlacement` if the pair already exists,
    /// `LeagueError::CohortNotFound` if the cohort does not.
    fn insert_placement(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<Placement, LeagueError>;

    /// Overwrite the experience stored on an existing placement.
    fn set_placement_experience(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<(), LeagueError>;

    /// Remove a placement. Returns whether it existed.
    fn remove_placement(&mut self, user: UserId, cohort: CohortId) -> Result<bool, LeagueError>;

    /// Last recorded outcome of a user.
    fn outcome(&self, user: UserId) -> Result<Option<WeeklyOutcome>, LeagueError>;

    /// Insert or overwrite the outcome of `outcome.user`.
    fn put_outcome(&mut self, outcome: WeeklyOutcome) -> Result<(), LeagueError>;

    /// Number of stored outcome records.
    fn outcome_count(&self) -> Result<usize, LeagueError>;

    /// Start date of the last cycle the reset engine closed.
    fn last_reset(&self) -> Result<Option<NaiveDate>, LeagueError>;

    /// Record the start date of a closed cycle.
    fn set_last_reset(&mut self, cycle_start: NaiveDate) -> Result<(), LeagueError>;

    // =========================================================================
    // PROVIDED
    // =========================================================================

    /// Validated view over the tier table.
    fn catalog(&self) -> Result<TierCatalog, LeagueError> {
        TierCatalog::new(self.tiers()?)
    }

    /// Lookup a user, failing if they are not registered.
    fn require_user(&self, id: UserId) -> Result<User, LeagueError> {
        self.user(id)?.ok_or(LeagueError::UserNotFound(id))
    }

    /// Cohorts of one cycle, ascending id.
    fn cohorts_in_cycle(&self, cycle_start: NaiveDate) -> Result<Vec<Cohort>, LeagueError> {
        Ok(self
            .cohorts()?
            .into_iter()
            .filter(|c| c.cycle_start == cycle_start)
            .collect())
    }

    /// Cohorts of one (tier, cycle) pair, ascending id.
    fn cohorts_for(&self, tier: u32, cycle_start: NaiveDate) -> Result<Vec<Cohort>, LeagueError> {
        Ok(self
            .cohorts_in_cycle(cycle_start)?
            .into_iter()
            .filter(|c| c.tier == tier)
            .collect())
    }

    /// The user's placement in the given cycle, with its cohort.
    ///
    /// If several exist (an invariant violation), the lowest cohort id wins.
    fn placement_in_cycle(
        &self,
        user: UserId,
        cycle_start: NaiveDate,
    ) -> Result<Option<(Cohort, Placement)>, LeagueError> {
        for placement in self.user_placements(user)? {
            if let Some(cohort) = self.cohort(placement.cohort)?
                && cohort.cycle_start == cycle_start
            {
                return Ok(Some((cohort, placement)));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// SHARED ENCODING
// =============================================================================

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, LeagueError> {
    postcard::to_allocvec(value).map_err(|e| LeagueError::SerializationError(e.to_string()))
}

pub(crate) fn decode<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, LeagueError> {
    postcard::from_bytes(bytes).map_err(|e| LeagueError::SerializationError(e.to_string()))
}
