//! # Cohort Allocator
//!
//! Fills cohorts of one (tier, cycle) pair up to `COHORT_CAPACITY`.
//!
//! Existing cohorts are used first, in ascending id order, skipping full
//! ones. Once they are exhausted new cohorts are created. Users are placed in
//! input order, so input order is the tie-breaker.

use crate::primitives::COHORT_CAPACITY;
use crate::store::LeagueStore;
use crate::{Cohort, CohortId, LeagueError, Tier, UserId};
use chrono::NaiveDate;

/// What one `allocate` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Number of users placed.
    pub placed: usize,
    /// Cohorts created during this call, ascending id.
    pub created: Vec<CohortId>,
    /// Every cohort that received at least one user, ascending id.
    pub touched: Vec<CohortId>,
}

/// Cursor over the cohorts of one (tier, cycle) pair.
struct Cursor {
    tier: u32,
    cycle_start: NaiveDate,
    existing: std::vec::IntoIter<Cohort>,
    current: Option<(CohortId, usize)>,
}

impl Cursor {
    fn new(store: &dyn LeagueStore, tier: u32, cycle_start: NaiveDate) -> Result<Self, LeagueError> {
        Ok(Self {
            tier,
            cycle_start,
            existing: store.cohorts_for(tier, cycle_start)?.into_iter(),
            current: None,
        })
    }

    /// The cohort the next user goes into, creating one when needed.
    /// The second value is true if the cohort was just created.
    fn open(&mut self, store: &mut dyn LeagueStore) -> Result<(CohortId, bool), LeagueError> {
        if let Some((id, size)) = self.current
            && size < COHORT_CAPACITY
        {
            return Ok((id, false));
        }

        for cohort in self.existing.by_ref() {
            let size = store.placement_count(cohort.id)?;
            if size < COHORT_CAPACITY {
                self.current = Some((cohort.id, size));
                return Ok((cohort.id, false));
            }
        }

        let cohort = store.create_cohort(self.tier, self.cycle_start)?;
        tracing::debug!(
            cohort_id = cohort.id.0,
            tier = self.tier,
            cycle_start = %self.cycle_start,
            "Opened cohort"
        );
        self.current = Some((cohort.id, 0));
        Ok((cohort.id, true))
    }

    fn record_placement(&mut self) {
        if let Some((_, size)) = self.current.as_mut() {
            *size += 1;
        }
    }
}

/// Place `users` into cohorts of `tier` for the cycle starting `cycle_start`.
///
/// Every placement also points the user's tier at `tier` and zeroes their
/// cycle experience.
///
/// # Errors
///
/// - `LeagueError::UserNotFound` if a user is not registered
/// - `LeagueError::DuplicatePlacement` if a user is already in a chosen cohort
pub fn allocate(
    store: &mut dyn LeagueStore,
    users: &[UserId],
    tier: &Tier,
    cycle_start: NaiveDate,
) -> Result<Allocation, LeagueError> {
    let mut allocation = Allocation::default();
    if users.is_empty() {
        return Ok(allocation);
    }

    let mut cursor = Cursor::new(store, tier.order, cycle_start)?;
    for &user_id in users {
        let (cohort, created) = cursor.open(store)?;
        if created {
            allocation.created.push(cohort);
        }
        if allocation.touched.last() != Some(&cohort) {
            allocation.touched.push(cohort);
        }

        let mut user = store.require_user(user_id)?;
        store.insert_placement(user_id, cohort, 0)?;
        user.tier.clone_from(&tier.name);
        user.cycle_experience = 0;
        store.put_user(user)?;

        cursor.record_placement();
        allocation.placed += 1;
    }

    Ok(allocation)
}

/// The first cohort of (`tier`, `cycle_start`) with spare capacity, created
/// if none exists.
pub fn open_cohort(
    store: &mut dyn LeagueStore,
    tier: &Tier,
    cycle_start: NaiveDate,
) -> Result<CohortId, LeagueError> {
    let mut cursor = Cursor::new(store, tier.order, cycle_start)?;
    Ok(cursor.open(store)?.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::User;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
    }

    fn store_with_users(count: u64) -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in 0..count {
            let mut user = User::new(UserId(id), format!("user{id}"));
            user.cycle_experience = 99;
            store.put_user(user).expect("put user");
        }
        store
    }

    #[test]
    fn sixty_one_users_make_three_cohorts() {
        let mut store = store_with_users(61);
        let users: Vec<UserId> = (0..61).map(UserId).collect();
        let tier = Tier::new("Silver", "images/silver.png", 1);

        let allocation = allocate(&mut store, &users, &tier, monday()).expect("allocate");

        assert_eq!(allocation.placed, 61);
        assert_eq!(allocation.created.len(), 3);
        let sizes: Vec<usize> = allocation
            .created
            .iter()
            .map(|c| store.placement_count(*c).expect("count"))
            .collect();
        assert_eq!(sizes, vec![30, 30, 1]);
    }

    #[test]
    fn allocation_resets_user_fields() {
        let mut store = store_with_users(1);
        let tier = Tier::new("Gold", "images/gold.png", 2);
        allocate(&mut store, &[UserId(0)], &tier, monday()).expect("allocate");

        let user = store.require_user(UserId(0)).expect("user");
        assert_eq!(user.tier, "Gold");
        assert_eq!(user.cycle_experience, 0);
    }

    #[test]
    fn existing_cohorts_are_filled_first() {
        let mut store = store_with_users(40);
        let tier = Tier::new("Bronze", "images/bronze.png", 0);
        let first: Vec<UserId> = (0..25).map(UserId).collect();
        let rest: Vec<UserId> = (25..40).map(UserId).collect();

        let a = allocate(&mut store, &first, &tier, monday()).expect("allocate");
        let b = allocate(&mut store, &rest, &tier, monday()).expect("allocate");

        assert_eq!(a.created.len(), 1);
        assert_eq!(b.created.len(), 1);
        assert_eq!(b.touched.len(), 2);
        assert_eq!(store.placement_count(a.created[0]).expect("count"), 30);
        assert_eq!(store.placement_count(b.created[0]).expect("count"), 10);
    }

    #[test]
    fn open_cohort_skips_full_cohorts() {
        let mut store = store_with_users(30);
        let tier = Tier::new("Bronze", "images/bronze.png", 0);
        let users: Vec<UserId> = (0..30).map(UserId).collect();
        let full = allocate(&mut store, &users, &tier, monday()).expect("allocate");

        let open = open_cohort(&mut store, &tier, monday()).expect("open");
        assert_ne!(open, full.created[0]);
        assert_eq!(store.placement_count(open).expect("count"), 0);
    }

    #[test]
    fn unknown_user_fails() {
        let mut store = MemoryStore::new();
        let tier = Tier::new("Bronze", "images/bronze.png", 0);
        let err = allocate(&mut store, &[UserId(5)], &tier, monday()).expect_err("must fail");
        assert!(matches!(err, LeagueError::UserNotFound(UserId(5))));
    }
}
