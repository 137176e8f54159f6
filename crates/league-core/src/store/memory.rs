//! In-memory store.
//!
//! Uses `BTreeMap` exclusively for deterministic ordering. Cloning is the
//! transaction mechanism: `Session` runs an operation against a clone and
//! swaps it in only when the operation succeeds.

use super::LeagueStore;
use crate::{
    Cohort, CohortId, LeagueError, Placement, PlacementId, Tier, User, UserId, WeeklyOutcome,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// `BTreeMap`-backed league store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// order -> tier
    tiers: BTreeMap<u32, Tier>,
    users: BTreeMap<UserId, User>,
    cohorts: BTreeMap<CohortId, Cohort>,
    /// (cohort, user) -> placement
    placements: BTreeMap<(CohortId, UserId), Placement>,
    /// (user, cohort) index
    by_user: BTreeSet<(UserId, CohortId)>,
    outcomes: BTreeMap<UserId, WeeklyOutcome>,
    last_reset: Option<NaiveDate>,
    next_cohort_id: u64,
    next_placement_id: u64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeagueStore for MemoryStore {
    fn tiers(&self) -> Result<Vec<Tier>, LeagueError> {
        Ok(self.tiers.values().cloned().collect())
    }

    fn put_tier(&mut self, tier: Tier) -> Result<(), LeagueError> {
        self.tiers.insert(tier.order, tier);
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LeagueError> {
        Ok(self.users.get(&id).cloned())
    }

    fn users(&self) -> Result<Vec<User>, LeagueError> {
        Ok(self.users.values().cloned().collect())
    }

    fn put_user(&mut self, user: User) -> Result<(), LeagueError> {
        self.users.insert(user.id, user);
        Ok(())
    }

    fn cohort(&self, id: CohortId) -> Result<Option<Cohort>, LeagueError> {
        Ok(self.cohorts.get(&id).cloned())
    }

    fn cohorts(&self) -> Result<Vec<Cohort>, LeagueError> {
        Ok(self.cohorts.values().cloned().collect())
    }

    fn create_cohort(&mut self, tier: u32, cycle_start: NaiveDate) -> Result<Cohort, LeagueError> {
        let id = CohortId(self.next_cohort_id);
        self.next_cohort_id = self.next_cohort_id.saturating_add(1);
        let cohort = Cohort {
            id,
            tier,
            cycle_start,
        };
        self.cohorts.insert(id, cohort.clone());
        Ok(cohort)
    }

    fn delete_cohort(&mut self, id: CohortId) -> Result<usize, LeagueError> {
        if self.cohorts.remove(&id).is_none() {
            return Err(LeagueError::CohortNotFound(id));
        }
        let members: Vec<UserId> = self
            .placements
            .range((id, UserId(0))..=(id, UserId(u64::MAX)))
            .map(|(&(_, user), _)| user)
            .collect();
        for user in &members {
            self.placements.remove(&(id, *user));
            self.by_user.remove(&(*user, id));
        }
        Ok(members.len())
    }

    fn placements(&self, cohort: CohortId) -> Result<Vec<Placement>, LeagueError> {
        let mut list: Vec<Placement> = self
            .placements
            .range((cohort, UserId(0))..=(cohort, UserId(u64::MAX)))
            .map(|(_, p)| p.clone())
            .collect();
        list.sort_by_key(|p| p.id);
        Ok(list)
    }

    fn placement_count(&self, cohort: CohortId) -> Result<usize, LeagueError> {
        Ok(self
            .placements
            .range((cohort, UserId(0))..=(cohort, UserId(u64::MAX)))
            .count())
    }

    fn user_placements(&self, user: UserId) -> Result<Vec<Placement>, LeagueError> {
        Ok(self
            .by_user
            .range((user, CohortId(0))..=(user, CohortId(u64::MAX)))
            .filter_map(|&(u, c)| self.placements.get(&(c, u)).cloned())
            .collect())
    }

    fn insert_placement(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<Placement, LeagueError> {
        if !self.cohorts.contains_key(&cohort) {
            return Err(LeagueError::CohortNotFound(cohort));
        }
        if self.placements.contains_key(&(cohort, user)) {
            return Err(LeagueError::DuplicatePlacement { user, cohort });
        }
        let placement = Placement {
            id: PlacementId(self.next_placement_id),
            user,
            cohort,
            experience,
        };
        self.next_placement_id = self.next_placement_id.saturating_add(1);
        self.placements.insert((cohort, user), placement.clone());
        self.by_user.insert((user, cohort));
        Ok(placement)
    }

    fn set_placement_experience(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<(), LeagueError> {
        match self.placements.get_mut(&(cohort, user)) {
            Some(placement) => {
                placement.experience = experience;
                Ok(())
            }
            None => Err(LeagueError::CohortNotFound(cohort)),
        }
    }

    fn remove_placement(&mut self, user: UserId, cohort: CohortId) -> Result<bool, LeagueError> {
        self.by_user.remove(&(user, cohort));
        Ok(self.placements.remove(&(cohort, user)).is_some())
    }

    fn outcome(&self, user: UserId) -> Result<Option<WeeklyOutcome>, LeagueError> {
        Ok(self.outcomes.get(&user).cloned())
    }

    fn put_outcome(&mut self, outcome: WeeklyOutcome) -> Result<(), LeagueError> {
        self.outcomes.insert(outcome.user, outcome);
        Ok(())
    }

    fn outcome_count(&self) -> Result<usize, LeagueError> {
        Ok(self.outcomes.len())
    }

    fn last_reset(&self) -> Result<Option<NaiveDate>, LeagueError> {
        Ok(self.last_reset)
    }

    fn set_last_reset(&mut self, cycle_start: NaiveDate) -> Result<(), LeagueError> {
        self.last_reset = Some(cycle_start);
        Ok(())
    }
}
