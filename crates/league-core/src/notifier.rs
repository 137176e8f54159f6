//! # Update Notifier
//!
//! Pushes a refreshed leaderboard to one user's live connection.
//!
//! The engine does not know about sockets. The binary implements
//! [`UpdateChannel`] and hands it in. [`cohort_update`] runs inside a store
//! transaction; [`push_update`] runs once it has committed. Delivery failures
//! are logged and swallowed, so a missing connection never fails the
//! operation that triggered the update.

use crate::cycle::current_cycle_date;
use crate::standings::{rank_cohort, refresh_cohort, tier_name};
use crate::store::LeagueStore;
use crate::{LeaderboardEntry, LeagueError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload pushed to a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardUpdate {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub current_tier: String,
}

/// Transport for leaderboard updates, keyed by user.
pub trait UpdateChannel {
    /// Deliver `update` to the live connection of `user`.
    ///
    /// Returns `LeagueError::Delivery` when there is no connection or the
    /// transport fails.
    fn deliver(&self, user: UserId, update: &LeaderboardUpdate) -> Result<(), LeagueError>;
}

/// Recompute the leaderboard of `user`'s current cohort.
///
/// Stale placement experience of every member is refreshed first. Returns
/// `None` if the user has no placement in the cycle containing `now`.
pub fn cohort_update(
    store: &mut dyn LeagueStore,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Option<LeaderboardUpdate>, LeagueError> {
    let user = store.require_user(user_id)?;
    if user.is_locked_out() {
        return Ok(None);
    }
    let Some((cohort, _)) = store.placement_in_cycle(user_id, current_cycle_date(&now))? else {
        return Ok(None);
    };

    let catalog = store.catalog()?;
    let repaired = refresh_cohort(store, cohort.id)?;
    if repaired > 0 {
        tracing::debug!(cohort_id = cohort.id.0, repaired, "Refreshed stale placements");
    }

    Ok(Some(LeaderboardUpdate {
        leaderboard: rank_cohort(store, cohort.id)?,
        current_tier: tier_name(&catalog, &cohort)?,
    }))
}

/// Hand `update` to the channel. Returns whether it was delivered.
///
/// Call after the refresh that produced `update` has committed.
pub fn push_update(channel: &dyn UpdateChannel, user: UserId, update: &LeaderboardUpdate) -> bool {
    match channel.deliver(user, update) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(user_id = user.0, error = %e, "Leaderboard update not delivered");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::allocate;
    use crate::store::MemoryStore;
    use crate::{Tier, User};
    use chrono::TimeZone;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(UserId, LeaderboardUpdate)>>,
        fail: bool,
    }

    impl UpdateChannel for Recorder {
        fn deliver(&self, user: UserId, update: &LeaderboardUpdate) -> Result<(), LeagueError> {
            if self.fail {
                return Err(LeagueError::Delivery("no live connection".to_string()));
            }
            self.sent.borrow_mut().push((user, update.clone()));
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        let bronze = Tier::new("Bronze", "images/bronze.png", 0);
        store.put_tier(bronze.clone()).expect("tier");
        store.put_user(User::new(UserId(1), "ada")).expect("user");
        store.put_user(User::new(UserId(2), "grace")).expect("user");
        allocate(
            &mut store,
            &[UserId(1), UserId(2)],
            &bronze,
            current_cycle_date(&now()),
        )
        .expect("allocate");
        store
    }

    #[test]
    fn update_refreshes_every_member() {
        let mut store = seeded();
        let mut grace = store.require_user(UserId(2)).expect("user");
        grace.cycle_experience = 30;
        store.put_user(grace).expect("put");

        let update = cohort_update(&mut store, UserId(1), now())
            .expect("update")
            .expect("placed");
        let channel = Recorder::default();
        assert!(push_update(&channel, UserId(1), &update));

        let sent = channel.sent.borrow();
        assert_eq!(sent.len(), 1);
        let (to, update) = &sent[0];
        assert_eq!(*to, UserId(1));
        assert_eq!(update.current_tier, "Bronze");
        assert_eq!(update.leaderboard[0].user, UserId(2));
        assert_eq!(update.leaderboard[0].experience, 30);
    }

    #[test]
    fn delivery_failure_is_swallowed() {
        let mut store = seeded();
        let update = cohort_update(&mut store, UserId(1), now())
            .expect("update")
            .expect("placed");
        let channel = Recorder {
            fail: true,
            ..Recorder::default()
        };
        assert!(!push_update(&channel, UserId(1), &update));
    }

    #[test]
    fn locked_out_user_gets_nothing() {
        let mut store = seeded();
        store.put_user(User::new(UserId(3), "alan")).expect("user");
        assert!(cohort_update(&mut store, UserId(3), now()).expect("update").is_none());
    }
}
