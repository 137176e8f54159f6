//! # Users
//!
//! Registration, experience awards and the per-user status listing.

use crate::cycle::current_cycle_date;
use crate::standings::rank_cohort;
use crate::store::LeagueStore;
use crate::{LeagueError, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Register a new user. They start locked out with every counter at zero.
///
/// # Errors
///
/// `LeagueError::UserExists` if the id is taken.
pub fn register_user(
    store: &mut dyn LeagueStore,
    id: UserId,
    username: &str,
) -> Result<User, LeagueError> {
    if store.user(id)?.is_some() {
        return Err(LeagueError::UserExists(id));
    }
    let user = User::new(id, username);
    store.put_user(user.clone())?;
    tracing::info!(user_id = id.0, username, "Registered user");
    Ok(user)
}

/// Add `amount` to the user's cycle experience.
///
/// While the user is locked out the amount also counts towards the entry
/// counter. Both counters saturate.
pub fn award_experience(
    store: &mut dyn LeagueStore,
    id: UserId,
    amount: u64,
) -> Result<User, LeagueError> {
    let mut user = store.require_user(id)?;
    user.cycle_experience = user.cycle_experience.saturating_add(amount);
    if user.is_locked_out() {
        user.entry_counter = user.entry_counter.saturating_add(amount);
    }
    store.put_user(user.clone())?;
    tracing::debug!(
        user_id = id.0,
        amount,
        cycle_experience = user.cycle_experience,
        entry_counter = user.entry_counter,
        "Awarded experience"
    );
    Ok(user)
}

/// One row of the league status dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: u64,
    pub username: String,
    /// Empty when locked out.
    pub tier: String,
    pub cycle_experience: u64,
    pub entry_counter: u64,
    pub reward_balance: u64,
    /// Experience stored on the current-cycle placement.
    pub placement_experience: Option<u64>,
    /// 1-based rank inside the current cohort.
    pub rank_in_cohort: Option<u32>,
}

/// Status of every user for the cycle containing `now`, ascending id.
pub fn status_rows(
    store: &dyn LeagueStore,
    now: DateTime<Utc>,
) -> Result<Vec<UserStatus>, LeagueError> {
    let cycle_start = current_cycle_date(&now);
    let mut rows = Vec::new();

    for user in store.users()? {
        let placement = store.placement_in_cycle(user.id, cycle_start)?;
        let (placement_experience, rank_in_cohort) = match placement {
            Some((cohort, placement)) => {
                let rank = rank_cohort(store, cohort.id)?
                    .iter()
                    .find(|entry| entry.user == user.id)
                    .map(|entry| entry.rank);
                (Some(placement.experience), rank)
            }
            None => (None, None),
        };
        rows.push(UserStatus {
            user_id: user.id.0,
            username: user.username,
            tier: user.tier,
            cycle_experience: user.cycle_experience,
            entry_counter: user.entry_counter,
            reward_balance: user.reward_balance,
            placement_experience,
            rank_in_cohort,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn duplicate_registration_fails() {
        let mut store = MemoryStore::new();
        register_user(&mut store, UserId(1), "ada").expect("register");
        let err = register_user(&mut store, UserId(1), "ada").expect_err("must fail");
        assert!(matches!(err, LeagueError::UserExists(UserId(1))));
    }

    #[test]
    fn locked_out_award_counts_towards_entry() {
        let mut store = MemoryStore::new();
        register_user(&mut store, UserId(1), "ada").expect("register");
        let user = award_experience(&mut store, UserId(1), 25).expect("award");
        assert_eq!(user.cycle_experience, 25);
        assert_eq!(user.entry_counter, 25);
    }

    #[test]
    fn active_award_leaves_entry_counter() {
        let mut store = MemoryStore::new();
        let mut user = User::new(UserId(1), "ada");
        user.tier = "Bronze".to_string();
        store.put_user(user).expect("put");

        let user = award_experience(&mut store, UserId(1), 10).expect("award");
        assert_eq!(user.cycle_experience, 10);
        assert_eq!(user.entry_counter, 0);
    }

    #[test]
    fn award_saturates() {
        let mut store = MemoryStore::new();
        let mut user = User::new(UserId(1), "ada");
        user.cycle_experience = u64::MAX - 1;
        store.put_user(user).expect("put");

        let user = award_experience(&mut store, UserId(1), 10).expect("award");
        assert_eq!(user.cycle_experience, u64::MAX);
    }
}
