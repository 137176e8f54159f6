//! # Reset Scenarios
//!
//! End-to-end weekly resets through `Session`, on both backends.

use chrono::{DateTime, Duration, TimeZone, Utc};
use league_core::{
    Admission, LeagueError, LeagueStore, MemoryStore, Session, Standings, Tier, User, UserId,
    allocate, current_cycle_date,
};
use tempfile::tempdir;

// =============================================================================
// FIXTURES
// =============================================================================

const NAMES: [&str; 6] = ["Bronze", "Silver", "Gold", "Platinum", "Diamond", "Sapphire"];

fn ladder() -> Vec<Tier> {
    NAMES
        .iter()
        .enumerate()
        .map(|(i, n)| Tier::new(*n, format!("images/{}.png", n.to_lowercase()), i as u32))
        .collect()
}

/// Wednesday of the closing cycle.
fn during() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Just after the following boundary.
fn boundary() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 0, 2, 0)
        .single()
        .expect("valid timestamp")
}

/// A store with `experience.len()` users placed into one cohort of `tier`.
/// User ids start at `first_id`, experience is assigned in order.
fn populate(store: &mut MemoryStore, tier: u32, first_id: u64, experience: &[u64]) {
    let tiers = ladder();
    let mut ids = Vec::new();
    for (offset, _) in experience.iter().enumerate() {
        let id = UserId(first_id + offset as u64);
        store
            .put_user(User::new(id, format!("user{}", id.0)))
            .expect("user");
        ids.push(id);
    }
    allocate(store, &ids, &tiers[tier as usize], current_cycle_date(&during())).expect("allocate");
    for (id, exp) in ids.iter().zip(experience) {
        let mut user = store.require_user(*id).expect("user");
        user.cycle_experience = *exp;
        store.put_user(user).expect("put");
        let (cohort, _) = store
            .placement_in_cycle(*id, current_cycle_date(&during()))
            .expect("lookup")
            .expect("placed");
        store
            .set_placement_experience(*id, cohort.id, *exp)
            .expect("set exp");
    }
}

fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for tier in ladder() {
        store.put_tier(tier).expect("tier");
    }
    store
}

fn tier_of(session: &Session, id: u64) -> String {
    session
        .user(UserId(id))
        .expect("lookup")
        .expect("exists")
        .tier
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn full_cohort_in_middle_tier() {
    let mut store = seeded_store();
    // users 0..30 with experience 29..0
    let experience: Vec<u64> = (0..30).rev().collect();
    populate(&mut store, 3, 0, &experience);
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");

    assert_eq!(report.members_processed, 30);
    assert_eq!(report.promoted, 7);
    assert_eq!(report.demoted, 7);
    assert_eq!(report.retained, 16);
    assert_eq!(report.locked_out, 0);
    assert_eq!(report.cohorts_closed, 1);

    for id in 0..7 {
        assert_eq!(tier_of(&session, id), "Diamond");
    }
    for id in 7..23 {
        assert_eq!(tier_of(&session, id), "Platinum");
    }
    for id in 23..30 {
        assert_eq!(tier_of(&session, id), "Gold");
    }
    // zero experience outside the lowest tier is a plain demotion
    let last = session.user(UserId(29)).expect("lookup").expect("exists");
    assert_eq!(last.tier, "Gold");
    assert_eq!(last.entry_counter, 0);
}

#[test]
fn outcomes_match_processed_members() {
    let mut store = seeded_store();
    let experience: Vec<u64> = (1..=12).collect();
    populate(&mut store, 2, 0, &experience);
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");

    let outcomes = session
        .inspect(|s| {
            let mut list = Vec::new();
            for id in 0..12 {
                list.push(s.outcome(UserId(id))?.expect("outcome"));
            }
            Ok(list)
        })
        .expect("read");
    assert_eq!(outcomes.len(), report.members_processed);
    for outcome in &outcomes {
        assert!((1..=12).contains(&outcome.finished_rank));
        assert_eq!(outcome.old_tier, "Gold");
        assert_eq!(outcome.recorded_at, boundary());
    }
    // user 11 had the most experience
    let best = outcomes.iter().find(|o| o.user == UserId(11)).expect("best");
    assert_eq!(best.finished_rank, 1);
    assert_eq!(best.new_tier, "Platinum");
}

#[test]
fn small_lowest_tier_cohort_with_zero_experience_is_locked_out() {
    let mut store = seeded_store();
    populate(&mut store, 0, 0, &[0, 0, 0, 0, 0]);
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");

    assert_eq!(report.locked_out, 5);
    assert_eq!(report.promoted, 0);
    for id in 0..5 {
        let user = session.user(UserId(id)).expect("lookup").expect("exists");
        assert!(user.is_locked_out());
        assert_eq!(user.entry_counter, 40);
    }
    let metrics = session.metrics(boundary()).expect("metrics");
    assert_eq!(metrics.current_cohorts, 0);
}

#[test]
fn highest_tier_top_gains_bonus_and_stays() {
    let mut store = seeded_store();
    let experience: Vec<u64> = (1..=10).rev().collect();
    populate(&mut store, 5, 0, &experience);
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");

    assert_eq!(report.rewarded, 7);
    for id in 0..7 {
        let user = session.user(UserId(id)).expect("lookup").expect("exists");
        assert_eq!(user.tier, "Sapphire");
        assert_eq!(user.reward_balance, 50);
    }
    let middle = session.user(UserId(8)).expect("lookup").expect("exists");
    assert_eq!(middle.reward_balance, 0);
}

#[test]
fn lockout_sweep_readmits_and_zeroes() {
    let mut store = seeded_store();
    let mut ready = User::new(UserId(100), "ready");
    ready.entry_counter = 40;
    store.put_user(ready).expect("user");
    let mut short = User::new(UserId(101), "short");
    short.entry_counter = 39;
    store.put_user(short).expect("user");
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");

    assert_eq!(report.readmitted, 1);
    let ready = session.user(UserId(100)).expect("lookup").expect("exists");
    assert_eq!(ready.tier, "Bronze");
    assert_eq!(ready.entry_counter, 0);
    let short = session.user(UserId(101)).expect("lookup").expect("exists");
    assert!(short.is_locked_out());
    assert_eq!(short.entry_counter, 0);
}

#[test]
fn newly_locked_out_users_are_readmitted_next_week() {
    let mut store = seeded_store();
    populate(&mut store, 0, 0, &[0]);
    let mut session = Session::with_store(store);

    session.run_reset(boundary()).expect("first reset");
    assert!(
        session
            .user(UserId(0))
            .expect("lookup")
            .expect("exists")
            .is_locked_out()
    );

    let report = session
        .run_reset(boundary() + Duration::days(7))
        .expect("second reset");
    assert_eq!(report.readmitted, 1);
    assert_eq!(tier_of(&session, 0), "Bronze");
}

#[test]
fn cohorts_in_new_cycle_never_exceed_capacity() {
    let mut store = seeded_store();
    // three full Silver cohorts: 21 promoted into Gold, 21 demoted into Bronze
    for block in 0..3u64 {
        let experience: Vec<u64> = (1..=30).collect();
        populate(&mut store, 1, block * 30, &experience);
    }
    let mut session = Session::with_store(store);

    let report = session.run_reset(boundary()).expect("reset");
    assert_eq!(report.members_processed, 90);
    assert_eq!(report.promoted, 21);
    assert_eq!(report.demoted, 21);

    let opening = current_cycle_date(&boundary());
    session
        .inspect(|s| {
            let cohorts = s.cohorts_in_cycle(opening)?;
            // 48 Silver -> 2, 21 Gold -> 1, 21 Bronze -> 1
            assert_eq!(cohorts.len(), 4);
            for cohort in cohorts {
                assert!(s.placement_count(cohort.id)? <= 30);
            }
            Ok(())
        })
        .expect("read");
}

#[test]
fn early_placement_in_new_cycle_is_replaced() {
    let mut store = seeded_store();
    let experience: Vec<u64> = (1..=10).collect();
    populate(&mut store, 1, 0, &experience);
    let mut session = Session::with_store(store);

    // a read after the boundary but before the reset self-heals into Bronze
    session.standings(UserId(9), boundary()).expect("standings");

    session.run_reset(boundary()).expect("reset");
    let opening = current_cycle_date(&boundary());
    let placements = session
        .inspect(|s| s.user_placements(UserId(9)))
        .expect("read");
    assert_eq!(placements.len(), 1);
    let cohort = session
        .inspect(|s| s.cohort(placements[0].cohort))
        .expect("read")
        .expect("cohort");
    assert_eq!(cohort.cycle_start, opening);
    assert_eq!(cohort.tier, 2);
}

#[test]
fn awards_count_without_a_standings_read() {
    let mut session = Session::new();
    session.seed_tiers(&ladder()).expect("seed");
    session.register_user(UserId(1), "ada").expect("register");
    session.award_experience(UserId(1), 40).expect("award");
    assert!(session.admit(UserId(1), during()).expect("admit").is_placed());
    session.award_experience(UserId(1), 25).expect("award");

    let report = session.run_reset(boundary()).expect("reset");

    assert_eq!(report.promoted, 1);
    assert_eq!(report.locked_out, 0);
    assert_eq!(tier_of(&session, 1), "Silver");
    let outcome = session
        .inspect(|s| s.outcome(UserId(1)))
        .expect("read")
        .expect("outcome");
    assert_eq!(outcome.finished_rank, 1);
    assert_eq!(outcome.new_tier, "Silver");
}

#[test]
fn equal_experience_ranks_in_placement_order() {
    let mut store = seeded_store();
    let order = [UserId(9), UserId(3), UserId(5)];
    for id in order {
        let mut user = User::new(id, format!("user{}", id.0));
        user.tier = "Gold".to_string();
        store.put_user(user).expect("user");
    }
    allocate(&mut store, &order, &ladder()[2], current_cycle_date(&during())).expect("allocate");
    for id in order {
        let mut user = store.require_user(id).expect("user");
        user.cycle_experience = 10;
        store.put_user(user).expect("put");
    }
    let mut session = Session::with_store(store);

    session.run_reset(boundary()).expect("reset");

    let ranks = session
        .inspect(|s| {
            let mut ranks = Vec::new();
            for id in order {
                ranks.push(s.outcome(id)?.expect("outcome").finished_rank);
            }
            Ok(ranks)
        })
        .expect("read");
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn locked_out_user_is_not_readmitted_in_the_same_cycle() {
    let mut store = seeded_store();
    populate(&mut store, 0, 0, &[0]);
    let mut session = Session::with_store(store);
    session.run_reset(boundary()).expect("reset");

    let user = session.user(UserId(0)).expect("lookup").expect("exists");
    assert!(user.is_locked_out());
    assert_eq!(user.entry_counter, 40);

    let next_cycle = current_cycle_date(&(boundary() + Duration::days(7)));
    let admission = session.admit(UserId(0), boundary()).expect("admit");
    assert_eq!(
        admission,
        Admission::Deferred {
            entry_counter: 40,
            next_cycle,
        }
    );
    let later = boundary() + Duration::days(3);
    assert!(!session.admit(UserId(0), later).expect("admit").is_placed());
    assert_eq!(
        session.standings(UserId(0), later).expect("standings"),
        Standings::LockedOut
    );

    let report = session
        .run_reset(boundary() + Duration::days(7))
        .expect("second reset");
    assert_eq!(report.readmitted, 1);
    assert_eq!(tier_of(&session, 0), "Bronze");
}

// =============================================================================
// FAILURE SEMANTICS
// =============================================================================

#[test]
fn second_reset_of_same_cycle_is_refused() {
    let mut store = seeded_store();
    populate(&mut store, 2, 0, &[5, 4, 3]);
    let mut session = Session::with_store(store);
    session.run_reset(boundary()).expect("first reset");

    let before = session.status_rows(boundary()).expect("rows");
    let err = session
        .run_reset(boundary() + Duration::hours(1))
        .expect_err("second reset must fail");
    assert!(matches!(err, LeagueError::AlreadyReset(_)));
    assert_eq!(session.status_rows(boundary()).expect("rows"), before);
}

#[test]
fn reset_without_tiers_writes_nothing() {
    let mut store = MemoryStore::new();
    let mut user = User::new(UserId(1), "ada");
    user.entry_counter = 12;
    store.put_user(user).expect("user");
    let mut session = Session::with_store(store);

    let err = session.run_reset(boundary()).expect_err("must fail");
    assert!(matches!(err, LeagueError::NoTiers));
    let user = session.user(UserId(1)).expect("lookup").expect("exists");
    assert_eq!(user.entry_counter, 12);
}

#[test]
fn redb_reset_survives_reopen() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("league.redb");

    {
        let mut session = Session::with_redb(&path).expect("open");
        session.seed_tiers(&ladder()).expect("seed");
        for id in 0..8 {
            session
                .register_user(UserId(id), &format!("user{id}"))
                .expect("register");
            session.award_experience(UserId(id), 40).expect("award");
            session.admit(UserId(id), during()).expect("admit");
            session
                .award_experience(UserId(id), id + 1)
                .expect("award");
        }
        let report = session.run_reset(boundary()).expect("reset");
        assert_eq!(report.members_processed, 8);
        assert_eq!(report.promoted, 7);
    }

    let mut session = Session::with_redb(&path).expect("reopen");
    assert_eq!(tier_of(&session, 7), "Silver");
    assert_eq!(tier_of(&session, 0), "Bronze");
    let err = session.run_reset(boundary()).expect_err("already reset");
    assert!(matches!(err, LeagueError::AlreadyReset(_)));
}
