//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{NaiveDate, TimeZone, Utc};
use league::api::{
    HealthResponse, LeaderboardRow, LiveUpdate, MAX_USERNAME_LENGTH, OutcomeJson,
    RegisterUserRequest, StandingsResponse, StatusResponse,
};
use league_core::{
    ActiveStandings, CohortId, LeaderboardEntry, LeaderboardUpdate, LeagueMetrics,
    OutcomeSummary, Standings, Tier, UserId,
};

fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).single().unwrap()
}

fn entry(id: u64, name: &str, experience: u64, rank: u32) -> LeaderboardEntry {
    LeaderboardEntry {
        user: UserId(id),
        username: name.to_string(),
        experience,
        rank,
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_status_response_from_metrics() {
    let metrics = LeagueMetrics {
        tier_count: 10,
        user_count: 45,
        active_users: 40,
        locked_out_users: 5,
        current_cohorts: 2,
        total_cohorts: 4,
        current_placements: 40,
        outcome_count: 38,
        current_cycle: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        last_reset: Some(NaiveDate::from_ymd_opt(2023, 12, 25).unwrap()),
    };

    let status = StatusResponse::from(&metrics);

    assert_eq!(status.league_count, 10);
    assert_eq!(status.current_cycle, "2024-01-01");
    assert_eq!(status.last_reset.as_deref(), Some("2023-12-25"));
    assert_eq!(status.fill_per_thousand, metrics.fill_per_thousand());
    assert!(status.live_connections.is_none());
    let value = serde_json::to_value(&status).unwrap();
    assert!(value.get("live_connections").is_none());
}

// =============================================================================
// STANDINGS RESPONSE
// =============================================================================

#[test]
fn test_standings_response_active() {
    let standings = Standings::Active(ActiveStandings {
        cohort: CohortId(3),
        cycle_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        current_tier: "Silver".to_string(),
        leaderboard: vec![entry(2, "grace", 30, 1), entry(1, "ada", 12, 2)],
        tiers: vec![
            Tier::new("Bronze", "images/bronze.png", 0),
            Tier::new("Silver", "images/silver.png", 1),
        ],
        outcome: OutcomeSummary {
            finished_rank: 4,
            old_tier: "Bronze".to_string(),
            new_tier: "Silver".to_string(),
        },
        countdown_seconds: 388_860,
    });

    let response = StandingsResponse::new(&standings, noon());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["currentLeague"], "Silver");
    assert_eq!(value["outcome"]["finished_rank"], 4);
    assert_eq!(value["outcome"]["old_league"], "Bronze");
    assert_eq!(value["outcome"]["new_league"], "Silver");
    assert_eq!(value["leaderboard"][1]["username"], "ada");
    assert_eq!(value["leaderboard"][1]["exp_earned"], 12);
    assert_eq!(value["leagues"][1]["order"], 1);
    assert_eq!(value["countdown_seconds"], 388_860);
    assert_eq!(value["server_time_utc"], "2024-01-03T12:00:00Z");
    assert_eq!(value["locked_out"], false);
    assert_eq!(value["cohort_id"], 3);
    assert_eq!(value["cycle_start"], "2024-01-01");
}

#[test]
fn test_standings_response_locked_out() {
    let response = StandingsResponse::new(&Standings::LockedOut, noon());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["locked_out"], true);
    assert_eq!(value["currentLeague"], "");
    assert!(value["leaderboard"].as_array().unwrap().is_empty());
    assert!(value["leagues"].as_array().unwrap().is_empty());
    assert!(value.get("cohort_id").is_none());
    // Wednesday noon to Monday 00:01
    assert_eq!(value["countdown_seconds"], 4 * 86_400 + 12 * 3_600 + 60);
}

#[test]
fn test_outcome_placeholder_is_zeroed() {
    let outcome = OutcomeJson::from(&OutcomeSummary::default());
    assert_eq!(outcome.finished_rank, 0);
    assert!(outcome.old_league.is_empty());
    assert!(outcome.new_league.is_empty());
}

// =============================================================================
// LIVE UPDATE
// =============================================================================

#[test]
fn test_live_update_wire_names() {
    let update = LeaderboardUpdate {
        leaderboard: vec![entry(9, "linus", 7, 1)],
        current_tier: "Gold".to_string(),
    };

    let json = serde_json::to_string(&LiveUpdate::from(&update)).unwrap();

    assert!(json.contains("\"currentLeague\":\"Gold\""));
    assert!(json.contains("\"exp_earned\":7"));
    let back: LiveUpdate = serde_json::from_str(&json).unwrap();
    assert_eq!(
        back.leaderboard,
        vec![LeaderboardRow {
            user_id: 9,
            username: "linus".to_string(),
            exp_earned: 7,
            rank: 1,
        }]
    );
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[test]
fn test_register_request_validation() {
    let ok = RegisterUserRequest {
        user_id: 1,
        username: " ada ".to_string(),
    };
    assert_eq!(ok.validated_username().unwrap(), "ada");

    let blank = RegisterUserRequest {
        user_id: 1,
        username: String::new(),
    };
    assert!(blank.validated_username().is_err());

    let long = RegisterUserRequest {
        user_id: 1,
        username: "x".repeat(MAX_USERNAME_LENGTH + 1),
    };
    assert!(long.validated_username().is_err());
}
