//! # API Request/Response Types
//!
//! JSON structures for the HTTP API and the live channel.
//!
//! Field names follow the wire format the clients already consume:
//! tiers are "leagues" on the wire and the current tier is `currentLeague`.

use chrono::{DateTime, SecondsFormat, Utc};
use league_core::{
    LeaderboardEntry, LeaderboardUpdate, LeagueMetrics, OutcomeSummary, Standings,
    Tier, User, countdown_seconds,
};
use serde::{Deserialize, Serialize};

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LENGTH: usize = 64;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// League status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub league_count: usize,
    pub user_count: usize,
    pub active_users: usize,
    pub locked_out_users: usize,
    pub current_cohorts: usize,
    pub current_placements: usize,
    /// Average cohort fill in thousandths of capacity.
    pub fill_per_thousand: u64,
    pub current_cycle: String,
    pub last_reset: Option<String>,
    /// Users with an open live connection; only the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_connections: Option<usize>,
}

impl From<&LeagueMetrics> for StatusResponse {
    fn from(metrics: &LeagueMetrics) -> Self {
        Self {
            league_count: metrics.tier_count,
            user_count: metrics.user_count,
            active_users: metrics.active_users,
            locked_out_users: metrics.locked_out_users,
            current_cohorts: metrics.current_cohorts,
            current_placements: metrics.current_placements,
            fill_per_thousand: metrics.fill_per_thousand(),
            current_cycle: metrics.current_cycle.to_string(),
            last_reset: metrics.last_reset.map(|d| d.to_string()),
            live_connections: None,
        }
    }
}

// =============================================================================
// STANDINGS RESPONSE
// =============================================================================

/// One tier of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueJson {
    pub name: String,
    pub icon: String,
    pub order: u32,
}

impl From<&Tier> for LeagueJson {
    fn from(tier: &Tier) -> Self {
        Self {
            name: tier.name.clone(),
            icon: tier.icon.clone(),
            order: tier.order,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub user_id: u64,
    pub username: String,
    pub exp_earned: u64,
    pub rank: u32,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            user_id: entry.user.0,
            username: entry.username.clone(),
            exp_earned: entry.experience,
            rank: entry.rank,
        }
    }
}

/// Last weekly outcome; all zero/empty when there is none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeJson {
    pub finished_rank: u32,
    pub old_league: String,
    pub new_league: String,
}

impl From<&OutcomeSummary> for OutcomeJson {
    fn from(outcome: &OutcomeSummary) -> Self {
        Self {
            finished_rank: outcome.finished_rank,
            old_league: outcome.old_tier.clone(),
            new_league: outcome.new_tier.clone(),
        }
    }
}

/// `GET /league/current` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsResponse {
    #[serde(rename = "currentLeague")]
    pub current_league: String,
    pub outcome: OutcomeJson,
    pub leaderboard: Vec<LeaderboardRow>,
    pub leagues: Vec<LeagueJson>,
    pub countdown_seconds: i64,
    pub server_time_utc: String,
    pub locked_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_start: Option<String>,
}

impl StandingsResponse {
    /// Build the wire view of `standings` computed at `now`.
    pub fn new(standings: &Standings, now: DateTime<Utc>) -> Self {
        let server_time_utc = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        match standings {
            Standings::LockedOut => Self {
                current_league: String::new(),
                outcome: OutcomeJson::default(),
                leaderboard: Vec::new(),
                leagues: Vec::new(),
                countdown_seconds: countdown_seconds(now),
                server_time_utc,
                locked_out: true,
                cohort_id: None,
                cycle_start: None,
            },
            Standings::Active(active) => Self {
                current_league: active.current_tier.clone(),
                outcome: OutcomeJson::from(&active.outcome),
                leaderboard: active.leaderboard.iter().map(LeaderboardRow::from).collect(),
                leagues: active.tiers.iter().map(LeagueJson::from).collect(),
                countdown_seconds: active.countdown_seconds,
                server_time_utc,
                locked_out: false,
                cohort_id: Some(active.cohort.0),
                cycle_start: Some(active.cycle_start.to_string()),
            },
        }
    }
}

// =============================================================================
// LIVE UPDATE
// =============================================================================

/// Message pushed over `/ws/leaderboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub leaderboard: Vec<LeaderboardRow>,
    #[serde(rename = "currentLeague")]
    pub current_league: String,
}

impl From<&LeaderboardUpdate> for LiveUpdate {
    fn from(update: &LeaderboardUpdate) -> Self {
        Self {
            leaderboard: update.leaderboard.iter().map(LeaderboardRow::from).collect(),
            current_league: update.current_tier.clone(),
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// User registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub user_id: u64,
    pub username: String,
}

impl RegisterUserRequest {
    /// Trimmed, validated username.
    pub fn validated_username(&self) -> Result<&str, String> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err("username must not be empty".to_string());
        }
        if username.len() > MAX_USERNAME_LENGTH {
            return Err(format!(
                "username length {} exceeds maximum {} bytes",
                username.len(),
                MAX_USERNAME_LENGTH
            ));
        }
        Ok(username)
    }
}

/// A user record on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: u64,
    pub username: String,
    /// Empty while locked out.
    pub league: String,
    pub cycle_experience: u64,
    pub entry_counter: u64,
    pub reward_balance: u64,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username.clone(),
            league: user.tier.clone(),
            cycle_experience: user.cycle_experience,
            entry_counter: user.entry_counter,
            reward_balance: user.reward_balance,
        }
    }
}

/// Experience award request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardRequest {
    pub amount: u64,
}

/// Experience award response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResponse {
    pub user: UserResponse,
    /// Whether a live leaderboard update reached the user.
    pub delivered: bool,
}

// =============================================================================
// ADMISSION
// =============================================================================

/// `POST /league/join` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub placed: bool,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub cohort_id: Option<u64>,
    /// Counter at the time of the attempt; 0 once placed.
    pub entry_counter: u64,
    /// Set when the caller was locked out this cycle: the reset opening
    /// this cycle admits them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admitted_from: Option<String>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
