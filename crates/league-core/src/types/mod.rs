//! # Core Type Definitions
//!
//! This module contains all core types for the league engine:
//! - Identifiers (`UserId`, `CohortId`, `PlacementId`)
//! - Reference data (`Tier`, `TierCatalog`)
//! - Cycle records (`Cohort`, `Placement`, `WeeklyOutcome`)
//! - The fields of a user that the engine owns (`User`)
//! - Error types (`LeagueError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`
//! - Use saturating arithmetic for counters to prevent overflow

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::primitives::ENTRY_THRESHOLD;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a user in the external account system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Identifier of a cohort ("league group"). Allocated monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CohortId(pub u64);

/// Identifier of a placement. Monotonic, so it doubles as insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlacementId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for CohortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TIER
// =============================================================================

/// A named, ordered competitive level.
///
/// `order` is dense from 0 (lowest) to N-1 (highest) across the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Unique display name, also stored on the user as the tier pointer.
    pub name: String,
    /// Icon reference handed to clients untouched.
    pub icon: String,
    /// Position in the ladder, 0 = lowest.
    pub order: u32,
}

impl Tier {
    /// Create a new tier.
    #[must_use]
    pub fn new(name: impl Into<String>, icon: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            order,
        }
    }
}

/// Validated, ordered view over the tier table.
///
/// Promotion and demotion adjacency is derived from `order` arithmetic,
/// never from tier names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    /// Build a catalog, checking that orders are dense `0..N` and names unique.
    ///
    /// # Errors
    ///
    /// - `LeagueError::NoTiers` if `tiers` is empty
    /// - `LeagueError::InvalidTierCatalog` on gaps, duplicate orders or names
    pub fn new(mut tiers: Vec<Tier>) -> Result<Self, LeagueError> {
        if tiers.is_empty() {
            return Err(LeagueError::NoTiers);
        }
        tiers.sort_by_key(|t| t.order);

        let mut names = BTreeSet::new();
        for (expected, tier) in tiers.iter().enumerate() {
            if tier.order as usize != expected {
                return Err(LeagueError::InvalidTierCatalog(format!(
                    "tier '{}' has order {}, expected {}",
                    tier.name, tier.order, expected
                )));
            }
            if tier.name.is_empty() {
                return Err(LeagueError::InvalidTierCatalog(format!(
                    "tier at order {} has an empty name",
                    tier.order
                )));
            }
            if !names.insert(tier.name.as_str()) {
                return Err(LeagueError::InvalidTierCatalog(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// All tiers, lowest first.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// A validated catalog is never empty; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// The entry tier (order 0).
    ///
    /// # Errors
    ///
    /// Returns `LeagueError::LowestTierMissing` if the catalog is empty.
    pub fn lowest(&self) -> Result<&Tier, LeagueError> {
        self.tiers.first().ok_or(LeagueError::LowestTierMissing)
    }

    /// Tier at the given order.
    #[must_use]
    pub fn by_order(&self, order: u32) -> Option<&Tier> {
        self.tiers.get(order as usize)
    }

    /// The tier one step above `order`, if any.
    #[must_use]
    pub fn above(&self, order: u32) -> Option<&Tier> {
        self.by_order(order.checked_add(1)?)
    }

    /// The tier one step below `order`, if any.
    #[must_use]
    pub fn below(&self, order: u32) -> Option<&Tier> {
        self.by_order(order.checked_sub(1)?)
    }

    /// True if `order` is the entry tier.
    #[must_use]
    pub fn is_lowest(&self, order: u32) -> bool {
        order == 0
    }
}

// =============================================================================
// USER
// =============================================================================

/// The slice of a user account that the league engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Current tier name. Empty means locked out / not participating.
    pub tier: String,
    /// Experience earned in the current cycle.
    pub cycle_experience: u64,
    /// Experience earned while locked out; admission needs `ENTRY_THRESHOLD`.
    pub entry_counter: u64,
    /// Reward currency, credited on top-tier retention.
    pub reward_balance: u64,
}

impl User {
    /// A freshly registered user: no tier, all counters at zero.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            tier: String::new(),
            cycle_experience: 0,
            entry_counter: 0,
            reward_balance: 0,
        }
    }

    /// A user without a tier does not participate in any cohort.
    #[must_use]
    pub fn is_locked_out(&self) -> bool {
        self.tier.is_empty()
    }

    /// Whether the entry counter has reached the admission threshold.
    #[must_use]
    pub fn is_entry_eligible(&self) -> bool {
        self.entry_counter >= ENTRY_THRESHOLD
    }
}

// =============================================================================
// COHORT & PLACEMENT
// =============================================================================

/// One capacity-bounded room of a tier for one weekly cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    /// Order of the owning tier.
    pub tier: u32,
    /// Monday date identifying the cycle.
    pub cycle_start: NaiveDate,
}

/// Membership of one user in one cohort, with the experience earned there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub user: UserId,
    pub cohort: CohortId,
    pub experience: u64,
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of the most recent cycle closure for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyOutcome {
    pub user: UserId,
    /// 1-based position in the closing cohort.
    pub finished_rank: u32,
    pub old_tier: String,
    /// Empty when the user was locked out.
    pub new_tier: String,
    pub recorded_at: DateTime<Utc>,
}

/// Client-facing outcome; the default value is the "no outcome yet" placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub finished_rank: u32,
    pub old_tier: String,
    pub new_tier: String,
}

impl From<&WeeklyOutcome> for OutcomeSummary {
    fn from(outcome: &WeeklyOutcome) -> Self {
        Self {
            finished_rank: outcome.finished_rank,
            old_tier: outcome.old_tier.clone(),
            new_tier: outcome.new_tier.clone(),
        }
    }
}

// =============================================================================
// RANKED VIEW
// =============================================================================

/// One row of a cohort leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: UserId,
    pub username: String,
    pub experience: u64,
    /// 1-based.
    pub rank: u32,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the league engine.
///
/// - No silent failures
/// - Use `Result<T, LeagueError>` for fallible operations
/// - The engine never panics; storage failures surface as `IoError`
#[derive(Debug, Error)]
pub enum LeagueError {
    /// The tier table is empty.
    #[error("No leagues defined.")]
    NoTiers,

    /// The tier table violates the dense-order or unique-name invariant.
    #[error("Invalid tier catalog: {0}")]
    InvalidTierCatalog(String),

    /// No tier with order 0 exists.
    #[error("Lowest tier missing")]
    LowestTierMissing,

    /// A tier reference does not resolve.
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// The requested user is not registered.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A user with this id is already registered.
    #[error("User already exists: {0}")]
    UserExists(UserId),

    /// The requested cohort does not exist.
    #[error("Cohort not found: {0}")]
    CohortNotFound(CohortId),

    /// A second placement for the same (user, cohort) pair was attempted.
    #[error("Duplicate placement: user {user} in cohort {cohort}")]
    DuplicatePlacement { user: UserId, cohort: CohortId },

    /// The cycle starting on this date has already been closed.
    #[error("Cycle starting {0} was already reset")]
    AlreadyReset(NaiveDate),

    /// A live update could not be delivered.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A write was attempted on a read-only snapshot.
    #[error("Read-only store: {0} is not allowed")]
    ReadOnly(&'static str),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder(names: &[&str]) -> Vec<Tier> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Tier::new(*n, format!("images/{}.png", n.to_lowercase()), i as u32))
            .collect()
    }

    #[test]
    fn catalog_sorts_and_exposes_bounds() {
        let mut tiers = ladder(&["Bronze", "Silver", "Gold"]);
        tiers.reverse();
        let catalog = TierCatalog::new(tiers).expect("catalog");

        assert_eq!(catalog.lowest().expect("lowest").name, "Bronze");
        assert_eq!(catalog.by_order(2).map(|t| t.name.as_str()), Some("Gold"));
        assert_eq!(catalog.above(0).map(|t| t.name.as_str()), Some("Silver"));
        assert_eq!(catalog.below(0), None);
        assert_eq!(catalog.above(2), None);
        assert!(catalog.is_lowest(0));
    }

    #[test]
    fn catalog_rejects_gaps() {
        let tiers = vec![Tier::new("Bronze", "b", 0), Tier::new("Gold", "g", 2)];
        assert!(matches!(
            TierCatalog::new(tiers),
            Err(LeagueError::InvalidTierCatalog(_))
        ));
    }

    #[test]
    fn catalog_rejects_duplicate_names() {
        let tiers = vec![Tier::new("Bronze", "b", 0), Tier::new("Bronze", "b", 1)];
        assert!(matches!(
            TierCatalog::new(tiers),
            Err(LeagueError::InvalidTierCatalog(_))
        ));
    }

    #[test]
    fn empty_catalog_is_no_tiers() {
        assert!(matches!(TierCatalog::new(Vec::new()), Err(LeagueError::NoTiers)));
    }

    #[test]
    fn new_user_is_locked_out() {
        let user = User::new(UserId(7), "ada");
        assert!(user.is_locked_out());
        assert!(!user.is_entry_eligible());
    }

    #[test]
    fn outcome_placeholder_is_zeroed() {
        let placeholder = OutcomeSummary::default();
        assert_eq!(placeholder.finished_rank, 0);
        assert!(placeholder.old_tier.is_empty());
        assert!(placeholder.new_tier.is_empty());
    }
}
