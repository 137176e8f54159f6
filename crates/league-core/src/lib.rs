//! # league-core
//!
//! The deterministic weekly league engine - THE LOGIC.
//!
//! Users are grouped into cohorts of at most 30 inside ordered tiers, earn
//! experience during a Monday-to-Monday cycle, and at the boundary are
//! promoted, demoted, retained or locked out based on rank in their cohort.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Takes the current instant from the caller; it never reads the clock
//! - Uses `BTreeMap`/`BTreeSet` only, integer arithmetic only
//! - Runs every operation inside one store transaction via [`Session`]
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod admission;
pub mod allocator;
pub mod cycle;
pub mod metrics;
pub mod notifier;
pub mod primitives;
pub mod reset;
pub mod session;
pub mod standings;
pub mod store;
pub mod types;
pub mod users;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Cohort, CohortId, LeaderboardEntry, LeagueError, OutcomeSummary, Placement, PlacementId,
    Tier, TierCatalog, User, UserId, WeeklyOutcome,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use admission::{Admission, admit_if_eligible};
pub use allocator::{Allocation, allocate, open_cohort};
pub use cycle::{countdown_seconds, current_cycle_date, next_cycle_start, previous_cycle_start};
pub use metrics::LeagueMetrics;
pub use notifier::{LeaderboardUpdate, UpdateChannel, cohort_update, push_update};
pub use reset::{Bucket, Buckets, Movement, ResetReport, partition, run_reset};
pub use session::{Session, StorageBackend};
pub use standings::{ActiveStandings, Standings, standings};
pub use store::{LeagueStore, MemoryStore, RedbStore};
pub use users::{UserStatus, award_experience, register_user, status_rows};
