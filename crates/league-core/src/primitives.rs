//! # League Primitives
//!
//! Hardcoded constants for the league engine.
//!
//! These values shape every cycle: how big a cohort can grow, how many
//! members move at a boundary, and what it takes to re-enter after a lockout.
//! They are compiled into the binary and are immutable at runtime.

/// Maximum number of placements in a single cohort.
pub const COHORT_CAPACITY: usize = 30;

/// Size of the promotion ("top") bucket.
///
/// Cohorts smaller than this promote everyone.
pub const PROMOTED_COUNT: usize = 7;

/// Size of the demotion ("bottom") bucket.
pub const DEMOTED_COUNT: usize = 7;

/// Smallest cohort that has a demotion bucket at all.
///
/// Below this size only the top bucket is taken and the rest stay.
pub const DEMOTION_MIN_COHORT: usize = 24;

/// Entry counter value needed to (re-)join the lowest tier.
///
/// Locked-out users are also reset to exactly this value, so the next
/// sweep re-admits them.
pub const ENTRY_THRESHOLD: u64 = 40;

/// Reward credited to every top-bucket member of the highest tier.
pub const TOP_TIER_BONUS: u64 = 50;

/// Length of one cycle.
pub const CYCLE_LENGTH_DAYS: i64 = 7;

/// Cycles start at this hour (UTC) on Monday.
pub const CYCLE_START_HOUR: u32 = 0;

/// Cycles start at this minute (UTC) on Monday.
pub const CYCLE_START_MINUTE: u32 = 1;
