//! # Session Module
//!
//! The facade the binary talks to. A `Session` owns one storage backend and
//! runs every engine operation as a single atomic unit.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore`; an operation runs against a clone that is
//!   swapped in only on success
//! - `Persistent`: `RedbStore`; an operation runs inside one redb write
//!   transaction, committed on success and aborted on error. Read-only
//!   calls use a read transaction
//!
//! Either way a failing operation leaves no trace.

use crate::admission::{Admission, admit_if_eligible};
use crate::metrics::LeagueMetrics;
use crate::notifier::{UpdateChannel, cohort_update, push_update};
use crate::reset::{ResetReport, run_reset};
use crate::standings::{Standings, standings};
use crate::store::{LeagueStore, MemoryStore, RedbStore};
use crate::users::{UserStatus, award_experience, register_user, status_rows};
use crate::{LeagueError, Tier, TierCatalog, User, UserId};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// A Session wraps a storage backend and exposes the league operations.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session over an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, LeagueError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Run `op` as one atomic unit: all of its writes land, or none do.
    pub fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut dyn LeagueStore) -> Result<T, LeagueError>,
    ) -> Result<T, LeagueError> {
        match &mut self.backend {
            StorageBackend::InMemory(store) => {
                let mut draft = store.clone();
                let value = op(&mut draft)?;
                *store = draft;
                Ok(value)
            }
            StorageBackend::Persistent(redb) => redb.write(op),
        }
    }

    /// Run a read-only `op`.
    pub fn inspect<T>(
        &self,
        op: impl FnOnce(&dyn LeagueStore) -> Result<T, LeagueError>,
    ) -> Result<T, LeagueError> {
        match &self.backend {
            StorageBackend::InMemory(store) => op(store),
            StorageBackend::Persistent(redb) => redb.read(op),
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Seed the tier table. Returns how many tiers were written.
    ///
    /// A store that already has tiers is left alone and `Ok(0)` returned.
    pub fn seed_tiers(&mut self, tiers: &[Tier]) -> Result<usize, LeagueError> {
        let catalog = TierCatalog::new(tiers.to_vec())?;
        self.atomically(|store| {
            if !store.tiers()?.is_empty() {
                tracing::debug!("Tier table already seeded");
                return Ok(0);
            }
            for tier in catalog.tiers() {
                store.put_tier(tier.clone())?;
            }
            tracing::info!(count = catalog.len(), "Seeded tiers");
            Ok(catalog.len())
        })
    }

    /// The validated tier catalog.
    pub fn catalog(&self) -> Result<TierCatalog, LeagueError> {
        self.inspect(|store| store.catalog())
    }

    /// Lookup a user.
    pub fn user(&self, id: UserId) -> Result<Option<User>, LeagueError> {
        self.inspect(|store| store.user(id))
    }

    /// Register a new user.
    pub fn register_user(&mut self, id: UserId, username: &str) -> Result<User, LeagueError> {
        self.atomically(|store| register_user(store, id, username))
    }

    /// Award experience to a user.
    pub fn award_experience(&mut self, id: UserId, amount: u64) -> Result<User, LeagueError> {
        self.atomically(|store| award_experience(store, id, amount))
    }

    /// Admit a locked-out user if their entry counter allows it.
    pub fn admit(&mut self, id: UserId, now: DateTime<Utc>) -> Result<Admission, LeagueError> {
        self.atomically(|store| admit_if_eligible(store, id, now))
    }

    /// Run the weekly reset for the cycle boundary before `now`.
    pub fn run_reset(&mut self, now: DateTime<Utc>) -> Result<ResetReport, LeagueError> {
        self.atomically(|store| run_reset(store, now))
    }

    /// Standings of a user, self-healing a missing placement.
    pub fn standings(&mut self, id: UserId, now: DateTime<Utc>) -> Result<Standings, LeagueError> {
        self.atomically(|store| standings(store, id, now))
    }

    /// Refresh a user's cohort, then push the committed leaderboard to their
    /// live channel. Returns whether it was delivered.
    pub fn publish(
        &mut self,
        channel: &dyn UpdateChannel,
        id: UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, LeagueError> {
        let Some(update) = self.atomically(|store| cohort_update(store, id, now))? else {
            tracing::debug!(user_id = id.0, "No current cohort, skipping update");
            return Ok(false);
        };
        Ok(push_update(channel, id, &update))
    }

    /// Current metrics.
    pub fn metrics(&self, now: DateTime<Utc>) -> Result<LeagueMetrics, LeagueError> {
        self.inspect(|store| LeagueMetrics::from_store(store, now))
    }

    /// Status of every user.
    pub fn status_rows(&self, now: DateTime<Utc>) -> Result<Vec<UserStatus>, LeagueError> {
        self.inspect(|store| status_rows(store, now))
    }
}
