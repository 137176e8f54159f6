//! # redb-backed League Storage
//!
//! A disk-backed league store using the redb embedded database.
//!
//! Every engine operation runs inside exactly one redb write transaction:
//! - committed when the operation returns `Ok`
//! - aborted when it returns `Err`, leaving the file untouched
//!
//! Read-only operations run on a read transaction and see the last commit
//! without queueing behind the writer.
//!
//! Records are postcard-encoded. Placements are keyed `(cohort, user)` with a
//! `(user, cohort)` index so both "who is in this cohort" and "where is this
//! user" are range scans.

use super::{LeagueStore, decode, encode};
use crate::{
    Cohort, CohortId, LeagueError, Placement, PlacementId, Tier, User, UserId, WeeklyOutcome,
};
use chrono::{Datelike, NaiveDate};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use std::path::Path;

/// Table for tiers: order(u32) -> serialized Tier
const TIERS: TableDefinition<u32, &[u8]> = TableDefinition::new("tiers");

/// Table for users: UserId(u64) -> serialized User
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Table for cohorts: CohortId(u64) -> serialized Cohort
const COHORTS: TableDefinition<u64, &[u8]> = TableDefinition::new("cohorts");

/// Table for placements: (cohort_id, user_id) -> serialized Placement
const PLACEMENTS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("placements");

/// Index: (user_id, cohort_id) -> placement id
const USER_PLACEMENTS: TableDefinition<(u64, u64), u64> = TableDefinition::new("user_placements");

/// Table for outcomes: UserId(u64) -> serialized WeeklyOutcome
const OUTCOMES: TableDefinition<u64, &[u8]> = TableDefinition::new("outcomes");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_COHORT_ID: &str = "next_cohort_id";
const NEXT_PLACEMENT_ID: &str = "next_placement_id";
/// Stored as days since 0001-01-01 (CE).
const LAST_RESET: &str = "last_reset";

/// Tables holding one postcard record per u64 key.
type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

fn io_err(e: impl std::fmt::Display) -> LeagueError {
    LeagueError::IoError(e.to_string())
}

/// A disk-backed league store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a league database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LeagueError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(TIERS).map_err(io_err)?;
            let _ = write_txn.open_table(USERS).map_err(io_err)?;
            let _ = write_txn.open_table(COHORTS).map_err(io_err)?;
            let _ = write_txn.open_table(PLACEMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(OUTCOMES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Run `op` inside one write transaction.
    ///
    /// Commits on `Ok`, aborts on `Err`.
    pub fn write<T>(
        &self,
        op: impl FnOnce(&mut dyn LeagueStore) -> Result<T, LeagueError>,
    ) -> Result<T, LeagueError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        let result = {
            let mut scope = RedbTxn { txn: &txn };
            op(&mut scope)
        };
        match result {
            Ok(value) => {
                txn.commit().map_err(io_err)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort redb transaction");
                }
                Err(e)
            }
        }
    }

    /// Run a read-only `op` against a snapshot. Never waits for a writer.
    pub fn read<T>(
        &self,
        op: impl FnOnce(&dyn LeagueStore) -> Result<T, LeagueError>,
    ) -> Result<T, LeagueError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let scope = RedbSnapshot { txn: &txn };
        op(&scope)
    }
}

// =============================================================================
// TABLE READS
// =============================================================================
//
// Shared by write transactions and read snapshots.

fn records<T, R>(table: &R) -> Result<Vec<T>, LeagueError>
where
    T: for<'de> serde::Deserialize<'de>,
    R: ReadableTable<u64, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in table.iter().map_err(io_err)? {
        let (_, value) = entry.map_err(io_err)?;
        out.push(decode(value.value())?);
    }
    Ok(out)
}

fn record<T, R>(table: &R, key: u64) -> Result<Option<T>, LeagueError>
where
    T: for<'de> serde::Deserialize<'de>,
    R: ReadableTable<u64, &'static [u8]>,
{
    match table.get(key).map_err(io_err)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn tier_records<R>(table: &R) -> Result<Vec<Tier>, LeagueError>
where
    R: ReadableTable<u32, &'static [u8]>,
{
    let mut tiers = Vec::new();
    for entry in table.iter().map_err(io_err)? {
        let (_, value) = entry.map_err(io_err)?;
        tiers.push(decode(value.value())?);
    }
    Ok(tiers)
}

/// User ids placed in `cohort`, ascending.
fn member_keys<R>(table: &R, cohort: CohortId) -> Result<Vec<u64>, LeagueError>
where
    R: ReadableTable<(u64, u64), &'static [u8]>,
{
    let mut users = Vec::new();
    for entry in table
        .range((cohort.0, 0u64)..=(cohort.0, u64::MAX))
        .map_err(io_err)?
    {
        let (key, _) = entry.map_err(io_err)?;
        users.push(key.value().1);
    }
    Ok(users)
}

/// Placements of `cohort` in insertion order.
fn cohort_placements<R>(table: &R, cohort: CohortId) -> Result<Vec<Placement>, LeagueError>
where
    R: ReadableTable<(u64, u64), &'static [u8]>,
{
    let mut list: Vec<Placement> = Vec::new();
    for entry in table
        .range((cohort.0, 0u64)..=(cohort.0, u64::MAX))
        .map_err(io_err)?
    {
        let (_, value) = entry.map_err(io_err)?;
        list.push(decode(value.value())?);
    }
    list.sort_by_key(|p| p.id);
    Ok(list)
}

fn user_placements_in<I, P>(
    index: &I,
    placements: &P,
    user: UserId,
) -> Result<Vec<Placement>, LeagueError>
where
    I: ReadableTable<(u64, u64), u64>,
    P: ReadableTable<(u64, u64), &'static [u8]>,
{
    let mut list = Vec::new();
    for entry in index
        .range((user.0, 0u64)..=(user.0, u64::MAX))
        .map_err(io_err)?
    {
        let (key, _) = entry.map_err(io_err)?;
        let (_, cohort) = key.value();
        if let Some(value) = placements.get((cohort, user.0)).map_err(io_err)? {
            list.push(decode(value.value())?);
        }
    }
    Ok(list)
}

fn meta_value<R>(table: &R, key: &str) -> Result<Option<u64>, LeagueError>
where
    R: ReadableTable<&'static str, u64>,
{
    Ok(table.get(key).map_err(io_err)?.map(|v| v.value()))
}

fn reset_marker(days: Option<u64>) -> Result<Option<NaiveDate>, LeagueError> {
    let Some(days) = days else {
        return Ok(None);
    };
    let days = i32::try_from(days)
        .map_err(|e| LeagueError::SerializationError(format!("reset marker out of range: {e}")))?;
    NaiveDate::from_num_days_from_ce_opt(days)
        .map(Some)
        .ok_or_else(|| LeagueError::SerializationError(format!("invalid reset marker {days}")))
}

// =============================================================================
// WRITE TRANSACTION SCOPE
// =============================================================================

/// A `LeagueStore` view over one open write transaction.
struct RedbTxn<'a> {
    txn: &'a WriteTransaction,
}

impl RedbTxn<'_> {
    fn meta(&self, key: &str) -> Result<Option<u64>, LeagueError> {
        let table = self.txn.open_table(METADATA).map_err(io_err)?;
        meta_value(&table, key)
    }

    fn set_meta(&self, key: &str, value: u64) -> Result<(), LeagueError> {
        let mut table = self.txn.open_table(METADATA).map_err(io_err)?;
        table.insert(key, value).map_err(io_err)?;
        Ok(())
    }

    /// Allocate the next value of a monotonic counter.
    fn next_id(&self, key: &str) -> Result<u64, LeagueError> {
        let id = self.meta(key)?.unwrap_or(0);
        self.set_meta(key, id.saturating_add(1))?;
        Ok(id)
    }

    fn fetch<T: for<'de> serde::Deserialize<'de>>(
        &self,
        def: RecordTable,
        key: u64,
    ) -> Result<Option<T>, LeagueError> {
        let table = self.txn.open_table(def).map_err(io_err)?;
        record(&table, key)
    }

    fn scan<T: for<'de> serde::Deserialize<'de>>(
        &self,
        def: RecordTable,
    ) -> Result<Vec<T>, LeagueError> {
        let table = self.txn.open_table(def).map_err(io_err)?;
        records(&table)
    }

    fn store<T: serde::Serialize>(
        &self,
        def: RecordTable,
        key: u64,
        value: &T,
    ) -> Result<(), LeagueError> {
        let bytes = encode(value)?;
        let mut table = self.txn.open_table(def).map_err(io_err)?;
        table.insert(key, bytes.as_slice()).map_err(io_err)?;
        Ok(())
    }
}

impl LeagueStore for RedbTxn<'_> {
    fn tiers(&self) -> Result<Vec<Tier>, LeagueError> {
        let table = self.txn.open_table(TIERS).map_err(io_err)?;
        tier_records(&table)
    }

    fn put_tier(&mut self, tier: Tier) -> Result<(), LeagueError> {
        let bytes = encode(&tier)?;
        let mut table = self.txn.open_table(TIERS).map_err(io_err)?;
        table.insert(tier.order, bytes.as_slice()).map_err(io_err)?;
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LeagueError> {
        self.fetch(USERS, id.0)
    }

    fn users(&self) -> Result<Vec<User>, LeagueError> {
        self.scan(USERS)
    }

    fn put_user(&mut self, user: User) -> Result<(), LeagueError> {
        self.store(USERS, user.id.0, &user)
    }

    fn cohort(&self, id: CohortId) -> Result<Option<Cohort>, LeagueError> {
        self.fetch(COHORTS, id.0)
    }

    fn cohorts(&self) -> Result<Vec<Cohort>, LeagueError> {
        self.scan(COHORTS)
    }

    fn create_cohort(&mut self, tier: u32, cycle_start: NaiveDate) -> Result<Cohort, LeagueError> {
        let cohort = Cohort {
            id: CohortId(self.next_id(NEXT_COHORT_ID)?),
            tier,
            cycle_start,
        };
        self.store(COHORTS, cohort.id.0, &cohort)?;
        Ok(cohort)
    }

    fn delete_cohort(&mut self, id: CohortId) -> Result<usize, LeagueError> {
        {
            let mut cohorts = self.txn.open_table(COHORTS).map_err(io_err)?;
            if cohorts.remove(id.0).map_err(io_err)?.is_none() {
                return Err(LeagueError::CohortNotFound(id));
            }
        }

        let mut placements = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        let members = member_keys(&placements, id)?;
        let mut index = self.txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
        for user in &members {
            placements.remove((id.0, *user)).map_err(io_err)?;
            index.remove((*user, id.0)).map_err(io_err)?;
        }
        Ok(members.len())
    }

    fn placements(&self, cohort: CohortId) -> Result<Vec<Placement>, LeagueError> {
        let table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        cohort_placements(&table, cohort)
    }

    fn placement_count(&self, cohort: CohortId) -> Result<usize, LeagueError> {
        let table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        Ok(member_keys(&table, cohort)?.len())
    }

    fn user_placements(&self, user: UserId) -> Result<Vec<Placement>, LeagueError> {
        let index = self.txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
        let placements = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        user_placements_in(&index, &placements, user)
    }

    fn insert_placement(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<Placement, LeagueError> {
        if self.cohort(cohort)?.is_none() {
            return Err(LeagueError::CohortNotFound(cohort));
        }
        {
            let table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
            if table.get((cohort.0, user.0)).map_err(io_err)?.is_some() {
                return Err(LeagueError::DuplicatePlacement { user, cohort });
            }
        }

        let placement = Placement {
            id: PlacementId(self.next_id(NEXT_PLACEMENT_ID)?),
            user,
            cohort,
            experience,
        };
        let bytes = encode(&placement)?;
        let mut table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        table
            .insert((cohort.0, user.0), bytes.as_slice())
            .map_err(io_err)?;
        let mut index = self.txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
        index
            .insert((user.0, cohort.0), placement.id.0)
            .map_err(io_err)?;
        Ok(placement)
    }

    fn set_placement_experience(
        &mut self,
        user: UserId,
        cohort: CohortId,
        experience: u64,
    ) -> Result<(), LeagueError> {
        let mut table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        let mut placement: Placement = match table.get((cohort.0, user.0)).map_err(io_err)? {
            Some(value) => decode(value.value())?,
            None => return Err(LeagueError::CohortNotFound(cohort)),
        };
        placement.experience = experience;
        let bytes = encode(&placement)?;
        table
            .insert((cohort.0, user.0), bytes.as_slice())
            .map_err(io_err)?;
        Ok(())
    }

    fn remove_placement(&mut self, user: UserId, cohort: CohortId) -> Result<bool, LeagueError> {
        let mut table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        let existed = table.remove((cohort.0, user.0)).map_err(io_err)?.is_some();
        let mut index = self.txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
        index.remove((user.0, cohort.0)).map_err(io_err)?;
        Ok(existed)
    }

    fn outcome(&self, user: UserId) -> Result<Option<WeeklyOutcome>, LeagueError> {
        self.fetch(OUTCOMES, user.0)
    }

    fn put_outcome(&mut self, outcome: WeeklyOutcome) -> Result<(), LeagueError> {
        self.store(OUTCOMES, outcome.user.0, &outcome)
    }

    fn outcome_count(&self) -> Result<usize, LeagueError> {
        let table = self.txn.open_table(OUTCOMES).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn last_reset(&self) -> Result<Option<NaiveDate>, LeagueError> {
        reset_marker(self.meta(LAST_RESET)?)
    }

    fn set_last_reset(&mut self, cycle_start: NaiveDate) -> Result<(), LeagueError> {
        let days = u64::try_from(cycle_start.num_days_from_ce()).map_err(|e| {
            LeagueError::SerializationError(format!("reset marker out of range: {e}"))
        })?;
        self.set_meta(LAST_RESET, days)
    }
}

// =============================================================================
// READ SNAPSHOT
// =============================================================================

/// A `LeagueStore` view over one read transaction. Writes fail with
/// `LeagueError::ReadOnly`.
struct RedbSnapshot<'a> {
    txn: &'a ReadTransaction,
}

impl LeagueStore for RedbSnapshot<'_> {
    fn tiers(&self) -> Result<Vec<Tier>, LeagueError> {
        let table = self.txn.open_table(TIERS).map_err(io_err)?;
        tier_records(&table)
    }

    fn put_tier(&mut self, _tier: Tier) -> Result<(), LeagueError> {
        Err(LeagueError::ReadOnly("put_tier"))
    }

    fn user(&self, id: UserId) -> Result<Option<User>, LeagueError> {
        let table = self.txn.open_table(USERS).map_err(io_err)?;
        record(&table, id.0)
    }

    fn users(&self) -> Result<Vec<User>, LeagueError> {
        let table = self.txn.open_table(USERS).map_err(io_err)?;
        records(&table)
    }

    fn put_user(&mut self, _user: User) -> Result<(), LeagueError> {
        Err(LeagueError::ReadOnly("put_user"))
    }

    fn cohort(&self, id: CohortId) -> Result<Option<Cohort>, LeagueError> {
        let table = self.txn.open_table(COHORTS).map_err(io_err)?;
        record(&table, id.0)
    }

    fn cohorts(&self) -> Result<Vec<Cohort>, LeagueError> {
        let table = self.txn.open_table(COHORTS).map_err(io_err)?;
        records(&table)
    }

    fn create_cohort(&mut self, _tier: u32, _cycle: NaiveDate) -> Result<Cohort, LeagueError> {
        Err(LeagueError::ReadOnly("create_cohort"))
    }

    fn delete_cohort(&mut self, _id: CohortId) -> Result<usize, LeagueError> {
        Err(LeagueError::ReadOnly("delete_cohort"))
    }

    fn placements(&self, cohort: CohortId) -> Result<Vec<Placement>, LeagueError> {
        let table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        cohort_placements(&table, cohort)
    }

    fn placement_count(&self, cohort: CohortId) -> Result<usize, LeagueError> {
        let table = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        Ok(member_keys(&table, cohort)?.len())
    }

    fn user_placements(&self, user: UserId) -> Result<Vec<Placement>, LeagueError> {
        let index = self.txn.open_table(USER_PLACEMENTS).map_err(io_err)?;
        let placements = self.txn.open_table(PLACEMENTS).map_err(io_err)?;
        user_placements_in(&index, &placements, user)
    }

    fn insert_placement(
        &mut self,
        _user: UserId,
        _cohort: CohortId,
        _experience: u64,
    ) -> Result<Placement, LeagueError> {
        Err(LeagueError::ReadOnly("insert_placement"))
    }

    fn set_placement_experience(
        &mut self,
        _user: UserId,
        _cohort: CohortId,
        _experience: u64,
    ) -> Result<(), LeagueError> {
        Err(LeagueError::ReadOnly("set_placement_experience"))
    }

    fn remove_placement(&mut self, _user: UserId, _cohort: CohortId) -> Result<bool, LeagueError> {
        Err(LeagueError::ReadOnly("remove_placement"))
    }

    fn outcome(&self, user: UserId) -> Result<Option<WeeklyOutcome>, LeagueError> {
        let table = self.txn.open_table(OUTCOMES).map_err(io_err)?;
        record(&table, user.0)
    }

    fn put_outcome(&mut self, _outcome: WeeklyOutcome) -> Result<(), LeagueError> {
        Err(LeagueError::ReadOnly("put_outcome"))
    }

    fn outcome_count(&self) -> Result<usize, LeagueError> {
        let table = self.txn.open_table(OUTCOMES).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn last_reset(&self) -> Result<Option<NaiveDate>, LeagueError> {
        let table = self.txn.open_table(METADATA).map_err(io_err)?;
        reset_marker(meta_value(&table, LAST_RESET)?)
    }

    fn set_last_reset(&mut self, _cycle_start: NaiveDate) -> Result<(), LeagueError> {
        Err(LeagueError::ReadOnly("set_last_reset"))
    }
}
