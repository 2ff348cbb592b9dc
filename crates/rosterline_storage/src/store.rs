//! Snapshot store.
//!
//! One series per team, keyed by date. A series only ever grows forward: a
//! put for a date at or before the team's last write is a write-order
//! violation and is refused. Restatement shortens a series explicitly with
//! [`SnapshotStore::truncate_from`] before rewriting it.

use crate::snapshot::{DailySnapshot, RosterState};
use chrono::NaiveDate;
use rosterline_core::{CoreError, Digest, DigestWriter, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No snapshot at or before the date
    #[error("no snapshot for {team_id} at or before {date}")]
    NotFound {
        /// Team queried
        team_id: TeamId,
        /// Date queried
        date: NaiveDate,
    },

    /// A put did not advance the team's series
    #[error("out-of-order write for {team_id}: {attempted} is not after last write {last}")]
    WriteOrderViolation {
        /// Team written
        team_id: TeamId,
        /// Latest date already stored
        last: NaiveDate,
        /// Date of the refused write
        attempted: NaiveDate,
    },

    /// A lock was poisoned by a panicking writer
    #[error("store lock poisoned: {what}")]
    Poisoned {
        /// Which lock
        what: &'static str,
    },

    /// A store image could not be produced or loaded
    #[error("store image: {reason}")]
    Image {
        /// Underlying failure
        reason: String,
    },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { team_id, date } => CoreError::NotFound {
                kind: "Snapshot".to_string(),
                id: format!("{}@{}", team_id, date),
            },
            StoreError::WriteOrderViolation { .. } => CoreError::OrderViolation {
                reason: err.to_string(),
            },
            other => CoreError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Teams with at least one series entry
    pub team_count: usize,
    /// Total snapshots held
    pub snapshot_count: usize,
    /// Successful puts since creation
    pub write_count: u64,
    /// Snapshots removed by truncation since creation
    pub truncated_count: u64,
}

type Series = BTreeMap<NaiveDate, RosterState>;

/// In-memory snapshot store
#[derive(Debug, Default)]
pub struct SnapshotStore {
    teams: RwLock<BTreeMap<TeamId, Arc<RwLock<Series>>>>,
    writes: AtomicU64,
    truncated: AtomicU64,
}

impl SnapshotStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn series(&self, team_id: TeamId) -> StoreResult<Option<Arc<RwLock<Series>>>> {
        let teams = self
            .teams
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team index" })?;
        Ok(teams.get(&team_id).cloned())
    }

    fn series_or_create(&self, team_id: TeamId) -> StoreResult<Arc<RwLock<Series>>> {
        if let Some(series) = self.series(team_id)? {
            return Ok(series);
        }
        let mut teams = self
            .teams
            .write()
            .map_err(|_| StoreError::Poisoned { what: "team index" })?;
        Ok(Arc::clone(teams.entry(team_id).or_default()))
    }

    /// Write a team's roster for a date
    ///
    /// # Errors
    ///
    /// Returns `WriteOrderViolation` unless `date` is after the team's last
    /// write
    pub fn put(&self, team_id: TeamId, date: NaiveDate, roster: RosterState) -> StoreResult<()> {
        let series = self.series_or_create(team_id)?;
        let mut series = series
            .write()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;

        if let Some((&last, _)) = series.last_key_value() {
            if date <= last {
                tracing::error!(team = %team_id, %last, attempted = %date, "out-of-order snapshot write");
                return Err(StoreError::WriteOrderViolation {
                    team_id,
                    last,
                    attempted: date,
                });
            }
        }

        series.insert(date, roster);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Write a snapshot
    ///
    /// # Errors
    ///
    /// See [`SnapshotStore::put`]
    pub fn put_snapshot(&self, snapshot: DailySnapshot) -> StoreResult<()> {
        self.put(snapshot.team_id, snapshot.date, snapshot.roster)
    }

    /// Roster as of a date: the exact write, or the most recent earlier one
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the team has no write at or before `date`
    pub fn get(&self, team_id: TeamId, date: NaiveDate) -> StoreResult<RosterState> {
        self.get_dated(team_id, date).map(|(_, roster)| roster)
    }

    /// Like [`SnapshotStore::get`], also returning the date actually written
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the team has no write at or before `date`
    pub fn get_dated(&self, team_id: TeamId, date: NaiveDate) -> StoreResult<(NaiveDate, RosterState)> {
        let not_found = StoreError::NotFound { team_id, date };
        let Some(series) = self.series(team_id)? else {
            return Err(not_found);
        };
        let series = series
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;
        series
            .range(..=date)
            .next_back()
            .map(|(d, roster)| (*d, roster.clone()))
            .ok_or(not_found)
    }

    /// Roster written exactly on a date, without fallback
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn get_exact(&self, team_id: TeamId, date: NaiveDate) -> StoreResult<Option<RosterState>> {
        let Some(series) = self.series(team_id)? else {
            return Ok(None);
        };
        let series = series
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;
        Ok(series.get(&date).cloned())
    }

    /// Day-by-day rosters for `[from, to]`
    ///
    /// Days before the team's first write and after its last write are not
    /// reported; days in between without an explicit write carry the prior
    /// roster forward.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the range holds no replayed day for the team
    pub fn get_range(
        &self,
        team_id: TeamId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<(NaiveDate, RosterState)>> {
        let not_found = StoreError::NotFound { team_id, date: to };
        let Some(series) = self.series(team_id)? else {
            return Err(not_found);
        };
        let series = series
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;

        let (Some((&first, _)), Some((&last, _))) = (series.first_key_value(), series.last_key_value())
        else {
            return Err(not_found);
        };
        let start = from.max(first);
        let end = to.min(last);
        if start > end {
            return Err(not_found);
        }

        let mut current = series
            .range(..=start)
            .next_back()
            .map(|(_, roster)| roster.clone())
            .unwrap_or_default();
        let mut out = Vec::new();
        for day in rosterline_core::DateRange::new(start, end) {
            if let Some(roster) = series.get(&day) {
                current = roster.clone();
            }
            out.push((day, current.clone()));
        }
        Ok(out)
    }

    /// Last written date for a team
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn frontier(&self, team_id: TeamId) -> StoreResult<Option<NaiveDate>> {
        let Some(series) = self.series(team_id)? else {
            return Ok(None);
        };
        let series = series
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;
        Ok(series.last_key_value().map(|(d, _)| *d))
    }

    /// First written date for a team
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn opening(&self, team_id: TeamId) -> StoreResult<Option<NaiveDate>> {
        let Some(series) = self.series(team_id)? else {
            return Ok(None);
        };
        let series = series
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;
        Ok(series.first_key_value().map(|(d, _)| *d))
    }

    /// Drop a team's snapshots on or after `from`, returning how many went
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn truncate_from(&self, team_id: TeamId, from: NaiveDate) -> StoreResult<usize> {
        let Some(series) = self.series(team_id)? else {
            return Ok(0);
        };
        let mut series = series
            .write()
            .map_err(|_| StoreError::Poisoned { what: "team series" })?;
        let removed = series.split_off(&from).len();
        if removed > 0 {
            tracing::warn!(team = %team_id, %from, removed, "truncated snapshot series");
            self.truncated.fetch_add(removed as u64, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Teams with a series, ascending
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn teams(&self) -> StoreResult<Vec<TeamId>> {
        let teams = self
            .teams
            .read()
            .map_err(|_| StoreError::Poisoned { what: "team index" })?;
        Ok(teams.keys().copied().collect())
    }

    /// Every snapshot, ordered by team then date
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn snapshots(&self) -> StoreResult<Vec<DailySnapshot>> {
        let mut out = Vec::new();
        for team_id in self.teams()? {
            let Some(series) = self.series(team_id)? else { continue };
            let series = series
                .read()
                .map_err(|_| StoreError::Poisoned { what: "team series" })?;
            out.extend(
                series
                    .iter()
                    .map(|(date, roster)| DailySnapshot::new(team_id, *date, roster.clone())),
            );
        }
        Ok(out)
    }

    /// Digest over the canonical encoding of every snapshot
    ///
    /// Two stores with equal fingerprints hold byte-identical snapshots.
    ///
    /// # Errors
    ///
    /// Returns error if a lock is poisoned or a snapshot cannot be encoded
    pub fn fingerprint(&self) -> StoreResult<Digest> {
        let mut writer = DigestWriter::new();
        for snapshot in self.snapshots()? {
            let bytes = postcard::to_allocvec(&snapshot).map_err(|e| StoreError::Image {
                reason: e.to_string(),
            })?;
            writer.update(&bytes);
        }
        Ok(writer.finalize())
    }

    /// Store statistics
    ///
    /// # Errors
    ///
    /// Returns error only if a lock is poisoned
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let mut stats = StoreStats {
            write_count: self.writes.load(Ordering::Relaxed),
            truncated_count: self.truncated.load(Ordering::Relaxed),
            ..StoreStats::default()
        };
        for team_id in self.teams()? {
            let Some(series) = self.series(team_id)? else { continue };
            let len = series
                .read()
                .map_err(|_| StoreError::Poisoned { what: "team series" })?
                .len();
            if len > 0 {
                stats.team_count += 1;
                stats.snapshot_count += len;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterline_core::PlayerId;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, n).unwrap()
    }

    fn roster(ids: &[u64]) -> RosterState {
        ids.iter().copied().map(PlayerId::new).collect()
    }

    const A: TeamId = TeamId::new(1);
    const B: TeamId = TeamId::new(2);

    #[test]
    fn test_put_get_exact() {
        let store = SnapshotStore::new();
        store.put(A, day(1), roster(&[1])).unwrap();
        assert_eq!(store.get(A, day(1)).unwrap(), roster(&[1]));
        assert_eq!(store.get_exact(A, day(1)).unwrap(), Some(roster(&[1])));
        assert_eq!(store.get_exact(A, day(2)).unwrap(), None);
    }

    #[test]
    fn test_get_falls_back_to_prior_write() {
        let store = SnapshotStore::new();
        store.put(A, day(1), roster(&[1])).unwrap();
        store.put(A, day(4), roster(&[2])).unwrap();
        assert_eq!(store.get(A, day(3)).unwrap(), roster(&[1]));
        assert_eq!(store.get_dated(A, day(3)).unwrap().0, day(1));
        assert_eq!(store.get(A, day(9)).unwrap(), roster(&[2]));
    }

    #[test]
    fn test_get_not_found() {
        let store = SnapshotStore::new();
        assert!(matches!(store.get(A, day(1)), Err(StoreError::NotFound { .. })));
        store.put(A, day(5), roster(&[])).unwrap();
        assert!(matches!(store.get(A, day(4)), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.get(B, day(5)), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_write_order_enforced() {
        let store = SnapshotStore::new();
        store.put(A, day(2), roster(&[1])).unwrap();
        let err = store.put(A, day(2), roster(&[2])).unwrap_err();
        assert!(matches!(err, StoreError::WriteOrderViolation { .. }));
        let err = store.put(A, day(1), roster(&[2])).unwrap_err();
        assert!(matches!(err, StoreError::WriteOrderViolation { .. }));
        // other teams are independent
        store.put(B, day(1), roster(&[3])).unwrap();
        assert_eq!(store.get(A, day(2)).unwrap(), roster(&[1]));
    }

    #[test]
    fn test_get_range_forward_fills_and_clamps() {
        let store = SnapshotStore::new();
        store.put(A, day(2), roster(&[1])).unwrap();
        store.put(A, day(4), roster(&[1, 2])).unwrap();
        store.put(A, day(5), roster(&[2])).unwrap();

        let range = store.get_range(A, day(1), day(9)).unwrap();
        let dates: Vec<_> = range.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![day(2), day(3), day(4), day(5)]);
        assert_eq!(range[1].1, roster(&[1]));
        assert_eq!(range[3].1, roster(&[2]));

        assert!(store.get_range(A, day(6), day(9)).is_err());
        assert_eq!(store.get_range(A, day(3), day(3)).unwrap(), vec![(day(3), roster(&[1]))]);
    }

    #[test]
    fn test_truncate_then_rewrite() {
        let store = SnapshotStore::new();
        for d in 1..=5 {
            store.put(A, day(d), roster(&[d as u64])).unwrap();
        }
        assert_eq!(store.truncate_from(A, day(3)).unwrap(), 3);
        assert_eq!(store.frontier(A).unwrap(), Some(day(2)));
        store.put(A, day(3), roster(&[30])).unwrap();
        assert_eq!(store.get(A, day(3)).unwrap(), roster(&[30]));
        assert_eq!(store.stats().unwrap().truncated_count, 3);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let s1 = SnapshotStore::new();
        let s2 = SnapshotStore::new();
        for store in [&s1, &s2] {
            store.put(A, day(1), roster(&[1, 2])).unwrap();
            store.put(B, day(1), roster(&[3])).unwrap();
        }
        assert_eq!(s1.fingerprint().unwrap(), s2.fingerprint().unwrap());
        s2.put(B, day(2), roster(&[])).unwrap();
        assert_ne!(s1.fingerprint().unwrap(), s2.fingerprint().unwrap());
    }

    #[test]
    fn test_concurrent_writers_disjoint_teams() {
        let store = Arc::new(SnapshotStore::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for d in 1..=20 {
                        store
                            .put(TeamId::new(t), day(d), roster(&[u64::from(t) * 100 + u64::from(d)]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = store.stats().unwrap();
        assert_eq!(stats.team_count, 8);
        assert_eq!(stats.snapshot_count, 160);
        assert_eq!(store.get(TeamId::new(3), day(20)).unwrap(), roster(&[320]));
    }

    proptest::proptest! {
        #[test]
        fn prop_range_agrees_with_point_reads(
            writes in proptest::collection::btree_map(1u32..28, proptest::collection::btree_set(0u64..6, 0..4), 1..8),
            from in 1u32..29,
            len in 0u32..10,
        ) {
            let store = SnapshotStore::new();
            for (d, players) in &writes {
                store.put(A, day(*d), players.iter().copied().map(PlayerId::new).collect()).unwrap();
            }
            let to = (from + len).min(30);
            let first = *writes.keys().next().unwrap();
            let last = *writes.keys().next_back().unwrap();

            match store.get_range(A, day(from), day(to)) {
                Ok(range) => {
                    let expected_len = to.min(last) + 1 - from.max(first);
                    proptest::prop_assert_eq!(range.len() as u32, expected_len);
                    for (date, roster) in range {
                        proptest::prop_assert_eq!(roster, store.get(A, date).unwrap());
                    }
                }
                Err(StoreError::NotFound { .. }) => {
                    proptest::prop_assert!(from.max(first) > to.min(last));
                }
                Err(other) => proptest::prop_assert!(false, "unexpected error {}", other),
            }
        }
    }
}
