//! Roster replay engine.
//!
//! Folds the journal, date by date, into one snapshot per team per day. Each
//! date runs its trade pairs and ADD/DROP bursts through [`replay_day`], then
//! checks exclusivity, then writes the day's snapshots.
//!
//! The same day loop serves three purposes. A full rebuild recomputes every
//! team from the opening date. An extension recomputes every team past the
//! frontier. A restatement recomputes only the teams a late event touches,
//! pulling in any team that trades with them, and reads every other team
//! back from the store.

use crate::day::replay_day;
use crate::state::LeagueState;
use chrono::NaiveDate;
use rosterline_core::{CoreError, DateRange, PlayerId, RunId, SeasonClock, TeamId};
use rosterline_log::{
    DayBurst, EventJournal, FaultKind, FaultLog, IntegrityFault, NormalizeConfig, Normalizer, RawRecord,
    TransactionEvent, group_bursts, pair_trades,
};
use rosterline_storage::{RosterState, SnapshotStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Season timezone as minutes east of UTC
    pub season_offset_minutes: i32,
    /// Opening date; defaults to the day before the first event
    pub season_start: Option<NaiveDate>,
    /// Resolve same-day bursts for different teams on the rayon pool
    pub parallel_teams: bool,
    /// Report players held by more than one team
    pub report_exclusivity: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            season_offset_minutes: SeasonClock::default().offset_minutes,
            season_start: None,
            parallel_teams: true,
            report_exclusivity: true,
        }
    }
}

impl ReplayConfig {
    /// Season clock for the configured offset
    ///
    /// # Errors
    ///
    /// Returns `Config` if the offset is not a valid UTC offset
    pub fn clock(&self) -> Result<SeasonClock, ReplayError> {
        SeasonClock::new(self.season_offset_minutes).map_err(|e| ReplayError::Config {
            reason: e.to_string(),
        })
    }
}

/// Replay engine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Cancellation was requested; nothing on or after `at` was written
    #[error("replay cancelled before {at}")]
    Cancelled {
        /// First date not replayed
        at: NaiveDate,
        /// Last date written for every team
        frontier: Option<NaiveDate>,
    },

    /// The snapshot store refused a read or write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration cannot be used
    #[error("invalid replay config: {reason}")]
    Config {
        /// What is wrong with it
        reason: String,
    },
}

impl From<ReplayError> for CoreError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Cancelled { .. } => CoreError::Cancelled,
            ReplayError::Store(store) => store.into(),
            ReplayError::Config { reason } => CoreError::Validation {
                field: "replay_config".to_string(),
                reason,
            },
        }
    }
}

/// How a run recomputed history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Everything from the opening date
    Rebuild,
    /// Every team past the frontier
    Extend,
    /// Late events rolled back affected teams, then extension
    Restate,
}

impl std::fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebuild => write!(f, "rebuild"),
            Self::Extend => write!(f, "extend"),
            Self::Restate => write!(f, "restate"),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Id shared by every log line of the run
    pub run_id: RunId,
    /// How history was recomputed
    pub mode: ReplayMode,
    /// First date recomputed
    pub from: Option<NaiveDate>,
    /// Frontier after the run
    pub through: Option<NaiveDate>,
    /// Dates replayed, opening date included
    pub dates_processed: usize,
    /// Snapshots put into the store
    pub snapshots_written: usize,
    /// Teams recomputed on at least one date
    pub teams_recomputed: usize,
    /// Replay faults raised by this run
    pub faults_recorded: usize,
}

impl ReplayReport {
    fn new(run_id: RunId, mode: ReplayMode) -> Self {
        Self {
            run_id,
            mode,
            from: None,
            through: None,
            dates_processed: 0,
            snapshots_written: 0,
            teams_recomputed: 0,
            faults_recorded: 0,
        }
    }
}

/// Summary of one ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Events new to the journal
    pub appended: usize,
    /// Exact repeats skipped
    pub repeated: usize,
    /// Records rejected as malformed or conflicting
    pub rejected: usize,
    /// Earliest already-replayed date the new events restate
    pub restatement_from: Option<NaiveDate>,
}

/// Late events waiting to be folded in
#[derive(Debug, Clone, PartialEq, Eq)]
struct Restatement {
    from: NaiveDate,
    teams: BTreeSet<TeamId>,
}

/// Roster replay engine
pub struct ReplayEngine {
    config: ReplayConfig,
    journal: EventJournal,
    store: Arc<SnapshotStore>,
    seed: BTreeMap<TeamId, RosterState>,
    ingest_faults: FaultLog,
    replay_faults: FaultLog,
    opening: Option<NaiveDate>,
    frontier: Option<NaiveDate>,
    pending: Option<Restatement>,
    cancel: CancellationToken,
}

impl ReplayEngine {
    /// Create an engine writing into `store`
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            config: ReplayConfig::default(),
            journal: EventJournal::new(),
            store,
            seed: BTreeMap::new(),
            ingest_faults: FaultLog::new(),
            replay_faults: FaultLog::new(),
            opening: None,
            frontier: None,
            pending: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Preseason rosters, the state on the opening date
    #[must_use]
    pub fn with_seed(mut self, seed: BTreeMap<TeamId, RosterState>) -> Self {
        self.seed = seed;
        self
    }

    /// Token checked once per date; cancelling it stops the run cleanly
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Every event accepted so far
    #[must_use]
    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Store the engine writes to
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Opening date of the last rebuild
    #[must_use]
    pub fn opening(&self) -> Option<NaiveDate> {
        self.opening
    }

    /// Last date written for every team
    #[must_use]
    pub fn frontier(&self) -> Option<NaiveDate> {
        self.frontier
    }

    /// Whether late events are waiting for the next run
    #[must_use]
    pub fn has_pending_restatement(&self) -> bool {
        self.pending.is_some()
    }

    /// Ingestion and replay faults in canonical order
    #[must_use]
    pub fn faults(&self) -> FaultLog {
        let mut log = self.ingest_faults.clone();
        log.absorb(self.replay_faults.clone());
        log.canonicalize();
        log
    }

    /// Normalize raw records and append them to the journal
    ///
    /// # Errors
    ///
    /// Returns `Config` if the season clock is invalid. Bad records are
    /// faults, not errors.
    pub fn ingest(&mut self, records: Vec<RawRecord>) -> Result<IngestReport, ReplayError> {
        let clock = self.config.clock()?;
        let batch = Normalizer::new()
            .with_config(NormalizeConfig { clock })
            .normalize(records);
        let rejected = batch.faults.len();
        self.ingest_faults.extend(batch.faults);

        let mut report = self.ingest_events(batch.events);
        report.rejected += rejected;
        Ok(report)
    }

    /// Append already-normalized events to the journal
    ///
    /// Events dated on or before the frontier are late: they are recorded
    /// as a pending restatement that the next run folds in.
    pub fn ingest_events(&mut self, events: Vec<TransactionEvent>) -> IngestReport {
        let outcome = self.journal.append(events);
        let rejected = outcome.faults.len();
        self.ingest_faults.extend(outcome.faults);

        let restatement_from = self.note_late_events(&outcome.appended);
        tracing::info!(
            appended = outcome.appended.len(),
            repeated = outcome.repeated,
            rejected,
            journal = self.journal.len(),
            "ingested events"
        );

        IngestReport {
            appended: outcome.appended.len(),
            repeated: outcome.repeated,
            rejected,
            restatement_from,
        }
    }

    fn note_late_events(&mut self, appended: &[TransactionEvent]) -> Option<NaiveDate> {
        let frontier = self.frontier?;
        let late: Vec<&TransactionEvent> = appended.iter().filter(|e| e.effective_date <= frontier).collect();
        let from = late.iter().map(|e| e.effective_date).min()?;
        let teams: BTreeSet<TeamId> = late
            .iter()
            .flat_map(|e| std::iter::once(e.team_id).chain(e.counterparty_team_id))
            .collect();

        tracing::warn!(%from, teams = teams.len(), events = late.len(), "late events restate replayed history");
        match &mut self.pending {
            Some(pending) => {
                pending.from = pending.from.min(from);
                pending.teams.extend(teams);
            }
            None => self.pending = Some(Restatement { from, teams }),
        }
        Some(from)
    }

    fn universe(&self) -> BTreeSet<TeamId> {
        let mut teams = self.journal.teams();
        teams.extend(self.seed.keys().copied());
        teams
    }

    fn seed_roster(&self, team_id: TeamId) -> RosterState {
        self.seed.get(&team_id).cloned().unwrap_or_default()
    }

    fn opening_for(&self, through: Option<NaiveDate>) -> Option<NaiveDate> {
        let before_first = self.journal.first_date().and_then(|d| d.pred_opt());
        match (self.config.season_start, before_first) {
            (Some(start), Some(before)) => Some(start.min(before)),
            (Some(start), None) => Some(start),
            (None, Some(before)) => Some(before),
            (None, None) => through,
        }
    }

    /// Discard every snapshot and replay fault, then replay from the opening
    /// date through `through` (default: the last event date)
    ///
    /// Running it twice over the same journal yields identical snapshots.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the token fires, or `Store` on a refused write
    pub fn rebuild(&mut self, through: Option<NaiveDate>) -> Result<ReplayReport, ReplayError> {
        let run_id = RunId::new();
        let _span = tracing::info_span!("replay", run = %run_id, mode = "rebuild").entered();
        let mut report = ReplayReport::new(run_id, ReplayMode::Rebuild);

        for team in self.store.teams()? {
            self.store.truncate_from(team, NaiveDate::MIN)?;
        }
        self.replay_faults = FaultLog::new();
        self.pending = None;
        self.frontier = None;
        self.opening = None;

        let Some(opening) = self.opening_for(through) else {
            tracing::info!("journal is empty; nothing to replay");
            return Ok(report);
        };
        let target = through.or(self.journal.last_date()).unwrap_or(opening).max(opening);
        let teams = self.universe();
        tracing::info!(%opening, %target, teams = teams.len(), events = self.journal.len(), "replay started");

        let league: LeagueState = teams.iter().map(|t| (*t, self.seed_roster(*t))).collect();
        for team in &teams {
            self.store.put(*team, opening, league.roster(*team))?;
        }
        self.opening = Some(opening);
        self.frontier = Some(opening);
        report.from = Some(opening);
        report.dates_processed = 1;
        report.snapshots_written = teams.len();
        report.teams_recomputed = teams.len();

        if let Some(next) = opening.succ_opt() {
            self.run_days(next, target, league, BTreeSet::new(), None, &mut report)?;
        }
        self.finish(&mut report);
        Ok(report)
    }

    /// Fold pending late events in, then extend every team through
    /// `through` (default: the last event date)
    ///
    /// Falls back to [`ReplayEngine::rebuild`] when nothing has been replayed
    /// yet or a late event precedes the opening date. The result always
    /// equals a full rebuild over the same journal.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the token fires, or `Store` on a refused write
    pub fn extend_to(&mut self, through: Option<NaiveDate>) -> Result<ReplayReport, ReplayError> {
        let (Some(opening), Some(frontier)) = (self.opening, self.frontier) else {
            return self.rebuild(through);
        };
        if self.pending.as_ref().is_some_and(|p| p.from <= opening) {
            tracing::warn!(%opening, "late events precede the opening date; rebuilding");
            return self.rebuild(Some(through.unwrap_or(frontier).max(frontier)));
        }

        let target = through.or(self.journal.last_date()).unwrap_or(frontier).max(frontier);
        let pending = self.pending.take();
        let mode = if pending.is_some() {
            ReplayMode::Restate
        } else {
            ReplayMode::Extend
        };

        let run_id = RunId::new();
        let _span = tracing::info_span!("replay", run = %run_id, mode = %mode).entered();
        let mut report = ReplayReport::new(run_id, mode);

        let (from, affected, narrow_until) = match pending {
            Some(restatement) => (restatement.from, restatement.teams, Some(frontier)),
            None => match frontier.succ_opt() {
                Some(next) => (next, BTreeSet::new(), None),
                None => return Ok(report),
            },
        };
        if from > target {
            report.through = self.frontier;
            return Ok(report);
        }
        let Some(before) = from.pred_opt() else {
            return Ok(report);
        };
        tracing::info!(%from, %target, affected = affected.len(), "replay started");

        let teams = self.universe();
        for team in &teams {
            if self.store.frontier(*team)?.is_none() {
                let through = if affected.contains(team) { before } else { frontier };
                self.backfill(*team, opening, through, &mut report)?;
            }
        }

        let mut league = LeagueState::new();
        for team in &teams {
            league.set(*team, self.store.get(*team, before)?);
        }

        report.from = Some(from);
        self.run_days(from, target, league, affected, narrow_until, &mut report)?;
        self.finish(&mut report);
        Ok(report)
    }

    /// Write the seed roster for a team that has never been replayed
    fn backfill(
        &mut self,
        team_id: TeamId,
        opening: NaiveDate,
        through: NaiveDate,
        report: &mut ReplayReport,
    ) -> Result<(), ReplayError> {
        let roster = self.seed_roster(team_id);
        for day in DateRange::new(opening, through) {
            self.store.put(team_id, day, roster.clone())?;
            report.snapshots_written += 1;
        }
        tracing::debug!(team = %team_id, %opening, %through, "backfilled new team");
        Ok(())
    }

    fn finish(&mut self, report: &mut ReplayReport) {
        report.through = self.frontier;
        tracing::info!(
            through = ?report.through,
            dates = report.dates_processed,
            snapshots = report.snapshots_written,
            faults = report.faults_recorded,
            "replay finished"
        );
    }

    fn run_days(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
        mut league: LeagueState,
        mut affected: BTreeSet<TeamId>,
        narrow_until: Option<NaiveDate>,
        report: &mut ReplayReport,
    ) -> Result<(), ReplayError> {
        let by_date = group_bursts(self.journal.range(from, to));
        let mut recomputed: BTreeSet<TeamId> = BTreeSet::new();

        for day in DateRange::new(from, to) {
            let restating = narrow_until.is_some_and(|until| day <= until);

            if self.cancel.is_cancelled() {
                if restating {
                    self.pending = Some(Restatement {
                        from: day,
                        teams: affected,
                    });
                }
                tracing::warn!(at = %day, frontier = ?self.frontier, "replay cancelled");
                return Err(ReplayError::Cancelled {
                    at: day,
                    frontier: self.frontier,
                });
            }

            // roll back only once the first restated date passes the cancellation check
            if restating && day == from {
                self.replay_faults.retract_from(from, &affected);
                for team in &affected {
                    self.store.truncate_from(*team, from)?;
                }
            }

            let bursts: &[DayBurst] = by_date.get(&day).map(Vec::as_slice).unwrap_or_default();
            let pairing = pair_trades(bursts.iter().flat_map(DayBurst::trade_legs));
            let previous = self.config.report_exclusivity.then(|| league.clone());

            if restating {
                self.widen_restatement(day, &pairing.pairs, &mut affected)?;
                let others: Vec<TeamId> = league.teams().filter(|t| !affected.contains(t)).collect();
                for team in others {
                    league.set(team, self.store.get(team, day)?);
                }
            }

            let include = |team: TeamId| !restating || affected.contains(&team);

            let faults = replay_day(&mut league, bursts, &pairing, include, self.config.parallel_teams);
            report.faults_recorded += faults.len();
            self.replay_faults.extend(faults);

            if let Some(previous) = previous {
                let faults = exclusivity_faults(day, bursts, &previous, &league);
                report.faults_recorded += faults.len();
                self.replay_faults.extend(faults);
            }

            let written: Vec<TeamId> = league.teams().filter(|t| include(*t)).collect();
            for team in &written {
                self.store.put(*team, day, league.roster(*team))?;
            }
            report.snapshots_written += written.len();
            report.dates_processed += 1;
            recomputed.extend(written.iter().copied());
            if !restating {
                self.frontier = Some(day);
            }
            tracing::debug!(date = %day, teams = written.len(), events = bursts.iter().map(DayBurst::len).sum::<usize>(), "date replayed");
        }

        report.teams_recomputed = report.teams_recomputed.max(recomputed.len());
        Ok(())
    }

    /// Pull into the restatement every team trading with an affected team
    fn widen_restatement(
        &mut self,
        day: NaiveDate,
        pairs: &[rosterline_log::TradePair],
        affected: &mut BTreeSet<TeamId>,
    ) -> Result<(), ReplayError> {
        loop {
            let joined: BTreeSet<TeamId> = pairs
                .iter()
                .filter_map(|pair| match (affected.contains(&pair.from_team()), affected.contains(&pair.to_team())) {
                    (true, false) => Some(pair.to_team()),
                    (false, true) => Some(pair.from_team()),
                    _ => None,
                })
                .collect();
            if joined.is_empty() {
                return Ok(());
            }
            for team in &joined {
                self.store.truncate_from(*team, day)?;
                tracing::debug!(team = %team, date = %day, "trade pulls team into restatement");
            }
            self.replay_faults.retract_from(day, &joined);
            affected.extend(joined);
        }
    }
}

/// Players newly held by two or more teams on `day`
///
/// Each team that picked the player up that day is charged with the
/// ADD/TRADE_IN that did it.
fn exclusivity_faults(
    day: NaiveDate,
    bursts: &[DayBurst],
    previous: &LeagueState,
    current: &LeagueState,
) -> Vec<IntegrityFault> {
    let candidates: BTreeSet<PlayerId> = bursts
        .iter()
        .flat_map(|b| b.events.iter())
        .filter(|e| e.action.is_addition())
        .map(|e| e.player_id)
        .collect();

    let mut faults = Vec::new();
    for player in candidates {
        let holders = current.holders(player);
        if holders.len() < 2 || previous.holders(player).len() >= 2 {
            continue;
        }
        for team in holders.iter().filter(|t| !previous.holds(**t, player)) {
            let culprit = bursts
                .iter()
                .filter(|b| b.team_id == *team)
                .flat_map(|b| b.events.iter())
                .filter(|e| e.player_id == player && e.action.is_addition())
                .last();
            let Some(event) = culprit else { continue };
            let others: Vec<String> = holders.iter().filter(|t| *t != team).map(ToString::to_string).collect();
            faults.push(
                IntegrityFault::new(
                    event.event_id.clone(),
                    FaultKind::ExclusivityViolation,
                    format!("{} also held by {}", player, others.join(", ")),
                )
                .at(*team, day),
            );
        }
    }
    faults
}
