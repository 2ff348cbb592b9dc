//! Validation of replayed rosters against ground truth.

use chrono::NaiveDate;
use rosterline_core::{PlayerId, TeamId};
use rosterline_storage::{SnapshotStore, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateConfig {
    /// Treat dates past a team's last replayed date as NO_DATA instead of
    /// comparing against the carried-forward roster
    pub past_frontier_is_no_data: bool,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            past_frontier_is_no_data: true,
        }
    }
}

/// Externally captured roster for one team on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthSnapshot {
    /// Team
    pub team_id: TeamId,
    /// Calendar day
    pub date: NaiveDate,
    /// Players on the captured roster
    pub players: BTreeSet<PlayerId>,
}

/// Outcome of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Replayed roster equals ground truth
    Match,
    /// Rosters differ
    Mismatch {
        /// In ground truth but not replayed
        missing_players: BTreeSet<PlayerId>,
        /// Replayed but not in ground truth
        extra_players: BTreeSet<PlayerId>,
    },
    /// No replayed snapshot covers the date
    NoData,
}

impl ValidationStatus {
    /// Report spelling
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Mismatch { .. } => "MISMATCH",
            Self::NoData => "NO_DATA",
        }
    }
}

/// One line of the validation report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEntry {
    /// Team
    pub team_id: TeamId,
    /// Calendar day
    pub date: NaiveDate,
    /// Verdict
    #[serde(flatten)]
    pub status: ValidationStatus,
    /// Human-readable explanation
    pub detail: String,
}

impl std::fmt::Display for ValidationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}: {}", self.team_id, self.date, self.status.as_str(), self.detail)
    }
}

/// Validation report, ordered by team then date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// One entry per capture
    pub entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    /// Captures that matched
    #[must_use]
    pub fn matched(&self) -> usize {
        self.count(|s| matches!(s, ValidationStatus::Match))
    }

    /// Captures that diverged
    #[must_use]
    pub fn mismatched(&self) -> usize {
        self.count(|s| matches!(s, ValidationStatus::Mismatch { .. }))
    }

    /// Captures with no replayed snapshot
    #[must_use]
    pub fn no_data(&self) -> usize {
        self.count(|s| matches!(s, ValidationStatus::NoData))
    }

    fn count(&self, pred: impl Fn(&ValidationStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    /// Whether every capture matched
    #[must_use]
    pub fn passed(&self) -> bool {
        self.entries.iter().all(|e| e.status == ValidationStatus::Match)
    }

    /// Entries needing follow-up
    pub fn divergent(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(|e| e.status != ValidationStatus::Match)
    }

    /// One-line verdict with counts
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Validation {}: {} match, {} mismatch, {} no data ({} captures)",
            if self.passed() { "PASSED" } else { "FAILED" },
            self.matched(),
            self.mismatched(),
            self.no_data(),
            self.entries.len()
        )
    }
}

/// Compares ground-truth captures against the snapshot store
///
/// Reads only; the store is never written.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyValidator {
    config: ValidateConfig,
}

impl ConsistencyValidator {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ValidateConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate every capture
    ///
    /// # Errors
    ///
    /// Returns error only if the store cannot be read
    pub fn validate<'a, I>(&self, store: &SnapshotStore, truths: I) -> StoreResult<ValidationReport>
    where
        I: IntoIterator<Item = &'a GroundTruthSnapshot>,
    {
        let mut entries = truths
            .into_iter()
            .map(|truth| self.check(store, truth))
            .collect::<StoreResult<Vec<_>>>()?;
        entries.sort_by_key(|e| (e.team_id, e.date));

        let report = ValidationReport { entries };
        tracing::info!(
            matched = report.matched(),
            mismatched = report.mismatched(),
            no_data = report.no_data(),
            "validation finished"
        );
        Ok(report)
    }

    /// Validate a single capture
    ///
    /// # Errors
    ///
    /// Returns error only if the store cannot be read
    pub fn check(&self, store: &SnapshotStore, truth: &GroundTruthSnapshot) -> StoreResult<ValidationEntry> {
        let entry = |status: ValidationStatus, detail: String| ValidationEntry {
            team_id: truth.team_id,
            date: truth.date,
            status,
            detail,
        };

        if self.config.past_frontier_is_no_data {
            if let Some(frontier) = store.frontier(truth.team_id)? {
                if truth.date > frontier {
                    return Ok(entry(
                        ValidationStatus::NoData,
                        format!("replayed only through {}", frontier),
                    ));
                }
            }
        }

        let (written, replayed) = match store.get_dated(truth.team_id, truth.date) {
            Ok(found) => found,
            Err(StoreError::NotFound { .. }) => {
                return Ok(entry(
                    ValidationStatus::NoData,
                    "no replayed snapshot at or before this date".to_string(),
                ));
            }
            Err(err) => return Err(err),
        };

        let replayed: BTreeSet<PlayerId> = replayed.iter().collect();
        let missing_players: BTreeSet<PlayerId> = truth.players.difference(&replayed).copied().collect();
        let extra_players: BTreeSet<PlayerId> = replayed.difference(&truth.players).copied().collect();

        if missing_players.is_empty() && extra_players.is_empty() {
            return Ok(entry(
                ValidationStatus::Match,
                format!("{} players, snapshot of {}", replayed.len(), written),
            ));
        }

        let detail = format!(
            "{} missing, {} extra against snapshot of {}",
            missing_players.len(),
            extra_players.len(),
            written
        );
        tracing::warn!(team = %truth.team_id, date = %truth.date, %detail, "roster diverges from ground truth");
        Ok(entry(
            ValidationStatus::Mismatch {
                missing_players,
                extra_players,
            },
            detail,
        ))
    }
}
