//! Integrity-fault log.
//!
//! Faults are data, not errors: a bad record or an impossible transition is
//! recorded here and processing continues with the next one.

use chrono::NaiveDate;
use rosterline_core::{EventId, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of integrity fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Record missing a required field or carrying an unusable value
    MalformedRecord,
    /// Two records share an id but disagree on payload
    ConflictingDuplicate,
    /// ADD or TRADE_IN of a player the team already holds
    DuplicateAdd,
    /// DROP or TRADE_OUT of a player the team does not hold
    DropOfAbsentPlayer,
    /// Trade leg without its opposite leg
    UnpairedTrade,
    /// Player held by more than one team on the same date
    ExclusivityViolation,
}

impl FaultKind {
    /// Whether the fault is raised while ingesting rather than replaying
    pub const fn is_ingest(self) -> bool {
        matches!(self, Self::MalformedRecord | Self::ConflictingDuplicate)
    }

    /// Wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRecord => "MalformedRecord",
            Self::ConflictingDuplicate => "ConflictingDuplicate",
            Self::DuplicateAdd => "DuplicateAdd",
            Self::DropOfAbsentPlayer => "DropOfAbsentPlayer",
            Self::UnpairedTrade => "UnpairedTrade",
            Self::ExclusivityViolation => "ExclusivityViolation",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded fault
///
/// Field order defines the canonical sort: date, team, event, kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntegrityFault {
    /// Effective date of the offending event, when known
    pub date: Option<NaiveDate>,
    /// Team whose state the fault concerns, when known
    pub team_id: Option<TeamId>,
    /// Offending event
    pub event_id: EventId,
    /// Fault category
    pub kind: FaultKind,
    /// Human-readable explanation
    pub detail: String,
}

impl IntegrityFault {
    /// Fault with no team or date attached
    pub fn new(event_id: EventId, kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            date: None,
            team_id: None,
            event_id,
            kind,
            detail: detail.into(),
        }
    }

    /// Attach the team and date the fault concerns
    #[must_use]
    pub fn at(mut self, team_id: TeamId, date: NaiveDate) -> Self {
        self.team_id = Some(team_id);
        self.date = Some(date);
        self
    }

    /// Attach only a date
    #[must_use]
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

impl std::fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.event_id)?;
        if let Some(team) = self.team_id {
            write!(f, " {}", team)?;
        }
        if let Some(date) = self.date {
            write!(f, " {}", date)?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Ordered collection of faults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultLog {
    faults: Vec<IntegrityFault>,
}

impl FaultLog {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault
    pub fn record(&mut self, fault: IntegrityFault) {
        tracing::warn!(
            kind = %fault.kind,
            event = %fault.event_id,
            team = ?fault.team_id,
            date = ?fault.date,
            "{}",
            fault.detail
        );
        self.faults.push(fault);
    }

    /// Record each fault in turn
    pub fn extend(&mut self, faults: impl IntoIterator<Item = IntegrityFault>) {
        for fault in faults {
            self.record(fault);
        }
    }

    /// Merge without re-logging (faults already logged where they were raised)
    pub fn absorb(&mut self, other: FaultLog) {
        self.faults.extend(other.faults);
    }

    /// Sort into canonical order and drop exact repeats
    pub fn canonicalize(&mut self) {
        self.faults.sort();
        self.faults.dedup();
    }

    /// Remove replay faults on or after `from` for the given teams, plus every
    /// exclusivity fault on or after `from`
    ///
    /// Used when a restatement rolls those teams back.
    pub fn retract_from(&mut self, from: NaiveDate, teams: &BTreeSet<TeamId>) -> usize {
        let before = self.faults.len();
        self.faults.retain(|fault| {
            if fault.kind.is_ingest() {
                return true;
            }
            let Some(date) = fault.date else { return true };
            if date < from {
                return true;
            }
            if fault.kind == FaultKind::ExclusivityViolation {
                return false;
            }
            !fault.team_id.is_some_and(|team| teams.contains(&team))
        });
        before - self.faults.len()
    }

    /// Faults in recorded order
    pub fn iter(&self) -> impl Iterator<Item = &IntegrityFault> {
        self.faults.iter()
    }

    /// Faults as a slice
    pub fn as_slice(&self) -> &[IntegrityFault] {
        &self.faults
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Faults of one kind
    pub fn of_kind(&self, kind: FaultKind) -> impl Iterator<Item = &IntegrityFault> {
        self.faults.iter().filter(move |f| f.kind == kind)
    }

    /// Count per kind
    pub fn summary(&self) -> BTreeMap<FaultKind, usize> {
        let mut counts = BTreeMap::new();
        for fault in &self.faults {
            *counts.entry(fault.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl IntoIterator for FaultLog {
    type Item = IntegrityFault;
    type IntoIter = std::vec::IntoIter<IntegrityFault>;

    fn into_iter(self) -> Self::IntoIter {
        self.faults.into_iter()
    }
}
