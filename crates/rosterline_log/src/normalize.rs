//! Normalization of raw transaction records into canonical events.
//!
//! Raw records arrive in whatever shape the upstream fetch produced. Two
//! shapes are understood: a flat canonical record and the league activity
//! feed message. Every accepted record becomes one event (two for an accepted
//! trade), every rejected record becomes a fault, and the batch is
//! deduplicated by event id.

use crate::event::{Action, TransactionEvent};
use crate::fault::{FaultKind, IntegrityFault};
use crate::order::sort_events;
use chrono::NaiveDate;
use indexmap::IndexMap;
use indexmap::map::Entry;
use rosterline_core::{Digest, EventId, PlayerId, SeasonClock, TeamId};
use serde::{Deserialize, Serialize};

/// Ingestion error for a single record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// A required field is missing or unusable
    #[error("malformed record {event_id}: {field} {reason}")]
    MalformedRecord {
        /// Record id, synthesized if the record had none
        event_id: EventId,
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Same id, different payload
    #[error("conflicting duplicate for {event_id}: {reason}")]
    ConflictingDuplicate {
        /// Shared id
        event_id: EventId,
        /// How the payloads differ
        reason: String,
    },
}

impl IngestError {
    fn missing(event_id: &EventId, field: &'static str) -> Self {
        Self::MalformedRecord {
            event_id: event_id.clone(),
            field,
            reason: "is missing".to_string(),
        }
    }

    fn invalid(event_id: &EventId, field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            event_id: event_id.clone(),
            field,
            reason: reason.into(),
        }
    }

    /// Turn the error into a fault-log entry
    #[must_use]
    pub fn into_fault(self) -> IntegrityFault {
        let detail = self.to_string();
        match self {
            Self::MalformedRecord { event_id, .. } => {
                IntegrityFault::new(event_id, FaultKind::MalformedRecord, detail)
            }
            Self::ConflictingDuplicate { event_id, .. } => {
                IntegrityFault::new(event_id, FaultKind::ConflictingDuplicate, detail)
            }
        }
    }
}

/// A raw record in any supported shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawRecord {
    /// Flat record already using canonical field names
    Canonical(CanonicalRecord),
    /// League activity-feed message
    Activity(ActivityRecord),
}

/// Flat record with canonical field names, every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Source id; synthesized when absent
    #[serde(default)]
    pub event_id: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 instant
    #[serde(default)]
    pub effective_date: Option<String>,
    /// Intra-day ordering value
    #[serde(default)]
    pub sequence_hint: Option<i64>,
    /// Acting team
    #[serde(default)]
    pub team_id: Option<u32>,
    /// Player moved
    #[serde(default)]
    pub player_id: Option<u64>,
    /// `ADD`, `DROP`, `TRADE_OUT` or `TRADE_IN`
    #[serde(default)]
    pub action: Option<String>,
    /// Required for trade legs
    #[serde(default)]
    pub counterparty_team_id: Option<u32>,
}

/// Activity-feed message as fetched from the league communication log
///
/// `from`/`to` use `-1` for free agency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Message id
    #[serde(default)]
    pub id: Option<String>,
    /// Topic timestamp in epoch milliseconds
    #[serde(default)]
    pub date: Option<i64>,
    /// Message type, e.g. `ROSTER_ADD`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Player moved
    #[serde(default, rename = "targetId")]
    pub target_id: Option<u64>,
    /// Sending team
    #[serde(default)]
    pub from: Option<i64>,
    /// Receiving team
    #[serde(default)]
    pub to: Option<i64>,
    /// Position of the message within its topic
    #[serde(default, rename = "messageIndex")]
    pub message_index: Option<i64>,
}

/// Normalizer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Season timezone used to bucket instants into days
    pub clock: SeasonClock,
}

/// Output of one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    /// Deduplicated events in canonical order
    pub events: Vec<TransactionEvent>,
    /// Rejected records
    pub faults: Vec<IntegrityFault>,
}

/// Converts raw records into canonical events
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

enum Slot {
    Unique(TransactionEvent, Digest),
    Conflicted,
}

impl Normalizer {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: NormalizeConfig) -> Self {
        self.config = config;
        self
    }

    /// Normalize and deduplicate a batch
    ///
    /// Bad records are isolated: each produces a fault and the rest proceed.
    /// Records sharing an id with a differing payload are all rejected, so
    /// the outcome never depends on input order.
    pub fn normalize<I>(&self, records: I) -> NormalizedBatch
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut faults = Vec::new();
        let mut slots: IndexMap<EventId, Slot> = IndexMap::new();

        for record in records {
            let events = match self.normalize_record(&record) {
                Ok(events) => events,
                Err(err) => {
                    faults.push(err.into_fault());
                    continue;
                }
            };

            for event in events {
                let digest = match event.payload_digest() {
                    Ok(digest) => digest,
                    Err(err) => {
                        faults.push(
                            IngestError::invalid(&event.event_id, "payload", err.to_string())
                                .into_fault(),
                        );
                        continue;
                    }
                };
                match slots.entry(event.event_id.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(Slot::Unique(event, digest));
                    }
                    Entry::Occupied(mut slot) => {
                        let conflict = match slot.get() {
                            Slot::Unique(_, existing) => *existing != digest,
                            Slot::Conflicted => true,
                        };
                        if conflict {
                            faults.push(
                                IngestError::ConflictingDuplicate {
                                    event_id: event.event_id.clone(),
                                    reason: "payload differs from another record with this id"
                                        .to_string(),
                                }
                                .into_fault()
                                .on(event.effective_date),
                            );
                            slot.insert(Slot::Conflicted);
                        }
                    }
                }
            }
        }

        let mut events: Vec<_> = slots
            .into_values()
            .filter_map(|slot| match slot {
                Slot::Unique(event, _) => Some(event),
                Slot::Conflicted => None,
            })
            .collect();
        sort_events(&mut events);

        tracing::debug!(events = events.len(), faults = faults.len(), "normalized batch");
        NormalizedBatch { events, faults }
    }

    /// Normalize one record into its events
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a required field is missing or unusable
    pub fn normalize_record(&self, record: &RawRecord) -> Result<Vec<TransactionEvent>, IngestError> {
        match record {
            RawRecord::Canonical(rec) => self.from_canonical(record, rec).map(|e| vec![e]),
            RawRecord::Activity(rec) => self.from_activity(record, rec),
        }
    }

    fn from_canonical(
        &self,
        raw: &RawRecord,
        rec: &CanonicalRecord,
    ) -> Result<TransactionEvent, IngestError> {
        let event_id = resolve_id(rec.event_id.as_deref(), raw)?;

        let date_raw = rec
            .effective_date
            .as_deref()
            .ok_or_else(|| IngestError::missing(&event_id, "effective_date"))?;
        let effective_date = self.parse_date(&event_id, date_raw)?;
        let team_id = rec
            .team_id
            .map(TeamId::new)
            .ok_or_else(|| IngestError::missing(&event_id, "team_id"))?;
        let player_id = rec
            .player_id
            .map(PlayerId::new)
            .ok_or_else(|| IngestError::missing(&event_id, "player_id"))?;
        let action_raw = rec
            .action
            .as_deref()
            .ok_or_else(|| IngestError::missing(&event_id, "action"))?;
        let action = Action::parse(action_raw).ok_or_else(|| {
            IngestError::invalid(&event_id, "action", format!("{:?} is not a roster action", action_raw))
        })?;

        let counterparty_team_id = if action.is_trade() {
            let cp = rec
                .counterparty_team_id
                .map(TeamId::new)
                .ok_or_else(|| IngestError::missing(&event_id, "counterparty_team_id"))?;
            if cp == team_id {
                return Err(IngestError::invalid(
                    &event_id,
                    "counterparty_team_id",
                    "equals team_id",
                ));
            }
            Some(cp)
        } else {
            if rec.counterparty_team_id.is_some() {
                tracing::debug!(event = %event_id, "ignoring counterparty on non-trade action");
            }
            None
        };

        Ok(TransactionEvent {
            event_id,
            effective_date,
            sequence_hint: rec.sequence_hint,
            team_id,
            player_id,
            action,
            counterparty_team_id,
        })
    }

    fn from_activity(
        &self,
        raw: &RawRecord,
        rec: &ActivityRecord,
    ) -> Result<Vec<TransactionEvent>, IngestError> {
        let event_id = resolve_id(rec.id.as_deref(), raw)?;

        let millis = rec
            .date
            .ok_or_else(|| IngestError::missing(&event_id, "effective_date"))?;
        let effective_date = self
            .config
            .clock
            .date_of_epoch_millis(millis)
            .map_err(|e| IngestError::invalid(&event_id, "effective_date", e.to_string()))?;
        let player_id = rec
            .target_id
            .map(PlayerId::new)
            .ok_or_else(|| IngestError::missing(&event_id, "player_id"))?;
        let kind = rec
            .kind
            .as_deref()
            .ok_or_else(|| IngestError::missing(&event_id, "action"))?;

        let hinted = |event: TransactionEvent| match rec.message_index {
            Some(hint) => event.with_hint(hint),
            None => event,
        };

        let events = match kind {
            "ROSTER_ADD" => {
                let team = team_side(&event_id, rec.to, "to")?;
                vec![TransactionEvent::add(event_id, effective_date, team, player_id)]
            }
            "ROSTER_DROP" => {
                let team = team_side(&event_id, rec.from, "from")?;
                vec![TransactionEvent::drop(event_id, effective_date, team, player_id)]
            }
            "TRADE_ACCEPTED" => {
                let from = team_side(&event_id, rec.from, "from")?;
                let to = team_side(&event_id, rec.to, "to")?;
                if from == to {
                    return Err(IngestError::invalid(&event_id, "to", "trade to the same team"));
                }
                vec![
                    TransactionEvent::trade_out(event_id.child("out"), effective_date, from, to, player_id),
                    TransactionEvent::trade_in(event_id.child("in"), effective_date, to, from, player_id),
                ]
            }
            other => {
                return Err(IngestError::invalid(
                    &event_id,
                    "action",
                    format!("{:?} is not a roster action", other),
                ));
            }
        };

        Ok(events.into_iter().map(hinted).collect())
    }

    fn parse_date(&self, event_id: &EventId, raw: &str) -> Result<NaiveDate, IngestError> {
        self.config
            .clock
            .parse_date(raw)
            .map_err(|e| IngestError::invalid(event_id, "effective_date", e.to_string()))
    }
}

/// Source id when present, otherwise one synthesized from the raw record
fn resolve_id(source: Option<&str>, raw: &RawRecord) -> Result<EventId, IngestError> {
    let Some(id) = source.map(str::trim).filter(|s| !s.is_empty()) else {
        return synthesize_id(raw);
    };
    EventId::new(id).or_else(|e| {
        Err(IngestError::MalformedRecord {
            event_id: synthesize_id(raw)?,
            field: "event_id",
            reason: e.to_string(),
        })
    })
}

/// Content-derived id for a record that carries none
///
/// # Errors
///
/// Returns `MalformedRecord` if the record cannot be rendered; the fault is
/// keyed by a digest of its debug form so unrelated failures never collide.
fn synthesize_id(raw: &RawRecord) -> Result<EventId, IngestError> {
    // Struct field order is fixed, so the JSON rendering is stable
    match serde_json::to_vec(raw) {
        Ok(bytes) => Ok(EventId::synthesized(&Digest::compute(&bytes))),
        Err(err) => Err(IngestError::MalformedRecord {
            event_id: EventId::synthesized(&Digest::compute(format!("{:?}", raw).as_bytes())),
            field: "event_id",
            reason: format!("cannot be synthesized: {}", err),
        }),
    }
}

fn team_side(event_id: &EventId, side: Option<i64>, field: &'static str) -> Result<TeamId, IngestError> {
    let raw = side.ok_or_else(|| IngestError::missing(event_id, "team_id"))?;
    u32::try_from(raw)
        .map(TeamId::new)
        .map_err(|_| IngestError::invalid(event_id, "team_id", format!("`{}` is {}", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn canonical(id: &str, date: &str, team: u32, player: u64, action: &str) -> RawRecord {
        RawRecord::Canonical(CanonicalRecord {
            event_id: Some(id.to_string()),
            effective_date: Some(date.to_string()),
            team_id: Some(team),
            player_id: Some(player),
            action: Some(action.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_canonical_record() {
        let batch = Normalizer::new().normalize(vec![canonical("tx-1", "2025-04-01", 2, 77, "ADD")]);
        assert!(batch.faults.is_empty());
        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        assert_eq!(event.action, Action::Add);
        assert_eq!(event.team_id, TeamId::new(2));
        assert_eq!(event.effective_date, day("2025-04-01"));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let mut no_team = canonical("tx-1", "2025-04-01", 2, 77, "ADD");
        if let RawRecord::Canonical(rec) = &mut no_team {
            rec.team_id = None;
        }
        let mut no_action = canonical("tx-2", "2025-04-01", 2, 77, "ADD");
        if let RawRecord::Canonical(rec) = &mut no_action {
            rec.action = None;
        }
        let bad_date = canonical("tx-3", "someday", 2, 77, "ADD");
        let good = canonical("tx-4", "2025-04-01", 2, 78, "ADD");

        let batch = Normalizer::new().normalize(vec![no_team, no_action, bad_date, good]);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.faults.len(), 3);
        assert!(batch.faults.iter().all(|f| f.kind == FaultKind::MalformedRecord));
        assert!(batch.faults[0].detail.contains("team_id"));
    }

    #[test]
    fn test_trade_requires_counterparty() {
        let record = canonical("tx-1", "2025-04-01", 2, 77, "TRADE_OUT");
        let err = Normalizer::new().normalize_record(&record).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MalformedRecord { field: "counterparty_team_id", .. }
        ));
    }

    #[test]
    fn test_identical_duplicates_collapse() {
        let batch = Normalizer::new().normalize(vec![
            canonical("tx-1", "2025-04-01", 2, 77, "ADD"),
            canonical("tx-1", "2025-04-01", 2, 77, "ADD"),
        ]);
        assert_eq!(batch.events.len(), 1);
        assert!(batch.faults.is_empty());
    }

    #[test]
    fn test_conflicting_duplicates_rejected() {
        let batch = Normalizer::new().normalize(vec![
            canonical("tx-1", "2025-04-01", 2, 77, "ADD"),
            canonical("tx-1", "2025-04-01", 3, 77, "ADD"),
            canonical("tx-2", "2025-04-02", 2, 78, "ADD"),
        ]);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].event_id.as_str(), "tx-2");
        assert_eq!(batch.faults.len(), 1);
        assert_eq!(batch.faults[0].kind, FaultKind::ConflictingDuplicate);
    }

    #[test]
    fn test_conflict_outcome_independent_of_order() {
        let a = canonical("tx-1", "2025-04-01", 2, 77, "ADD");
        let b = canonical("tx-1", "2025-04-01", 3, 77, "ADD");
        let n = Normalizer::new();
        assert_eq!(
            n.normalize(vec![a.clone(), b.clone()]).events,
            n.normalize(vec![b, a]).events
        );
    }

    #[test]
    fn test_activity_add_and_drop() {
        let clock = NormalizeConfig { clock: SeasonClock::utc() };
        let n = Normalizer::new().with_config(clock);
        let add = RawRecord::Activity(ActivityRecord {
            id: Some("m1".to_string()),
            date: Some(1_743_465_600_000), // 2025-04-01T00:00:00Z
            kind: Some("ROSTER_ADD".to_string()),
            target_id: Some(41),
            from: Some(-1),
            to: Some(4),
            message_index: Some(0),
        });
        let drop = RawRecord::Activity(ActivityRecord {
            id: Some("m2".to_string()),
            kind: Some("ROSTER_DROP".to_string()),
            from: Some(4),
            to: Some(-1),
            message_index: Some(1),
            ..match &add {
                RawRecord::Activity(a) => a.clone(),
                RawRecord::Canonical(_) => unreachable!(),
            }
        });

        let batch = n.normalize(vec![drop, add]);
        assert!(batch.faults.is_empty());
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].action, Action::Add);
        assert_eq!(batch.events[0].sequence_hint, Some(0));
        assert_eq!(batch.events[1].action, Action::Drop);
        assert_eq!(batch.events[1].team_id, TeamId::new(4));
        assert_eq!(batch.events[0].effective_date, day("2025-04-01"));
    }

    #[test]
    fn test_activity_trade_expands_to_pair() {
        let record = RawRecord::Activity(ActivityRecord {
            id: Some("t9".to_string()),
            date: Some(1_743_465_600_000),
            kind: Some("TRADE_ACCEPTED".to_string()),
            target_id: Some(5),
            from: Some(1),
            to: Some(2),
            message_index: None,
        });
        let events = Normalizer::new().normalize_record(&record).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].pairs_with(&events[1]));
        assert_eq!(events[0].event_id.as_str(), "t9/out");
        assert_eq!(events[1].event_id.as_str(), "t9/in");
    }

    #[test]
    fn test_activity_free_agent_side_is_malformed() {
        let record = RawRecord::Activity(ActivityRecord {
            id: Some("m3".to_string()),
            date: Some(1_743_465_600_000),
            kind: Some("ROSTER_ADD".to_string()),
            target_id: Some(5),
            from: Some(3),
            to: Some(-1),
            message_index: None,
        });
        let err = Normalizer::new().normalize_record(&record).unwrap_err();
        assert!(err.to_string().contains("team_id"));
    }

    #[test]
    fn test_synthesized_id_is_stable() {
        let mut rec = canonical("", "2025-04-01", 2, 77, "ADD");
        if let RawRecord::Canonical(r) = &mut rec {
            r.event_id = None;
        }
        let n = Normalizer::new();
        let first = n.normalize(vec![rec.clone()]);
        let second = n.normalize(vec![rec.clone(), rec]);
        assert!(first.events[0].event_id.is_synthesized());
        assert_eq!(first.events, second.events);
    }

    #[test]
    fn test_synthesized_ids_differ_by_content() {
        let mut first = canonical("", "2025-04-01", 2, 77, "ADD");
        let mut second = canonical("", "2025-04-01", 2, 78, "ADD");
        for rec in [&mut first, &mut second] {
            if let RawRecord::Canonical(r) = rec {
                r.event_id = None;
            }
        }
        let batch = Normalizer::new().normalize(vec![first, second]);
        assert_eq!(batch.events.len(), 2);
        assert!(batch.faults.is_empty());
        assert_ne!(batch.events[0].event_id, batch.events[1].event_id);
    }

    #[test]
    fn test_raw_record_json_shape() {
        let json = r#"[
            {"source": "canonical", "event_id": "a", "effective_date": "2025-04-02",
             "team_id": 1, "player_id": 9, "action": "DROP"},
            {"source": "activity", "id": "b", "date": 1743465600000, "type": "ROSTER_ADD",
             "targetId": 9, "from": -1, "to": 1}
        ]"#;
        let records: Vec<RawRecord> = serde_json::from_str(json).unwrap();
        let batch = Normalizer::new().normalize(records);
        assert_eq!(batch.events.len(), 2);
        assert!(batch.faults.is_empty());
    }
}
