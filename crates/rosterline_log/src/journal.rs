//! Append-only journal of normalized events.
//!
//! The journal is the single source replay reads from. Events are appended,
//! never edited; an event whose id is already journaled is either an exact
//! repeat (ignored) or a conflicting duplicate (rejected, the journaled
//! version stays).

use crate::event::TransactionEvent;
use crate::fault::{FaultKind, IntegrityFault};
use crate::order::{OrderKey, sort_events};
use chrono::NaiveDate;
use rosterline_core::{Digest, EventId, TeamId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of appending a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Events that were new to the journal, in canonical order
    pub appended: Vec<TransactionEvent>,
    /// Exact repeats that were skipped
    pub repeated: usize,
    /// Conflicting duplicates that were rejected
    pub faults: Vec<IntegrityFault>,
}

impl AppendOutcome {
    /// Earliest effective date among newly appended events
    #[must_use]
    pub fn earliest(&self) -> Option<NaiveDate> {
        self.appended.iter().map(|e| e.effective_date).min()
    }
}

/// Append-only, id-deduplicated event journal
#[derive(Debug, Clone, Default)]
pub struct EventJournal {
    by_id: HashMap<EventId, (TransactionEvent, Digest)>,
    by_order: BTreeMap<OrderKey, EventId>,
}

impl EventJournal {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of normalized events
    pub fn append(&mut self, batch: impl IntoIterator<Item = TransactionEvent>) -> AppendOutcome {
        let mut outcome = AppendOutcome::default();

        for event in batch {
            let digest = match event.payload_digest() {
                Ok(digest) => digest,
                Err(err) => {
                    outcome.faults.push(
                        IntegrityFault::new(
                            event.event_id.clone(),
                            FaultKind::MalformedRecord,
                            format!("payload cannot be encoded: {}", err),
                        )
                        .on(event.effective_date),
                    );
                    continue;
                }
            };

            if let Some((existing, existing_digest)) = self.by_id.get(&event.event_id) {
                if *existing_digest == digest {
                    outcome.repeated += 1;
                } else {
                    outcome.faults.push(
                        IntegrityFault::new(
                            event.event_id.clone(),
                            FaultKind::ConflictingDuplicate,
                            format!("already journaled as `{}`, rejected `{}`", existing, event),
                        )
                        .on(event.effective_date),
                    );
                }
                continue;
            }

            self.by_order.insert(OrderKey::of(&event), event.event_id.clone());
            self.by_id.insert(event.event_id.clone(), (event.clone(), digest));
            outcome.appended.push(event);
        }

        sort_events(&mut outcome.appended);
        outcome
    }

    /// Look up an event by id
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&TransactionEvent> {
        self.by_id.get(id).map(|(event, _)| event)
    }

    /// Whether an event with this id is logged
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.by_id.contains_key(id)
    }

    /// All events in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &TransactionEvent> {
        self.by_order.values().filter_map(|id| self.get(id))
    }

    /// Events with effective date in `[from, to]`, in canonical order
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = &TransactionEvent> {
        self.iter()
            .skip_while(move |e| e.effective_date < from)
            .take_while(move |e| e.effective_date <= to)
    }

    /// Every team mentioned, as actor or counterparty
    #[must_use]
    pub fn teams(&self) -> BTreeSet<TeamId> {
        self.iter()
            .flat_map(|e| std::iter::once(e.team_id).chain(e.counterparty_team_id))
            .collect()
    }

    /// Earliest effective date logged
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.by_order.keys().next().map(|k| k.effective_date)
    }

    /// Latest effective date logged
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.by_order.keys().next_back().map(|k| k.effective_date)
    }

    /// Number of logged events
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
