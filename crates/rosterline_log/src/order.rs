//! Explicit total order over events and same-day grouping.
//!
//! Order: effective date, then events carrying a sequence hint before events
//! without one, then the hint, then event id. Source row order is never
//! consulted.

use crate::event::{Action, TransactionEvent};
use chrono::NaiveDate;
use rosterline_core::{EventId, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort key realizing the total order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey {
    /// Calendar day
    pub effective_date: NaiveDate,
    /// `false` sorts first, so hinted events lead their day
    pub unhinted: bool,
    /// Sequence hint, `0` when absent
    pub hint: i64,
    /// Final tie-breaker
    pub event_id: EventId,
}

impl OrderKey {
    /// Key of one event
    #[must_use]
    pub fn of(event: &TransactionEvent) -> Self {
        Self {
            effective_date: event.effective_date,
            unhinted: event.sequence_hint.is_none(),
            hint: event.sequence_hint.unwrap_or(0),
            event_id: event.event_id.clone(),
        }
    }
}

/// Sort events into canonical order
pub fn sort_events(events: &mut [TransactionEvent]) {
    events.sort_by_cached_key(OrderKey::of);
}

/// All events one team logged on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBurst {
    /// Team
    pub team_id: TeamId,
    /// Calendar day
    pub date: NaiveDate,
    /// Events in canonical order
    pub events: Vec<TransactionEvent>,
}

impl DayBurst {
    /// Whether every event carries a sequence hint, making intra-day order known
    #[must_use]
    pub fn fully_hinted(&self) -> bool {
        self.events.iter().all(|e| e.sequence_hint.is_some())
    }

    /// Non-trade events (ADD/DROP)
    pub fn moves(&self) -> impl Iterator<Item = &TransactionEvent> {
        self.events.iter().filter(|e| !e.is_trade())
    }

    /// Trade legs acted by this team
    pub fn trade_legs(&self) -> impl Iterator<Item = &TransactionEvent> {
        self.events.iter().filter(|e| e.is_trade())
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the burst has no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Group events by `(date, team)`, each burst in canonical order
///
/// The outer map iterates dates ascending; bursts within a date are sorted by
/// team id.
pub fn group_bursts<'a, I>(events: I) -> BTreeMap<NaiveDate, Vec<DayBurst>>
where
    I: IntoIterator<Item = &'a TransactionEvent>,
{
    let mut grouped: BTreeMap<NaiveDate, BTreeMap<TeamId, Vec<TransactionEvent>>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.effective_date)
            .or_default()
            .entry(event.team_id)
            .or_default()
            .push(event.clone());
    }

    grouped
        .into_iter()
        .map(|(date, teams)| {
            let bursts = teams
                .into_iter()
                .map(|(team_id, mut events)| {
                    sort_events(&mut events);
                    DayBurst { team_id, date, events }
                })
                .collect();
            (date, bursts)
        })
        .collect()
}

/// A matched TRADE_OUT / TRADE_IN pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePair {
    /// TRADE_OUT logged by the sending team
    pub out_leg: TransactionEvent,
    /// TRADE_IN logged by the receiving team
    pub in_leg: TransactionEvent,
}

impl TradePair {
    /// Sending team
    pub fn from_team(&self) -> TeamId {
        self.out_leg.team_id
    }

    /// Receiving team
    pub fn to_team(&self) -> TeamId {
        self.in_leg.team_id
    }

    /// Key of the earlier leg; pairs apply in this order
    pub fn order_key(&self) -> OrderKey {
        OrderKey::of(&self.out_leg).min(OrderKey::of(&self.in_leg))
    }
}

/// Trade legs of one day, matched up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePairing {
    /// Complete pairs in apply order
    pub pairs: Vec<TradePair>,
    /// Legs with no matching opposite leg, in canonical order
    pub unpaired: Vec<TransactionEvent>,
}

/// Match trade legs of a single day
///
/// Each TRADE_OUT is matched with the first unused TRADE_IN (canonical order)
/// for the same player with swapped team and counterparty.
pub fn pair_trades<'a, I>(events: I) -> TradePairing
where
    I: IntoIterator<Item = &'a TransactionEvent>,
{
    let mut outs = Vec::new();
    let mut ins = Vec::new();
    for event in events {
        match event.action {
            Action::TradeOut => outs.push(event.clone()),
            Action::TradeIn => ins.push(event.clone()),
            Action::Add | Action::Drop => {}
        }
    }
    sort_events(&mut outs);
    sort_events(&mut ins);

    let mut used = vec![false; ins.len()];
    let mut pairing = TradePairing::default();

    for out_leg in outs {
        let partner = ins
            .iter()
            .enumerate()
            .find(|(i, in_leg)| !used[*i] && out_leg.pairs_with(in_leg))
            .map(|(i, _)| i);
        match partner {
            Some(i) => {
                used[i] = true;
                pairing.pairs.push(TradePair {
                    out_leg,
                    in_leg: ins[i].clone(),
                });
            }
            None => pairing.unpaired.push(out_leg),
        }
    }
    pairing.unpaired.extend(
        ins.into_iter()
            .zip(used)
            .filter(|(_, used)| !used)
            .map(|(leg, _)| leg),
    );

    pairing.pairs.sort_by_cached_key(TradePair::order_key);
    sort_events(&mut pairing.unpaired);
    pairing
}
