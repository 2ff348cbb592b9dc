//! Same-day ADD/DROP resolution for one team.
//!
//! A fully hinted burst is applied event by event in hint order. Without
//! complete hints, intra-day order is unknown and each player's moves are
//! reduced to their net effect instead: removals and additions alternate
//! starting from whether the team held the player before the burst, and
//! whatever cannot be paired off is a fault.

use rosterline_core::PlayerId;
use rosterline_log::{Action, DayBurst, FaultKind, IntegrityFault, TransactionEvent};
use rosterline_storage::RosterState;
use std::collections::{BTreeMap, VecDeque};

/// Roster after a burst, plus the faults it raised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurstOutcome {
    /// Roster at the end of the day
    pub roster: RosterState,
    /// Events that could not be applied
    pub faults: Vec<IntegrityFault>,
}

/// Resolve the non-trade events of a burst against the team's prior roster
#[must_use]
pub fn resolve_moves(prior: &RosterState, burst: &DayBurst) -> BurstOutcome {
    let moves: Vec<&TransactionEvent> = burst.moves().collect();
    if moves.iter().all(|e| e.sequence_hint.is_some()) {
        apply_sequential(prior, &moves)
    } else {
        apply_net_effect(prior, &moves)
    }
}

fn duplicate_add(event: &TransactionEvent) -> IntegrityFault {
    IntegrityFault::new(
        event.event_id.clone(),
        FaultKind::DuplicateAdd,
        format!("{} already holds {}", event.team_id, event.player_id),
    )
    .at(event.team_id, event.effective_date)
}

fn drop_of_absent(event: &TransactionEvent) -> IntegrityFault {
    IntegrityFault::new(
        event.event_id.clone(),
        FaultKind::DropOfAbsentPlayer,
        format!("{} does not hold {}", event.team_id, event.player_id),
    )
    .at(event.team_id, event.effective_date)
}

/// Apply one ADD or DROP to a roster, returning the fault if it does not fit
///
/// Trade legs are ignored; pairs go through the trade coordinator.
pub fn apply_move(roster: &mut RosterState, event: &TransactionEvent) -> Option<IntegrityFault> {
    match event.action {
        Action::Add => (!roster.insert(event.player_id)).then(|| duplicate_add(event)),
        Action::Drop => (!roster.remove(event.player_id)).then(|| drop_of_absent(event)),
        Action::TradeOut | Action::TradeIn => None,
    }
}

fn apply_sequential(prior: &RosterState, moves: &[&TransactionEvent]) -> BurstOutcome {
    let mut roster = prior.clone();
    let faults = moves.iter().filter_map(|event| apply_move(&mut roster, event)).collect();
    BurstOutcome { roster, faults }
}

#[derive(Default)]
struct PlayerMoves<'a> {
    additions: VecDeque<&'a TransactionEvent>,
    removals: VecDeque<&'a TransactionEvent>,
}

fn apply_net_effect(prior: &RosterState, moves: &[&TransactionEvent]) -> BurstOutcome {
    let mut by_player: BTreeMap<PlayerId, PlayerMoves<'_>> = BTreeMap::new();
    for event in moves {
        let entry = by_player.entry(event.player_id).or_default();
        match event.action {
            Action::Add => entry.additions.push_back(event),
            Action::Drop => entry.removals.push_back(event),
            Action::TradeOut | Action::TradeIn => {}
        }
    }

    let mut outcome = BurstOutcome {
        roster: prior.clone(),
        faults: Vec::new(),
    };

    for (player, mut pending) in by_player {
        let mut present = prior.contains(player);
        loop {
            let next = if present {
                pending.removals.pop_front()
            } else {
                pending.additions.pop_front()
            };
            if next.is_none() {
                break;
            }
            present = !present;
        }

        outcome.faults.extend(pending.additions.iter().map(|e| duplicate_add(e)));
        outcome.faults.extend(pending.removals.iter().map(|e| drop_of_absent(e)));

        if present {
            outcome.roster.insert(player);
        } else {
            outcome.roster.remove(player);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rosterline_core::{EventId, TeamId};
    use rosterline_log::group_bursts;

    const TEAM: TeamId = TeamId::new(1);

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn add(id: &str, player: u64) -> TransactionEvent {
        TransactionEvent::add(EventId::new(id).unwrap(), day(), TEAM, PlayerId::new(player))
    }

    fn drop(id: &str, player: u64) -> TransactionEvent {
        TransactionEvent::drop(EventId::new(id).unwrap(), day(), TEAM, PlayerId::new(player))
    }

    fn burst(events: &[TransactionEvent]) -> DayBurst {
        let mut grouped = group_bursts(events);
        grouped.remove(&day()).unwrap().remove(0)
    }

    fn roster(ids: &[u64]) -> RosterState {
        ids.iter().copied().map(PlayerId::new).collect()
    }

    #[test]
    fn test_add_then_drop_nets_to_absent() {
        let outcome = resolve_moves(&roster(&[]), &burst(&[add("z", 5), drop("a", 5)]));
        assert!(outcome.roster.is_empty());
        assert!(outcome.faults.is_empty());
    }

    #[test]
    fn test_drop_then_add_nets_to_present() {
        let outcome = resolve_moves(&roster(&[5]), &burst(&[drop("z", 5), add("a", 5)]));
        assert_eq!(outcome.roster, roster(&[5]));
        assert!(outcome.faults.is_empty());
    }

    #[test]
    fn test_surplus_add_is_duplicate() {
        let outcome = resolve_moves(&roster(&[5]), &burst(&[add("a", 5)]));
        assert_eq!(outcome.roster, roster(&[5]));
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].kind, FaultKind::DuplicateAdd);
    }

    #[test]
    fn test_surplus_drop_is_absent() {
        let outcome = resolve_moves(&roster(&[]), &burst(&[drop("a", 5), drop("b", 5), add("c", 5)]));
        // add then drop pair off; one drop is left over
        assert!(outcome.roster.is_empty());
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].kind, FaultKind::DropOfAbsentPlayer);
    }

    #[test]
    fn test_hinted_burst_is_sequential() {
        let events = [drop("a", 5).with_hint(1), add("b", 5).with_hint(2)];
        let outcome = resolve_moves(&roster(&[]), &burst(&events));
        assert_eq!(outcome.roster, roster(&[5]));
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].kind, FaultKind::DropOfAbsentPlayer);
    }

    #[test]
    fn test_independent_players() {
        let outcome = resolve_moves(&roster(&[1, 2]), &burst(&[drop("a", 1), add("b", 3), add("c", 4)]));
        assert_eq!(outcome.roster, roster(&[2, 3, 4]));
        assert!(outcome.faults.is_empty());
    }
}
