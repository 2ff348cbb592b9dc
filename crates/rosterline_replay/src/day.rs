//! One date of the replay: trade pairs and ADD/DROP bursts together.
//!
//! A team whose burst for the day is fully hinted is sequenced: its moves and
//! every pair between two sequenced teams run as one timeline in canonical
//! order, a pair staged when its earlier leg comes up. Every other pair
//! applies first, then every other team's moves resolve to their net effect.

use crate::burst::{BurstOutcome, apply_move, resolve_moves};
use crate::state::LeagueState;
use crate::trade::{settle_pair, unpaired_faults};
use rayon::prelude::*;
use rosterline_core::TeamId;
use rosterline_log::{DayBurst, IntegrityFault, OrderKey, TradePair, TradePairing, TransactionEvent};
use std::collections::BTreeSet;

enum Step<'a> {
    Move(&'a TransactionEvent),
    Trade(&'a TradePair),
}

/// Apply one date's events to the league, returning the faults raised
///
/// Only teams accepted by `include` are touched; a pair needs both teams
/// accepted. Net-effect bursts resolve on rayon when `parallel` is set.
pub fn replay_day<F>(
    league: &mut LeagueState,
    bursts: &[DayBurst],
    pairing: &TradePairing,
    include: F,
    parallel: bool,
) -> Vec<IntegrityFault>
where
    F: Fn(TeamId) -> bool,
{
    let sequenced: BTreeSet<TeamId> = bursts
        .iter()
        .filter(|b| include(b.team_id) && b.fully_hinted())
        .map(|b| b.team_id)
        .collect();

    let (timed, upfront): (Vec<&TradePair>, Vec<&TradePair>) = pairing
        .pairs
        .iter()
        .filter(|p| include(p.from_team()) && include(p.to_team()))
        .partition(|p| sequenced.contains(&p.from_team()) && sequenced.contains(&p.to_team()));

    let mut faults = unpaired_faults(pairing.unpaired.iter().filter(|leg| include(leg.team_id)));

    for pair in upfront {
        if let Err(refused) = settle_pair(league, pair) {
            faults.extend(refused);
        }
    }

    let mut steps: Vec<(OrderKey, Step<'_>)> = timed.into_iter().map(|p| (p.order_key(), Step::Trade(p))).collect();
    steps.extend(
        bursts
            .iter()
            .filter(|b| sequenced.contains(&b.team_id))
            .flat_map(DayBurst::moves)
            .map(|e| (OrderKey::of(e), Step::Move(e))),
    );
    steps.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, step) in steps {
        match step {
            Step::Trade(pair) => {
                if let Err(refused) = settle_pair(league, pair) {
                    faults.extend(refused);
                }
            }
            Step::Move(event) => faults.extend(apply_move(league.roster_mut(event.team_id), event)),
        }
    }

    let work: Vec<&DayBurst> = bursts
        .iter()
        .filter(|b| include(b.team_id) && !sequenced.contains(&b.team_id))
        .collect();
    let outcomes: Vec<(TeamId, BurstOutcome)> = {
        let current: &LeagueState = league;
        let resolve = |burst: &&DayBurst| (burst.team_id, resolve_moves(&current.roster(burst.team_id), burst));
        if parallel {
            work.par_iter().map(resolve).collect()
        } else {
            work.iter().map(resolve).collect()
        }
    };
    for (team, outcome) in outcomes {
        faults.extend(outcome.faults);
        league.set(team, outcome.roster);
    }

    faults
}
