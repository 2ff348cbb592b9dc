//! Trade coordinator.
//!
//! A trade touches two teams at once. Each pair is staged against the current
//! league state, both legs are checked, and only then are both committed.
//! A pair that fails either check changes neither team.

use crate::state::LeagueState;
use rosterline_log::{FaultKind, IntegrityFault, TradePair, TransactionEvent};
use rosterline_core::{PlayerId, TeamId};

/// A trade pair that passed both checks and is ready to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTrade {
    from_team: TeamId,
    to_team: TeamId,
    player: PlayerId,
}

impl StagedTrade {
    /// Check both legs of a pair against the league
    ///
    /// # Errors
    ///
    /// Returns one fault per failing leg: `DropOfAbsentPlayer` if the sending
    /// team does not hold the player, `DuplicateAdd` if the receiving team
    /// already does.
    pub fn stage(league: &LeagueState, pair: &TradePair) -> Result<Self, Vec<IntegrityFault>> {
        let player = pair.out_leg.player_id;
        let from_team = pair.from_team();
        let to_team = pair.to_team();
        let date = pair.out_leg.effective_date;
        let mut faults = Vec::new();

        if !league.holds(from_team, player) {
            faults.push(
                IntegrityFault::new(
                    pair.out_leg.event_id.clone(),
                    FaultKind::DropOfAbsentPlayer,
                    format!("{} does not hold {}; trade with {} not applied", from_team, player, to_team),
                )
                .at(from_team, date),
            );
        }
        if league.holds(to_team, player) {
            faults.push(
                IntegrityFault::new(
                    pair.in_leg.event_id.clone(),
                    FaultKind::DuplicateAdd,
                    format!("{} already holds {}; trade with {} not applied", to_team, player, from_team),
                )
                .at(to_team, date),
            );
        }

        if faults.is_empty() {
            Ok(Self {
                from_team,
                to_team,
                player,
            })
        } else {
            Err(faults)
        }
    }

    /// Apply both legs
    pub fn commit(self, league: &mut LeagueState) {
        league.roster_mut(self.from_team).remove(self.player);
        league.roster_mut(self.to_team).insert(self.player);
    }
}

/// Stage and commit one pair, or report why it was refused
///
/// # Errors
///
/// Returns the faults from [`StagedTrade::stage`]; the league is unchanged
pub fn settle_pair(league: &mut LeagueState, pair: &TradePair) -> Result<(), Vec<IntegrityFault>> {
    StagedTrade::stage(league, pair).map(|staged| staged.commit(league))
}

/// `UnpairedTrade` faults for legs with no opposite leg
pub fn unpaired_faults<'a, I>(legs: I) -> Vec<IntegrityFault>
where
    I: IntoIterator<Item = &'a TransactionEvent>,
{
    legs.into_iter()
        .map(|leg| {
            let counterparty = leg
                .counterparty_team_id
                .map_or_else(|| "unknown team".to_string(), |t| t.to_string());
            IntegrityFault::new(
                leg.event_id.clone(),
                FaultKind::UnpairedTrade,
                format!("{} of {} with {} has no matching leg; not applied", leg.action, leg.player_id, counterparty),
            )
            .at(leg.team_id, leg.effective_date)
        })
        .collect()
}
