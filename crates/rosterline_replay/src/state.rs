//! League-wide roster state during replay.

use rosterline_core::{PlayerId, TeamId};
use rosterline_storage::RosterState;
use std::collections::{BTreeMap, BTreeSet};

/// Every team's roster at the replay cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeagueState {
    rosters: BTreeMap<TeamId, RosterState>,
}

impl LeagueState {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster of a team; empty if the team has never been seen
    #[must_use]
    pub fn roster(&self, team_id: TeamId) -> RosterState {
        self.rosters.get(&team_id).cloned().unwrap_or_default()
    }

    /// Whether a team holds a player
    #[must_use]
    pub fn holds(&self, team_id: TeamId, player: PlayerId) -> bool {
        self.rosters.get(&team_id).is_some_and(|r| r.contains(player))
    }

    /// Mutable roster, created empty if the team is new
    pub fn roster_mut(&mut self, team_id: TeamId) -> &mut RosterState {
        self.rosters.entry(team_id).or_default()
    }

    /// Replace a team's roster
    pub fn set(&mut self, team_id: TeamId, roster: RosterState) {
        self.rosters.insert(team_id, roster);
    }

    /// Teams currently holding a player
    #[must_use]
    pub fn holders(&self, player: PlayerId) -> BTreeSet<TeamId> {
        self.rosters
            .iter()
            .filter(|(_, roster)| roster.contains(player))
            .map(|(team, _)| *team)
            .collect()
    }

    /// Teams in id order
    pub fn teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.rosters.keys().copied()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.rosters.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rosters.is_empty()
    }
}

impl FromIterator<(TeamId, RosterState)> for LeagueState {
    fn from_iter<I: IntoIterator<Item = (TeamId, RosterState)>>(iter: I) -> Self {
        Self {
            rosters: iter.into_iter().collect(),
        }
    }
}
