//! Roster state and daily snapshots.

use chrono::NaiveDate;
use rosterline_core::{PlayerId, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Players held by one team at one point in time
///
/// Backed by an ordered set so equal rosters always encode to equal bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RosterState {
    players: BTreeSet<PlayerId>,
}

impl RosterState {
    /// Create an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the player is on the roster
    #[must_use]
    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    /// Insert a player; returns `false` if already held
    pub fn insert(&mut self, player: PlayerId) -> bool {
        self.players.insert(player)
    }

    /// Remove a player; returns `false` if not held
    pub fn remove(&mut self, player: PlayerId) -> bool {
        self.players.remove(&player)
    }

    /// Players in id order
    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().copied()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in `self` but not in `other`
    #[must_use]
    pub fn difference(&self, other: &RosterState) -> BTreeSet<PlayerId> {
        self.players.difference(&other.players).copied().collect()
    }

    /// Whether no player is on both rosters
    #[must_use]
    pub fn is_disjoint(&self, other: &RosterState) -> bool {
        self.players.is_disjoint(&other.players)
    }
}

impl FromIterator<PlayerId> for RosterState {
    fn from_iter<I: IntoIterator<Item = PlayerId>>(iter: I) -> Self {
        Self {
            players: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for RosterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, player) in self.players.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", player.as_u64())?;
        }
        write!(f, "}}")
    }
}

/// A team's roster on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    /// Team
    pub team_id: TeamId,
    /// Calendar day
    pub date: NaiveDate,
    /// Players held at end of day
    pub roster: RosterState,
}

impl DailySnapshot {
    /// Snapshot of one team on one date
    #[must_use]
    pub fn new(team_id: TeamId, date: NaiveDate, roster: RosterState) -> Self {
        Self { team_id, date, roster }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(ids: &[u64]) -> RosterState {
        ids.iter().copied().map(PlayerId::new).collect()
    }

    #[test]
    fn test_insert_remove() {
        let mut state = RosterState::new();
        assert!(state.insert(PlayerId::new(1)));
        assert!(!state.insert(PlayerId::new(1)));
        assert!(state.contains(PlayerId::new(1)));
        assert!(state.remove(PlayerId::new(1)));
        assert!(!state.remove(PlayerId::new(1)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_difference_and_disjoint() {
        let a = roster(&[1, 2, 3]);
        let b = roster(&[2, 4]);
        assert_eq!(a.difference(&b).len(), 2);
        assert!(!a.is_disjoint(&b));
        assert!(roster(&[5]).is_disjoint(&a));
    }

    #[test]
    fn test_display_sorted() {
        assert_eq!(roster(&[3, 1, 2]).to_string(), "{1, 2, 3}");
        assert_eq!(RosterState::new().to_string(), "{}");
    }

    #[test]
    fn test_json_is_plain_array() {
        let json = serde_json::to_string(&roster(&[2, 1])).unwrap();
        assert_eq!(json, "[1,2]");
    }
}
