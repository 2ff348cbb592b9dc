//! Roster tenure intervals derived from daily snapshots.

use crate::store::{SnapshotStore, StoreResult};
use chrono::NaiveDate;
use rosterline_core::{PlayerId, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One continuous stretch of a player on a team's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenure {
    /// Team
    pub team_id: TeamId,
    /// Player moved
    pub player_id: PlayerId,
    /// First day on the roster, clamped to the queried range
    pub start_date: NaiveDate,
    /// Last day on the roster; `None` if still held at the end of the range
    pub end_date: Option<NaiveDate>,
    /// Days on the roster within the range, both ends inclusive
    pub days_held: i64,
}

/// Tenures for a team over `[from, to]`, ordered by start date then player
///
/// # Errors
///
/// Returns `NotFound` if the team has no replayed day in the range
pub fn tenures(store: &SnapshotStore, team_id: TeamId, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<Tenure>> {
    let days = store.get_range(team_id, from, to)?;
    let Some((last_day, _)) = days.last().cloned() else {
        return Ok(Vec::new());
    };

    let mut open: BTreeMap<PlayerId, NaiveDate> = BTreeMap::new();
    let mut closed = Vec::new();
    let mut previous_day: Option<NaiveDate> = None;

    for (day, roster) in &days {
        let departed: Vec<PlayerId> = open.keys().copied().filter(|p| !roster.contains(*p)).collect();
        for player in departed {
            if let (Some(start), Some(end)) = (open.remove(&player), previous_day) {
                closed.push(tenure(team_id, player, start, Some(end), end));
            }
        }
        for player in roster.iter() {
            open.entry(player).or_insert(*day);
        }
        previous_day = Some(*day);
    }

    closed.extend(
        open.into_iter()
            .map(|(player, start)| tenure(team_id, player, start, None, last_day)),
    );
    closed.sort_by_key(|t| (t.start_date, t.player_id, t.end_date.is_none(), t.end_date));
    Ok(closed)
}

fn tenure(
    team_id: TeamId,
    player_id: PlayerId,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    through: NaiveDate,
) -> Tenure {
    Tenure {
        team_id,
        player_id,
        start_date,
        end_date,
        days_held: (through - start_date).num_days() + 1,
    }
}
