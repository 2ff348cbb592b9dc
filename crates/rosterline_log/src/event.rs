//! Canonical roster transaction events.
//!
//! A [`TransactionEvent`] is immutable once normalized. Trades are carried as
//! two events, one per side, linked through `counterparty_team_id`.

use crate::encoding::CanonicalEncode;
use chrono::NaiveDate;
use rosterline_core::{CoreResult, Digest, EventId, PlayerId, TeamId};
use serde::{Deserialize, Serialize};

/// Roster-affecting action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Free-agent or waiver pickup
    Add,
    /// Release to free agency
    Drop,
    /// Player leaves in a trade
    TradeOut,
    /// Player arrives in a trade
    TradeIn,
}

impl Action {
    /// Parse an action name, accepting the upstream spellings
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "ADD" | "ROSTER_ADD" | "FA_ADD" | "WAIVER_ADD" => Some(Self::Add),
            "DROP" | "ROSTER_DROP" => Some(Self::Drop),
            "TRADE_OUT" => Some(Self::TradeOut),
            "TRADE_IN" => Some(Self::TradeIn),
            _ => None,
        }
    }

    /// Whether the action is one leg of a trade
    pub const fn is_trade(self) -> bool {
        matches!(self, Self::TradeOut | Self::TradeIn)
    }

    /// Whether the action puts a player onto the acting team's roster
    pub const fn is_addition(self) -> bool {
        matches!(self, Self::Add | Self::TradeIn)
    }

    /// Whether the action takes a player off the acting team's roster
    pub const fn is_removal(self) -> bool {
        !self.is_addition()
    }

    /// Upstream spelling
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Drop => "DROP",
            Self::TradeOut => "TRADE_OUT",
            Self::TradeIn => "TRADE_IN",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized roster transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Stable id; source-provided or synthesized
    pub event_id: EventId,
    /// Calendar day in the season timezone
    pub effective_date: NaiveDate,
    /// Source-provided intra-day ordering value
    pub sequence_hint: Option<i64>,
    /// Acting team
    pub team_id: TeamId,
    /// Player moved
    pub player_id: PlayerId,
    /// What happened to the player
    pub action: Action,
    /// Other side of a trade; set only for trade actions
    pub counterparty_team_id: Option<TeamId>,
}

/// Everything about an event except its id, used for duplicate detection
#[derive(Serialize)]
struct EventPayload<'a> {
    effective_date: &'a NaiveDate,
    sequence_hint: Option<i64>,
    team_id: TeamId,
    player_id: PlayerId,
    action: Action,
    counterparty_team_id: Option<TeamId>,
}

impl CanonicalEncode for EventPayload<'_> {}

impl TransactionEvent {
    /// Free-agent or waiver pickup
    pub fn add(event_id: EventId, date: NaiveDate, team_id: TeamId, player_id: PlayerId) -> Self {
        Self::plain(event_id, date, team_id, player_id, Action::Add)
    }

    /// Release to free agency
    pub fn drop(event_id: EventId, date: NaiveDate, team_id: TeamId, player_id: PlayerId) -> Self {
        Self::plain(event_id, date, team_id, player_id, Action::Drop)
    }

    /// Outgoing side of a trade: `team_id` sends the player to `to_team`
    pub fn trade_out(
        event_id: EventId,
        date: NaiveDate,
        team_id: TeamId,
        to_team: TeamId,
        player_id: PlayerId,
    ) -> Self {
        Self {
            counterparty_team_id: Some(to_team),
            ..Self::plain(event_id, date, team_id, player_id, Action::TradeOut)
        }
    }

    /// Incoming side of a trade: `team_id` receives the player from `from_team`
    pub fn trade_in(
        event_id: EventId,
        date: NaiveDate,
        team_id: TeamId,
        from_team: TeamId,
        player_id: PlayerId,
    ) -> Self {
        Self {
            counterparty_team_id: Some(from_team),
            ..Self::plain(event_id, date, team_id, player_id, Action::TradeIn)
        }
    }

    fn plain(
        event_id: EventId,
        effective_date: NaiveDate,
        team_id: TeamId,
        player_id: PlayerId,
        action: Action,
    ) -> Self {
        Self {
            event_id,
            effective_date,
            sequence_hint: None,
            team_id,
            player_id,
            action,
            counterparty_team_id: None,
        }
    }

    /// Attach an intra-day ordering value
    pub fn with_hint(mut self, hint: i64) -> Self {
        self.sequence_hint = Some(hint);
        self
    }

    /// Whether this is a trade leg
    pub fn is_trade(&self) -> bool {
        self.action.is_trade()
    }

    /// Whether `other` is the matching opposite leg of this trade leg
    pub fn pairs_with(&self, other: &Self) -> bool {
        let opposite = matches!(
            (self.action, other.action),
            (Action::TradeOut, Action::TradeIn) | (Action::TradeIn, Action::TradeOut)
        );
        opposite
            && self.player_id == other.player_id
            && self.effective_date == other.effective_date
            && self.counterparty_team_id == Some(other.team_id)
            && other.counterparty_team_id == Some(self.team_id)
    }

    /// Digest of everything but the id
    ///
    /// Two records sharing an id are duplicates exactly when their payload
    /// digests agree.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be encoded
    pub fn payload_digest(&self) -> CoreResult<Digest> {
        EventPayload {
            effective_date: &self.effective_date,
            sequence_hint: self.sequence_hint,
            team_id: self.team_id,
            player_id: self.player_id,
            action: self.action,
            counterparty_team_id: self.counterparty_team_id,
        }
        .digest()
    }
}

impl std::fmt::Display for TransactionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.event_id, self.effective_date, self.team_id, self.action, self.player_id
        )?;
        if let Some(cp) = self.counterparty_team_id {
            write!(f, " <> {}", cp)?;
        }
        Ok(())
    }
}
