//! Identifiers for rosterline entities.
//!
//! Team and player ids are the numeric ids assigned by the upstream league
//! platform. Event ids are opaque strings, either source-assigned or
//! synthesized from a digest of the record payload.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Team identifier - one fantasy team within the league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(u32);

impl TeamId {
    /// Create from the platform's numeric team id
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw numeric id
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "team:{}", self.0)
    }
}

impl FromStr for TeamId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("team:").unwrap_or(s);
        raw.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| CoreError::InvalidId {
                reason: format!("not a team id: {:?}", s),
            })
    }
}

impl From<u32> for TeamId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Player identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Create from the platform's numeric player id
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw numeric id
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player:{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Event identifier - unique per transaction event
///
/// Ordered lexically; that order is the final tiebreak between events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Prefix carried by synthesized ids
    pub const SYNTHETIC_PREFIX: &'static str = "syn_";

    /// Create from a source-assigned id
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty or only whitespace
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidId {
                reason: "empty event id".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Synthesize an id from a payload digest
    #[must_use]
    pub fn synthesized(digest: &crate::Digest) -> Self {
        Self(format!("{}{}", Self::SYNTHETIC_PREFIX, digest.short_hex()))
    }

    /// Derive a child id (used when one record expands into several events)
    #[must_use]
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}/{}", self.0, suffix))
    }

    /// Whether this id was synthesized rather than source-assigned
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.0.starts_with(Self::SYNTHETIC_PREFIX)
    }

    /// Get as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run identifier - identifies a single replay run in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Digest;

    #[test]
    fn test_team_id_display_and_parse() {
        let team = TeamId::new(2);
        assert_eq!(team.to_string(), "team:2");
        assert_eq!("team:2".parse::<TeamId>().unwrap(), team);
        assert_eq!("2".parse::<TeamId>().unwrap(), team);
        assert!("two".parse::<TeamId>().is_err());
    }

    #[test]
    fn test_event_id_rejects_empty() {
        assert!(EventId::new("").is_err());
        assert!(EventId::new("   ").is_err());
        assert!(EventId::new("tx-1").is_ok());
    }

    #[test]
    fn test_event_id_lexical_order() {
        let a = EventId::new("a-10").unwrap();
        let b = EventId::new("a-9").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_synthesized_id() {
        let id = EventId::synthesized(&Digest::compute(b"payload"));
        assert!(id.is_synthesized());
        assert_eq!(id, EventId::synthesized(&Digest::compute(b"payload")));
        assert!(!EventId::new("tx-1").unwrap().is_synthesized());
    }

    #[test]
    fn test_child_id() {
        let id = EventId::new("trade-7").unwrap();
        assert_eq!(id.child("out").as_str(), "trade-7/out");
    }

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert!(RunId::new().to_string().starts_with("run_"));
    }
}
