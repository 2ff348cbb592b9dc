//! Rosterline Transaction Log
//!
//! Canonical roster transaction events, normalization of heterogeneous raw
//! records, the append-only deduplicated journal, and the explicit total
//! order and same-day grouping the replay engine consumes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod event;
pub mod fault;
pub mod journal;
pub mod normalize;
pub mod order;

pub use encoding::CanonicalEncode;
pub use event::{Action, TransactionEvent};
pub use fault::{FaultKind, FaultLog, IntegrityFault};
pub use journal::{AppendOutcome, EventJournal};
pub use normalize::{
    ActivityRecord, CanonicalRecord, IngestError, NormalizeConfig, NormalizedBatch, Normalizer,
    RawRecord,
};
pub use order::{DayBurst, OrderKey, TradePair, TradePairing, group_bursts, pair_trades, sort_events};
