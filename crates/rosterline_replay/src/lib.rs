//! Rosterline Replay Engine
//!
//! Deterministic reconstruction of every team's roster for every day of the
//! season from the transaction journal. Supports full rebuild, incremental
//! extension, and narrow restatement when late events arrive.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod burst;
pub mod day;
pub mod engine;
pub mod state;
pub mod trade;

pub use burst::{BurstOutcome, apply_move, resolve_moves};
pub use day::replay_day;
pub use engine::{IngestReport, ReplayConfig, ReplayEngine, ReplayError, ReplayMode, ReplayReport};
pub use state::LeagueState;
pub use trade::{StagedTrade, settle_pair, unpaired_faults};
