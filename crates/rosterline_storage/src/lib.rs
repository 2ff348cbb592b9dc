//! Rosterline Snapshot Storage
//!
//! Daily roster snapshots per team, written in strict date order and queried
//! point-in-time or by range. Writers for different teams proceed
//! concurrently; writers for one team are serialized.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod image;
pub mod snapshot;
pub mod store;
pub mod tenure;

pub use image::StoreImage;
pub use snapshot::{DailySnapshot, RosterState};
pub use store::{SnapshotStore, StoreError, StoreResult, StoreStats};
pub use tenure::{Tenure, tenures};
