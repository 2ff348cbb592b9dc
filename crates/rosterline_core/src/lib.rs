//! Rosterline Core Types
//!
//! Pure types shared by every rosterline crate: identifiers, the season
//! calendar, content digests and the core error. No I/O lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod time;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::{Digest, DigestWriter};
pub use id::{EventId, PlayerId, RunId, TeamId};
pub use time::{DateRange, SeasonClock};
