//! Rosterline Consistency Validator
//!
//! Cross-checks replayed snapshots against independently captured rosters.
//! Ground truth is only ever compared against; it never feeds back into
//! replayed state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod validator;

pub use validator::{
    ConsistencyValidator, GroundTruthSnapshot, ValidateConfig, ValidationEntry, ValidationReport,
    ValidationStatus,
};
