//! Output rendering for the `gwmon` binary.

pub mod report;
