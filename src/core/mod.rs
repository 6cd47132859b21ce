//! Shared foundations: settings, error taxonomy, the published snapshot, and
//! degradation counters.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod snapshot;
