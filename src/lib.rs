//! gwmon: local supervisory monitor for a long-running gateway service.
//!
//! Polls the gateway's liveness, configuration, log tail, and resource usage
//! into a single published [`Snapshot`](core::snapshot::Snapshot), runs
//! start/stop/restart/health-check control operations, keeps a login-time
//! autostart descriptor, and announces run-state transitions.

pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
pub mod platform;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod cli_app;
