//! Daemon subsystem: status poller, periodic loop, control operations,
//! autostart registration, notifications, signal handling.

pub mod autostart;
pub mod loop_main;
pub mod notifications;
pub mod poller;
#[cfg(feature = "daemon")]
pub mod signals;
