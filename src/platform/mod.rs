//! Platform seam: every interaction with external programs goes through the
//! [`command::CommandRunner`] trait so the rest of the crate can be driven by
//! scripted fakes in tests.

pub mod command;
#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandRunner, ShellRunner, shell_join, shell_quote};
