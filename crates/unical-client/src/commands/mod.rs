//! Subcommand implementations.

pub mod config;
pub mod search;
pub mod sync;
pub mod watch;
