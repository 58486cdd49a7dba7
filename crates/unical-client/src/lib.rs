//! The `unical` command-line client: configuration, adapter wiring and the
//! `sync`, `search`, `watch` and `config` commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod secret;
pub mod setup;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
