//! Google adapter: Calendar v3 for events, Tasks v1 for tasks.
//!
//! Access tokens come from a [`TokenSource`](crate::TokenSource); the
//! adapter never runs the OAuth consent flow itself. `authenticate` asks
//! the source for a token and checks it against the calendar list.
//!
//! Events are requested with `singleEvents=true`, so recurring series
//! arrive as individual instances. Tasks are read from the first task list.

mod adapter;
mod client;
mod config;

pub use adapter::GoogleAdapter;
pub use config::GoogleConfig;
