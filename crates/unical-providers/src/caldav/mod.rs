//! Apple adapter: iCloud calendars and reminders over CalDAV.
//!
//! `authenticate` walks the usual discovery chain (principal, then
//! calendar home) with Basic credentials, typically an app-specific
//! password. Events come from `calendar-query` REPORTs with a time-range
//! filter on every collection that holds `VEVENT`s; reminders come from the
//! collections that hold `VTODO`s.

mod adapter;
mod client;
mod config;
mod ics;
mod xml;

pub use adapter::AppleAdapter;
pub use config::CalDavConfig;
