//! Outlook adapter over Microsoft Graph.
//!
//! Events come from `/me/calendarView`, which expands recurring series
//! into instances. Tasks come from Microsoft To Do, reading the first task
//! list. All requests ask Graph to express times in UTC.

mod adapter;
mod client;
mod config;

pub use adapter::OutlookAdapter;
pub use config::OutlookConfig;
