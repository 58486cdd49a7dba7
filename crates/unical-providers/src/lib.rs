//! Provider adapters for unical.
//!
//! Every calendar backend implements [`CalendarAdapter`]. Adapters parse
//! their wire format into [`RawEvent`] / [`RawTask`] and run the shared
//! normalization pipeline, so callers only ever see
//! [`CalendarEvent`](unical_core::CalendarEvent) and
//! [`Task`](unical_core::Task).
//!
//! ```text
//!  Google v3/Tasks     Microsoft Graph     iCloud CalDAV
//!        |                    |                  |
//!  GoogleAdapter       OutlookAdapter      AppleAdapter
//!        \                    |                  /
//!         +------ RawEvent / RawTask -----------+
//!                             |
//!                     normalize_events()
//!                             |
//!                CalendarEvent / Task (unical-core)
//! ```
//!
//! Adapters sit behind cargo features: `google`, `outlook` and `caldav`.

pub mod adapter;
pub mod auth;
#[cfg(feature = "caldav")]
pub mod caldav;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
#[cfg(any(feature = "google", feature = "outlook", feature = "caldav"))]
mod http;
pub mod normalize;
#[cfg(feature = "outlook")]
pub mod outlook;
pub mod raw;

pub use adapter::{BoxFuture, CalendarAdapter, CalendarInfo, ErrorAdapter};
pub use auth::{AuthEvent, AuthState, StaticToken, TokenSource};
#[cfg(feature = "caldav")]
pub use caldav::{AppleAdapter, CalDavConfig};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
#[cfg(feature = "google")]
pub use google::{GoogleAdapter, GoogleConfig};
pub use normalize::{
    map_ical_priority, map_importance, map_priority, normalize_event, normalize_events,
    normalize_task, normalize_tasks,
};
#[cfg(feature = "outlook")]
pub use outlook::{OutlookAdapter, OutlookConfig};
pub use raw::{NativePriority, RawEvent, RawEventTime, RawTask};
