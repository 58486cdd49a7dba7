//! Sync orchestration for unical.
//!
//! ```text
//!   CalendarAdapter (google, outlook, apple)
//!          │  fetch_events / fetch_tasks, all dispatched at once
//!          ▼
//!   SyncOrchestrator ── pending counter ──► SyncEvent::Completed
//!          │  upsert
//!          ▼
//!   AggregateStore ──► StoreEvent
//! ```
//!
//! The orchestrator owns the adapter registry and is the only writer of the
//! store during a cycle. Callers observe progress through
//! [`SyncOrchestrator::subscribe_sync`] and auth changes through
//! [`SyncOrchestrator::subscribe_auth`].

pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
mod scheduler;

#[cfg(test)]
mod testing;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use events::{SyncEvent, SyncSummary};
pub use orchestrator::{SharedStore, SyncOrchestrator};
