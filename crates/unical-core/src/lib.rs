//! Core types for unical: providers, events, tasks, the aggregate store and
//! the search engine.

pub mod criteria;
pub mod event;
pub mod persistence;
pub mod provider;
pub mod search;
pub mod store;
pub mod task;
pub mod text;
pub mod time;
pub mod tracing;

pub use criteria::SearchCriteria;
pub use event::CalendarEvent;
pub use persistence::{EntityRepository, InMemoryRepository, PersistenceError, PersistenceResult};
pub use provider::{EntityKey, Provider, UnknownProvider};
pub use search::{SearchEngine, SearchResults};
pub use store::{AggregateStore, StoreEvent, UpsertOutcome};
pub use task::Task;
pub use text::Keyword;
pub use time::DateRange;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
