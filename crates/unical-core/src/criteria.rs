//! Search criteria for composite queries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::provider::Provider;
use crate::time::DateRange;

/// Filters applied by [`SearchEngine::advanced_search_events`] and
/// [`SearchEngine::advanced_search_tasks`].
///
/// Every dimension is optional; an empty set means "no filter".
///
/// [`SearchEngine::advanced_search_events`]: crate::search::SearchEngine::advanced_search_events
/// [`SearchEngine::advanced_search_tasks`]: crate::search::SearchEngine::advanced_search_tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Case-insensitive substring; empty matches everything.
    pub keyword: String,
    /// Closed date interval.
    pub date_range: Option<DateRange>,
    /// Accepted providers.
    pub providers: BTreeSet<Provider>,
    /// Accepted owner ids.
    pub owners: BTreeSet<String>,
    /// Whether completed tasks are returned.
    pub include_completed: bool,
}

impl SearchCriteria {
    /// Creates criteria that match everything except completed tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if every field is at its default.
    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty()
            && self.date_range.is_none()
            && self.providers.is_empty()
            && self.owners.is_empty()
            && !self.include_completed
    }

    pub fn has_date_range(&self) -> bool {
        self.date_range.is_some()
    }

    pub fn has_provider_filter(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn has_owner_filter(&self) -> bool {
        !self.owners.is_empty()
    }

    /// Resets every field to its default.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Builder method to set the keyword.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Builder method to set the date range.
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Builder method to accept one more provider.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.insert(provider);
        self
    }

    /// Builder method to accept one more owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owners.insert(owner_id.into());
        self
    }

    /// Builder method to include completed tasks.
    pub fn with_include_completed(mut self, include: bool) -> Self {
        self.include_completed = include;
        self
    }
}
