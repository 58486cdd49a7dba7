//! Read-only queries over the [`AggregateStore`].
//!
//! The engine holds nothing but a borrow of the store. Event results are
//! sorted by start time; task results follow [`Task::display_order`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::criteria::SearchCriteria;
use crate::event::CalendarEvent;
use crate::provider::Provider;
use crate::store::AggregateStore;
use crate::task::Task;
use crate::text::Keyword;
use crate::time::DateRange;

/// Combined result of [`SearchEngine::search_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub events: Vec<CalendarEvent>,
    pub tasks: Vec<Task>,
}

impl SearchResults {
    /// Total number of matches.
    pub fn len(&self) -> usize {
        self.events.len() + self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tasks.is_empty()
    }
}

/// Keyword and composite search over a store.
#[derive(Debug, Clone, Copy)]
pub struct SearchEngine<'a> {
    store: &'a AggregateStore,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a AggregateStore) -> Self {
        Self { store }
    }

    /// Events matching `keyword` in title, description, location or
    /// attendees. An empty keyword returns every event.
    pub fn search_events(&self, keyword: &str) -> Vec<CalendarEvent> {
        let keyword = Keyword::new(keyword);
        self.collect_events(|e| e.matches_keyword(&keyword))
    }

    /// Tasks matching `keyword` in title, description or tags. An empty
    /// keyword returns every task, completed ones included.
    pub fn search_tasks(&self, keyword: &str) -> Vec<Task> {
        let keyword = Keyword::new(keyword);
        self.collect_tasks(|t| t.matches_keyword(&keyword))
    }

    /// Keyword search restricted to events overlapping `range`.
    pub fn search_events_in_range(&self, range: &DateRange, keyword: &str) -> Vec<CalendarEvent> {
        let keyword = Keyword::new(keyword);
        self.collect_events(|e| e.matches_keyword(&keyword) && e.is_in_date_range(range))
    }

    /// Keyword search restricted to the given providers. An empty set
    /// accepts every provider.
    pub fn search_events_by_providers(
        &self,
        keyword: &str,
        providers: &BTreeSet<Provider>,
    ) -> Vec<CalendarEvent> {
        let keyword = Keyword::new(keyword);
        self.collect_events(|e| {
            e.matches_keyword(&keyword) && (providers.is_empty() || providers.contains(&e.provider))
        })
    }

    /// Applies keyword, date range, provider set and owner set, in that
    /// order. All filters must pass.
    pub fn advanced_search_events(&self, criteria: &SearchCriteria) -> Vec<CalendarEvent> {
        let keyword = Keyword::new(&criteria.keyword);
        self.collect_events(|e| {
            e.matches_keyword(&keyword)
                && criteria
                    .date_range
                    .as_ref()
                    .is_none_or(|range| e.is_in_date_range(range))
                && (criteria.providers.is_empty() || criteria.providers.contains(&e.provider))
                && (criteria.owners.is_empty() || criteria.owners.contains(&e.owner_id))
        })
    }

    /// Like [`advanced_search_events`](Self::advanced_search_events) for
    /// tasks. Completed tasks are dropped first unless
    /// `criteria.include_completed` is set. Tasks without a due date pass
    /// the date range filter.
    pub fn advanced_search_tasks(&self, criteria: &SearchCriteria) -> Vec<Task> {
        let keyword = Keyword::new(&criteria.keyword);
        self.collect_tasks(|t| {
            (criteria.include_completed || !t.is_completed)
                && t.matches_keyword(&keyword)
                && match (&criteria.date_range, t.due) {
                    (Some(range), Some(due)) => range.contains(due.date_naive()),
                    _ => true,
                }
                && (criteria.providers.is_empty() || criteria.providers.contains(&t.provider))
                && (criteria.owners.is_empty() || criteria.owners.contains(&t.owner_id))
        })
    }

    /// Runs [`search_events`](Self::search_events) and
    /// [`search_tasks`](Self::search_tasks) with the same keyword.
    pub fn search_all(&self, keyword: &str) -> SearchResults {
        SearchResults {
            events: self.search_events(keyword),
            tasks: self.search_tasks(keyword),
        }
    }

    fn collect_events<F>(&self, keep: F) -> Vec<CalendarEvent>
    where
        F: Fn(&CalendarEvent) -> bool,
    {
        let mut events: Vec<_> = self.store.events().into_iter().filter(|e| keep(e)).collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.key().cmp(&b.key())));
        events
    }

    fn collect_tasks<F>(&self, keep: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut tasks: Vec<_> = self.store.tasks().into_iter().filter(|t| keep(t)).collect();
        tasks.sort_by(Task::display_order);
        tasks
    }
}
