//! The unified task.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{EntityKey, Provider};
use crate::text::Keyword;

/// Highest task priority.
pub const PRIORITY_HIGHEST: u8 = 1;
/// Priority used when a provider has no notion of priority.
pub const PRIORITY_DEFAULT: u8 = 3;
/// Lowest task priority.
pub const PRIORITY_LOWEST: u8 = 5;

/// A task (to-do, reminder) normalized from any provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier assigned by the provider.
    pub id: String,
    /// The task title.
    pub title: String,
    /// Free-form notes, possibly empty.
    pub description: String,
    /// Optional due timestamp.
    pub due: Option<DateTime<Utc>>,
    /// Whether the task has been completed.
    pub is_completed: bool,
    /// Priority in `1..=5`, 1 being the highest.
    pub priority: u8,
    /// Labels attached to the task.
    pub tags: BTreeSet<String>,
    /// Owner of the list the task belongs to.
    pub owner_id: String,
    /// Where the task came from.
    pub provider: Provider,
}

impl Task {
    /// Creates an open task with default priority.
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            due: None,
            is_completed: false,
            priority: PRIORITY_DEFAULT,
            tags: BTreeSet::new(),
            owner_id: String::new(),
            provider,
        }
    }

    /// Returns the identity key `(id, provider)`.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.id.clone(), self.provider)
    }

    /// A task is valid iff id and title are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty()
    }

    /// Returns true if the task is open and its due time has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.due.is_some_and(|due| due < now)
    }

    /// Returns true if the task is due on `date` (UTC).
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.due.is_some_and(|due| due.date_naive() == date)
    }

    /// Matches the keyword against title and description.
    pub fn matches_text(&self, keyword: &Keyword) -> bool {
        keyword.matches_any([self.title.as_str(), self.description.as_str()])
    }

    /// Like [`matches_text`](Self::matches_text), also looking at tags.
    pub fn matches_keyword(&self, keyword: &Keyword) -> bool {
        self.matches_text(keyword) || keyword.matches_any(self.tags.iter().map(String::as_str))
    }

    /// Sort order for task lists.
    ///
    /// Incomplete tasks come first, then lower priority numbers, then earlier
    /// due dates. Tasks without a due date sort after dated ones.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.is_completed
            .cmp(&other.is_completed)
            .then(self.priority.cmp(&other.priority))
            .then_with(|| match (self.due, other.due) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }

    /// Builder method to set the due time.
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Builder method to set completion.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.is_completed = completed;
        self
    }

    /// Builder method to set the priority, clamped into `1..=5`.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(PRIORITY_HIGHEST, PRIORITY_LOWEST);
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Builder method to set the owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn validity_needs_id_and_title() {
        assert!(Task::new("t1", "Write report", Provider::Outlook).is_valid());
        assert!(!Task::new("", "Write report", Provider::Outlook).is_valid());
        assert!(!Task::new("t1", "", Provider::Outlook).is_valid());
    }

    #[test]
    fn priority_is_clamped() {
        let task = Task::new("t1", "x", Provider::Apple);
        assert_eq!(task.priority, PRIORITY_DEFAULT);
        assert_eq!(task.clone().with_priority(0).priority, 1);
        assert_eq!(task.with_priority(9).priority, 5);
    }

    #[test]
    fn incomplete_sorts_before_complete_regardless_of_priority() {
        let open = Task::new("a", "open", Provider::Google).with_priority(5);
        let done = Task::new("b", "done", Provider::Google)
            .with_priority(1)
            .with_due(utc(2020, 1, 1, 0))
            .with_completed(true);
        assert_eq!(open.display_order(&done), Ordering::Less);
        assert_eq!(done.display_order(&open), Ordering::Greater);
    }

    #[test]
    fn priority_then_due_then_undated() {
        let urgent = Task::new("a", "a", Provider::Google).with_priority(1);
        let early = Task::new("b", "b", Provider::Google).with_due(utc(2024, 6, 1, 0));
        let late = Task::new("c", "c", Provider::Google).with_due(utc(2024, 6, 2, 0));
        let undated = Task::new("d", "d", Provider::Google);

        let mut tasks = vec![undated.clone(), late.clone(), urgent.clone(), early.clone()];
        tasks.sort_by(Task::display_order);
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }

    #[test]
    fn overdue_and_due_on() {
        let now = utc(2024, 6, 15, 12);
        let task = Task::new("t1", "Pay rent", Provider::Apple).with_due(utc(2024, 6, 15, 9));
        assert!(task.is_overdue(now));
        assert!(!task.clone().with_completed(true).is_overdue(now));
        assert!(task.is_due_on(now.date_naive()));
        assert!(!Task::new("t2", "Someday", Provider::Apple).is_overdue(now));
    }

    #[test]
    fn keyword_matches_tags() {
        let task = Task::new("t1", "Buy milk", Provider::Apple).with_tag("Errands");
        assert!(!task.matches_text(&Keyword::new("errand")));
        assert!(task.matches_keyword(&Keyword::new("errand")));
    }
}
