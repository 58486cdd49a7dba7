//! The aggregate store: one in-memory collection of events and tasks from
//! every provider.
//!
//! Entities are keyed by `(id, provider)`. Mutations return plain booleans
//! (a rejected `add` is not an error) and announce themselves to every
//! subscriber: each successful mutation sends its specific [`StoreEvent`]
//! followed by [`StoreEvent::DataChanged`]. Every subscriber has its own
//! unbounded queue, so a large merge never drops a notification. Reads
//! always return clones.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::CalendarEvent;
use crate::persistence::{EntityRepository, PersistenceResult};
use crate::provider::{EntityKey, Provider};
use crate::task::Task;
use crate::text::Keyword;
use crate::time::DateRange;

/// A change notification emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    EventAdded(EntityKey),
    EventUpdated(EntityKey),
    EventRemoved(EntityKey),
    TaskAdded(EntityKey),
    TaskUpdated(EntityKey),
    TaskRemoved(EntityKey),
    /// Sent after every successful mutation.
    DataChanged,
}

/// What an [`AggregateStore::upsert_event`] / [`AggregateStore::upsert_task`]
/// call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    /// The entity failed its validity check and was not stored.
    Rejected,
}

/// Per-type hooks so events and tasks share one implementation.
trait Stored: Clone {
    const KIND: &'static str;

    fn key(&self) -> EntityKey;
    fn is_valid(&self) -> bool;
    fn added(key: EntityKey) -> StoreEvent;
    fn updated(key: EntityKey) -> StoreEvent;
    fn removed(key: EntityKey) -> StoreEvent;
    fn save(repo: &dyn EntityRepository, item: &Self) -> PersistenceResult<()>;
    fn delete(repo: &dyn EntityRepository, key: &EntityKey) -> PersistenceResult<()>;
}

impl Stored for CalendarEvent {
    const KIND: &'static str = "event";

    fn key(&self) -> EntityKey {
        CalendarEvent::key(self)
    }
    fn is_valid(&self) -> bool {
        CalendarEvent::is_valid(self)
    }
    fn added(key: EntityKey) -> StoreEvent {
        StoreEvent::EventAdded(key)
    }
    fn updated(key: EntityKey) -> StoreEvent {
        StoreEvent::EventUpdated(key)
    }
    fn removed(key: EntityKey) -> StoreEvent {
        StoreEvent::EventRemoved(key)
    }
    fn save(repo: &dyn EntityRepository, item: &Self) -> PersistenceResult<()> {
        repo.save_event(item)
    }
    fn delete(repo: &dyn EntityRepository, key: &EntityKey) -> PersistenceResult<()> {
        repo.delete_event(key)
    }
}

impl Stored for Task {
    const KIND: &'static str = "task";

    fn key(&self) -> EntityKey {
        Task::key(self)
    }
    fn is_valid(&self) -> bool {
        Task::is_valid(self)
    }
    fn added(key: EntityKey) -> StoreEvent {
        StoreEvent::TaskAdded(key)
    }
    fn updated(key: EntityKey) -> StoreEvent {
        StoreEvent::TaskUpdated(key)
    }
    fn removed(key: EntityKey) -> StoreEvent {
        StoreEvent::TaskRemoved(key)
    }
    fn save(repo: &dyn EntityRepository, item: &Self) -> PersistenceResult<()> {
        repo.save_task(item)
    }
    fn delete(repo: &dyn EntityRepository, key: &EntityKey) -> PersistenceResult<()> {
        repo.delete_task(key)
    }
}

/// Subscriber queues plus optional write-through target.
struct Sink {
    observers: Mutex<Vec<mpsc::UnboundedSender<StoreEvent>>>,
    repository: Option<Box<dyn EntityRepository>>,
}

impl Sink {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Sends `events` in order to every live subscriber and forgets the ones
    /// whose receiver was dropped.
    fn notify(&self, events: &[StoreEvent]) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }

    fn announce(&self, event: StoreEvent) {
        self.notify(&[event, StoreEvent::DataChanged]);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn persist<T: Stored>(&self, item: &T) {
        let Some(repo) = &self.repository else {
            return;
        };
        if let Err(e) = T::save(repo.as_ref(), item) {
            warn!(kind = T::KIND, key = %item.key(), error = %e, "write-through save failed");
        }
    }

    fn unpersist<T: Stored>(&self, key: &EntityKey) {
        let Some(repo) = &self.repository else {
            return;
        };
        if let Err(e) = T::delete(repo.as_ref(), key) {
            warn!(kind = T::KIND, %key, error = %e, "write-through delete failed");
        }
    }

    fn add<T: Stored>(&self, rows: &mut BTreeMap<EntityKey, T>, item: T) -> bool {
        if !item.is_valid() {
            debug!(kind = T::KIND, key = %item.key(), "rejecting invalid entity");
            return false;
        }
        let key = item.key();
        if rows.contains_key(&key) {
            return false;
        }
        self.persist(&item);
        rows.insert(key.clone(), item);
        self.announce(T::added(key));
        true
    }

    fn update<T: Stored>(&self, rows: &mut BTreeMap<EntityKey, T>, item: T) -> bool {
        if !item.is_valid() {
            return false;
        }
        let key = item.key();
        let Some(slot) = rows.get_mut(&key) else {
            return false;
        };
        self.persist(&item);
        *slot = item;
        self.announce(T::updated(key));
        true
    }

    fn remove<T: Stored>(&self, rows: &mut BTreeMap<EntityKey, T>, key: EntityKey) -> bool {
        if rows.remove(&key).is_none() {
            return false;
        }
        self.unpersist::<T>(&key);
        self.announce(T::removed(key));
        true
    }

    fn upsert<T: Stored>(&self, rows: &mut BTreeMap<EntityKey, T>, item: T) -> UpsertOutcome {
        if !item.is_valid() {
            return UpsertOutcome::Rejected;
        }
        if rows.contains_key(&item.key()) {
            self.update(rows, item);
            UpsertOutcome::Updated
        } else {
            self.add(rows, item);
            UpsertOutcome::Added
        }
    }
}

/// In-memory collection of unified events and tasks.
pub struct AggregateStore {
    events: BTreeMap<EntityKey, CalendarEvent>,
    tasks: BTreeMap<EntityKey, Task>,
    sink: Sink,
}

impl std::fmt::Debug for AggregateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateStore")
            .field("events", &self.events.len())
            .field("tasks", &self.tasks.len())
            .field("has_repository", &self.sink.repository.is_some())
            .finish()
    }
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStore {
    /// Creates an empty store without persistence.
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            tasks: BTreeMap::new(),
            sink: Sink {
                observers: Mutex::new(Vec::new()),
                repository: None,
            },
        }
    }

    /// Builder method to attach a write-through repository.
    pub fn with_repository(mut self, repository: Box<dyn EntityRepository>) -> Self {
        self.sink.repository = Some(repository);
        self
    }

    /// Subscribes to change notifications. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.sink.subscribe()
    }

    /// Loads every entity from the attached repository.
    ///
    /// Loaded entities replace in-memory ones with the same key and are not
    /// written back. Sends a single `DataChanged` if anything was loaded.
    /// Returns the number of entities loaded; zero without a repository.
    pub fn hydrate(&mut self) -> PersistenceResult<usize> {
        let Some(repo) = &self.sink.repository else {
            return Ok(0);
        };
        let events = repo.load_events()?;
        let tasks = repo.load_tasks()?;

        let mut loaded = 0;
        for event in events.into_iter().filter(CalendarEvent::is_valid) {
            self.events.insert(event.key(), event);
            loaded += 1;
        }
        for task in tasks.into_iter().filter(Task::is_valid) {
            self.tasks.insert(task.key(), task);
            loaded += 1;
        }
        if loaded > 0 {
            self.sink.notify(&[StoreEvent::DataChanged]);
        }
        debug!(loaded, "hydrated aggregate store");
        Ok(loaded)
    }

    // Events

    /// Inserts a new event. Fails if invalid or the key already exists.
    pub fn add_event(&mut self, event: CalendarEvent) -> bool {
        self.sink.add(&mut self.events, event)
    }

    /// Replaces an existing event. Fails if invalid or the key is unknown.
    pub fn update_event(&mut self, event: CalendarEvent) -> bool {
        self.sink.update(&mut self.events, event)
    }

    /// Removes an event by identity.
    pub fn remove_event(&mut self, id: &str, provider: Provider) -> bool {
        self.sink.remove(&mut self.events, EntityKey::new(id, provider))
    }

    /// Adds the event, or updates it if the key is already present.
    pub fn upsert_event(&mut self, event: CalendarEvent) -> UpsertOutcome {
        self.sink.upsert(&mut self.events, event)
    }

    pub fn event(&self, id: &str, provider: Provider) -> Option<CalendarEvent> {
        self.events.get(&EntityKey::new(id, provider)).cloned()
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events.values().cloned().collect()
    }

    /// Events whose date span overlaps `range`.
    pub fn events_in_range(&self, range: &DateRange) -> Vec<CalendarEvent> {
        self.events
            .values()
            .filter(|e| e.is_in_date_range(range))
            .cloned()
            .collect()
    }

    pub fn events_by_provider(&self, provider: Provider) -> Vec<CalendarEvent> {
        self.events
            .values()
            .filter(|e| e.provider == provider)
            .cloned()
            .collect()
    }

    /// Events whose title, description or location contain `keyword`.
    pub fn search_events(&self, keyword: &str) -> Vec<CalendarEvent> {
        let keyword = Keyword::new(keyword);
        self.events
            .values()
            .filter(|e| e.matches_text(&keyword))
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // Tasks

    /// Inserts a new task. Fails if invalid or the key already exists.
    pub fn add_task(&mut self, task: Task) -> bool {
        self.sink.add(&mut self.tasks, task)
    }

    /// Replaces an existing task. Fails if invalid or the key is unknown.
    pub fn update_task(&mut self, task: Task) -> bool {
        self.sink.update(&mut self.tasks, task)
    }

    /// Removes a task by identity.
    pub fn remove_task(&mut self, id: &str, provider: Provider) -> bool {
        self.sink.remove(&mut self.tasks, EntityKey::new(id, provider))
    }

    /// Adds the task, or updates it if the key is already present.
    pub fn upsert_task(&mut self, task: Task) -> UpsertOutcome {
        self.sink.upsert(&mut self.tasks, task)
    }

    /// Marks a task complete or open. Returns false if the task is unknown.
    pub fn set_task_completed(&mut self, id: &str, provider: Provider, completed: bool) -> bool {
        let Some(mut task) = self.task(id, provider) else {
            return false;
        };
        task.is_completed = completed;
        self.update_task(task)
    }

    pub fn task(&self, id: &str, provider: Provider) -> Option<Task> {
        self.tasks.get(&EntityKey::new(id, provider)).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Tasks whose due date falls inside `range`. Undated tasks are excluded.
    pub fn tasks_in_range(&self, range: &DateRange) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.due.is_some_and(|due| range.contains(due.date_naive())))
            .cloned()
            .collect()
    }

    pub fn tasks_by_provider(&self, provider: Provider) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.provider == provider)
            .cloned()
            .collect()
    }

    /// Tasks due on `date` (UTC).
    pub fn tasks_due_on(&self, date: NaiveDate) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.is_due_on(date))
            .cloned()
            .collect()
    }

    /// Tasks whose title, description or tags contain `keyword`.
    pub fn search_tasks(&self, keyword: &str) -> Vec<Task> {
        let keyword = Keyword::new(keyword);
        self.tasks
            .values()
            .filter(|t| t.matches_keyword(&keyword))
            .cloned()
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the store holds neither events nor tasks.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tasks.is_empty()
    }
}
