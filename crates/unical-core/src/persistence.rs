//! Persistence collaborator for the aggregate store.
//!
//! The store never knows how entities are persisted. It is handed an
//! [`EntityRepository`] at construction time, loads from it on
//! [`hydrate`](crate::store::AggregateStore::hydrate) and writes through it
//! after every successful mutation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::event::CalendarEvent;
use crate::provider::EntityKey;
use crate::task::Task;

/// Errors raised by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backend could not be reached or opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Stored data could not be decoded.
    #[error("corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },
    /// Any other backend failure.
    #[error("storage error: {0}")]
    Other(String),
}

/// Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Load-all and save/delete-by-identity operations over unified entities.
///
/// Implementations must round-trip the identity key `(id, provider)` exactly.
pub trait EntityRepository: Send + Sync {
    fn load_events(&self) -> PersistenceResult<Vec<CalendarEvent>>;

    fn load_tasks(&self) -> PersistenceResult<Vec<Task>>;

    /// Inserts or replaces the event with the same identity key.
    fn save_event(&self, event: &CalendarEvent) -> PersistenceResult<()>;

    /// Inserts or replaces the task with the same identity key.
    fn save_task(&self, task: &Task) -> PersistenceResult<()>;

    /// Deletes an event. Deleting a missing key is not an error.
    fn delete_event(&self, key: &EntityKey) -> PersistenceResult<()>;

    /// Deletes a task. Deleting a missing key is not an error.
    fn delete_task(&self, key: &EntityKey) -> PersistenceResult<()>;
}

/// A repository that keeps everything in memory.
///
/// Useful for tests and as a stand-in when no durable store is configured.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    events: Mutex<BTreeMap<EntityKey, CalendarEvent>>,
    tasks: Mutex<BTreeMap<EntityKey, Task>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-filled with entities.
    pub fn with_entities(events: Vec<CalendarEvent>, tasks: Vec<Task>) -> Self {
        let repo = Self::new();
        if let Ok(mut map) = repo.events.lock() {
            map.extend(events.into_iter().map(|e| (e.key(), e)));
        }
        if let Ok(mut map) = repo.tasks.lock() {
            map.extend(tasks.into_iter().map(|t| (t.key(), t)));
        }
        repo
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Number of stored tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> PersistenceError {
    PersistenceError::Unavailable("in-memory repository lock poisoned".to_string())
}

impl EntityRepository for InMemoryRepository {
    fn load_events(&self) -> PersistenceResult<Vec<CalendarEvent>> {
        Ok(self.events.lock().map_err(poisoned)?.values().cloned().collect())
    }

    fn load_tasks(&self) -> PersistenceResult<Vec<Task>> {
        Ok(self.tasks.lock().map_err(poisoned)?.values().cloned().collect())
    }

    fn save_event(&self, event: &CalendarEvent) -> PersistenceResult<()> {
        self.events
            .lock()
            .map_err(poisoned)?
            .insert(event.key(), event.clone());
        Ok(())
    }

    fn save_task(&self, task: &Task) -> PersistenceResult<()> {
        self.tasks
            .lock()
            .map_err(poisoned)?
            .insert(task.key(), task.clone());
        Ok(())
    }

    fn delete_event(&self, key: &EntityKey) -> PersistenceResult<()> {
        self.events.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn delete_task(&self, key: &EntityKey) -> PersistenceResult<()> {
        self.tasks.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    #[test]
    fn save_replaces_by_identity() {
        let repo = InMemoryRepository::new();
        repo.save_task(&Task::new("t1", "first", Provider::Google)).unwrap();
        repo.save_task(&Task::new("t1", "second", Provider::Google)).unwrap();
        repo.save_task(&Task::new("t1", "other provider", Provider::Apple)).unwrap();

        let tasks = repo.load_tasks().unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().any(|t| t.title == "second"));
    }

    #[test]
    fn delete_missing_is_ok() {
        let repo = InMemoryRepository::new();
        repo.delete_event(&EntityKey::new("nope", Provider::Outlook)).unwrap();
        assert_eq!(repo.event_count(), 0);
    }

    #[test]
    fn identity_round_trips() {
        let event = CalendarEvent::new("e1", "Standup", Provider::Outlook);
        let repo = InMemoryRepository::with_entities(vec![event.clone()], Vec::new());
        let loaded = repo.load_events().unwrap();
        assert_eq!(loaded[0].key(), event.key());
    }
}
