//! Scripted adapters for orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;
use unical_core::{CalendarEvent, DateRange, Provider, Task};
use unical_providers::{
    AuthEvent, AuthState, BoxFuture, CalendarAdapter, ProviderError, ProviderResult,
};

pub(crate) fn event(id: &str, provider: Provider) -> CalendarEvent {
    let start = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
    CalendarEvent::new(id, format!("Event {id}"), provider)
        .with_times(start, start + chrono::Duration::hours(1))
}

pub(crate) fn task(id: &str, provider: Provider) -> Task {
    Task::new(id, format!("Task {id}"), provider)
}

#[derive(Default)]
struct Script {
    events: Vec<CalendarEvent>,
    tasks: Vec<Task>,
    event_failure: Option<String>,
    task_failure: Option<String>,
    events_latency: Duration,
    tasks_latency: Duration,
}

/// An adapter whose answers, latency and failures are set by the test.
pub(crate) struct ScriptedAdapter {
    provider: Provider,
    auth: AuthState,
    script: Mutex<Script>,
    event_calls: AtomicUsize,
    task_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub(crate) fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            auth: AuthState::new(provider),
            script: Mutex::new(Script::default()),
            event_calls: AtomicUsize::new(0),
            task_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn authenticated(provider: Provider) -> Arc<Self> {
        let adapter = Self::new(provider);
        adapter.auth.mark_authenticated();
        adapter
    }

    pub(crate) fn with_events(self: Arc<Self>, events: Vec<CalendarEvent>) -> Arc<Self> {
        self.set_events(events);
        self
    }

    pub(crate) fn with_tasks(self: Arc<Self>, tasks: Vec<Task>) -> Arc<Self> {
        self.script.lock().unwrap().tasks = tasks;
        self
    }

    pub(crate) fn with_event_failure(self: Arc<Self>, message: &str) -> Arc<Self> {
        self.script.lock().unwrap().event_failure = Some(message.to_string());
        self
    }

    pub(crate) fn with_task_failure(self: Arc<Self>, message: &str) -> Arc<Self> {
        self.script.lock().unwrap().task_failure = Some(message.to_string());
        self
    }

    pub(crate) fn with_latency(self: Arc<Self>, events: Duration, tasks: Duration) -> Arc<Self> {
        {
            let mut script = self.script.lock().unwrap();
            script.events_latency = events;
            script.tasks_latency = tasks;
        }
        self
    }

    pub(crate) fn set_events(&self, events: Vec<CalendarEvent>) {
        self.script.lock().unwrap().events = events;
    }

    pub(crate) fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// `(fetch_events, fetch_tasks)` call counts.
    pub(crate) fn calls(&self) -> (usize, usize) {
        (
            self.event_calls.load(Ordering::SeqCst),
            self.task_calls.load(Ordering::SeqCst),
        )
    }
}

impl CalendarAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async {
            self.auth.mark_authenticated();
            Ok(())
        })
    }

    fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    fn logout(&self) {
        self.auth.clear();
    }

    fn fetch_events(&self, _range: DateRange) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        let (latency, result) = {
            let script = self.script.lock().unwrap();
            let result = match &script.event_failure {
                Some(message) => Err(ProviderError::transport(message.clone())),
                None => Ok(script.events.clone()),
            };
            (script.events_latency, result)
        };
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            result.map_err(|e| e.with_provider(self.provider))
        })
    }

    fn fetch_tasks(&self) -> BoxFuture<'_, ProviderResult<Vec<Task>>> {
        self.task_calls.fetch_add(1, Ordering::SeqCst);
        let (latency, result) = {
            let script = self.script.lock().unwrap();
            let result = match &script.task_failure {
                Some(message) => Err(ProviderError::transport(message.clone())),
                None => Ok(script.tasks.clone()),
            };
            (script.tasks_latency, result)
        };
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            result.map_err(|e| e.with_provider(self.provider))
        })
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }
}
