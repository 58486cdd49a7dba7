//! The sync orchestrator.
//!
//! Holds one adapter per provider and drives sync cycles against them. A
//! cycle dispatches one `fetch_events` and one `fetch_tasks` per
//! authenticated adapter, all at once, and counts outstanding operations
//! down as they report back. Whichever operation reports last (success or
//! error) closes the cycle and sends [`SyncEvent::Completed`], exactly once.
//!
//! Every result is merged into the shared [`AggregateStore`] by upsert from
//! this one place, one batch at a time under the store's write lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use unical_core::{AggregateStore, CalendarEvent, Provider, StoreEvent, Task};
use unical_providers::{AuthEvent, BoxFuture, CalendarAdapter, ProviderResult};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncSummary};
use crate::scheduler::AutoSync;

/// The store as shared between the orchestrator and its readers.
pub type SharedStore = Arc<tokio::sync::RwLock<AggregateStore>>;

struct RegisteredAdapter {
    adapter: Arc<dyn CalendarAdapter>,
    forwarder: Option<JoinHandle<()>>,
}

impl Drop for RegisteredAdapter {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// One finished adapter operation.
enum Outcome {
    Events(Provider, ProviderResult<Vec<CalendarEvent>>),
    Tasks(Provider, ProviderResult<Vec<Task>>),
}

/// Resets the syncing flag even if a cycle is dropped half way.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives adapters and merges their results into the aggregate store.
pub struct SyncOrchestrator {
    store: SharedStore,
    adapters: RwLock<BTreeMap<Provider, RegisteredAdapter>>,
    syncing: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    config: SyncConfig,
    sync_events: broadcast::Sender<SyncEvent>,
    auth_events: broadcast::Sender<AuthEvent>,
    auto_sync: Mutex<AutoSync>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("providers", &self.providers())
            .field("syncing", &self.is_syncing())
            .field("config", &self.config)
            .finish()
    }
}

impl SyncOrchestrator {
    pub fn new(store: AggregateStore, config: SyncConfig) -> Self {
        Self::with_shared_store(Arc::new(tokio::sync::RwLock::new(store)), config)
    }

    /// Uses a store that other components already hold.
    pub fn with_shared_store(store: SharedStore, config: SyncConfig) -> Self {
        let (sync_events, _) = broadcast::channel(config.channel_capacity.max(1));
        let (auth_events, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            store,
            adapters: RwLock::new(BTreeMap::new()),
            syncing: AtomicBool::new(false),
            last_sync: Mutex::new(None),
            auto_sync: Mutex::new(AutoSync::new(config.auto_sync_interval)),
            config,
            sync_events,
            auth_events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Registers `adapter` for its provider, replacing and returning any
    /// adapter already registered there.
    ///
    /// The replaced adapter's auth forwarding stops before the new one is
    /// attached. Forwarding needs a Tokio runtime; without one the adapter is
    /// still registered, only its auth events are not relayed.
    pub fn register_adapter(
        &self,
        adapter: Arc<dyn CalendarAdapter>,
    ) -> Option<Arc<dyn CalendarAdapter>> {
        let provider = adapter.provider();
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);

        let previous = adapters.remove(&provider).map(|old| {
            debug!(%provider, "replacing adapter");
            Arc::clone(&old.adapter)
        });

        let forwarder = self.spawn_auth_forwarder(adapter.as_ref());
        adapters.insert(provider, RegisteredAdapter { adapter, forwarder });
        info!(%provider, "adapter registered");
        previous
    }

    /// Removes the adapter for `provider`, if any.
    pub fn unregister_adapter(&self, provider: Provider) -> Option<Arc<dyn CalendarAdapter>> {
        let removed = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider)
            .map(|r| Arc::clone(&r.adapter));
        if removed.is_some() {
            info!(%provider, "adapter unregistered");
        }
        removed
    }

    pub fn adapter(&self, provider: Provider) -> Option<Arc<dyn CalendarAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .map(|r| Arc::clone(&r.adapter))
    }

    /// Providers with a registered adapter, in provider order.
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// When the last cycle completed.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync_events.subscribe()
    }

    /// Auth changes from every registered adapter.
    pub fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    /// Store changes, including every entity a sync merges.
    pub async fn subscribe_store(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.read().await.subscribe()
    }

    /// Syncs every authenticated adapter over the fetch window.
    ///
    /// Returns `None` without doing anything if a cycle is already running.
    pub async fn sync_all(&self) -> Option<SyncSummary> {
        let _guard = self.begin()?;
        let adapters: Vec<_> = self
            .registered()
            .into_iter()
            .filter(|a| {
                let ready = a.is_authenticated();
                if !ready {
                    debug!(provider = %a.provider(), "skipping unauthenticated adapter");
                }
                ready
            })
            .collect();
        Some(self.run_cycle(adapters).await)
    }

    /// Syncs a single provider.
    ///
    /// Fails immediately, with an error signal, when the provider has no
    /// adapter or the adapter is not authenticated. Returns `Ok(None)` if a
    /// cycle is already running.
    pub async fn sync_platform(&self, provider: Provider) -> SyncResult<Option<SyncSummary>> {
        let adapter = match self.adapter(provider) {
            Some(adapter) if adapter.is_authenticated() => adapter,
            Some(_) => return Err(self.reject(SyncError::NotAuthenticated(provider))),
            None => return Err(self.reject(SyncError::AdapterUnavailable(provider))),
        };
        let Some(_guard) = self.begin() else {
            return Ok(None);
        };
        Ok(Some(self.run_cycle(vec![adapter]).await))
    }

    /// Starts or stops the recurring sync timer. Both directions are no-ops
    /// when the timer is already in the requested state.
    pub fn set_auto_sync_enabled(self: &Arc<Self>, enabled: bool) {
        let mut auto_sync = self.auto_sync.lock().unwrap_or_else(PoisonError::into_inner);
        if enabled {
            auto_sync.start(self);
        } else {
            auto_sync.stop();
        }
    }

    /// Changes the auto-sync period. Zero is ignored.
    pub fn set_auto_sync_interval(self: &Arc<Self>, interval: Duration) {
        self.auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_interval(interval, self);
    }

    pub fn auto_sync_interval(&self) -> Duration {
        self.auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .interval()
    }

    pub fn is_auto_sync_enabled(&self) -> bool {
        self.auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    fn registered(&self) -> Vec<Arc<dyn CalendarAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| Arc::clone(&r.adapter))
            .collect()
    }

    fn begin(&self) -> Option<SyncingGuard<'_>> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync already in progress");
            return None;
        }
        Some(SyncingGuard(&self.syncing))
    }

    fn reject(&self, error: SyncError) -> SyncError {
        warn!(provider = %error.provider(), %error, "sync refused");
        self.emit(SyncEvent::error(error.provider(), &error));
        error
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.sync_events.send(event);
    }

    async fn run_cycle(&self, adapters: Vec<Arc<dyn CalendarAdapter>>) -> SyncSummary {
        let window = self.config.fetch_window(Local::now().date_naive());
        let mut summary = SyncSummary {
            adapters: adapters.len(),
            operations: adapters.len() * 2,
            ..SyncSummary::default()
        };
        info!(
            adapters = summary.adapters,
            from = %window.start,
            to = %window.end,
            "sync started"
        );
        self.emit(SyncEvent::Started);

        let mut pending: FuturesUnordered<BoxFuture<'static, Outcome>> = FuturesUnordered::new();
        for adapter in adapters {
            let provider = adapter.provider();
            self.emit(SyncEvent::Progress {
                provider,
                percent: 0,
            });
            let events = Arc::clone(&adapter);
            pending.push(Box::pin(async move {
                Outcome::Events(provider, events.fetch_events(window).await)
            }));
            pending.push(Box::pin(async move {
                Outcome::Tasks(provider, adapter.fetch_tasks().await)
            }));
        }

        let mut remaining = summary.operations;
        while let Some(outcome) = pending.next().await {
            remaining -= 1;
            match outcome {
                Outcome::Events(provider, Ok(events)) => {
                    summary.events += events.len();
                    self.merge_events(provider, events).await;
                    self.emit(SyncEvent::Progress {
                        provider,
                        percent: 50,
                    });
                }
                Outcome::Tasks(provider, Ok(tasks)) => {
                    summary.tasks += tasks.len();
                    self.merge_tasks(provider, tasks).await;
                    self.emit(SyncEvent::Progress {
                        provider,
                        percent: 100,
                    });
                }
                Outcome::Events(provider, Err(e)) | Outcome::Tasks(provider, Err(e)) => {
                    summary.errors += 1;
                    warn!(%provider, error = %e, "sync operation failed");
                    self.emit(SyncEvent::error(provider, e.message()));
                }
            }
            debug!(remaining, "sync operation reported");
        }

        let at = Utc::now();
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
        info!(
            events = summary.events,
            tasks = summary.tasks,
            errors = summary.errors,
            "sync completed"
        );
        self.syncing.store(false, Ordering::SeqCst);
        self.emit(SyncEvent::Completed { at });
        summary
    }

    async fn merge_events(&self, provider: Provider, events: Vec<CalendarEvent>) {
        let count = events.len();
        let mut store = self.store.write().await;
        for event in events {
            store.upsert_event(event);
        }
        debug!(%provider, count, "events merged");
    }

    async fn merge_tasks(&self, provider: Provider, tasks: Vec<Task>) {
        let count = tasks.len();
        let mut store = self.store.write().await;
        for task in tasks {
            store.upsert_task(task);
        }
        debug!(%provider, count, "tasks merged");
    }

    fn spawn_auth_forwarder(&self, adapter: &dyn CalendarAdapter) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(provider = %adapter.provider(), "no runtime, auth events not forwarded");
            return None;
        };
        let mut source = adapter.subscribe_auth();
        let sink = self.auth_events.clone();
        Some(runtime.spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        let _ = sink.send(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAdapter, event, task};
    use std::time::Duration;
    use tokio::time::timeout;

    fn orchestrator() -> SyncOrchestrator {
        SyncOrchestrator::new(AggregateStore::new(), SyncConfig::default())
    }

    fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn completions(events: &[SyncEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SyncEvent::Completed { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn two_adapters_dispatch_four_operations() {
        let orch = orchestrator();
        let google = ScriptedAdapter::authenticated(Provider::Google)
            .with_events(vec![event("g1", Provider::Google)])
            .with_latency(Duration::from_millis(300), Duration::from_millis(10));
        let apple = ScriptedAdapter::authenticated(Provider::Apple)
            .with_tasks(vec![task("a1", Provider::Apple)])
            .with_latency(Duration::from_millis(20), Duration::from_millis(200));
        orch.register_adapter(google.clone());
        orch.register_adapter(apple.clone());
        let mut rx = orch.subscribe_sync();

        let summary = orch.sync_all().await.unwrap();

        assert_eq!(summary.adapters, 2);
        assert_eq!(summary.operations, 4);
        assert_eq!(summary.errors, 0);
        assert_eq!(google.calls(), (1, 1));
        assert_eq!(apple.calls(), (1, 1));

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&SyncEvent::Started));
        assert!(matches!(events.last(), Some(SyncEvent::Completed { .. })));
        assert_eq!(completions(&events), 1);
        let dispatched = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::Progress { percent: 0, .. }))
            .count();
        assert_eq!(dispatched, 2);

        assert!(!orch.is_syncing());
        assert!(orch.last_sync_time().is_some());
        let store = orch.store();
        let store = store.read().await;
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.task_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_still_completes() {
        let orch = orchestrator();
        let outlook = ScriptedAdapter::authenticated(Provider::Outlook)
            .with_event_failure("request timeout")
            .with_tasks(vec![task("o1", Provider::Outlook)]);
        let google = ScriptedAdapter::authenticated(Provider::Google)
            .with_events(vec![event("g1", Provider::Google)]);
        orch.register_adapter(outlook);
        orch.register_adapter(google);
        let mut rx = orch.subscribe_sync();

        let summary = orch.sync_all().await.unwrap();
        assert_eq!(summary.errors, 1);

        let events = drain(&mut rx);
        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::Error { .. }))
            .collect();
        assert_eq!(
            errors,
            vec![&SyncEvent::Error {
                provider: Provider::Outlook,
                message: "outlook: request timeout".into()
            }]
        );
        assert_eq!(completions(&events), 1);

        let store = orch.store();
        let store = store.read().await;
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.task_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reported_last_still_completes_once() {
        let orch = orchestrator();
        let google = ScriptedAdapter::authenticated(Provider::Google)
            .with_events(vec![event("g1", Provider::Google)])
            .with_task_failure("server error (503)")
            .with_latency(Duration::from_millis(10), Duration::from_millis(80));
        orch.register_adapter(google.clone());
        let mut rx = orch.subscribe_sync();

        let summary = orch.sync_all().await.unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(google.calls(), (1, 1));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[..4],
            [
                SyncEvent::Started,
                SyncEvent::Progress {
                    provider: Provider::Google,
                    percent: 0
                },
                SyncEvent::Progress {
                    provider: Provider::Google,
                    percent: 50
                },
                SyncEvent::Error {
                    provider: Provider::Google,
                    message: "google: server error (503)".into()
                },
            ]
        );
        assert!(matches!(events[4], SyncEvent::Completed { .. }));
        assert!(!orch.is_syncing());
    }

    #[tokio::test]
    async fn store_subscribers_see_every_merged_entity() {
        let orch = orchestrator();
        let events: Vec<_> = (0..300)
            .map(|i| event(&format!("g{i}"), Provider::Google))
            .collect();
        let tasks: Vec<_> = (0..200)
            .map(|i| task(&format!("t{i}"), Provider::Google))
            .collect();
        orch.register_adapter(
            ScriptedAdapter::authenticated(Provider::Google)
                .with_events(events)
                .with_tasks(tasks),
        );
        let mut rx = orch.subscribe_store().await;

        orch.sync_all().await.unwrap();

        let mut added = 0;
        let mut changed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                StoreEvent::EventAdded(_) | StoreEvent::TaskAdded(_) => added += 1,
                StoreEvent::DataChanged => changed += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(added, 500);
        assert_eq!(changed, 500);
    }

    #[tokio::test]
    async fn zero_adapters_complete_immediately() {
        let orch = orchestrator();
        let mut rx = orch.subscribe_sync();
        let summary = orch.sync_all().await.unwrap();
        assert_eq!(summary, SyncSummary::default());
        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&SyncEvent::Started));
        assert_eq!(completions(&events), 1);
        assert!(!orch.is_syncing());
        assert!(orch.last_sync_time().is_some());
    }

    #[tokio::test]
    async fn unauthenticated_adapters_are_not_dispatched() {
        let orch = orchestrator();
        let idle = ScriptedAdapter::new(Provider::Apple);
        orch.register_adapter(idle.clone());
        let mut rx = orch.subscribe_sync();

        let summary = orch.sync_all().await.unwrap();
        assert_eq!(summary.operations, 0);
        assert_eq!(idle.calls(), (0, 0));
        assert_eq!(completions(&drain(&mut rx)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_sync_while_running_is_a_no_op() {
        let orch = Arc::new(orchestrator());
        let slow = ScriptedAdapter::authenticated(Provider::Google)
            .with_latency(Duration::from_secs(5), Duration::from_secs(5));
        orch.register_adapter(slow.clone());

        let running = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.sync_all().await })
        };
        tokio::task::yield_now().await;
        assert!(orch.is_syncing());
        assert!(orch.sync_all().await.is_none());
        assert_eq!(orch.sync_platform(Provider::Google).await, Ok(None));

        assert!(running.await.unwrap().is_some());
        assert_eq!(slow.calls(), (1, 1));
        assert!(!orch.is_syncing());
    }

    #[tokio::test]
    async fn repeated_cycles_upsert_remote_edits() {
        let orch = orchestrator();
        let google = ScriptedAdapter::authenticated(Provider::Google)
            .with_events(vec![event("g1", Provider::Google)]);
        orch.register_adapter(google.clone());

        orch.sync_all().await.unwrap();
        google.set_events(vec![event("g1", Provider::Google).with_location("Room 2")]);
        orch.sync_all().await.unwrap();

        let store = orch.store();
        let store = store.read().await;
        assert_eq!(store.event_count(), 1);
        assert_eq!(
            store.event("g1", Provider::Google).unwrap().location,
            "Room 2"
        );
    }

    #[tokio::test]
    async fn sync_platform_rejects_missing_or_idle_adapter() {
        let orch = orchestrator();
        let mut rx = orch.subscribe_sync();

        let err = orch.sync_platform(Provider::Apple).await.unwrap_err();
        assert_eq!(err, SyncError::AdapterUnavailable(Provider::Apple));

        orch.register_adapter(ScriptedAdapter::new(Provider::Apple));
        let err = orch.sync_platform(Provider::Apple).await.unwrap_err();
        assert_eq!(err, SyncError::NotAuthenticated(Provider::Apple));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, SyncEvent::Error { .. })));
        assert!(!orch.is_syncing());
        assert!(orch.last_sync_time().is_none());
    }

    #[tokio::test]
    async fn sync_platform_only_touches_one_adapter() {
        let orch = orchestrator();
        let google = ScriptedAdapter::authenticated(Provider::Google);
        let outlook = ScriptedAdapter::authenticated(Provider::Outlook);
        orch.register_adapter(google.clone());
        orch.register_adapter(outlook.clone());

        let summary = orch.sync_platform(Provider::Outlook).await.unwrap().unwrap();
        assert_eq!(summary.operations, 2);
        assert_eq!(google.calls(), (0, 0));
        assert_eq!(outlook.calls(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_follows_each_landing() {
        let orch = orchestrator();
        let google = ScriptedAdapter::authenticated(Provider::Google)
            .with_latency(Duration::from_millis(10), Duration::from_millis(50));
        orch.register_adapter(google);
        let mut rx = orch.subscribe_sync();

        orch.sync_all().await.unwrap();
        let events = drain(&mut rx);
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 50, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_an_adapter_detaches_the_old_one() {
        let orch = orchestrator();
        let first = ScriptedAdapter::new(Provider::Google);
        let second = ScriptedAdapter::new(Provider::Google);
        assert!(orch.register_adapter(first.clone()).is_none());
        let replaced = orch.register_adapter(second.clone()).unwrap();
        assert_eq!(replaced.provider(), Provider::Google);
        assert_eq!(orch.providers(), vec![Provider::Google]);

        let mut rx = orch.subscribe_auth();
        first.auth().mark_authenticated();
        assert!(timeout(Duration::from_secs(1), rx.recv()).await.is_err());

        second.auth().mark_authenticated();
        let forwarded = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(forwarded.unwrap(), AuthEvent::Authenticated(Provider::Google));

        assert!(orch.unregister_adapter(Provider::Google).is_some());
        assert!(orch.adapter(Provider::Google).is_none());
    }

    #[test]
    fn registers_without_a_runtime() {
        let orch = orchestrator();
        orch.register_adapter(ScriptedAdapter::new(Provider::Apple));
        assert!(orch.adapter(Provider::Apple).is_some());
    }
}
