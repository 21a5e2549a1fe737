//! Dictionary Retrieval Service
//!
//! Keeps the router's in-memory set of compression dictionaries exactly
//! synchronized with the set of servable store versions that use
//! dictionary-based compression. The service runs as a producer-consumer
//! pipeline:
//!
//! ```text
//! ┌─────────────────────┐   enqueue    ┌────────────────┐
//! │ StoreChangeListener │ ───────────► │ CandidateQueue │
//! └─────────────────────┘              └───────┬────────┘
//! ┌─────────────────────┐   re-enqueue         │ pop (single consumer)
//! │ Retry timer (100ms) │ ───────────►         ▼
//! └─────────▲───────────┘              ┌────────────────┐  spawn   ┌─────────┐
//!           │ transient failure        │ ensure_fetch   │ ───────► │ fetch   │
//!           └───────────────────────── │ (in-flight map)│          │ task    │
//!                                      └────────────────┘          └────┬────┘
//!                                                            success    │
//!                                      ┌────────────────────┐           │
//!                                      │ CompressorRegistry │ ◄─────────┘
//!                                      └────────────────────┘
//! ```
//!
//! There are two producers: the store change listener, which reacts to
//! metadata events, and the retry timers, which put a topic back on the
//! queue 100ms after a failed download. Every failure is retried until the
//! version retires or the service stops.
//!
//! At startup the service pre-fetches dictionaries for all currently
//! eligible versions in parallel under a single deadline. Warm-up is
//! fail-fast: if any download does not complete in time, `start()` errors
//! and the embedding router must refuse to serve traffic.
//!
//! ## Cancellation
//!
//! Retiring a version removes its handle from the in-flight map and fails
//! the handle with a `Retired` cause. The fetch task observes this on
//! completion: a late success discards its bytes, a late failure schedules
//! no retry. Stopping the service cancels every tracked handle the same way
//! with a `Stopped` cause.

use crate::config::RouterConfig;
use crate::error::{FetchError, Result, RouterError};
use crate::fetcher::DictionaryFetcher;
use crate::handle::{FailureCause, FetchHandle, FetchState};
use crate::instance::InstanceDirectory;
use crate::queue::CandidateQueue;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use keyhouse_core::{topic, CompressorRegistry};
use keyhouse_metadata::{
    MetadataRepository, Store, StoreDataChangedListener, Version, VersionStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Delay before a failed download goes back on the candidate queue.
const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceState {
    Created,
    Started,
    Stopped,
}

/// Downloads and retires compression dictionaries as versions enter and
/// leave service.
///
/// All collaborators are injected: the metadata repository supplies store
/// state and change events, the instance directory supplies storage node
/// addresses, and downloaded dictionaries are installed into the shared
/// compressor registry owned by the embedding process.
pub struct DictionaryRetrievalService {
    inner: Arc<ServiceInner>,
    state: RwLock<ServiceState>,
    consumer: RwLock<Option<JoinHandle<()>>>,
}

struct ServiceInner {
    config: RouterConfig,
    repository: Arc<dyn MetadataRepository>,
    compressors: Arc<CompressorRegistry>,
    fetcher: DictionaryFetcher,

    /// Bounds the number of dictionary downloads in flight at once.
    fetch_permits: Arc<Semaphore>,

    /// Topic -> handle of the download started for it. Membership means "a
    /// fetch has been started and the version has not retired since"; a
    /// completed handle stays resident as the "dictionary loaded" marker.
    registry: DashMap<String, Arc<FetchHandle>>,

    candidates: CandidateQueue,
    shutdown_signal: watch::Sender<bool>,
}

impl DictionaryRetrievalService {
    pub fn new(
        config: RouterConfig,
        repository: Arc<dyn MetadataRepository>,
        directory: Arc<dyn InstanceDirectory>,
        compressors: Arc<CompressorRegistry>,
    ) -> Result<Self> {
        let fetcher = DictionaryFetcher::new(directory, &config)?;
        let (shutdown_signal, _) = watch::channel(false);
        let fetch_permits = Arc::new(Semaphore::new(config.dictionary_processing_threads.max(1)));

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                repository,
                compressors,
                fetcher,
                fetch_permits,
                registry: DashMap::new(),
                candidates: CandidateQueue::new(),
                shutdown_signal,
            }),
            state: RwLock::new(ServiceState::Created),
            consumer: RwLock::new(None),
        })
    }

    /// Register the change listener, warm up dictionaries for all currently
    /// eligible versions, and start the download consumer.
    ///
    /// # Errors
    ///
    /// - `AlreadyStarted`: the service was started or stopped before
    /// - `WarmupFailed`: not every eligible dictionary was installed within
    ///   the retrieval deadline; the caller must abort router startup
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ServiceState::Created {
            return Err(RouterError::AlreadyStarted);
        }

        info!("starting dictionary retrieval service");

        self.inner
            .repository
            .register_store_data_changed_listener(Arc::new(StoreChangeListener {
                inner: Arc::clone(&self.inner),
            }));

        if let Err(error) = ServiceInner::warm_up(&self.inner).await {
            // Fail fast: settle whatever the warm-up left in flight and keep
            // the router from serving traffic.
            self.inner.shutdown();
            *state = ServiceState::Stopped;
            return Err(error);
        }

        let consumer = tokio::spawn(ServiceInner::run_consumer(Arc::clone(&self.inner)));
        *self.consumer.write().await = Some(consumer);
        *state = ServiceState::Started;

        info!("dictionary retrieval service started");
        Ok(())
    }

    /// Stop the service: exit the consumer, cancel retry timers, and settle
    /// every tracked handle with a `Stopped` cause.
    ///
    /// Best-effort and idempotent. Does not wait for in-flight HTTP
    /// requests; their late results are discarded.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ServiceState::Started {
            warn!("dictionary retrieval service not started, skipping stop");
            return Ok(());
        }

        info!("stopping dictionary retrieval service");
        self.inner.shutdown();

        if let Some(consumer) = self.consumer.write().await.take() {
            let _ = consumer.await;
        }

        *state = ServiceState::Stopped;
        info!("dictionary retrieval service stopped");
        Ok(())
    }

    pub async fn is_started(&self) -> bool {
        *self.state.read().await == ServiceState::Started
    }

    /// Whether a download for this topic is currently in flight.
    pub fn fetch_in_flight(&self, topic: &str) -> bool {
        self.inner
            .registry
            .get(topic)
            .map(|entry| entry.value().is_pending())
            .unwrap_or(false)
    }
}

impl ServiceInner {
    /// Start a download for the version unless one is already tracked.
    ///
    /// This is the deduplication point: the registry holds at most one
    /// handle per topic, so concurrent callers for the same topic all
    /// observe the same download.
    fn ensure_fetch(inner: &Arc<Self>, version: &Version) -> Arc<FetchHandle> {
        let topic_name = version.topic_name();
        let handle = match inner.registry.entry(topic_name.clone()) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(slot) => {
                let handle = Arc::new(FetchHandle::new(topic_name));
                slot.insert(Arc::clone(&handle));
                handle
            }
        };

        Self::spawn_fetch(inner, version.clone(), Arc::clone(&handle));
        handle
    }

    fn spawn_fetch(inner: &Arc<Self>, version: Version, handle: Arc<FetchHandle>) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let permit = match Arc::clone(&inner.fetch_permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let result = inner
                .fetcher
                .fetch(&version.store_name, version.number)
                .await;
            drop(permit);

            match result {
                Ok(bytes) => inner.install_downloaded(&version, bytes, &handle).await,
                Err(error) => Self::handle_fetch_failure(&inner, &error, &handle),
            }
        });
    }

    /// Success path of a fetch task.
    ///
    /// The version may have retired while the request was in flight, so the
    /// current status is re-resolved from the repository and the handle must
    /// still be the one tracked for the topic. The install happens while the
    /// registry entry is held, so a racing retirement orders its compressor
    /// removal after the install instead of losing it.
    async fn install_downloaded(&self, version: &Version, bytes: Bytes, handle: &Arc<FetchHandle>) {
        let topic_name = handle.topic();

        let current_status = match self.repository.store(&version.store_name).await {
            Ok(store) => store.and_then(|s| s.version(version.number).map(|v| v.status)),
            Err(error) => {
                warn!(
                    topic = %topic_name,
                    error = %error,
                    "status lookup failed after download, discarding dictionary"
                );
                None
            }
        };
        if current_status != Some(VersionStatus::Online) {
            debug!(topic = %topic_name, "version no longer online, discarding dictionary");
            return;
        }

        let installed = match self.registry.get(topic_name) {
            Some(entry) if Arc::ptr_eq(entry.value(), handle) && handle.complete() => {
                self.compressors
                    .install(version.compression_strategy, topic_name, bytes);
                true
            }
            _ => false,
        };

        if installed {
            info!(topic = %topic_name, "dictionary downloaded, compressor installed");
        } else {
            debug!(topic = %topic_name, "fetch handle superseded, discarding dictionary");
        }
    }

    /// Failure path of a fetch task. Never retries in place: the handle is
    /// dropped from the registry and the topic goes back through the queue,
    /// which keeps retries serial and the retry policy in one place.
    fn handle_fetch_failure(inner: &Arc<Self>, error: &FetchError, handle: &Arc<FetchHandle>) {
        if !handle.fail(FailureCause::Transient) {
            // Retirement or shutdown settled the handle mid-flight; that
            // path owns the cleanup.
            debug!(topic = %handle.topic(), "fetch failed after handle was settled");
            return;
        }

        warn!(
            topic = %handle.topic(),
            error = %error,
            retry_in_ms = RETRY_DELAY.as_millis() as u64,
            "dictionary download failed, scheduling retry"
        );

        inner
            .registry
            .remove_if(handle.topic(), |_, tracked| Arc::ptr_eq(tracked, handle));
        Self::schedule_retry(inner, handle.topic().to_string());
    }

    /// Re-enqueue a topic after the retry delay. The timer races the
    /// shutdown signal so no retry fires after `stop()`.
    fn schedule_retry(inner: &Arc<Self>, topic_name: String) {
        let mut shutdown = inner.shutdown_signal.subscribe();
        if *shutdown.borrow() {
            return;
        }

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(RETRY_DELAY) => inner.candidates.push(topic_name),
                _ = shutdown.changed() => {}
            }
        });
    }

    /// Pre-fetch dictionaries for every currently eligible version, all in
    /// parallel, under one shared deadline.
    async fn warm_up(inner: &Arc<Self>) -> Result<()> {
        inner.repository.refresh().await?;

        let mut topics = Vec::new();
        let mut handles = Vec::new();
        for store in inner.repository.all_stores().await? {
            for version in &store.versions {
                let topic_name = version.topic_name();
                if version.is_dictionary_eligible() && !inner.registry.contains_key(&topic_name) {
                    handles.push(Self::ensure_fetch(inner, version));
                    topics.push(topic_name);
                }
            }
        }

        if handles.is_empty() {
            info!("no dictionaries to warm up");
            return Ok(());
        }

        info!(count = handles.len(), "beginning dictionary warm-up");

        // One deadline for the whole batch, not per request. With more
        // eligible versions than download concurrency this can expire even
        // though every individual request is healthy; raise the retrieval
        // time rather than expecting per-request accounting.
        let deadline = inner.config.retrieval_timeout();
        match timeout(deadline, join_all(handles.iter().map(|h| h.wait()))).await {
            Ok(states) => {
                for (topic_name, state) in topics.iter().zip(states) {
                    if state != FetchState::Completed {
                        return Err(RouterError::WarmupFailed {
                            detail: format!("download for {topic_name} ended as {state:?}"),
                        });
                    }
                }
                info!(count = topics.len(), "dictionary warm-up complete");
                Ok(())
            }
            Err(_) => Err(RouterError::WarmupFailed {
                detail: format!("not all downloads finished within {deadline:?}"),
            }),
        }
    }

    /// Drain the candidate queue until it closes. Holds no lock while
    /// parked and never waits on a download; it starts the fetch and loops.
    async fn run_consumer(inner: Arc<Self>) {
        info!("dictionary download consumer started");

        while let Some(topic_name) = inner.candidates.pop().await {
            // Dequeue-time filtering makes queued duplicates harmless.
            if inner.compressors.has(&topic_name) {
                continue;
            }
            if inner.registry.contains_key(&topic_name) {
                continue;
            }

            match inner.resolve(&topic_name).await {
                Some(version) => {
                    Self::ensure_fetch(&inner, &version);
                }
                None => {
                    // Retired between enqueue and dequeue.
                    debug!(topic = %topic_name, "topic no longer resolvable, skipping download");
                }
            }
        }

        info!("dictionary download consumer stopped");
    }

    async fn resolve(&self, topic_name: &str) -> Option<Version> {
        let store_name = topic::parse_store(topic_name).ok()?;
        let number = topic::parse_version(topic_name).ok()?;

        let store = match self.repository.store(store_name).await {
            Ok(store) => store?,
            Err(error) => {
                warn!(topic = %topic_name, error = %error, "store lookup failed");
                return None;
            }
        };
        store.version(number).cloned()
    }

    /// Take a topic out of service: cancel any in-flight download, drop
    /// queued copies, and remove its compressor.
    fn retire(&self, topic_name: &str, reason: &str) {
        if let Some((_, handle)) = self.registry.remove(topic_name) {
            if handle.fail(FailureCause::Retired) {
                debug!(topic = %topic_name, "cancelled in-flight dictionary download");
            }
        }

        self.candidates.remove(topic_name);

        if self.compressors.remove(topic_name) {
            info!(topic = %topic_name, reason = %reason, "removed dictionary for retired version");
        } else {
            debug!(topic = %topic_name, reason = %reason, "retired version had no dictionary");
        }
    }

    fn tracked_topics_of_store(&self, store_name: &str) -> Vec<String> {
        self.registry
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|topic_name| topic::parse_store(topic_name).ok() == Some(store_name))
            .collect()
    }

    fn shutdown(&self) {
        self.shutdown_signal.send_replace(true);
        self.candidates.close();

        let topics: Vec<String> = self
            .registry
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for topic_name in topics {
            if let Some((_, handle)) = self.registry.remove(&topic_name) {
                handle.fail(FailureCause::Stopped);
            }
        }
    }
}

/// Primary producer: turns store change events into download and
/// retirement decisions.
///
/// Callbacks arrive on the metadata repository's threads and may interleave
/// with the consumer and with fetch completions; everything they touch is
/// internally synchronized.
struct StoreChangeListener {
    inner: Arc<ServiceInner>,
}

impl StoreDataChangedListener for StoreChangeListener {
    fn store_created(&self, store: &Store) {
        let topics: Vec<String> = store
            .versions
            .iter()
            .filter(|version| version.is_dictionary_eligible())
            .map(|version| version.topic_name())
            .collect();

        if !topics.is_empty() {
            debug!(
                store = %store.name,
                count = topics.len(),
                "queueing dictionary downloads for new store"
            );
            self.inner.candidates.extend(topics);
        }
    }

    fn store_changed(&self, store: &Store) {
        let inner = &self.inner;

        // New eligible versions start a download. Already-tracked topics are
        // skipped here and again at dequeue time.
        let added: Vec<String> = store
            .versions
            .iter()
            .filter(|version| version.is_dictionary_eligible())
            .map(|version| version.topic_name())
            .filter(|topic_name| !inner.registry.contains_key(topic_name))
            .collect();
        inner.candidates.extend(added);

        // Dictionary-compressed versions that left Online lose theirs.
        for version in store.versions.iter().filter(|version| {
            version.compression_strategy.requires_dictionary() && !version.status.is_servable()
        }) {
            inner.retire(
                &version.topic_name(),
                &format!("version status {}", version.status),
            );
        }

        // Tracked topics whose version number vanished from the store.
        for topic_name in inner.tracked_topics_of_store(&store.name) {
            if let Ok(number) = topic::parse_version(&topic_name) {
                if store.version(number).is_none() {
                    inner.retire(&topic_name, "version retired");
                }
            }
        }
    }

    fn store_deleted(&self, store: &Store) {
        for version in &store.versions {
            self.inner.retire(&version.topic_name(), "store deleted");
        }
        // Tracked topics can outlive the deleted store's version list.
        for topic_name in self.inner.tracked_topics_of_store(&store.name) {
            self.inner.retire(&topic_name, "store deleted");
        }
    }
}
