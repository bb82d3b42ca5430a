//! The sync scheduler.
//!
//! [`SyncScheduler`] wires a [`StateStore`] to its local snapshot and to
//! the remote document. A store listener turns every commit into a job on
//! an unbounded queue; one tokio task drains the queue and performs all
//! I/O, so `mutate` never waits on a disk or a network.
//!
//! Per commit the worker:
//!
//! 1. saves the snapshot (every origin);
//! 2. pushes the state if the commit is local, an identity is present and
//!    the echo guard allows it.
//!
//! A retryable push failure parks the state in a single pending slot that
//! is retried with exponential backoff (see [`RetryConfig`]).
//!
//! [`RetryConfig`]: crate::RetryConfig

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::handle::StateHandle;
use crate::remote::RemoteSyncAdapter;
use crate::state::{SyncStats, SyncStatus};
use parking_lot::{Mutex, RwLock};
use questline_core::{
    ApplicationState, Clock, CommitEvent, CommitOrigin, LocalPersistence, MergeOutcome,
    StateStore, StoreConfig, Subscription, SystemClock,
};
use questline_storage::KeyValueStore;
use questline_sync_protocol::{DocumentStore, Identity, ListenerRegistration, RemoteDocument};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of a manual resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The remote state replaced the local state.
    Replaced {
        /// Timestamp of the adopted state.
        updated_at: u64,
    },
    /// No remote document exists; the local state was kept.
    RemoteEmpty,
}

/// Work items for the scheduler task.
pub(crate) enum Job {
    Commit {
        event: CommitEvent,
        push_allowed: bool,
    },
    Inbound {
        generation: u64,
        document: RemoteDocument,
    },
    Resync(oneshot::Sender<SyncResult<ResyncOutcome>>),
    SetIdentity(Option<Identity>, oneshot::Sender<()>),
    ConnectivityRestored,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Sends a resync request and waits for its outcome.
pub(crate) async fn request_resync(
    jobs: &mpsc::UnboundedSender<Job>,
) -> SyncResult<ResyncOutcome> {
    let (reply, outcome) = oneshot::channel();
    jobs.send(Job::Resync(reply))
        .map_err(|_| SyncError::Shutdown)?;
    outcome.await.map_err(|_| SyncError::Shutdown)?
}

#[derive(Debug)]
struct PendingPush {
    state: Arc<ApplicationState>,
    /// Failed attempts so far.
    attempts: u32,
    due: Instant,
}

struct Shared<K, D> {
    config: SyncConfig,
    store: Arc<StateStore>,
    persistence: LocalPersistence<K>,
    remote: RemoteSyncAdapter<D>,
    pending: Mutex<Option<PendingPush>>,
    status: RwLock<SyncStatus>,
    stats: Mutex<SyncStats>,
}

impl<K: KeyValueStore, D> Shared<K, D> {
    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status;
    }

    fn record_synced(&self, update: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.stats.lock();
        update(&mut stats);
        stats.last_synced_at = Some(std::time::Instant::now());
    }

    fn record_failure(&self, error: &dyn fmt::Display, update: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.stats.lock();
        update(&mut stats);
        stats.last_error = Some(error.to_string());
    }

    fn persist(&self, state: &ApplicationState) {
        if let Err(e) = self.persistence.save(state) {
            warn!(updated_at = state.updated_at, error = %e, "failed to save local snapshot");
            self.record_failure(&e, |s| s.persist_failures += 1);
        }
    }
}

/// Builder for [`SyncScheduler`].
pub struct SchedulerBuilder<K, D> {
    local: K,
    remote: D,
    config: SyncConfig,
    store_config: StoreConfig,
    clock: Arc<dyn Clock>,
    identity: Option<Identity>,
    seed: Box<dyn FnOnce() -> ApplicationState + Send>,
}

impl<K, D> SchedulerBuilder<K, D>
where
    K: KeyValueStore + 'static,
    D: DocumentStore,
{
    /// Sets the sync configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the store configuration.
    #[must_use]
    pub fn with_store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Sets the clock used to stamp commits.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the identity signed in at startup.
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the state used when no local snapshot exists.
    #[must_use]
    pub fn with_seed<F>(mut self, seed: F) -> Self
    where
        F: FnOnce() -> ApplicationState + Send + 'static,
    {
        self.seed = Box::new(seed);
        self
    }

    /// Runs the startup sequence and returns the running scheduler.
    ///
    /// 1. Load the local snapshot, or the seed if there is none.
    /// 2. Build the store and start the worker.
    /// 3. With an identity: pull the remote document, offer it to the
    ///    conflict resolver if it carries `updatedAt`, then subscribe.
    ///
    /// Remote failures during startup are logged; the scheduler still
    /// starts from local state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if the worker exits during startup.
    pub async fn start(self) -> SyncResult<SyncScheduler<K, D>> {
        let persistence = LocalPersistence::with_key(self.local, self.config.storage_key.clone());
        let initial = persistence.load_or_else(self.seed);
        debug!(updated_at = initial.updated_at, "initial state loaded");

        let store = Arc::new(StateStore::with_config(
            initial,
            self.store_config,
            self.clock,
        ));
        let remote = RemoteSyncAdapter::new(self.remote, self.config.device_id);

        let shared = Arc::new(Shared {
            config: self.config,
            store: Arc::clone(&store),
            persistence,
            remote,
            pending: Mutex::new(None),
            status: RwLock::new(SyncStatus::LocalOnly),
            stats: Mutex::new(SyncStats::default()),
        });

        let (jobs, queue) = mpsc::unbounded_channel();
        let commits = subscribe_commits(&store, jobs.clone());

        let worker = Worker {
            shared: Arc::clone(&shared),
            jobs: jobs.clone(),
            identity: None,
            subscription: None,
            generation: 0,
            flush_waiters: Vec::new(),
        };
        let task = tokio::spawn(worker.run(queue));

        let scheduler = SyncScheduler {
            shared,
            jobs,
            worker: Mutex::new(Some(task)),
            _commits: commits,
        };
        scheduler.set_identity(self.identity).await?;
        Ok(scheduler)
    }
}

/// Enqueues a job for every commit of `store`.
///
/// The echo guard is consulted here, under the commit lock, so each
/// verdict belongs to exactly the commit it was asked about.
fn subscribe_commits(store: &Arc<StateStore>, jobs: mpsc::UnboundedSender<Job>) -> Subscription {
    let weak: Weak<StateStore> = Arc::downgrade(store);
    store.subscribe(move |event| {
        let guard_open = match weak.upgrade() {
            Some(store) => store.echo_guard().should_push(event.updated_at()),
            None => true,
        };
        let push_allowed = event.origin == CommitOrigin::Local && guard_open;
        let job = Job::Commit {
            event: event.clone(),
            push_allowed,
        };
        if jobs.send(job).is_err() {
            debug!(sequence = event.sequence, "scheduler stopped, commit not synced");
        }
    })
}

/// Keeps local and remote state in step with the canonical store.
///
/// # Example
///
/// ```rust,no_run
/// use questline_storage::InMemoryKvStore;
/// use questline_sync_engine::{SyncConfig, SyncScheduler};
/// use questline_sync_protocol::Identity;
/// use questline_sync_server::DocumentServer;
/// use serde_json::json;
///
/// # async fn demo() -> questline_sync_engine::SyncResult<()> {
/// let scheduler = SyncScheduler::bootstrap(
///     SyncConfig::default(),
///     InMemoryKvStore::new(),
///     DocumentServer::new(),
///     Some(Identity::new("u1")),
/// )
/// .await?;
///
/// let state = scheduler.handle();
/// state.mutate(|s| s.with_collection("tasks", json!(["stretch"])));
/// scheduler.flush().await?;
/// scheduler.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SyncScheduler<K, D> {
    shared: Arc<Shared<K, D>>,
    jobs: mpsc::UnboundedSender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    _commits: Subscription,
}

impl<K, D> SyncScheduler<K, D>
where
    K: KeyValueStore + 'static,
    D: DocumentStore,
{
    /// Returns a builder over a local key-value store and a remote document store.
    pub fn builder(local: K, remote: D) -> SchedulerBuilder<K, D> {
        SchedulerBuilder {
            local,
            remote,
            config: SyncConfig::default(),
            store_config: StoreConfig::default(),
            clock: Arc::new(SystemClock),
            identity: None,
            seed: Box::new(ApplicationState::new),
        }
    }

    /// Starts a scheduler with default store settings and an empty seed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if the worker exits during startup.
    pub async fn bootstrap(
        config: SyncConfig,
        local: K,
        remote: D,
        identity: Option<Identity>,
    ) -> SyncResult<Self> {
        Self::builder(local, remote)
            .with_config(config)
            .with_identity(identity)
            .start()
            .await
    }

    /// Returns the canonical store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.shared.store
    }

    /// Returns a handle for feature code.
    pub fn handle(&self) -> StateHandle {
        StateHandle::new(Arc::clone(&self.shared.store), self.jobs.clone())
    }

    /// Returns the local snapshot adapter.
    pub fn persistence(&self) -> &LocalPersistence<K> {
        &self.shared.persistence
    }

    /// Returns the remote adapter.
    pub fn remote(&self) -> &RemoteSyncAdapter<D> {
        &self.shared.remote
    }

    /// Returns the sync configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Signs in or out.
    ///
    /// Drops the current subscription and pending push, then runs the pull
    /// and subscribe sequence for the new identity. `None` switches to
    /// local-only mode.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if the worker has stopped.
    pub async fn set_identity(&self, identity: Option<Identity>) -> SyncResult<()> {
        let (reply, done) = oneshot::channel();
        self.jobs
            .send(Job::SetIdentity(identity, reply))
            .map_err(|_| SyncError::Shutdown)?;
        done.await.map_err(|_| SyncError::Shutdown)
    }

    /// Replaces local state with the remote document, bypassing the
    /// conflict resolver.
    ///
    /// A pending push is retried once first (unless disabled in
    /// [`SyncConfig`]).
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotSignedIn`] without an identity
    /// - a remote or timeout error if the pull fails; local state is untouched
    pub async fn manual_resync(&self) -> SyncResult<ResyncOutcome> {
        request_resync(&self.jobs).await
    }

    /// Retries the pending push now instead of waiting for its backoff.
    ///
    /// If the remote subscription could not be set up earlier, the pull
    /// and subscribe sequence runs again first.
    pub fn notify_connectivity_restored(&self) {
        if self.jobs.send(Job::ConnectivityRestored).is_err() {
            debug!("scheduler stopped, connectivity notice dropped");
        }
    }

    /// Waits until every job queued so far, and every job those jobs
    /// queued in turn, has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if the worker has stopped.
    pub async fn flush(&self) -> SyncResult<()> {
        let (reply, done) = oneshot::channel();
        self.jobs
            .send(Job::Flush(reply))
            .map_err(|_| SyncError::Shutdown)?;
        done.await.map_err(|_| SyncError::Shutdown)
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        *self.shared.status.read()
    }

    /// Returns a copy of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.lock().clone()
    }

    /// Returns the timestamp of the state waiting for a push retry.
    pub fn pending_push(&self) -> Option<u64> {
        self.shared
            .pending
            .lock()
            .as_ref()
            .map(|pending| pending.state.updated_at)
    }

    /// Stops the worker and removes the remote subscription.
    ///
    /// Jobs queued before the call are handled first.
    pub async fn shutdown(&self) {
        let _ = self.jobs.send(Job::Shutdown);
        let task = self.worker.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "sync worker ended abnormally");
            }
        }
    }
}

impl<K, D> Drop for SyncScheduler<K, D> {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
    }
}

impl<K, D> fmt::Debug for SyncScheduler<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("status", &*self.shared.status.read())
            .field("store", &self.shared.store)
            .finish_non_exhaustive()
    }
}

/// State owned by the scheduler task.
struct Worker<K, D> {
    shared: Arc<Shared<K, D>>,
    jobs: mpsc::UnboundedSender<Job>,
    identity: Option<Identity>,
    subscription: Option<ListenerRegistration>,
    /// Bumped on every identity change; inbound jobs from older
    /// subscriptions are dropped.
    generation: u64,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl<K, D> Worker<K, D>
where
    K: KeyValueStore + 'static,
    D: DocumentStore,
{
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Job>) {
        'outer: loop {
            let retry_at = self.shared.pending.lock().as_ref().map(|p| p.due);

            let job = tokio::select! {
                job = queue.recv() => job,
                () = wait_until(retry_at) => {
                    self.retry_pending().await;
                    continue;
                }
            };

            let Some(job) = job else { break };
            if self.handle(job).await.is_break() {
                break;
            }

            // Jobs queued by the job above (our own echoes) count toward a flush
            while let Ok(job) = queue.try_recv() {
                if self.handle(job).await.is_break() {
                    break 'outer;
                }
            }
            for waiter in self.flush_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }

        self.stop();
    }

    async fn handle(&mut self, job: Job) -> ControlFlow<()> {
        match job {
            Job::Commit {
                event,
                push_allowed,
            } => self.on_commit(event, push_allowed).await,
            Job::Inbound {
                generation,
                document,
            } => {
                if generation == self.generation {
                    self.on_inbound(document);
                } else {
                    debug!(
                        updated_at = document.updated_at(),
                        "dropping snapshot from previous identity"
                    );
                }
            }
            Job::Resync(reply) => {
                let outcome = self.resync().await;
                let _ = reply.send(outcome);
            }
            Job::SetIdentity(identity, reply) => {
                self.attach(identity).await;
                let _ = reply.send(());
            }
            Job::ConnectivityRestored => self.on_connectivity_restored().await,
            Job::Flush(waiter) => self.flush_waiters.push(waiter),
            Job::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_commit(&mut self, event: CommitEvent, push_allowed: bool) {
        // Resync saves its state itself before replying
        if event.origin != CommitOrigin::Resync {
            self.shared.persist(&event.state);
        }

        if !push_allowed {
            if event.origin == CommitOrigin::Local {
                debug!(updated_at = event.updated_at(), "push suppressed by echo guard");
            }
            return;
        }
        let Some(identity) = self.identity.clone() else {
            return;
        };

        let state = event.state;
        match self.try_push(identity, Arc::clone(&state)).await {
            Ok(()) => self.clear_pending_through(state.updated_at),
            Err(e) => self.schedule_retry(state, 1, &e),
        }
    }

    fn on_inbound(&self, document: RemoteDocument) {
        let updated_at = document.updated_at();
        let store = &self.shared.store;

        if store.echo_guard().is_echo(document.origin.as_ref()) {
            debug!(updated_at, "ignoring echo of own push");
            self.shared.stats.lock().echoes_ignored += 1;
            return;
        }
        if !document.timestamped {
            debug!("ignoring remote document without updatedAt");
            self.shared.stats.lock().remote_discarded += 1;
            return;
        }

        match store.replace_from_remote(document.state) {
            MergeOutcome::Replaced { updated_at } => {
                info!(updated_at, "applied remote state");
                self.shared.record_synced(|s| s.remote_replacements += 1);
            }
            MergeOutcome::KeptLocal { local, remote } => {
                debug!(local, remote, "remote state older than local, kept local");
                self.shared.stats.lock().remote_discarded += 1;
            }
        }
    }

    async fn attach(&mut self, identity: Option<Identity>) {
        self.subscription = None;
        self.shared.pending.lock().take();
        self.generation += 1;
        self.identity = identity.clone();

        let Some(identity) = identity else {
            info!("signed out, running local-only");
            self.shared.set_status(SyncStatus::LocalOnly);
            return;
        };
        info!(uid = %identity.uid, "identity attached");
        self.connect(identity).await;
    }

    /// Subscribes to the remote document, then pulls it.
    ///
    /// The listener is registered first so a write landing between the two
    /// calls is delivered as a snapshot; if the pull also sees it, the
    /// duplicate ties and is discarded.
    async fn connect(&mut self, identity: Identity) {
        let mut healthy = true;

        let jobs = self.jobs.clone();
        let generation = self.generation;
        let target = identity.clone();
        let subscribed = self
            .remote_call(move |remote| {
                remote.subscribe(&target, move |document| {
                    let _ = jobs.send(Job::Inbound {
                        generation,
                        document,
                    });
                })
            })
            .await;

        match subscribed {
            Ok(registration) => self.subscription = Some(registration),
            Err(e) => {
                warn!(uid = %identity.uid, error = %e, "failed to subscribe to remote document");
                self.shared.record_failure(&e, |_| {});
                healthy = false;
            }
        }

        if self.pull_and_apply(identity).await.is_err() {
            healthy = false;
        }

        self.shared.set_status(if healthy {
            SyncStatus::Idle
        } else {
            SyncStatus::Error
        });
    }

    /// Pulls the remote document and offers it to the conflict resolver.
    async fn pull_and_apply(&self, identity: Identity) -> SyncResult<()> {
        let uid = identity.uid.clone();
        match self.pull(identity).await? {
            Some(document) if document.timestamped => self.on_inbound(document),
            Some(_) => debug!(uid = %uid, "remote document has no updatedAt"),
            None => debug!(uid = %uid, "no remote document yet"),
        }
        Ok(())
    }

    async fn on_connectivity_restored(&mut self) {
        debug!("connectivity restored");
        if self.subscription.is_none() {
            if let Some(identity) = self.identity.clone() {
                self.connect(identity).await;
            }
        }
        self.retry_pending().await;
    }

    async fn resync(&mut self) -> SyncResult<ResyncOutcome> {
        let Some(identity) = self.identity.clone() else {
            return Err(SyncError::NotSignedIn);
        };
        info!(uid = %identity.uid, "manual resync");

        if self.shared.config.flush_pending_on_resync {
            self.retry_pending().await;
        }

        let Some(document) = self.pull(identity).await? else {
            info!("remote document empty, local state kept");
            self.shared.set_status(SyncStatus::Idle);
            return Ok(ResyncOutcome::RemoteEmpty);
        };

        let updated_at = document.updated_at();
        self.shared.store.force_replace(document.state);
        self.shared.persist(&self.shared.store.read());
        self.shared.record_synced(|s| s.remote_replacements += 1);
        self.shared.set_status(SyncStatus::Synced);
        info!(updated_at, "local state replaced from remote");
        Ok(ResyncOutcome::Replaced { updated_at })
    }

    async fn pull(&self, identity: Identity) -> SyncResult<Option<RemoteDocument>> {
        self.shared.set_status(SyncStatus::Pulling);
        let uid = identity.uid.clone();
        let result = self.remote_call(move |remote| remote.pull(&identity)).await;
        match &result {
            Ok(_) => self.shared.record_synced(|s| s.pulls += 1),
            Err(e) => {
                warn!(uid = %uid, error = %e, "pull failed");
                self.shared.record_failure(e, |s| s.pull_failures += 1);
                self.shared.set_status(SyncStatus::Error);
            }
        }
        result
    }

    async fn try_push(&self, identity: Identity, state: Arc<ApplicationState>) -> SyncResult<()> {
        let origin = self.shared.remote.next_origin();
        // The store may deliver the snapshot of this write before `set` returns
        self.shared.store.echo_guard().record_push(origin);
        self.shared.set_status(SyncStatus::Pushing);

        let result = self
            .remote_call(move |remote| remote.push(&identity, &state, origin))
            .await;
        if result.is_ok() {
            self.shared.record_synced(|s| s.pushes += 1);
        }
        result
    }

    /// Retries the pending push now, if there is one.
    ///
    /// The remote document is pulled first: snapshots written while this
    /// device was offline were never delivered, and a newer remote state
    /// must supersede the pending one instead of being overwritten by it.
    async fn retry_pending(&mut self) {
        let Some(pending) = self.shared.pending.lock().take() else {
            return;
        };
        let Some(identity) = self.identity.clone() else {
            return;
        };
        if let Err(e) = self.pull_and_apply(identity.clone()).await {
            self.shared.stats.lock().retries += 1;
            self.schedule_retry(pending.state, pending.attempts + 1, &e);
            return;
        }
        let current = self.shared.store.read().updated_at;
        if current > pending.state.updated_at {
            debug!(
                updated_at = pending.state.updated_at,
                current, "pending push superseded"
            );
            self.shared.set_status(SyncStatus::Idle);
            return;
        }

        self.shared.stats.lock().retries += 1;
        debug!(
            updated_at = pending.state.updated_at,
            attempt = pending.attempts + 1,
            "retrying push"
        );

        match self.try_push(identity, Arc::clone(&pending.state)).await {
            Ok(()) => self.clear_pending_through(pending.state.updated_at),
            Err(e) => self.schedule_retry(pending.state, pending.attempts + 1, &e),
        }
    }

    fn clear_pending_through(&self, updated_at: u64) {
        let mut pending = self.shared.pending.lock();
        if pending
            .as_ref()
            .is_some_and(|p| p.state.updated_at <= updated_at)
        {
            *pending = None;
        }
        let status = if pending.is_some() {
            SyncStatus::RetryWait
        } else {
            SyncStatus::Synced
        };
        drop(pending);
        self.shared.set_status(status);
    }

    fn schedule_retry(&self, state: Arc<ApplicationState>, failed: u32, error: &SyncError) {
        let updated_at = state.updated_at;
        self.shared.record_failure(error, |s| s.push_failures += 1);

        if !error.is_retryable() {
            warn!(updated_at, error = %error, "push rejected, not retrying");
            self.shared.set_status(SyncStatus::Error);
            return;
        }

        let retry = &self.shared.config.retry;
        if !retry.allows_retry(failed) {
            warn!(updated_at, attempts = failed, error = %error, "giving up on push");
            self.shared.stats.lock().retries_exhausted += 1;
            self.shared.set_status(SyncStatus::Error);
            return;
        }

        let mut pending = self.shared.pending.lock();
        if pending
            .as_ref()
            .is_some_and(|p| p.state.updated_at > updated_at)
        {
            return;
        }
        let delay = retry.delay_for_attempt(failed);
        *pending = Some(PendingPush {
            state,
            attempts: failed,
            due: Instant::now() + delay,
        });
        drop(pending);

        debug!(
            updated_at,
            attempt = failed,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "push queued for retry"
        );
        self.shared.set_status(SyncStatus::RetryWait);
    }

    /// Runs a blocking remote call off the worker, bounded by the request timeout.
    async fn remote_call<T, F>(&self, call: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RemoteSyncAdapter<D>) -> SyncResult<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let timeout = self.shared.config.request_timeout;
        let task = tokio::task::spawn_blocking(move || call(&shared.remote));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SyncError::Internal(e.to_string())),
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "remote call timed out"
                );
                Err(SyncError::Timeout)
            }
        }
    }

    fn stop(&mut self) {
        self.subscription = None;
        self.shared.set_status(SyncStatus::Stopped);
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!("sync worker stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::ManualClock;
    use questline_storage::InMemoryKvStore;
    use questline_sync_server::DocumentServer;
    use serde_json::json;

    fn user() -> Identity {
        Identity::new("u1")
    }

    async fn signed_in(
        server: &Arc<DocumentServer>,
    ) -> SyncScheduler<InMemoryKvStore, Arc<DocumentServer>> {
        SyncScheduler::builder(InMemoryKvStore::new(), Arc::clone(server))
            .with_clock(Arc::new(ManualClock::new(1_000)))
            .with_identity(Some(user()))
            .start()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn local_only_saves_but_never_pushes() {
        let server = Arc::new(DocumentServer::new());
        let scheduler = SyncScheduler::bootstrap(
            SyncConfig::default(),
            InMemoryKvStore::new(),
            Arc::clone(&server),
            None,
        )
        .await
        .unwrap();

        scheduler
            .store()
            .mutate(|s| s.with_collection("gold", json!(10)));
        scheduler.flush().await.unwrap();

        assert_eq!(scheduler.status(), SyncStatus::LocalOnly);
        assert_eq!(scheduler.persistence().load(), Some((*scheduler.store().read()).clone()));
        assert_eq!(server.stats().writes, 0);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn local_commit_is_pushed_and_echo_ignored() {
        let server = Arc::new(DocumentServer::new());
        let scheduler = signed_in(&server).await;

        let ts = scheduler
            .store()
            .mutate(|s| s.with_collection("tasks", json!(["a"])));
        scheduler.flush().await.unwrap();

        let remote = server.peek(&user().document_path()).unwrap();
        assert_eq!(remote["updatedAt"], json!(ts));
        let stats = scheduler.stats();
        assert_eq!(stats.pushes, 1);
        assert_eq!(stats.echoes_ignored, 1);
        assert_eq!(stats.remote_replacements, 0);
        assert_eq!(server.stats().writes, 1);
        assert_eq!(scheduler.store().commit_count(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn startup_adopts_newer_remote_document() {
        let server = Arc::new(DocumentServer::new());
        server
            .set(
                &user().document_path(),
                json!({"updatedAt": 5_000, "gold": 42}),
            )
            .unwrap();

        let scheduler = signed_in(&server).await;
        scheduler.flush().await.unwrap();

        assert_eq!(scheduler.store().read().updated_at, 5_000);
        assert_eq!(scheduler.store().read().collection("gold"), Some(&json!(42)));
        // Adopted state is saved, not pushed back
        assert_eq!(server.stats().writes, 1);
        assert_eq!(scheduler.persistence().load().unwrap().updated_at, 5_000);
        assert_eq!(server.listener_count(&user().document_path()), 1);
        scheduler.shutdown().await;
        assert_eq!(server.listener_count(&user().document_path()), 0);
    }

    #[tokio::test]
    async fn startup_ignores_untimestamped_document() {
        let server = Arc::new(DocumentServer::new());
        server
            .set(&user().document_path(), json!({"gold": 42}))
            .unwrap();

        let scheduler = signed_in(&server).await;
        assert_eq!(scheduler.store().read().updated_at, 0);
        assert!(scheduler.store().read().collection("gold").is_none());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn resync_without_identity() {
        let scheduler = SyncScheduler::bootstrap(
            SyncConfig::default(),
            InMemoryKvStore::new(),
            DocumentServer::new(),
            None,
        )
        .await
        .unwrap();

        assert!(matches!(
            scheduler.manual_resync().await,
            Err(SyncError::NotSignedIn)
        ));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn resync_replaces_even_older_remote() {
        let server = Arc::new(DocumentServer::new());
        let scheduler = signed_in(&server).await;
        scheduler
            .store()
            .mutate(|s| s.with_collection("gold", json!(1)));
        scheduler.flush().await.unwrap();

        // Another client writes an older state
        server
            .set(&user().document_path(), json!({"updatedAt": 10, "gold": 99}))
            .unwrap();
        scheduler.flush().await.unwrap();
        assert_eq!(scheduler.store().read().collection("gold"), Some(&json!(1)));

        let outcome = scheduler.manual_resync().await.unwrap();
        assert_eq!(outcome, ResyncOutcome::Replaced { updated_at: 10 });
        assert_eq!(scheduler.store().read().collection("gold"), Some(&json!(99)));
        assert_eq!(scheduler.persistence().load().unwrap().updated_at, 10);

        // The forced replacement is not pushed back
        scheduler.flush().await.unwrap();
        assert_eq!(server.stats().writes, 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_rejects_later_calls() {
        let server = Arc::new(DocumentServer::new());
        let scheduler = signed_in(&server).await;
        scheduler.shutdown().await;

        assert_eq!(scheduler.status(), SyncStatus::Stopped);
        assert!(matches!(scheduler.flush().await, Err(SyncError::Shutdown)));
        assert!(matches!(
            scheduler.manual_resync().await,
            Err(SyncError::Shutdown)
        ));
    }
}
