//! Keyed background task orchestration.
//!
//! Repository operations run as spawned Tokio tasks; their results come back
//! to the caller through a [`Mailbox`] that the caller drains on its own
//! task. Handlers therefore never run concurrently with the caller's own
//! code.
//!
//! # Keys and coalescing
//!
//! Every submission carries a [`TaskKey`]. While a key is running, further
//! submissions for it attach to the existing run instead of starting a new
//! one, and every subscriber receives the *same* `Arc`'d result exactly once.
//! A run whose task dies without a result (it panicked) still delivers a
//! [`CmisError::Interrupted`] to each subscriber.
//!
//! ```text
//! Idle ──submit──▶ Running ──ok──▶ Succeeded
//!                     │    └─err─▶ Failed
//!                     └─cancel──▶ Cancelled
//! ```
//!
//! # Screens
//!
//! Subscribers belong to a [`ScreenId`]. Closing a screen drops its
//! subscriptions, cancels runs nobody else is waiting for, and suppresses
//! deliveries already queued for it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use cmis_explorer_core::error::CmisError;

/// Result shared between all subscribers of one run.
pub type Shared<T> = Arc<Result<T, CmisError>>;

type Erased = Arc<dyn Any + Send + Sync>;
type Handler = Box<dyn FnOnce(Erased) + Send>;
type Interrupt = Box<dyn FnOnce(CmisError) -> Erased + Send>;

/// Terminal states remembered for [`TaskOrchestrator::state`].
const STATE_HISTORY: usize = 256;

/// Identifies one logical operation, e.g. "list this folder on this server".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn listing(server_id: &str, url: &str) -> Self {
        Self(format!("{}:list:{}", server_id, url))
    }

    pub fn detail(server_id: &str, url: &str) -> Self {
        Self(format!("{}:detail:{}", server_id, url))
    }

    pub fn capabilities(server_id: &str) -> Self {
        Self(format!("{}:capabilities", server_id))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token for the screen (or any other owner) that results are delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// What a call to [`TaskOrchestrator::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// A new run was started for the key.
    Started,
    /// The caller was attached to the run already in flight.
    Attached,
    /// The owning screen is closed; nothing was scheduled.
    Ignored,
}

struct Subscriber {
    owner: ScreenId,
    alive: Arc<AtomicBool>,
    handler: Handler,
}

struct Run {
    id: u64,
    subscribers: Vec<Subscriber>,
    /// Builds the failure result, typed for this run's subscribers.
    interrupt: Interrupt,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct Table {
    runs: HashMap<TaskKey, Run>,
    /// Terminal states, stamped with `seq` so the oldest can be evicted.
    states: HashMap<TaskKey, (TaskState, u64)>,
    seq: u64,
    screens: HashMap<ScreenId, Arc<AtomicBool>>,
}

impl Table {
    fn record(&mut self, key: &TaskKey, state: TaskState) {
        self.seq += 1;
        self.states.insert(key.clone(), (state, self.seq));
        if self.states.len() > STATE_HISTORY {
            let oldest = self
                .states
                .iter()
                .min_by_key(|(_, (_, seq))| *seq)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.states.remove(&oldest);
            }
        }
    }

    /// Remove run `run_id` of `key` and record `state`. `None` when the run
    /// is stale (cancelled or replaced).
    fn finish(&mut self, key: &TaskKey, run_id: u64, state: TaskState) -> Option<Run> {
        if !self.runs.get(key).is_some_and(|run| run.id == run_id) {
            return None;
        }
        let run = self.runs.remove(key)?;
        self.record(key, state);
        Some(run)
    }
}

struct Inner {
    table: Mutex<Table>,
    workers: Arc<Semaphore>,
    outbox: mpsc::UnboundedSender<Delivery>,
    next_id: AtomicU64,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of run `run_id` and queue one delivery per
    /// subscriber. Stale runs (cancelled or replaced) are ignored.
    fn complete(&self, key: &TaskKey, run_id: u64, ok: bool, result: Erased) {
        let state = if ok {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        let Some(run) = self.table().finish(key, run_id, state) else {
            debug!(%key, run_id, "discarding result of stale run");
            return;
        };
        debug!(%key, run_id, subscribers = run.subscribers.len(), ?state, "run finished");
        self.deliver(key, run.subscribers, result);
    }

    /// Fail run `run_id`, whose task ended without a result.
    fn abandon(&self, key: &TaskKey, run_id: u64) {
        let Some(run) = self.table().finish(key, run_id, TaskState::Failed) else {
            return;
        };
        warn!(%key, run_id, "task ended without a result");
        let result = (run.interrupt)(CmisError::Interrupted(key.to_string()));
        self.deliver(key, run.subscribers, result);
    }

    fn deliver(&self, key: &TaskKey, subscribers: Vec<Subscriber>, result: Erased) {
        for sub in subscribers {
            let result = result.clone();
            let handler = sub.handler;
            let delivery = Delivery {
                key: key.clone(),
                alive: sub.alive,
                run: Box::new(move || handler(result)),
            };
            if self.outbox.send(delivery).is_err() {
                warn!(%key, "mailbox closed, dropping delivery");
            }
        }
    }

    fn cancel_locked(table: &mut Table, key: &TaskKey) -> bool {
        let Some(run) = table.runs.remove(key) else {
            return false;
        };
        if let Some(abort) = run.abort {
            abort.abort();
        }
        table.record(key, TaskState::Cancelled);
        debug!(%key, run_id = run.id, "run cancelled");
        true
    }
}

/// Calls [`Inner::abandon`] unless the run reported a result. Dropped
/// during unwinding when the work panics.
struct RunGuard {
    inner: Arc<Inner>,
    key: TaskKey,
    run_id: u64,
    finished: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.abandon(&self.key, self.run_id);
        }
    }
}

/// Runs keyed operations on a bounded pool of Tokio tasks.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

impl TaskOrchestrator {
    /// Create an orchestrator running at most `max_workers` operations at a
    /// time, and the mailbox its results are delivered to.
    pub fn new(max_workers: usize) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            table: Mutex::new(Table::default()),
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
            outbox: tx,
            next_id: AtomicU64::new(1),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            Mailbox { inbox: rx },
        )
    }

    pub fn open_screen(&self) -> ScreenId {
        let id = ScreenId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .table()
            .screens
            .insert(id, Arc::new(AtomicBool::new(true)));
        id
    }

    /// Tear down `screen`: nothing is delivered to it any more, and runs
    /// that no other screen is waiting for are cancelled.
    pub fn close_screen(&self, screen: ScreenId) {
        let mut table = self.inner.table();
        if let Some(alive) = table.screens.remove(&screen) {
            alive.store(false, Ordering::SeqCst);
        }

        let mut orphaned = Vec::new();
        for (key, run) in table.runs.iter_mut() {
            let before = run.subscribers.len();
            run.subscribers.retain(|s| s.owner != screen);
            if before > 0 && run.subscribers.is_empty() {
                orphaned.push(key.clone());
            }
        }
        for key in orphaned {
            Inner::cancel_locked(&mut table, &key);
        }
    }

    /// Run `work` under `key` and hand its result to `handler` on the
    /// mailbox owner's task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<T, F, Fut, H>(&self, owner: ScreenId, key: TaskKey, work: F, handler: H) -> Submitted
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CmisError>> + Send + 'static,
        H: FnOnce(Shared<T>) + Send + 'static,
    {
        let mut table = self.inner.table();
        let Some(alive) = table.screens.get(&owner).cloned() else {
            warn!(%key, "submission from a closed screen ignored");
            return Submitted::Ignored;
        };

        let handler: Handler = Box::new(move |erased: Erased| match erased.downcast::<Result<T, CmisError>>() {
            Ok(result) => handler(result),
            Err(_) => warn!("result type does not match the subscriber, dropping"),
        });
        let subscriber = Subscriber {
            owner,
            alive,
            handler,
        };

        if let Some(run) = table.runs.get_mut(&key) {
            run.subscribers.push(subscriber);
            debug!(%key, run_id = run.id, "attached to running task");
            return Submitted::Attached;
        }

        let run_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task_key = key.clone();
        // The table lock is held until the run is registered, so `complete`
        // always finds it.
        let handle = tokio::spawn(async move {
            let mut guard = RunGuard {
                inner: inner.clone(),
                key: task_key,
                run_id,
                finished: false,
            };
            let Ok(_permit) = inner.workers.clone().acquire_owned().await else {
                return;
            };
            let result = work().await;
            let ok = result.is_ok();
            guard.finished = true;
            inner.complete(&guard.key, run_id, ok, Arc::new(result));
        });

        table.runs.insert(
            key.clone(),
            Run {
                id: run_id,
                subscribers: vec![subscriber],
                interrupt: Box::new(|err| Arc::new(Err::<T, CmisError>(err)) as Erased),
                abort: Some(handle.abort_handle()),
            },
        );
        debug!(%key, run_id, "task started");
        Submitted::Started
    }

    /// Cancel the run for `key`. Its result, if it still arrives, is
    /// discarded. Returns `false` when nothing was running.
    pub fn cancel(&self, key: &TaskKey) -> bool {
        Inner::cancel_locked(&mut self.inner.table(), key)
    }

    /// Cancel every run in flight.
    pub fn shutdown(&self) {
        let mut table = self.inner.table();
        let keys: Vec<TaskKey> = table.runs.keys().cloned().collect();
        for key in keys {
            Inner::cancel_locked(&mut table, &key);
        }
    }

    pub fn state(&self, key: &TaskKey) -> TaskState {
        let table = self.inner.table();
        if table.runs.contains_key(key) {
            return TaskState::Running;
        }
        table
            .states
            .get(key)
            .map_or(TaskState::Idle, |(state, _)| *state)
    }
}

struct Delivery {
    key: TaskKey,
    alive: Arc<AtomicBool>,
    run: Box<dyn FnOnce() + Send>,
}

/// Outcome of dispatching one queued delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The subscriber's handler ran.
    Delivered,
    /// The subscriber's screen was closed after the result was queued.
    Suppressed,
}

/// Receiving end of task results. Handlers run inside `dispatch_*` calls.
pub struct Mailbox {
    inbox: mpsc::UnboundedReceiver<Delivery>,
}

impl Mailbox {
    /// Wait for the next delivery and dispatch it. `None` once the
    /// orchestrator is gone and the queue is drained.
    pub async fn dispatch_next(&mut self) -> Option<Dispatched> {
        let delivery = self.inbox.recv().await?;
        Some(dispatch(delivery))
    }

    /// Dispatch everything already queued without waiting. Returns the
    /// number of handlers that ran.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(delivery) = self.inbox.try_recv() {
            if dispatch(delivery) == Dispatched::Delivered {
                delivered += 1;
            }
        }
        delivered
    }
}

fn dispatch(delivery: Delivery) -> Dispatched {
    if !delivery.alive.load(Ordering::SeqCst) {
        debug!(key = %delivery.key, "delivery suppressed");
        return Dispatched::Suppressed;
    }
    (delivery.run)();
    Dispatched::Delivered
}
