//! # Thread Manager
//!
//! Owns every named thread and pool the engine starts.
//!
//! ```text
//! ┌──────────────── ThreadManager ─────────────────┐
//! │ Mutex<Inner>                                   │
//! │   threads: name ─► ThreadRecord ──► control ◄──┼── worker thread
//! │   pools:   name ─► PoolRecord   ──► TaskQueue ◄┼── submit_task
//! │ active: AtomicUsize (bumped by the threads)    │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! The table lock is held only for bookkeeping. Joins, pause waits and user
//! callables always run without it, so a thread body may call back into the
//! manager.

use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use pitlane_core::{AtomicState, TaskQueue};

use super::native;
use super::types::{NativeHint, ThreadInfo, ThreadKind, ThreadPriority, ThreadStatus};
use crate::error::{ThreadError, ThreadResult};
use crate::profiler::Profiler;

/// Unit of work executed by a pool worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

type ThreadBody = Box<dyn FnMut() + Send + 'static>;

/// Idle poll interval of a pool worker with an empty queue.
const WORKER_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Per-thread flags shared between the manager and the thread itself.
struct ThreadControl {
    status: AtomicState<ThreadStatus>,
    stop: AtomicBool,
    paused: Mutex<bool>,
    wake: Condvar,
}

impl ThreadControl {
    fn new() -> Self {
        Self {
            status: AtomicState::new(ThreadStatus::Idle),
            stop: AtomicBool::new(false),
            paused: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    #[inline]
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Sets the stop flag and releases a parked thread.
    fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        let mut paused = self.paused.lock();
        *paused = false;
        self.wake.notify_all();
    }

    /// Publishes the terminal status and wakes every `wait_stopped` caller.
    fn mark_stopped(&self) {
        let _paused = self.paused.lock();
        self.status.set(ThreadStatus::Stopped);
        self.wake.notify_all();
    }

    /// Blocks until the thread has published Stopped.
    fn wait_stopped(&self) {
        let mut paused = self.paused.lock();
        while self.status.get() != ThreadStatus::Stopped {
            self.wake.wait(&mut paused);
        }
    }

    /// Parks the calling thread while paused. Returns `false` if it was
    /// woken to stop.
    fn wait_while_paused(&self) -> bool {
        let mut paused = self.paused.lock();
        if *paused {
            while *paused && !self.stop_requested() {
                self.wake.wait(&mut paused);
            }
            self.status
                .compare_and_swap(ThreadStatus::Paused, ThreadStatus::Running);
        }
        !self.stop_requested()
    }
}

struct ThreadRecord {
    kind: ThreadKind,
    priority: ThreadPriority,
    pool: Option<String>,
    native_priority: NativeHint,
    control: Arc<ThreadControl>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl ThreadRecord {
    fn status(&self) -> ThreadStatus {
        self.control.status.get()
    }

    fn info(&self, name: &str) -> ThreadInfo {
        ThreadInfo {
            name: name.to_owned(),
            kind: self.kind,
            priority: self.priority,
            status: self.status(),
            native_priority: self.native_priority,
            pool: self.pool.clone(),
        }
    }
}

struct PoolRecord {
    workers: Vec<String>,
    queue: Arc<TaskQueue<Task>>,
}

#[derive(Default)]
struct Inner {
    initialized: bool,
    max_threads: usize,
    threads: HashMap<String, ThreadRecord>,
    pools: HashMap<String, PoolRecord>,
}

impl Inner {
    fn live_count(&self) -> usize {
        self.threads.values().filter(|r| r.status().is_live()).count()
    }
}

/// Registry of named threads and worker pools.
pub struct ThreadManager {
    inner: Mutex<Inner>,
    active: Arc<AtomicUsize>,
    profiler: Option<Arc<Profiler>>,
}

impl ThreadManager {
    /// Creates an uninitialized manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            active: Arc::new(AtomicUsize::new(0)),
            profiler: None,
        }
    }

    /// Creates a manager whose pool workers time each task under
    /// `"{pool}_Task"`.
    #[must_use]
    pub fn with_profiler(profiler: Arc<Profiler>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            active: Arc::new(AtomicUsize::new(0)),
            profiler: Some(profiler),
        }
    }

    /// Enables the manager with a live-thread cap.
    ///
    /// A cap of 0 resolves to the hardware concurrency, at least 2.
    ///
    /// # Errors
    ///
    /// [`ThreadError::AlreadyInitialized`] if called twice without `shutdown`.
    pub fn initialize(&self, max_threads: usize) -> ThreadResult<()> {
        let mut inner = self.inner.lock();
        if inner.initialized {
            tracing::warn!("Thread manager already initialized");
            return Err(ThreadError::AlreadyInitialized);
        }

        inner.max_threads = if max_threads == 0 {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(2)
                .max(2)
        } else {
            max_threads
        };
        inner.initialized = true;

        tracing::info!(max_threads = inner.max_threads, "Thread manager initialized");
        Ok(())
    }

    /// Whether `initialize` has run (and `shutdown` has not).
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Spawns a named thread running `body`.
    ///
    /// `Transient` threads invoke `body` once. `Looping` threads invoke it
    /// until stopped, checking for pause and stop between invocations. A
    /// panic in `body` is logged and ends the thread.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::NotInitialized`]
    /// - [`ThreadError::DuplicateThread`] if a live thread has this name
    /// - [`ThreadError::CapacityExceeded`] if the cap is reached
    /// - [`ThreadError::Spawn`] if the OS refuses the thread
    pub fn create_thread<F>(
        &self,
        name: &str,
        kind: ThreadKind,
        priority: ThreadPriority,
        body: F,
    ) -> ThreadResult<()>
    where
        F: FnMut() + Send + 'static,
    {
        let stale = {
            let mut inner = self.inner.lock();
            if !inner.initialized {
                tracing::error!(thread = %name, "Thread manager not initialized");
                return Err(ThreadError::NotInitialized);
            }
            if inner.threads.get(name).is_some_and(|r| r.status().is_live()) {
                tracing::error!(thread = %name, "Thread already exists");
                return Err(ThreadError::DuplicateThread(name.to_owned()));
            }
            let live = inner.live_count();
            if live >= inner.max_threads {
                tracing::error!(thread = %name, live, max = inner.max_threads, "Maximum thread count reached");
                return Err(ThreadError::CapacityExceeded {
                    live,
                    requested: 1,
                    max: inner.max_threads,
                });
            }
            self.spawn_locked(&mut inner, name, kind, priority, None, Box::new(body))?
        };

        // A previous, finished thread of the same name
        if let Some(handle) = stale {
            join_quietly(name, handle);
        }
        Ok(())
    }

    /// Registers and spawns one thread. Returns the handle of a Stopped
    /// record the new one replaced, for the caller to join after unlocking.
    fn spawn_locked(
        &self,
        inner: &mut Inner,
        name: &str,
        kind: ThreadKind,
        priority: ThreadPriority,
        pool: Option<&str>,
        body: ThreadBody,
    ) -> ThreadResult<Option<JoinHandle<()>>> {
        if let Some(existing) = inner.threads.get(name) {
            if existing.status().is_live() {
                tracing::error!(thread = %name, "Thread already exists");
                return Err(ThreadError::DuplicateThread(name.to_owned()));
            }
        }
        if name.contains('\0') {
            return Err(ThreadError::Spawn {
                name: name.to_owned(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "thread name contains a NUL byte",
                ),
            });
        }

        let control = Arc::new(ThreadControl::new());
        let handle = {
            let control = Arc::clone(&control);
            let active = Arc::clone(&self.active);
            let thread_name = name.to_owned();
            thread::Builder::new()
                .name(name.to_owned())
                .spawn(move || run_thread(&thread_name, kind, &control, &active, body))
                .map_err(|source| {
                    tracing::error!(thread = %name, error = %source, "Failed to spawn thread");
                    ThreadError::Spawn {
                        name: name.to_owned(),
                        source,
                    }
                })?
        };

        let native_priority = native::apply_priority(&handle, priority);
        if !native_priority.is_honored() {
            tracing::warn!(thread = %name, ?priority, outcome = ?native_priority, "Failed to set native thread priority");
        }

        let previous = inner.threads.insert(
            name.to_owned(),
            ThreadRecord {
                kind,
                priority,
                pool: pool.map(str::to_owned),
                native_priority,
                control,
                thread_id: handle.thread().id(),
                handle: Some(handle),
            },
        );

        tracing::info!(thread = %name, ?kind, ?priority, "Created thread");
        Ok(previous.and_then(|mut record| record.handle.take()))
    }

    /// Stops a thread and waits for it to finish.
    ///
    /// Stopping an already Stopped thread succeeds without side effects. A
    /// Looping thread finishes its current invocation before it observes
    /// the request. Concurrent callers all return once the thread has
    /// finished. A thread stopping itself only raises its stop flag; it
    /// reaches Stopped when its current invocation returns.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`].
    pub fn stop_thread(&self, name: &str) -> ThreadResult<()> {
        let (control, thread_id, handle) = {
            let mut inner = self.inner.lock();
            let Some(record) = inner.threads.get_mut(name) else {
                tracing::error!(thread = %name, "Thread not found");
                return Err(ThreadError::UnknownThread(name.to_owned()));
            };
            if record.handle.is_none() && record.status() == ThreadStatus::Stopped {
                tracing::warn!(thread = %name, "Thread already stopped");
                return Ok(());
            }
            // A self-stop leaves the handle for whoever joins later
            let handle = if record.thread_id == thread::current().id() {
                None
            } else {
                record.handle.take()
            };
            (Arc::clone(&record.control), record.thread_id, handle)
        };

        control.request_stop();
        if thread_id == thread::current().id() {
            tracing::info!(thread = %name, "Thread asked to stop itself");
            return Ok(());
        }
        await_exit(name, &control, handle);

        tracing::info!(thread = %name, "Stopped thread");
        Ok(())
    }

    /// Asks a thread to park before its next invocation.
    ///
    /// The status reads Paused from this call on, even while the current
    /// invocation is still finishing.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`], or [`ThreadError::InvalidTransition`]
    /// unless the thread is Running (or Idle, not yet started).
    pub fn pause_thread(&self, name: &str) -> ThreadResult<()> {
        let control = self.control(name)?;
        let mut paused = control.paused.lock();

        let status = control.status.get();
        let parked = !control.stop_requested()
            && matches!(status, ThreadStatus::Running | ThreadStatus::Idle)
            && control.status.compare_and_swap(status, ThreadStatus::Paused);
        if !parked {
            tracing::warn!(thread = %name, ?status, "Thread not running, cannot pause");
            return Err(ThreadError::InvalidTransition {
                name: name.to_owned(),
                operation: "pause",
                status: control.status.get(),
            });
        }
        *paused = true;
        drop(paused);

        tracing::info!(thread = %name, "Paused thread");
        Ok(())
    }

    /// Releases a paused thread.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`], or [`ThreadError::InvalidTransition`]
    /// unless the thread is Paused.
    pub fn resume_thread(&self, name: &str) -> ThreadResult<()> {
        let control = self.control(name)?;
        let mut paused = control.paused.lock();

        if !control
            .status
            .compare_and_swap(ThreadStatus::Paused, ThreadStatus::Running)
        {
            let status = control.status.get();
            tracing::warn!(thread = %name, ?status, "Thread not paused, cannot resume");
            return Err(ThreadError::InvalidTransition {
                name: name.to_owned(),
                operation: "resume",
                status,
            });
        }
        *paused = false;
        control.wake.notify_all();
        drop(paused);

        tracing::info!(thread = %name, "Resumed thread");
        Ok(())
    }

    fn control(&self, name: &str) -> ThreadResult<Arc<ThreadControl>> {
        self.inner
            .lock()
            .threads
            .get(name)
            .map(|record| Arc::clone(&record.control))
            .ok_or_else(|| {
                tracing::error!(thread = %name, "Thread not found");
                ThreadError::UnknownThread(name.to_owned())
            })
    }

    /// Whether a record (live or Stopped) exists under `name`.
    #[must_use]
    pub fn thread_exists(&self, name: &str) -> bool {
        self.inner.lock().threads.contains_key(name)
    }

    /// Current status of a thread.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`].
    pub fn thread_status(&self, name: &str) -> ThreadResult<ThreadStatus> {
        self.thread_info(name).map(|info| info.status)
    }

    /// Logical priority of a thread.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`].
    pub fn thread_priority(&self, name: &str) -> ThreadResult<ThreadPriority> {
        self.thread_info(name).map(|info| info.priority)
    }

    /// Snapshot of a thread record.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`].
    pub fn thread_info(&self, name: &str) -> ThreadResult<ThreadInfo> {
        self.inner
            .lock()
            .threads
            .get(name)
            .map(|record| record.info(name))
            .ok_or_else(|| ThreadError::UnknownThread(name.to_owned()))
    }

    /// Threads currently inside their run loop.
    #[inline]
    #[must_use]
    pub fn active_thread_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Records that count against the cap (every status except Stopped).
    #[must_use]
    pub fn live_thread_count(&self) -> usize {
        self.inner.lock().live_count()
    }

    /// The resolved cap, 0 before `initialize`.
    #[must_use]
    pub fn max_thread_count(&self) -> usize {
        self.inner.lock().max_threads
    }

    /// Starts `count` Looping workers named `"{pool}_Worker{i}"` sharing one
    /// task queue.
    ///
    /// Either every worker starts or none stays registered.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::NotInitialized`]
    /// - [`ThreadError::DuplicatePool`]
    /// - [`ThreadError::CapacityExceeded`] if `live + count > max`
    /// - any error of [`create_thread`](Self::create_thread) for a worker
    pub fn create_thread_pool(
        &self,
        pool: &str,
        count: usize,
        priority: ThreadPriority,
    ) -> ThreadResult<()> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            tracing::error!(pool = %pool, "Thread manager not initialized");
            return Err(ThreadError::NotInitialized);
        }
        if inner.pools.contains_key(pool) {
            tracing::error!(pool = %pool, "Thread pool already exists");
            return Err(ThreadError::DuplicatePool(pool.to_owned()));
        }
        let live = inner.live_count();
        if live + count > inner.max_threads {
            tracing::error!(pool = %pool, live, count, max = inner.max_threads, "Maximum thread count would be exceeded");
            return Err(ThreadError::CapacityExceeded {
                live,
                requested: count,
                max: inner.max_threads,
            });
        }

        let queue: Arc<TaskQueue<Task>> = Arc::new(TaskQueue::new());
        let mut workers = Vec::with_capacity(count);
        let mut stale = Vec::new();

        for i in 0..count {
            let worker = format!("{pool}_Worker{i}");
            let body = self.worker_body(pool, Arc::clone(&queue));
            match self.spawn_locked(&mut inner, &worker, ThreadKind::Looping, priority, Some(pool), body) {
                Ok(previous) => {
                    stale.extend(previous.map(|handle| (worker.clone(), handle)));
                    workers.push(worker);
                }
                Err(err) => {
                    let rollback: Vec<_> = workers
                        .iter()
                        .filter_map(|w| inner.threads.remove(w).map(|record| (w.clone(), record)))
                        .collect();
                    drop(inner);

                    for (name, mut record) in rollback {
                        record.control.request_stop();
                        if let Some(handle) = record.handle.take() {
                            join_quietly(&name, handle);
                        }
                    }
                    for (name, handle) in stale {
                        join_quietly(&name, handle);
                    }
                    tracing::error!(pool = %pool, error = %err, "Thread pool creation rolled back");
                    return Err(err);
                }
            }
        }

        inner.pools.insert(pool.to_owned(), PoolRecord { workers, queue });
        drop(inner);

        for (name, handle) in stale {
            join_quietly(&name, handle);
        }
        tracing::info!(pool = %pool, workers = count, "Created thread pool");
        Ok(())
    }

    fn worker_body(&self, pool: &str, queue: Arc<TaskQueue<Task>>) -> ThreadBody {
        let pool = pool.to_owned();
        let label = format!("{pool}_Task");
        let profiler = self.profiler.clone();

        Box::new(move || {
            let Some(task) = queue.try_pop() else {
                thread::sleep(WORKER_IDLE_SLEEP);
                return;
            };
            let _scope = profiler.as_deref().map(|p| p.scope(&label));
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                tracing::error!(pool = %pool, "Task panicked: {}", panic_message(payload.as_ref()));
            }
        })
    }

    /// Whether a pool exists under `pool`.
    #[must_use]
    pub fn pool_exists(&self, pool: &str) -> bool {
        self.inner.lock().pools.contains_key(pool)
    }

    /// Worker thread names of a pool, in index order.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownPool`].
    pub fn pool_workers(&self, pool: &str) -> ThreadResult<Vec<String>> {
        self.inner
            .lock()
            .pools
            .get(pool)
            .map(|record| record.workers.clone())
            .ok_or_else(|| ThreadError::UnknownPool(pool.to_owned()))
    }

    /// Tasks queued in a pool and not yet picked up.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownPool`].
    pub fn pending_tasks(&self, pool: &str) -> ThreadResult<usize> {
        self.inner
            .lock()
            .pools
            .get(pool)
            .map(|record| record.queue.len())
            .ok_or_else(|| ThreadError::UnknownPool(pool.to_owned()))
    }

    /// Queues `task` on a pool. Any idle worker may pick it up.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownPool`].
    pub fn submit_task<F>(&self, pool: &str, task: F) -> ThreadResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = self.inner.lock();
        let Some(record) = inner.pools.get(pool) else {
            tracing::error!(pool = %pool, "Thread pool not found");
            return Err(ThreadError::UnknownPool(pool.to_owned()));
        };
        record.queue.push(Box::new(task));
        Ok(())
    }

    /// Applies a new scheduling priority. The logical priority changes only
    /// if the OS honored the hint.
    ///
    /// # Errors
    ///
    /// [`ThreadError::UnknownThread`], or [`ThreadError::InvalidTransition`]
    /// for a thread that has already finished.
    pub fn set_thread_priority(&self, name: &str, priority: ThreadPriority) -> ThreadResult<NativeHint> {
        let mut inner = self.inner.lock();
        let record = inner
            .threads
            .get_mut(name)
            .ok_or_else(|| ThreadError::UnknownThread(name.to_owned()))?;
        let handle = running_handle(name, record, "set priority of")?;

        let hint = native::apply_priority(handle, priority);
        if hint.is_honored() {
            record.priority = priority;
        } else {
            tracing::warn!(thread = %name, ?priority, outcome = ?hint, "Failed to set native thread priority");
        }
        Ok(hint)
    }

    /// Restricts a thread to the cores in `core_mask` (bit N = core N).
    ///
    /// # Errors
    ///
    /// Same as [`set_thread_priority`](Self::set_thread_priority).
    pub fn set_thread_affinity(&self, name: &str, core_mask: u64) -> ThreadResult<NativeHint> {
        let mut inner = self.inner.lock();
        let record = inner
            .threads
            .get_mut(name)
            .ok_or_else(|| ThreadError::UnknownThread(name.to_owned()))?;
        let handle = running_handle(name, record, "set affinity of")?;

        let hint = native::apply_affinity(handle, core_mask);
        if !hint.is_honored() {
            tracing::warn!(thread = %name, core_mask, outcome = ?hint, "Failed to set thread affinity");
        }
        Ok(hint)
    }

    /// Stops and joins every thread, then forgets all threads and pools.
    ///
    /// Paused threads are released so they can observe the stop. Calling
    /// this on an uninitialized manager does nothing.
    pub fn shutdown(&self) {
        let records: Vec<(String, ThreadRecord)> = {
            let mut inner = self.inner.lock();
            if !inner.initialized {
                return;
            }
            tracing::info!(threads = inner.threads.len(), pools = inner.pools.len(), "Shutting down thread manager");
            inner.initialized = false;
            inner.pools.clear();
            inner.threads.drain().collect()
        };

        for (_, record) in &records {
            record.control.request_stop();
        }
        for (name, mut record) in records {
            if record.thread_id == thread::current().id() {
                // Shutdown from a managed thread; it finishes on its own
                continue;
            }
            await_exit(&name, &record.control, record.handle.take());
        }

        self.active.store(0, Ordering::SeqCst);
    }
}

impl Default for ThreadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ThreadManager")
            .field("initialized", &inner.initialized)
            .field("max_threads", &inner.max_threads)
            .field("threads", &inner.threads.len())
            .field("pools", &inner.pools.len())
            .field("active", &self.active_thread_count())
            .finish()
    }
}

fn running_handle<'a>(
    name: &str,
    record: &'a ThreadRecord,
    operation: &'static str,
) -> ThreadResult<&'a JoinHandle<()>> {
    match (&record.handle, record.status()) {
        (Some(handle), status) if status.is_live() => Ok(handle),
        (_, status) => Err(ThreadError::InvalidTransition {
            name: name.to_owned(),
            operation,
            status,
        }),
    }
}

/// Thread entry point: status bookkeeping around the pause/invoke loop.
fn run_thread(
    name: &str,
    kind: ThreadKind,
    control: &ThreadControl,
    active: &AtomicUsize,
    mut body: ThreadBody,
) {
    control
        .status
        .compare_and_swap(ThreadStatus::Idle, ThreadStatus::Running);
    active.fetch_add(1, Ordering::SeqCst);
    tracing::info!(thread = %name, "Thread started");

    while !control.stop_requested() {
        if !control.wait_while_paused() {
            break;
        }

        if let Err(payload) = catch_unwind(AssertUnwindSafe(&mut body)) {
            tracing::error!(thread = %name, "Thread panicked: {}", panic_message(payload.as_ref()));
            break;
        }

        if kind == ThreadKind::Transient {
            break;
        }
    }

    control.status.set(ThreadStatus::Stopping);
    tracing::info!(thread = %name, "Thread stopping");
    // Shutdown may already have reset the counter
    let _ = active.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    control.mark_stopped();
}

/// Waits for another thread to finish: joins it if we hold the handle,
/// otherwise waits for whoever does.
fn await_exit(name: &str, control: &ThreadControl, handle: Option<JoinHandle<()>>) {
    match handle {
        Some(handle) => join_quietly(name, handle),
        None => control.wait_stopped(),
    }
}

fn join_quietly(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!(thread = %name, "Thread terminated by an uncaught panic");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    fn manager(max: usize) -> ThreadManager {
        let manager = ThreadManager::new();
        manager.initialize(max).unwrap();
        manager
    }

    #[test]
    fn test_initialize_twice() {
        let manager = manager(4);
        assert!(matches!(manager.initialize(4), Err(ThreadError::AlreadyInitialized)));
        assert_eq!(manager.max_thread_count(), 4);
    }

    #[test]
    fn test_zero_cap_uses_hardware_concurrency() {
        let manager = manager(0);
        assert!(manager.max_thread_count() >= 2);
    }

    #[test]
    fn test_create_before_initialize() {
        let manager = ThreadManager::new();
        let result = manager.create_thread("Early", ThreadKind::Transient, ThreadPriority::Normal, || {});
        assert!(matches!(result, Err(ThreadError::NotInitialized)));
        assert!(matches!(
            manager.create_thread_pool("Pool", 1, ThreadPriority::Normal),
            Err(ThreadError::NotInitialized)
        ));
    }

    #[test]
    fn test_transient_runs_once() {
        let manager = manager(4);
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        manager
            .create_thread("Once", ThreadKind::Transient, ThreadPriority::Normal, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            manager.thread_status("Once").unwrap() == ThreadStatus::Stopped
        }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(manager.live_thread_count(), 0);
        assert_eq!(manager.active_thread_count(), 0);
    }

    #[test]
    fn test_looping_runs_until_stopped() {
        let manager = manager(4);
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        manager
            .create_thread("Loop", ThreadKind::Looping, ThreadPriority::Low, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::SeqCst) >= 3));
        manager.stop_thread("Loop").unwrap();
        assert_eq!(manager.thread_status("Loop").unwrap(), ThreadStatus::Stopped);

        let after_stop = runs.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);

        // Stopping again is a no-op
        manager.stop_thread("Loop").unwrap();
    }

    #[test]
    fn test_panicking_thread_is_contained() {
        let manager = manager(2);
        manager
            .create_thread("Crash", ThreadKind::Looping, ThreadPriority::Normal, || {
                panic!("engine failure");
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            manager.thread_status("Crash").unwrap() == ThreadStatus::Stopped
        }));
        assert_eq!(manager.active_thread_count(), 0);
    }

    #[test]
    fn test_stopped_name_can_be_reused() {
        let manager = manager(1);
        manager
            .create_thread("Lap", ThreadKind::Transient, ThreadPriority::Normal, || {})
            .unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            manager.thread_status("Lap").unwrap() == ThreadStatus::Stopped
        }));

        // The Stopped record neither blocks the name nor the single slot
        manager
            .create_thread("Lap", ThreadKind::Transient, ThreadPriority::High, || {})
            .unwrap();
        assert_eq!(manager.thread_priority("Lap").unwrap(), ThreadPriority::High);
    }

    #[test]
    fn test_unknown_names() {
        let manager = manager(2);
        assert!(matches!(manager.stop_thread("Ghost"), Err(ThreadError::UnknownThread(_))));
        assert!(matches!(manager.pause_thread("Ghost"), Err(ThreadError::UnknownThread(_))));
        assert!(matches!(manager.resume_thread("Ghost"), Err(ThreadError::UnknownThread(_))));
        assert!(matches!(manager.thread_status("Ghost"), Err(ThreadError::UnknownThread(_))));
        assert!(matches!(
            manager.set_thread_priority("Ghost", ThreadPriority::High),
            Err(ThreadError::UnknownThread(_))
        ));
        assert!(matches!(manager.set_thread_affinity("Ghost", 1), Err(ThreadError::UnknownThread(_))));
        assert!(matches!(manager.submit_task("NoPool", || {}), Err(ThreadError::UnknownPool(_))));
        assert!(matches!(manager.pending_tasks("NoPool"), Err(ThreadError::UnknownPool(_))));
        assert!(!manager.thread_exists("Ghost"));
        assert!(!manager.pool_exists("NoPool"));
    }

    #[test]
    fn test_resume_requires_paused() {
        let manager = manager(2);
        manager
            .create_thread("Spin", ThreadKind::Looping, ThreadPriority::Normal, || {
                thread::sleep(Duration::from_millis(1));
            })
            .unwrap();

        let err = manager.resume_thread("Spin").unwrap_err();
        assert!(matches!(
            err,
            ThreadError::InvalidTransition { operation: "resume", .. }
        ));

        manager.pause_thread("Spin").unwrap();
        assert!(matches!(
            manager.pause_thread("Spin"),
            Err(ThreadError::InvalidTransition { status: ThreadStatus::Paused, .. })
        ));
        manager.resume_thread("Spin").unwrap();
        manager.shutdown();
    }

    #[test]
    fn test_pool_worker_names_and_kind() {
        let manager = manager(4);
        manager
            .create_thread_pool("AIPool", 3, ThreadPriority::Normal)
            .unwrap();

        let workers = manager.pool_workers("AIPool").unwrap();
        assert_eq!(workers, ["AIPool_Worker0", "AIPool_Worker1", "AIPool_Worker2"]);
        for worker in &workers {
            let info = manager.thread_info(worker).unwrap();
            assert_eq!(info.kind, ThreadKind::Looping);
            assert_eq!(info.pool.as_deref(), Some("AIPool"));
        }
        assert!(matches!(
            manager.create_thread_pool("AIPool", 1, ThreadPriority::Normal),
            Err(ThreadError::DuplicatePool(_))
        ));
    }

    #[test]
    fn test_pool_rolls_back_on_worker_failure() {
        let manager = manager(4);
        // Squats on the second worker's name
        manager
            .create_thread("Grid_Worker1", ThreadKind::Looping, ThreadPriority::Normal, || {
                thread::sleep(Duration::from_millis(1));
            })
            .unwrap();

        let err = manager
            .create_thread_pool("Grid", 2, ThreadPriority::Normal)
            .unwrap_err();
        assert!(matches!(err, ThreadError::DuplicateThread(ref name) if name == "Grid_Worker1"));
        assert!(!manager.pool_exists("Grid"));
        assert!(!manager.thread_exists("Grid_Worker0"));
        assert_eq!(manager.live_thread_count(), 1);
    }

    #[test]
    fn test_task_profiled_under_pool_label() {
        let profiler = Arc::new(Profiler::new(true));
        let manager = ThreadManager::with_profiler(Arc::clone(&profiler));
        manager.initialize(2).unwrap();
        manager.create_thread_pool("Audio", 1, ThreadPriority::Normal).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        manager
            .submit_task("Audio", move || flag.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            profiler.stats("Audio_Task").is_some_and(|s| s.calls == 1)
        }));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_priority_hint_outcome_drives_logical_priority() {
        let manager = manager(2);
        manager
            .create_thread("Physics", ThreadKind::Looping, ThreadPriority::Normal, || {
                thread::sleep(Duration::from_millis(1));
            })
            .unwrap();

        let hint = manager
            .set_thread_priority("Physics", ThreadPriority::RealTime)
            .unwrap();
        let expected = if hint.is_honored() {
            ThreadPriority::RealTime
        } else {
            ThreadPriority::Normal
        };
        assert_eq!(manager.thread_priority("Physics").unwrap(), expected);

        // Affinity never touches the logical priority
        let _ = manager.set_thread_affinity("Physics", 0b1).unwrap();
        assert_eq!(manager.thread_priority("Physics").unwrap(), expected);

        manager.stop_thread("Physics").unwrap();
        assert!(matches!(
            manager.set_thread_priority("Physics", ThreadPriority::Low),
            Err(ThreadError::InvalidTransition { status: ThreadStatus::Stopped, .. })
        ));
    }

    #[test]
    fn test_shutdown_allows_reinitialize() {
        let manager = manager(2);
        manager.create_thread_pool("Pool", 2, ThreadPriority::Normal).unwrap();
        manager.shutdown();
        manager.shutdown();

        assert!(!manager.is_initialized());
        assert!(!manager.pool_exists("Pool"));
        assert_eq!(manager.active_thread_count(), 0);

        manager.initialize(2).unwrap();
        manager.create_thread_pool("Pool", 2, ThreadPriority::Normal).unwrap();
    }
}
