//! The toolkit thread and its request marshaling
//!
//! [`ToolkitThread`] spawns the only thread allowed to touch the native
//! toolkit and owns it until dropped. [`ToolkitHandle`] is a cheap clonable
//! reference used to run closures on that thread and wait for their result.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use super::{EventQueue, Toolkit, ToolkitError, ToolkitResult, ToolkitWaker, WindowKey};
use crate::window::callbacks::SharedCallbacks;

/// Lifecycle of the toolkit thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ToolkitState {
    /// Thread started, native toolkit not yet initialized
    Uninitialized = 0,
    /// Accepting requests
    Running = 1,
    /// Shut down; no further requests are valid
    Stopped = 2,
}

impl ToolkitState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Uninitialized,
        }
    }
}

/// Factory run on the toolkit thread to initialize the native toolkit
pub type ToolkitFactory = Box<dyn FnOnce() -> ToolkitResult<Box<dyn Toolkit>> + Send>;

type Task = Box<dyn FnOnce(&ToolkitHost) + Send>;
type TaskResult<R> = Result<R, Box<dyn Any + Send>>;

/// Only one toolkit thread may exist per process
static ACTIVE: AtomicBool = AtomicBool::new(false);

thread_local! {
    static HOST: RefCell<Option<Rc<ToolkitHost>>> = const { RefCell::new(None) };
}

/// State reachable from both sides
struct Shared {
    queue: Mutex<VecDeque<Task>>,
    waker: OnceLock<Arc<dyn ToolkitWaker>>,
    thread_id: OnceLock<ThreadId>,
    state: AtomicU8,
    exit: AtomicBool,
    events: EventQueue,
}

impl Shared {
    fn state(&self) -> ToolkitState {
        ToolkitState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn wake(&self) {
        if let Some(waker) = self.waker.get() {
            waker.wake();
        }
    }

    fn run_pending(&self, host: &ToolkitHost) {
        loop {
            // Never hold the queue lock while a task runs
            let task = self.queue.lock().pop_front();
            match task {
                Some(task) => task(host),
                None => break,
            }
        }
    }
}

/// Toolkit-thread-only state: the native toolkit and the event routes
pub(crate) struct ToolkitHost {
    toolkit: Box<dyn Toolkit>,
    routes: RefCell<HashMap<WindowKey, SharedCallbacks>>,
    events: EventQueue,
}

impl ToolkitHost {
    pub(crate) fn toolkit(&self) -> &dyn Toolkit {
        self.toolkit.as_ref()
    }

    /// Start forwarding native events of `key` to `callbacks`
    pub(crate) fn register_route(&self, key: WindowKey, callbacks: SharedCallbacks) {
        self.routes.borrow_mut().insert(key, callbacks);
    }

    /// Stop forwarding events of `key` and drop the ones still queued
    pub(crate) fn unregister_route(&self, key: WindowKey) {
        self.routes.borrow_mut().remove(&key);
        let purged = self.events.purge(key);
        if purged > 0 {
            log::debug!("Purged {} pending events of window {}", purged, key.raw());
        }
    }

    fn route_events(&self) {
        let events = self.toolkit.take_events();
        if events.is_empty() {
            return;
        }
        let routes = self.routes.borrow();
        for (key, event) in events {
            match routes.get(&key) {
                Some(callbacks) => self.events.push(key, event, Arc::clone(callbacks)),
                None => log::trace!("Dropping {:?} for unrouted window {}", event, key.raw()),
            }
        }
    }
}

fn current_host() -> Option<Rc<ToolkitHost>> {
    HOST.with(|host| host.borrow().clone())
}

/// Owner of the toolkit thread
///
/// Dropping it stops the thread, runs any requests still queued and joins.
pub struct ToolkitThread {
    handle: ToolkitHandle,
    join: Option<JoinHandle<()>>,
}

impl ToolkitThread {
    /// Spawn the toolkit thread and initialize the native toolkit on it
    ///
    /// Blocks until `factory` has run. Fails with
    /// [`ToolkitError::AlreadyInitialized`] if another toolkit thread is alive
    /// and with whatever `factory` returned if initialization failed.
    pub fn spawn(factory: ToolkitFactory, events: EventQueue, wait_timeout: Duration) -> ToolkitResult<Self> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ToolkitError::AlreadyInitialized);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            waker: OnceLock::new(),
            thread_id: OnceLock::new(),
            state: AtomicU8::new(ToolkitState::Uninitialized as u8),
            exit: AtomicBool::new(false),
            events,
        });

        let (init_tx, init_rx) = bounded::<ToolkitResult<()>>(1);
        let thread_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("toolkit".to_string())
            .spawn(move || {
                let _ = thread_shared.thread_id.set(thread::current().id());
                let toolkit = match factory() {
                    Ok(toolkit) => toolkit,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                run(&thread_shared, toolkit, wait_timeout, &init_tx);
            });

        let join = match spawned {
            Ok(join) => join,
            Err(e) => {
                ACTIVE.store(false, Ordering::Release);
                return Err(ToolkitError::Initialization(format!("Failed to spawn toolkit thread: {}", e)));
            }
        };

        let init = init_rx
            .recv()
            .unwrap_or_else(|_| Err(ToolkitError::Initialization("Toolkit thread exited during startup".to_string())));
        if let Err(e) = init {
            let _ = join.join();
            ACTIVE.store(false, Ordering::Release);
            log::error!("Toolkit initialization failed: {}", e);
            return Err(e);
        }

        log::debug!("Toolkit thread running");
        Ok(Self {
            handle: ToolkitHandle { shared },
            join: Some(join),
        })
    }

    /// Handle for issuing requests
    pub fn handle(&self) -> ToolkitHandle {
        self.handle.clone()
    }
}

impl Drop for ToolkitThread {
    fn drop(&mut self) {
        self.handle.shared.exit.store(true, Ordering::Release);
        self.handle.shared.wake();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("Toolkit thread panicked during shutdown");
            }
        }
        ACTIVE.store(false, Ordering::Release);
        log::debug!("Toolkit thread stopped");
    }
}

fn run(
    shared: &Shared,
    toolkit: Box<dyn Toolkit>,
    wait_timeout: Duration,
    init_tx: &crossbeam_channel::Sender<ToolkitResult<()>>,
) {
    let _ = shared.waker.set(toolkit.waker());
    let host = Rc::new(ToolkitHost {
        toolkit,
        routes: RefCell::new(HashMap::new()),
        events: shared.events.clone(),
    });
    HOST.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&host)));
    shared.state.store(ToolkitState::Running as u8, Ordering::Release);
    let _ = init_tx.send(Ok(()));

    loop {
        shared.run_pending(&host);
        if shared.exit.load(Ordering::Acquire) {
            break;
        }
        host.toolkit().wait_events(wait_timeout);
        host.route_events();
    }

    {
        let _queue = shared.queue.lock();
        shared.state.store(ToolkitState::Stopped as u8, Ordering::Release);
    }
    // Requests accepted before the state flip still get an answer
    shared.run_pending(&host);

    let leaked = host.routes.borrow().len();
    if leaked > 0 {
        log::warn!("{} windows still registered at toolkit shutdown", leaked);
    }
    HOST.with(|slot| slot.borrow_mut().take());
    drop(host);
}

/// Clonable reference to the toolkit thread
#[derive(Clone)]
pub struct ToolkitHandle {
    shared: Arc<Shared>,
}

impl ToolkitHandle {
    /// Current lifecycle state
    pub fn state(&self) -> ToolkitState {
        self.shared.state()
    }

    /// Identity of the toolkit thread
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.thread_id.get().copied()
    }

    /// Whether the caller is running on the toolkit thread
    pub fn is_toolkit_thread(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }

    /// Queue that receives this toolkit's window events
    pub fn events(&self) -> &EventQueue {
        &self.shared.events
    }

    /// Run `f` against the native toolkit on the toolkit thread
    ///
    /// Runs inline when already on the toolkit thread. Otherwise blocks until
    /// the toolkit thread has run the request; a panic inside `f` is resumed
    /// on the caller.
    ///
    /// # Panics
    ///
    /// If the toolkit is not running.
    pub fn execute<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&dyn Toolkit) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.execute_with_host(move |host| f(host.toolkit()))
    }

    /// Process pending native events without blocking and queue them
    pub fn poll_events(&self) {
        self.execute_with_host(|host| {
            host.toolkit().poll_events();
            host.route_events();
        });
    }

    pub(crate) fn execute_with_host<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&ToolkitHost) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_toolkit_thread() {
            let Some(host) = current_host() else {
                panic!("Toolkit request issued on the toolkit thread after shutdown");
            };
            return f(&host);
        }

        let (tx, rx) = bounded::<TaskResult<R>>(1);
        let task: Task = Box::new(move |host| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(host)));
            let _ = tx.send(result);
        });

        {
            let mut queue = self.shared.queue.lock();
            let state = self.shared.state();
            assert!(
                state == ToolkitState::Running,
                "Toolkit request issued while the toolkit is {:?}",
                state
            );
            queue.push_back(task);
        }
        self.shared.wake();

        match rx.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("Toolkit thread dropped a request without answering"),
        }
    }
}

impl std::fmt::Debug for ToolkitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolkitHandle")
            .field("state", &self.state())
            .field("thread_id", &self.thread_id())
            .finish()
    }
}

/// Serializes tests that spawn a toolkit thread
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = parking_lot::const_mutex(());
    LOCK.lock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::mock::{spawn as spawn_mock, MockToolkit, MockWorld};
    use crate::toolkit::{WindowDescriptor, WindowEvent};
    use crate::window::callbacks::WindowCallbacks;

    #[test]
    fn test_requests_run_on_toolkit_thread() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        let handle = toolkit.handle();
        assert_eq!(handle.state(), ToolkitState::Running);

        let callers: Vec<ThreadId> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.execute(|_| thread::current().id()))
            })
            .map(|worker| worker.join().unwrap())
            .collect();

        let toolkit_id = handle.thread_id().unwrap();
        assert!(callers.iter().all(|id| *id == toolkit_id));
        assert_ne!(toolkit_id, thread::current().id());
    }

    #[test]
    fn test_reentrant_request_runs_inline() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        let handle = toolkit.handle();
        let inner = handle.clone();

        let value = handle.execute(move |_| inner.execute(|_| 7) + 1);
        assert_eq!(value, 8);
    }

    #[test]
    fn test_double_initialization_rejected() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let _toolkit = spawn_mock(&world);

        let second = ToolkitThread::spawn(
            Box::new(move || Ok(Box::new(MockToolkit::new(MockWorld::new())) as Box<dyn Toolkit>)),
            EventQueue::new(),
            Duration::from_millis(20),
        );
        assert!(matches!(second, Err(ToolkitError::AlreadyInitialized)));
    }

    #[test]
    fn test_initialization_failure_is_reported() {
        let _guard = test_lock();
        let result = ToolkitThread::spawn(
            Box::new(|| Err(ToolkitError::Initialization("no display".to_string()))),
            EventQueue::new(),
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(ToolkitError::Initialization(_))));

        // The slot is released again
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        assert_eq!(toolkit.handle().state(), ToolkitState::Running);
    }

    #[test]
    fn test_panic_is_resumed_on_caller_and_thread_survives() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        let handle = toolkit.handle();

        let caller = handle.clone();
        let result = thread::spawn(move || caller.execute(|_| -> u32 { panic!("boom") })).join();
        assert!(result.is_err());

        assert_eq!(handle.execute(|_| 3), 3);
    }

    #[test]
    fn test_stopped_after_drop() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        let handle = toolkit.handle();
        drop(toolkit);

        assert_eq!(handle.state(), ToolkitState::Stopped);
        let result = panic::catch_unwind(AssertUnwindSafe(|| handle.execute(|_| ())));
        assert!(result.is_err());
    }

    #[test]
    fn test_native_events_are_routed_to_queue() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let toolkit = spawn_mock(&world);
        let handle = toolkit.handle();
        let key = WindowKey::next();
        let callbacks = WindowCallbacks::shared();

        let route = Arc::clone(&callbacks);
        handle
            .execute_with_host(move |host| {
                host.toolkit().create_window(key, &WindowDescriptor {
                    size: (320, 240),
                    title: "events".to_string(),
                    monitor: None,
                    resizable: true,
                    decorated: true,
                })?;
                host.register_route(key, route);
                Ok::<(), ToolkitError>(())
            })
            .unwrap();

        world.inject_event(key, WindowEvent::Focus(true));
        handle.poll_events();
        assert_eq!(handle.events().len(), 1);

        handle.execute_with_host(move |host| {
            host.unregister_route(key);
            host.toolkit().destroy_window(key);
        });
        assert!(handle.events().is_empty());
    }
}
