//! # Instance
//!
//! Composition root of the windowing layer. Owns the toolkit thread, the
//! deferred window event queue and the instance lock. Everything that
//! mutates consumers or runs scheduled updates does so while holding the
//! lock; window callbacks only run from [`Instance::dispatch_events`].

use parking_lot::{Mutex, MutexGuard};

use crate::config::ToolkitSettings;
use crate::scheduler::Scheduler;
use crate::toolkit::thread::ToolkitFactory;
use crate::toolkit::{EventQueue, ToolkitHandle, ToolkitResult, ToolkitThread};

/// State guarded by the instance lock
#[derive(Debug)]
pub struct InstanceState {
    /// Periodic update registry
    pub scheduler: Scheduler,
    toolkit: ToolkitHandle,
}

impl InstanceState {
    /// Toolkit handle for creating windows
    pub fn toolkit(&self) -> &ToolkitHandle {
        &self.toolkit
    }
}

/// Proof of holding the instance lock
pub type InstanceLock<'a> = MutexGuard<'a, InstanceState>;

/// Toolkit thread, event queue and instance lock
pub struct Instance {
    state: Mutex<InstanceState>,
    events: EventQueue,
    // Joined last, after everything that may still talk to it
    toolkit: ToolkitThread,
}

impl Instance {
    /// Start the toolkit thread with `factory`
    ///
    /// Fails if the toolkit cannot be initialized or another instance is
    /// alive in this process.
    pub fn new(factory: ToolkitFactory, settings: &ToolkitSettings) -> ToolkitResult<Self> {
        let events = EventQueue::new();
        let toolkit = ToolkitThread::spawn(factory, events.clone(), settings.wait_timeout())?;
        let handle = toolkit.handle();
        log::info!("Windowing instance started");

        Ok(Self {
            state: Mutex::new(InstanceState {
                scheduler: Scheduler::new(),
                toolkit: handle,
            }),
            events,
            toolkit,
        })
    }

    /// Start an instance backed by GLFW
    #[cfg(feature = "glfw-toolkit")]
    pub fn with_glfw(settings: &ToolkitSettings) -> ToolkitResult<Self> {
        Self::new(crate::toolkit::glfw::GlfwToolkit::factory(), settings)
    }

    /// Acquire the instance lock
    pub fn lock(&self) -> InstanceLock<'_> {
        self.state.lock()
    }

    /// Acquire the instance lock if it is free
    pub fn try_lock(&self) -> Option<InstanceLock<'_>> {
        self.state.try_lock()
    }

    /// Toolkit handle
    pub fn toolkit(&self) -> ToolkitHandle {
        self.toolkit.handle()
    }

    /// Pump native events without blocking
    ///
    /// The toolkit thread also pumps on its own; calling this just shortens
    /// the delay before events become dispatchable.
    pub fn poll_events(&self) {
        self.toolkit.handle().poll_events();
    }

    /// Run the callbacks of every queued window event
    pub fn dispatch_events(&self, lock: &mut InstanceLock<'_>) -> usize {
        debug_assert!(MutexGuard::mutex(lock).is_locked());
        self.events.dispatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::mock::{factory, MockWorld};
    use crate::toolkit::thread::test_lock;
    use crate::toolkit::{ToolkitError, ToolkitState, WindowDescriptor, WindowEvent};
    use crate::window::{WindowCallbacks, WindowHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_second_instance_rejected() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let _instance = Instance::new(factory(&world), &ToolkitSettings::default()).unwrap();
        let second = Instance::new(factory(&world), &ToolkitSettings::default());
        assert!(matches!(second, Err(ToolkitError::AlreadyInitialized)));
    }

    #[test]
    fn test_events_dispatch_under_lock() {
        let _guard = test_lock();
        let world = MockWorld::new();
        let instance = Instance::new(factory(&world), &ToolkitSettings::default()).unwrap();
        let toolkit = instance.toolkit();

        let closes = Arc::new(AtomicUsize::new(0));
        let callbacks = WindowCallbacks::shared();
        let counter = Arc::clone(&closes);
        callbacks.lock().close = Some(Box::new(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let window = WindowHandle::create(
            &toolkit,
            WindowDescriptor {
                size: (320, 240),
                title: "instance".to_string(),
                monitor: None,
                resizable: true,
                decorated: true,
            },
            callbacks,
        )
        .unwrap();

        world.inject_event(window.key(), WindowEvent::Close);
        instance.poll_events();
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        let mut lock = instance.lock();
        assert_eq!(instance.dispatch_events(&mut lock), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        drop(lock);
        drop(window);

        let handle = instance.toolkit();
        drop(instance);
        assert_eq!(handle.state(), ToolkitState::Stopped);
    }
}
