//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`RuntimeScheduler`] for `weave-core`.
//! A host event loop creates a [`StdRuntime`], builds its engine through it
//! and calls [`StdRuntime::run_until_idle`] whenever it gets the chance.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use weave_core::{Engine, EngineOptions, Host, Result, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Scheduler that records checkpoint requests and optionally wakes the
/// host loop.
#[derive(Default)]
pub struct StdScheduler {
    requested: AtomicBool,
    requests: AtomicUsize,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback invoked on every checkpoint request.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.waker.write() {
            *slot = Some(Arc::new(waker));
        }
    }

    /// Clears the pending request, returning whether there was one.
    pub fn take_checkpoint_request(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    pub fn is_checkpoint_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Total number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl RuntimeScheduler for StdScheduler {
    fn request_checkpoint(&self) {
        self.requested.store(true, Ordering::Release);
        self.requests.fetch_add(1, Ordering::Relaxed);
        let waker = self.waker.read().ok().and_then(|slot| slot.clone());
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("requested", &self.is_checkpoint_requested())
            .field("requests", &self.request_count())
            .finish_non_exhaustive()
    }
}

/// Convenience container bundling the standard scheduler with engine options.
#[derive(Debug, Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    options: EngineOptions,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            scheduler: Arc::new(StdScheduler::new()),
            options,
        }
    }

    /// Returns an engine over `host` reporting to this runtime's scheduler.
    pub fn engine(&self, host: impl Host) -> Engine {
        Engine::with_options(host, self.scheduler.clone(), self.options.clone())
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Runs checkpoints while the scheduler has outstanding requests.
    /// Returns how many checkpoints ran.
    pub fn run_until_idle(&self, engine: &Engine) -> Result<usize> {
        let mut checkpoints = 0;
        while self.scheduler.take_checkpoint_request() {
            engine.run_microtasks()?;
            checkpoints += 1;
        }
        if checkpoints > 0 {
            tracing::trace!(checkpoints, "runtime idle");
        }
        Ok(checkpoints)
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use weave_core::{ComponentDef, MemoryDocument, Template};

    #[test]
    fn waker_fires_once_per_idle_to_busy_transition() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        {
            let wakes = Arc::clone(&wakes);
            runtime.scheduler().set_waker(move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            });
        }
        let engine = runtime.engine(MemoryDocument::new());

        engine.queue_microtask(|| Ok(()));
        engine.queue_microtask(|| Ok(()));

        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert!(runtime.scheduler().is_checkpoint_requested());
    }

    #[test]
    fn run_until_idle_drains_follow_up_work() {
        let runtime = StdRuntime::new();
        let engine = runtime.engine(MemoryDocument::new());
        let renders = Rc::new(Cell::new(0));
        let def = {
            let renders = Rc::clone(&renders);
            ComponentDef::builder("x-clock")
                .field("tick", 0)
                .track("tick")
                .render(move |_| {
                    renders.set(renders.get() + 1);
                    Ok(Template::empty())
                })
                .build()
        };
        let element = engine.create_element("x-clock", &def).expect("mount succeeds");
        let cmp = element.component().expect("component mounted");

        cmp.set_field("tick", 1);
        let checkpoints = runtime.run_until_idle(&engine).expect("runtime settles");

        assert_eq!(checkpoints, 1);
        assert_eq!(renders.get(), 2);
        assert!(!runtime.scheduler().is_checkpoint_requested());
        assert_eq!(runtime.run_until_idle(&engine).expect("idle"), 0);
    }
}
