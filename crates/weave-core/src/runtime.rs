use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::map::HashSet;
use crate::error::Result;
use crate::platform::RuntimeScheduler;
use crate::vm::VmInner;

pub(crate) type VmId = usize;

pub(crate) type Task = Box<dyn FnOnce() -> Result<()> + 'static>;

pub(crate) enum Microtask {
    /// Re-render every instance queued as dirty.
    Flush,
    /// Deliver batched attribute-change callbacks.
    DeliverAttributes,
    /// Post-mount notification for one instance.
    Connected(Weak<VmInner>),
    Task(Task),
}

impl fmt::Debug for Microtask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Microtask::Flush => f.write_str("Flush"),
            Microtask::DeliverAttributes => f.write_str("DeliverAttributes"),
            Microtask::Connected(_) => f.write_str("Connected"),
            Microtask::Task(_) => f.write_str("Task"),
        }
    }
}

pub(crate) type DirtyEntry = (VmId, Weak<VmInner>);

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    checkpoint_requested: Cell<bool>,
    microtasks: RefCell<VecDeque<Microtask>>,
    dirty: RefCell<HashSet<VmId>>,
    dirty_queue: RefCell<Vec<DirtyEntry>>,
    flush_enqueued: Cell<bool>,
    attribute_queue: RefCell<Vec<Weak<VmInner>>>,
    attributes_enqueued: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            checkpoint_requested: Cell::new(false),
            microtasks: RefCell::new(VecDeque::new()),
            dirty: RefCell::new(HashSet::new()),
            dirty_queue: RefCell::new(Vec::new()),
            flush_enqueued: Cell::new(false),
            attribute_queue: RefCell::new(Vec::new()),
            attributes_enqueued: Cell::new(false),
        }
    }

    fn enqueue(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
        if !self.checkpoint_requested.replace(true) {
            self.scheduler.request_checkpoint();
        }
    }

    fn pop(&self) -> Option<Microtask> {
        let task = self.microtasks.borrow_mut().pop_front();
        if task.is_none() {
            self.checkpoint_requested.set(false);
        }
        task
    }

    /// Recovers the checkpoint request after an aborted checkpoint so that
    /// work still queued is reported to the scheduler again.
    fn rearm(&self) {
        self.checkpoint_requested.set(false);
        if !self.microtasks.borrow().is_empty() {
            self.checkpoint_requested.set(true);
            self.scheduler.request_checkpoint();
        }
    }

    fn register_dirty(&self, id: VmId, vm: Weak<VmInner>) {
        if !self.dirty.borrow_mut().insert(id) {
            return;
        }
        self.dirty_queue.borrow_mut().push((id, vm));
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        if !self.flush_enqueued.replace(true) {
            self.enqueue(Microtask::Flush);
        }
    }

    fn begin_flush(&self) -> Vec<DirtyEntry> {
        self.flush_enqueued.set(false);
        self.dirty_queue.borrow_mut().drain(..).collect()
    }

    fn requeue(&self, entries: Vec<DirtyEntry>) {
        if entries.is_empty() {
            return;
        }
        self.dirty
            .borrow_mut()
            .extend(entries.iter().map(|(id, _)| *id));
        self.dirty_queue.borrow_mut().extend(entries);
        self.schedule_flush();
    }

    fn clear_dirty(&self, id: VmId) {
        self.dirty.borrow_mut().remove(&id);
    }

    fn enqueue_attribute_delivery(&self, vm: Weak<VmInner>) {
        self.attribute_queue.borrow_mut().push(vm);
        if !self.attributes_enqueued.replace(true) {
            self.enqueue(Microtask::DeliverAttributes);
        }
    }

    fn take_attribute_queue(&self) -> Vec<Weak<VmInner>> {
        self.attributes_enqueued.set(false);
        self.attribute_queue.borrow_mut().drain(..).collect()
    }
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending_microtasks(&self) -> bool {
        !self.inner.microtasks.borrow().is_empty()
    }

    pub fn checkpoint_requested(&self) -> bool {
        self.inner.checkpoint_requested.get()
    }

    /// Number of instances waiting for the next reactive flush.
    pub fn dirty_count(&self) -> usize {
        self.inner.dirty.borrow().len()
    }

    pub(crate) fn pop(&self) -> Option<Microtask> {
        self.inner.pop()
    }

    pub(crate) fn enqueue(&self, task: Microtask) {
        self.inner.enqueue(task);
    }

    pub(crate) fn begin_flush(&self) -> Vec<DirtyEntry> {
        self.inner.begin_flush()
    }

    pub(crate) fn requeue(&self, entries: Vec<DirtyEntry>) {
        self.inner.requeue(entries);
    }

    pub(crate) fn rearm(&self) {
        self.inner.rearm();
    }

    pub(crate) fn clear_dirty(&self, id: VmId) {
        self.inner.clear_dirty(id);
    }

    pub(crate) fn take_attribute_queue(&self) -> Vec<Weak<VmInner>> {
        self.inner.take_attribute_queue()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn request_checkpoint(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    requests: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn request_checkpoint(&self) {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Non-owning handle held by instances.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn register_dirty(&self, id: VmId, vm: Weak<VmInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.register_dirty(id, vm);
        }
    }

    pub(crate) fn clear_dirty(&self, id: VmId) {
        if let Some(inner) = self.0.upgrade() {
            inner.clear_dirty(id);
        }
    }

    pub(crate) fn enqueue_attribute_delivery(&self, vm: Weak<VmInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_attribute_delivery(vm);
        }
    }

    pub fn has_pending_microtasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| !inner.microtasks.borrow().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
