use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weave_core::{
    ComponentDef, ElementHandle, Engine, EngineOptions, Error, Host, MemoryDocument, NodeId,
    NodeStats, Result, RuntimeScheduler, VNode,
};

/// Scheduler that only counts checkpoint requests.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    requests: AtomicUsize,
}

impl RecordingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for RecordingScheduler {
    fn request_checkpoint(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising components in tests.
///
/// `WeaveTestRule` owns an engine over an in-memory document and exposes
/// helpers for mounting vnode trees, driving microtask checkpoints and
/// inspecting the produced host tree.
pub struct WeaveTestRule {
    engine: Engine,
    scheduler: Arc<RecordingScheduler>,
}

impl WeaveTestRule {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let scheduler = Arc::new(RecordingScheduler::default());
        let engine = Engine::with_options(MemoryDocument::new(), scheduler.clone(), options);
        Self { engine, scheduler }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Root mount of `def`, as a host calling `createElement` would.
    pub fn create_element(&self, tag: &str, def: &Rc<ComponentDef>) -> Result<ElementHandle> {
        self.engine.create_element(tag, def)
    }

    /// Mounts `vnode` onto a fresh container appended to the body.
    pub fn mount(&self, vnode: &VNode) -> Result<ElementHandle> {
        let container = self.document(|doc| {
            let container = doc.create_element("div");
            let body = doc.body();
            doc.append_child(body, container).map(|()| container)
        })?;
        let elm = self.engine.patch(container, vnode)?;
        Ok(self.engine.element(elm))
    }

    /// Patches `previous` into `next`.
    pub fn update(&self, previous: &VNode, next: &VNode) -> Result<ElementHandle> {
        let elm = self.engine.patch(previous, next)?;
        Ok(self.engine.element(elm))
    }

    /// One microtask checkpoint; the equivalent of awaiting a resolved promise.
    pub fn tick(&self) -> Result<()> {
        self.engine.run_microtasks()
    }

    /// Runs checkpoints until no microtask is left.
    pub fn pump_until_idle(&self) -> Result<()> {
        while self.engine.runtime().has_pending_microtasks() {
            self.tick()?;
        }
        Ok(())
    }

    /// Number of times the engine asked for a checkpoint.
    pub fn checkpoint_requests(&self) -> usize {
        self.scheduler.requests()
    }

    pub fn body(&self) -> ElementHandle {
        let body = self.document(|doc| Ok::<_, Error>(doc.body()));
        self.engine.element(body.unwrap_or_default())
    }

    pub fn stats(&self, element: &ElementHandle) -> NodeStats {
        self.document(|doc| Ok::<_, Error>(doc.stats(element.id())))
            .unwrap_or_default()
    }

    pub fn dump_tree(&self, element: &ElementHandle) -> String {
        self.document(|doc| Ok::<_, Error>(doc.dump_tree(element.id())))
            .unwrap_or_default()
    }

    /// Direct access to the in-memory document. `f` must not call back into
    /// the engine.
    pub fn document<R, E>(&self, f: impl FnOnce(&mut MemoryDocument) -> std::result::Result<R, E>) -> Result<R>
    where
        Error: From<E>,
    {
        match self.engine.with_host(f) {
            Some(result) => result.map_err(Error::from),
            None => Err(Error::callback("engine host is not a MemoryDocument")),
        }
    }

    /// Raw host write that bypasses the engine, as foreign script would.
    pub fn set_host_attribute(&self, element: &ElementHandle, name: &str, value: &str) -> Result<()> {
        let id: NodeId = element.id();
        self.document(|doc| doc.set_attribute(id, name, value))
    }
}

impl Default for WeaveTestRule {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WeaveTestRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaveTestRule")
            .field("engine", &self.engine)
            .field("checkpoint_requests", &self.checkpoint_requests())
            .finish()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `WeaveTestRule`.
pub fn run_test<R>(f: impl FnOnce(&WeaveTestRule) -> R) -> R {
    let rule = WeaveTestRule::new();
    f(&rule)
}

/// Shared call counter for hooks and accessors.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Rc<Cell<usize>>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }
}

/// Shared log of values captured by callbacks.
#[derive(Debug)]
pub struct Captured<T>(Rc<RefCell<Vec<T>>>);

impl<T> Captured<T> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.borrow_mut().push(value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl<T: Clone> Captured<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for Captured<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::api::{h, t};
    use weave_core::VNodeData;

    #[test]
    fn mount_appends_a_container_to_the_body() {
        let rule = WeaveTestRule::new();
        let element = rule
            .mount(&h("p", VNodeData::new(), vec![t("hello")]))
            .expect("mount succeeds");

        assert_eq!(element.text_content().expect("text"), "hello");
        assert_eq!(
            rule.body().children().expect("children"),
            vec![element.clone()]
        );
        assert_eq!(rule.dump_tree(&element), "<p>\n  \"hello\"\n");
    }

    #[test]
    fn pump_until_idle_drains_nested_tasks() {
        let rule = WeaveTestRule::new();
        let counter = CallCounter::new();
        {
            let engine = rule.engine().clone();
            let counter = counter.clone();
            rule.engine().queue_microtask(move || {
                counter.hit();
                let counter = counter.clone();
                engine.queue_microtask(move || {
                    counter.hit();
                    Ok(())
                });
                Ok(())
            });
        }

        rule.pump_until_idle().expect("pump succeeds");

        assert_eq!(counter.count(), 2);
        assert_eq!(rule.checkpoint_requests(), 1);
    }
}
