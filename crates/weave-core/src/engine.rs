use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::api;
use crate::bridge;
use crate::collections::map::HashMap;
use crate::component::{Component, ComponentDef};
use crate::error::{Error, Result};
use crate::host::{Host, HostError, NodeId};
use crate::platform::RuntimeScheduler;
use crate::runtime::{DefaultScheduler, Microtask, Runtime};
use crate::value::{Func, Value};
use crate::vm::{Vm, VmInner, VmState};
use crate::vnode::{Event, Listener, VNode, VNodeData};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on microtasks run by one checkpoint.
    pub max_microtasks: usize,
    /// Log props supplied by an owner that the component does not expose.
    pub warn_unknown_props: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_microtasks: 10_000,
            warn_unknown_props: true,
        }
    }
}

pub(crate) struct EngineInner {
    host: RefCell<Box<dyn Host>>,
    runtime: Runtime,
    vms: RefCell<HashMap<NodeId, Vm>>,
    listeners: RefCell<HashMap<NodeId, IndexMap<String, Listener>>>,
    roots: RefCell<HashMap<NodeId, VNode>>,
    options: EngineOptions,
}

/// Owns the host document and every mounted component instance.
///
/// Cloning is cheap and yields another handle to the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    pub fn new(host: impl Host) -> Self {
        Self::with_scheduler(host, Arc::new(DefaultScheduler))
    }

    pub fn with_scheduler(host: impl Host, scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_options(host, scheduler, EngineOptions::default())
    }

    pub fn with_options(
        host: impl Host,
        scheduler: Arc<dyn RuntimeScheduler>,
        options: EngineOptions,
    ) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                host: RefCell::new(Box::new(host)),
                runtime: Runtime::new(scheduler),
                vms: RefCell::new(HashMap::new()),
                listeners: RefCell::new(HashMap::new()),
                roots: RefCell::new(HashMap::new()),
                options,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<EngineInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EngineInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub(crate) fn host_read<R>(&self, f: impl FnOnce(&dyn Host) -> R) -> R {
        let host = self.inner.host.borrow();
        f(&**host)
    }

    pub(crate) fn host_write<R>(&self, f: impl FnOnce(&mut dyn Host) -> R) -> R {
        let mut host = self.inner.host.borrow_mut();
        f(&mut **host)
    }

    /// Runs `f` against the concrete host. `None` when the host is not an `H`.
    ///
    /// `f` must not call back into the engine.
    pub fn with_host<H: Host, R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        let mut host = self.inner.host.borrow_mut();
        host.as_any_mut().downcast_mut::<H>().map(f)
    }

    pub fn element(&self, id: NodeId) -> ElementHandle {
        ElementHandle {
            engine: self.clone(),
            id,
        }
    }

    /// Component instance mounted on `id`, if any.
    pub fn vm_for(&self, id: NodeId) -> Option<Vm> {
        self.inner.vms.borrow().get(&id).cloned()
    }

    pub(crate) fn vms_mut(&self) -> RefMut<'_, HashMap<NodeId, Vm>> {
        self.inner.vms.borrow_mut()
    }

    pub(crate) fn listeners_mut(&self) -> RefMut<'_, HashMap<NodeId, IndexMap<String, Listener>>> {
        self.inner.listeners.borrow_mut()
    }

    /// Number of live component instances.
    pub fn instance_count(&self) -> usize {
        self.inner.vms.borrow().len()
    }

    /// Creates a detached element owning a fresh instance of `def` and
    /// renders it synchronously.
    pub fn create_element(&self, tag: &str, def: &Rc<ComponentDef>) -> Result<ElementHandle> {
        let vnode = api::c(tag, def, VNodeData::default());
        let elm = self.host_write(|host| host.create_element(tag));
        self.create_component_elm(&vnode, Rc::clone(def), Some(elm), true, 0)?;
        tracing::debug!(tag, component = def.name(), "root element created");
        self.inner.roots.borrow_mut().insert(elm, vnode);
        Ok(self.element(elm))
    }

    /// Tears down a root created by [`create_element`](Self::create_element).
    pub fn destroy_element(&self, element: &ElementHandle) -> Result<()> {
        let root = self.inner.roots.borrow_mut().remove(&element.id);
        match root {
            Some(vnode) => self.unmount(&vnode),
            None => Ok(()),
        }
    }

    pub fn queue_microtask(&self, task: impl FnOnce() -> Result<()> + 'static) {
        self.inner.runtime.enqueue(Microtask::Task(Box::new(task)));
    }

    /// Microtask checkpoint: runs queued work until the queue is empty.
    ///
    /// A failing checkpoint stops at the first error. Whatever is still
    /// queued is reported to the scheduler again.
    pub fn run_microtasks(&self) -> Result<()> {
        let result = self.drain_microtasks();
        if result.is_err() {
            self.inner.runtime.rearm();
        }
        result
    }

    fn drain_microtasks(&self) -> Result<()> {
        let limit = self.inner.options.max_microtasks;
        let mut ran = 0usize;
        loop {
            if ran == limit && self.inner.runtime.has_pending_microtasks() {
                tracing::warn!(limit, "microtask checkpoint aborted");
                return Err(Error::RunawayMicrotasks { limit });
            }
            let Some(task) = self.inner.runtime.pop() else {
                break;
            };
            ran += 1;
            self.run_microtask(task)?;
        }
        Ok(())
    }

    fn run_microtask(&self, task: Microtask) -> Result<()> {
        match task {
            Microtask::Flush => self.flush(),
            Microtask::DeliverAttributes => self.deliver_attributes(),
            Microtask::Connected(vm) => self.connect(vm),
            Microtask::Task(task) => task(),
        }
    }

    /// Re-renders every queued dirty instance, parents first.
    fn flush(&self) -> Result<()> {
        let entries = self.inner.runtime.begin_flush();
        let span = tracing::debug_span!("flush", queued = entries.len());
        let _enter = span.enter();

        let mut pending = Vec::with_capacity(entries.len());
        for (id, weak) in entries {
            match weak.upgrade() {
                Some(inner) => pending.push(((id, weak), Vm::from_inner(inner))),
                None => self.inner.runtime.clear_dirty(id),
            }
        }
        pending.sort_by_key(|(_, vm)| vm.depth());

        let mut pending = pending.into_iter();
        while let Some(((id, _), vm)) = pending.next() {
            if vm.state() == VmState::Unmounted || !vm.is_dirty() {
                self.inner.runtime.clear_dirty(id);
                continue;
            }
            let renders = vm.render_count();
            if let Err(err) = self.rerender(&vm) {
                let mut requeued = Vec::new();
                if vm.render_count() == renders && vm.restore_dirty() {
                    requeued.push((vm.id(), vm.downgrade()));
                }
                requeued.extend(pending.map(|(entry, _)| entry));
                tracing::debug!(requeued = requeued.len(), "flush failed");
                self.inner.runtime.requeue(requeued);
                return Err(err);
            }
        }
        Ok(())
    }

    fn deliver_attributes(&self) -> Result<()> {
        for weak in self.inner.runtime.take_attribute_queue() {
            let Some(vm) = weak.upgrade().map(Vm::from_inner) else {
                continue;
            };
            let changes = vm.take_attribute_changes();
            if vm.state() == VmState::Unmounted {
                continue;
            }
            let Some(callback) = vm.def().attribute_changed_hook().cloned() else {
                continue;
            };
            let component = vm.component();
            for (name, previous) in changes {
                let current = self.host_read(|host| host.get_attribute(vm.elm(), &name))?;
                if current == previous {
                    continue;
                }
                tracing::trace!(attribute = %name, "delivering attribute change");
                callback(&component, &name, previous.as_deref(), current.as_deref())?;
            }
        }
        Ok(())
    }

    fn connect(&self, vm: Weak<VmInner>) -> Result<()> {
        let Some(vm) = vm.upgrade().map(Vm::from_inner) else {
            return Ok(());
        };
        if !vm.mark_connected() {
            return Ok(());
        }
        match vm.def().connected_hook().cloned() {
            Some(hook) => hook(&vm.component()),
            None => Ok(()),
        }
    }

    /// Writes or removes an attribute, recording the change for the
    /// instance mounted on `elm` when it observes that attribute.
    pub(crate) fn write_attribute(&self, elm: NodeId, name: &str, value: Option<&str>) -> Result<()> {
        let previous = self.host_write(|host| -> Result<Option<String>, HostError> {
            let previous = host.get_attribute(elm, name)?;
            match value {
                Some(value) => host.set_attribute(elm, name, value)?,
                None => host.remove_attribute(elm, name)?,
            }
            Ok(previous)
        })?;
        tracing::trace!(elm, attribute = name, "attribute written");
        if let Some(vm) = self.vm_for(elm) {
            vm.record_attribute_change(name, previous);
        }
        Ok(())
    }

    pub(crate) fn get_property(&self, elm: NodeId, name: &str) -> Result<Value> {
        if let Some(vm) = self.vm_for(elm) {
            if let Some(value) = bridge::read_property(&vm, name)? {
                return Ok(value);
            }
        }
        Ok(self.host_read(|host| host.get_property(elm, name))?)
    }

    pub(crate) fn set_property(&self, elm: NodeId, name: &str, value: Value) -> Result<()> {
        if let Some(vm) = self.vm_for(elm) {
            if bridge::write_property(&vm, name, value.clone())? {
                return Ok(());
            }
        }
        Ok(self.host_write(|host| host.set_property(elm, name, value))?)
    }

    pub(crate) fn dispatch_event(&self, elm: NodeId, name: &str, detail: Value) -> Result<bool> {
        let listener = self
            .inner
            .listeners
            .borrow()
            .get(&elm)
            .and_then(|listeners| listeners.get(name))
            .cloned();
        let Some(listener) = listener else {
            return Ok(false);
        };
        listener.call(&Event {
            name: name.to_string(),
            target: elm,
            detail,
        })?;
        Ok(true)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("instances", &self.inner.vms.borrow().len())
            .field("roots", &self.inner.roots.borrow().len())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// A host element as seen from outside the engine.
///
/// Property access goes through the public surface of the component mounted
/// on the element, if there is one, and falls back to host properties.
#[derive(Clone)]
pub struct ElementHandle {
    engine: Engine,
    id: NodeId,
}

impl ElementHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.engine.get_property(self.id, name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.engine.set_property(self.id, name, value.into())
    }

    /// Bound public method, without invoking it.
    pub fn method(&self, name: &str) -> Result<Func> {
        match self.engine.vm_for(self.id) {
            Some(vm) => vm.bound_method(name),
            None => Err(Error::NotAMethod {
                component: self.tag_name()?.unwrap_or_default(),
                name: name.to_string(),
            }),
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.method(name)?.call(args)
    }

    pub fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .engine
            .host_read(|host| host.get_attribute(self.id, name))?)
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.engine.write_attribute(self.id, name, Some(value))
    }

    pub fn remove_attribute(&self, name: &str) -> Result<()> {
        self.engine.write_attribute(self.id, name, None)
    }

    pub fn style_text(&self) -> Result<String> {
        Ok(self.engine.host_read(|host| host.style_text(self.id))?)
    }

    pub fn text_content(&self) -> Result<String> {
        Ok(self.engine.host_read(|host| host.text_content(self.id))?)
    }

    pub fn tag_name(&self) -> Result<Option<String>> {
        Ok(self.engine.host_read(|host| host.tag_name(self.id))?)
    }

    pub fn parent(&self) -> Result<Option<ElementHandle>> {
        let parent = self.engine.host_read(|host| host.parent(self.id))?;
        Ok(parent.map(|id| self.engine.element(id)))
    }

    pub fn children(&self) -> Result<Vec<ElementHandle>> {
        let children = self.engine.host_read(|host| host.children(self.id))?;
        Ok(children
            .into_iter()
            .map(|id| self.engine.element(id))
            .collect())
    }

    /// First descendant matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let found = self
            .engine
            .host_read(|host| host.query_selector(self.id, selector))?;
        Ok(found.map(|id| self.engine.element(id)))
    }

    /// Invokes the listener registered for `name` on this element. Returns
    /// whether one was registered.
    pub fn dispatch_event(&self, name: &str, detail: impl Into<Value>) -> Result<bool> {
        self.engine.dispatch_event(self.id, name, detail.into())
    }

    pub fn component(&self) -> Option<Component> {
        self.vm().map(|vm| vm.component())
    }

    pub fn vm(&self) -> Option<Vm> {
        self.engine.vm_for(self.id)
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.engine.inner, &other.engine.inner)
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandle").field("id", &self.id).finish()
    }
}

/// Query scope over a component's own subtree.
#[derive(Debug, Clone)]
pub struct Root {
    host: ElementHandle,
}

impl Root {
    pub(crate) fn new(host: ElementHandle) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &ElementHandle {
        &self.host
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        self.host.query_selector(selector)
    }
}
