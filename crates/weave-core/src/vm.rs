//! Per-instance bookkeeping: the view model behind every mounted component.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;

use crate::api::Api;
use crate::bridge;
use crate::collections::map::HashMap;
use crate::component::{Component, ComponentDef, SlotSet, TemplateContext};
use crate::engine::{ElementHandle, Engine, EngineInner};
use crate::error::{Error, Result};
use crate::host::NodeId;
use crate::runtime::{RuntimeHandle, VmId};
use crate::value::{Func, Value};
use crate::vnode::VNode;

static NEXT_VM_ID: AtomicUsize = AtomicUsize::new(1);

fn next_vm_id() -> VmId {
    NEXT_VM_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Uninitialized,
    Constructed,
    Rendered,
    Dirty,
    Unmounted,
}

pub(crate) struct VmInner {
    id: VmId,
    def: Rc<ComponentDef>,
    component: Component,
    elm: NodeId,
    engine: Weak<EngineInner>,
    runtime: RuntimeHandle,
    is_root: bool,
    depth: usize,
    state: Cell<VmState>,
    dirty: Cell<bool>,
    rendering: Cell<bool>,
    connected: Cell<bool>,
    render_count: Cell<usize>,
    children: RefCell<Vec<VNode>>,
    slots: RefCell<SlotSet>,
    context: TemplateContext,
    bound_methods: RefCell<HashMap<String, Func>>,
    pending_attributes: RefCell<IndexMap<String, Option<String>>>,
    attributes_enqueued: Cell<bool>,
}

/// Handle to a component instance's view model.
#[derive(Clone)]
pub struct Vm {
    inner: Rc<VmInner>,
}

impl Vm {
    /// Validates the declaration, constructs the component object and
    /// applies the owner's initial props through the public surface.
    pub(crate) fn create(
        engine: &Engine,
        tag: &str,
        def: Rc<ComponentDef>,
        elm: NodeId,
        props: &IndexMap<String, Value>,
        is_root: bool,
        depth: usize,
    ) -> Result<Vm> {
        bridge::validate_declarations(&def)?;
        let component = Component::new(Rc::clone(&def));
        let inner = Rc::new(VmInner {
            id: next_vm_id(),
            def,
            component: component.clone(),
            elm,
            engine: engine.downgrade(),
            runtime: engine.runtime().handle(),
            is_root,
            depth,
            state: Cell::new(VmState::Uninitialized),
            dirty: Cell::new(false),
            rendering: Cell::new(false),
            connected: Cell::new(false),
            render_count: Cell::new(0),
            children: RefCell::new(Vec::new()),
            slots: RefCell::new(SlotSet::default()),
            context: TemplateContext::new(tag),
            bound_methods: RefCell::new(HashMap::new()),
            pending_attributes: RefCell::new(IndexMap::new()),
            attributes_enqueued: Cell::new(false),
        });
        component.attach(Rc::downgrade(&inner));
        let vm = Vm { inner };
        component.initialize(props)?;
        vm.inner.state.set(VmState::Constructed);
        let warn_unknown = engine.options().warn_unknown_props;
        for (name, value) in props {
            bridge::apply_prop(&vm, name, value.clone(), warn_unknown)?;
        }
        Ok(vm)
    }

    pub(crate) fn from_inner(inner: Rc<VmInner>) -> Vm {
        Vm { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<VmInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn id(&self) -> VmId {
        self.inner.id
    }

    pub fn def(&self) -> &Rc<ComponentDef> {
        &self.inner.def
    }

    pub fn component(&self) -> Component {
        self.inner.component.clone()
    }

    pub fn elm(&self) -> NodeId {
        self.inner.elm
    }

    pub fn tag_name(&self) -> &str {
        self.inner.context.tag_name()
    }

    /// Whether this instance was mounted directly by the embedder.
    pub fn is_root(&self) -> bool {
        self.inner.is_root
    }

    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn state(&self) -> VmState {
        self.inner.state.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub(crate) fn is_rendering(&self) -> bool {
        self.inner.rendering.get()
    }

    /// Completed render passes, including the first one.
    pub fn render_count(&self) -> usize {
        self.inner.render_count.get()
    }

    pub(crate) fn engine(&self) -> Result<Engine> {
        self.inner
            .engine
            .upgrade()
            .map(Engine::from_inner)
            .ok_or(Error::Detached)
    }

    pub fn element(&self) -> Result<ElementHandle> {
        Ok(self.engine()?.element(self.inner.elm))
    }

    /// Flags the instance for re-render. Only instances that already
    /// rendered (or are rendering right now) join the flush queue.
    pub fn mark_dirty(&self) {
        let state = self.inner.state.get();
        if state == VmState::Unmounted || self.inner.dirty.replace(true) {
            return;
        }
        let rendered = matches!(state, VmState::Rendered | VmState::Dirty);
        if rendered || self.inner.rendering.get() {
            if state == VmState::Rendered {
                self.inner.state.set(VmState::Dirty);
            }
            tracing::trace!(component = self.inner.def.name(), "instance marked dirty");
            self.inner
                .runtime
                .register_dirty(self.inner.id, self.downgrade());
        }
    }

    /// Runs render, then the template it returns.
    pub(crate) fn render(&self) -> Result<Vec<VNode>> {
        self.inner.dirty.set(false);
        self.inner.runtime.clear_dirty(self.inner.id);
        self.inner.rendering.set(true);
        let result = self.produce_children();
        self.inner.rendering.set(false);
        result
    }

    fn produce_children(&self) -> Result<Vec<VNode>> {
        let Some(render) = self.inner.def.render_fn().cloned() else {
            return Ok(Vec::new());
        };
        let component = &self.inner.component;
        let template = render(component)?;
        let slots = self.inner.slots.borrow().clone();
        template.call(&Api, component, &slots, &self.inner.context)
    }

    /// Flags an instance whose render failed as dirty again. False when it
    /// was unmounted meanwhile.
    pub(crate) fn restore_dirty(&self) -> bool {
        if self.inner.state.get() == VmState::Unmounted {
            return false;
        }
        self.inner.dirty.set(true);
        if self.inner.state.get() == VmState::Rendered {
            self.inner.state.set(VmState::Dirty);
        }
        true
    }

    pub(crate) fn finish_render(&self) {
        self.inner.render_count.set(self.inner.render_count.get() + 1);
        let next = if self.inner.dirty.get() {
            VmState::Dirty
        } else {
            VmState::Rendered
        };
        self.inner.state.set(next);
    }

    pub(crate) fn take_children(&self) -> Vec<VNode> {
        std::mem::take(&mut *self.inner.children.borrow_mut())
    }

    pub(crate) fn set_children(&self, children: Vec<VNode>) {
        *self.inner.children.borrow_mut() = children;
    }

    /// Rendered children of the last completed pass.
    pub fn children(&self) -> Vec<VNode> {
        self.inner.children.borrow().clone()
    }

    pub(crate) fn set_slots(&self, slots: SlotSet) {
        *self.inner.slots.borrow_mut() = slots;
    }

    /// Marks the instance connected; false when it already was or is gone.
    pub(crate) fn mark_connected(&self) -> bool {
        self.inner.state.get() != VmState::Unmounted && !self.inner.connected.replace(true)
    }

    /// Moves to `Unmounted`. Returns false when already unmounted.
    pub(crate) fn unmount(&self) -> bool {
        if self.inner.state.replace(VmState::Unmounted) == VmState::Unmounted {
            return false;
        }
        self.inner.dirty.set(false);
        self.inner.runtime.clear_dirty(self.inner.id);
        self.inner.pending_attributes.borrow_mut().clear();
        tracing::debug!(component = self.inner.def.name(), "instance unmounted");
        true
    }

    /// Records a change of an observed attribute. The first recorded
    /// previous value of a cycle wins.
    pub(crate) fn record_attribute_change(&self, name: &str, previous: Option<String>) {
        if self.inner.state.get() == VmState::Unmounted || !self.inner.def.observes(name) {
            return;
        }
        self.inner
            .pending_attributes
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(previous);
        if !self.inner.attributes_enqueued.replace(true) {
            self.inner
                .runtime
                .enqueue_attribute_delivery(self.downgrade());
        }
    }

    pub(crate) fn take_attribute_changes(&self) -> IndexMap<String, Option<String>> {
        self.inner.attributes_enqueued.set(false);
        std::mem::take(&mut *self.inner.pending_attributes.borrow_mut())
    }

    /// Callable bound to this component. The same function is returned on
    /// every read.
    pub fn bound_method(&self, name: &str) -> Result<Func> {
        let def = &self.inner.def;
        if !def.is_public_method(name) {
            return Err(Error::NotAMethod {
                component: def.name().to_string(),
                name: name.to_string(),
            });
        }
        if let Some(func) = self.inner.bound_methods.borrow().get(name) {
            return Ok(func.clone());
        }
        let method = def.method(name).cloned().ok_or_else(|| Error::MissingMethod {
            component: def.name().to_string(),
            method: name.to_string(),
        })?;
        let component = self.inner.component.downgrade();
        let func = Func::new(move |args| {
            let component = component.upgrade().ok_or(Error::Detached)?;
            method(&component, args)
        });
        self.inner
            .bound_methods
            .borrow_mut()
            .insert(name.to_string(), func.clone());
        Ok(func)
    }

    pub fn ptr_eq(&self, other: &Vm) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("id", &self.inner.id)
            .field("component", &self.inner.def.name())
            .field("elm", &self.inner.elm)
            .field("state", &self.inner.state.get())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}
