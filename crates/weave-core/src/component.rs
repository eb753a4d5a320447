//! Component descriptors and component objects.
//!
//! A component is a capability-tagged record: an immutable [`ComponentDef`]
//! holding the declaration tables, paired with a per-instance [`Component`]
//! state object that plays the role of `this` for every accessor, method and
//! hook.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::api::Api;
use crate::collections::map::{HashMap, HashSet};
use crate::engine::{ElementHandle, Root};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::vm::{Vm, VmInner};
use crate::vnode::VNode;

/// Access contract of a public property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Plain field, optionally with a default. Readable, settable by the owner.
    Field,
    /// Computed getter. Readable, never settable from outside.
    Getter,
    /// Setter without getter. Always a declaration error.
    Setter,
    /// Getter and setter. Readable, settable by the owner.
    Accessor,
}

pub type Getter = Rc<dyn Fn(&Component) -> Result<Value>>;
pub type Setter = Rc<dyn Fn(&Component, Value) -> Result<()>>;
pub type Method = Rc<dyn Fn(&Component, &[Value]) -> Result<Value>>;
pub type Hook = Rc<dyn Fn(&Component) -> Result<()>>;
pub type RenderFn = Rc<dyn Fn(&Component) -> Result<Template>>;
pub type AttributeChanged = Rc<dyn Fn(&Component, &str, Option<&str>, Option<&str>) -> Result<()>>;

#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

#[derive(Clone)]
enum FieldInit {
    Value(Value),
    With(Rc<dyn Fn() -> Value>),
}

impl FieldInit {
    fn produce(&self) -> Value {
        match self {
            FieldInit::Value(value) => value.clone(),
            FieldInit::With(init) => init(),
        }
    }
}

type TemplateFn = dyn Fn(&Api, &Component, &SlotSet, &TemplateContext) -> Result<Vec<VNode>>;

/// Compiled template: `(api, component, slots, context) -> children`.
#[derive(Clone)]
pub struct Template(Rc<TemplateFn>);

impl Template {
    pub fn new(
        f: impl Fn(&Api, &Component, &SlotSet, &TemplateContext) -> Result<Vec<VNode>> + 'static,
    ) -> Self {
        Template(Rc::new(f))
    }

    /// Template producing no children.
    pub fn empty() -> Self {
        Template::new(|_, _, _, _| Ok(Vec::new()))
    }

    pub fn call(
        &self,
        api: &Api,
        component: &Component,
        slots: &SlotSet,
        context: &TemplateContext,
    ) -> Result<Vec<VNode>> {
        (self.0)(api, component, slots, context)
    }
}

/// Slotted children supplied by the owner, grouped by slot name.
#[derive(Debug, Clone, Default)]
pub struct SlotSet {
    slots: IndexMap<String, Vec<VNode>>,
}

impl SlotSet {
    pub const DEFAULT: &'static str = "";

    pub(crate) fn from_children(children: &[VNode]) -> Self {
        let mut slots: IndexMap<String, Vec<VNode>> = IndexMap::new();
        for child in children {
            let name = child.data.slot.clone().unwrap_or_default();
            slots.entry(name).or_default().push(child.clone());
        }
        Self { slots }
    }

    /// Fresh copies of the vnodes assigned to `name`.
    pub fn get(&self, name: &str) -> Vec<VNode> {
        self.slots.get(name).cloned().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-instance template context; the memo table survives re-renders.
pub struct TemplateContext {
    tag_name: String,
    memo: RefCell<HashMap<String, Value>>,
}

impl TemplateContext {
    pub(crate) fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn memo(&self, key: &str, init: impl FnOnce() -> Value) -> Value {
        if let Some(value) = self.memo.borrow().get(key) {
            return value.clone();
        }
        let value = init();
        self.memo.borrow_mut().insert(key.to_string(), value.clone());
        value
    }
}

#[derive(Default, Clone)]
struct Hooks {
    constructor: Option<Hook>,
    connected: Option<Hook>,
    rendered: Option<Hook>,
    disconnected: Option<Hook>,
    attribute_changed: Option<AttributeChanged>,
}

/// Immutable component declaration.
pub struct ComponentDef {
    name: String,
    fields: Vec<(String, FieldInit)>,
    accessors: HashMap<String, Accessor>,
    methods: HashMap<String, Method>,
    public_props: IndexMap<String, AccessMode>,
    public_methods: Vec<String>,
    observed_attributes: Vec<String>,
    tracked: HashSet<String>,
    render: Option<RenderFn>,
    hooks: Hooks,
}

impl ComponentDef {
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_props(&self) -> impl Iterator<Item = (&str, AccessMode)> {
        self.public_props.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn public_prop(&self, name: &str) -> Option<AccessMode> {
        self.public_props.get(name).copied()
    }

    pub fn public_methods(&self) -> &[String] {
        &self.public_methods
    }

    pub fn is_public_method(&self, name: &str) -> bool {
        self.public_methods.iter().any(|m| m == name)
    }

    pub fn observed_attributes(&self) -> &[String] {
        &self.observed_attributes
    }

    pub fn observes(&self, attribute: &str) -> bool {
        self.observed_attributes.iter().any(|a| a == attribute)
    }

    pub fn is_tracked(&self, field: &str) -> bool {
        self.tracked.contains(field)
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub(crate) fn render_fn(&self) -> Option<&RenderFn> {
        self.render.as_ref()
    }

    pub(crate) fn connected_hook(&self) -> Option<&Hook> {
        self.hooks.connected.as_ref()
    }

    pub(crate) fn rendered_hook(&self) -> Option<&Hook> {
        self.hooks.rendered.as_ref()
    }

    pub(crate) fn disconnected_hook(&self) -> Option<&Hook> {
        self.hooks.disconnected.as_ref()
    }

    pub(crate) fn attribute_changed_hook(&self) -> Option<&AttributeChanged> {
        self.hooks.attribute_changed.as_ref()
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("public_props", &self.public_props)
            .field("public_methods", &self.public_methods)
            .field("observed_attributes", &self.observed_attributes)
            .finish_non_exhaustive()
    }
}

pub struct ComponentBuilder {
    def: ComponentDef,
}

impl ComponentBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            def: ComponentDef {
                name: name.into(),
                fields: Vec::new(),
                accessors: HashMap::new(),
                methods: HashMap::new(),
                public_props: IndexMap::new(),
                public_methods: Vec::new(),
                observed_attributes: Vec::new(),
                tracked: HashSet::new(),
                render: None,
                hooks: Hooks::default(),
            },
        }
    }

    /// Field default. Objects are shared between instances; use
    /// [`field_with`](Self::field_with) for a fresh value per instance.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.def
            .fields
            .push((name.into(), FieldInit::Value(value.into())));
        self
    }

    pub fn field_with(mut self, name: impl Into<String>, init: impl Fn() -> Value + 'static) -> Self {
        self.def
            .fields
            .push((name.into(), FieldInit::With(Rc::new(init))));
        self
    }

    pub fn getter(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&Component) -> Result<Value> + 'static,
    ) -> Self {
        self.def.accessors.entry(name.into()).or_default().get = Some(Rc::new(get));
        self
    }

    pub fn setter(
        mut self,
        name: impl Into<String>,
        set: impl Fn(&Component, Value) -> Result<()> + 'static,
    ) -> Self {
        self.def.accessors.entry(name.into()).or_default().set = Some(Rc::new(set));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Component, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.def.methods.insert(name.into(), Rc::new(method));
        self
    }

    pub fn public_prop(mut self, name: impl Into<String>, mode: AccessMode) -> Self {
        self.def.public_props.insert(name.into(), mode);
        self
    }

    pub fn public_method(mut self, name: impl Into<String>) -> Self {
        self.def.public_methods.push(name.into());
        self
    }

    pub fn observed_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def
            .observed_attributes
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn track(mut self, field: impl Into<String>) -> Self {
        self.def.tracked.insert(field.into());
        self
    }

    pub fn render(mut self, render: impl Fn(&Component) -> Result<Template> + 'static) -> Self {
        self.def.render = Some(Rc::new(render));
        self
    }

    pub fn constructor(mut self, hook: impl Fn(&Component) -> Result<()> + 'static) -> Self {
        self.def.hooks.constructor = Some(Rc::new(hook));
        self
    }

    pub fn connected(mut self, hook: impl Fn(&Component) -> Result<()> + 'static) -> Self {
        self.def.hooks.connected = Some(Rc::new(hook));
        self
    }

    pub fn rendered(mut self, hook: impl Fn(&Component) -> Result<()> + 'static) -> Self {
        self.def.hooks.rendered = Some(Rc::new(hook));
        self
    }

    pub fn disconnected(mut self, hook: impl Fn(&Component) -> Result<()> + 'static) -> Self {
        self.def.hooks.disconnected = Some(Rc::new(hook));
        self
    }

    pub fn attribute_changed(
        mut self,
        hook: impl Fn(&Component, &str, Option<&str>, Option<&str>) -> Result<()> + 'static,
    ) -> Self {
        self.def.hooks.attribute_changed = Some(Rc::new(hook));
        self
    }

    pub fn build(self) -> Rc<ComponentDef> {
        Rc::new(self.def)
    }
}

pub(crate) struct ComponentInner {
    def: Rc<ComponentDef>,
    fields: RefCell<HashMap<String, Value>>,
    vm: RefCell<Weak<VmInner>>,
}

/// Component state object, the `this` of accessors, methods and hooks.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Component {
    pub(crate) fn new(def: Rc<ComponentDef>) -> Self {
        Self {
            inner: Rc::new(ComponentInner {
                def,
                fields: RefCell::new(HashMap::new()),
                vm: RefCell::new(Weak::new()),
            }),
        }
    }

    pub(crate) fn attach(&self, vm: Weak<VmInner>) {
        *self.inner.vm.borrow_mut() = vm;
    }

    /// Runs field initializers and the constructor hook.
    ///
    /// Defaults for names backed by a setter go through that setter, except
    /// for names the owner is about to supply.
    pub(crate) fn initialize(&self, supplied: &IndexMap<String, Value>) -> Result<()> {
        let def = Rc::clone(&self.inner.def);
        for (name, init) in &def.fields {
            let setter = def.accessor(name).and_then(|a| a.set.clone());
            match setter {
                Some(_) if supplied.contains_key(name) => {}
                Some(setter) => setter(self, init.produce())?,
                None => {
                    self.inner
                        .fields
                        .borrow_mut()
                        .insert(name.clone(), init.produce());
                }
            }
        }
        if let Some(constructor) = &def.hooks.constructor {
            constructor(self)?;
        }
        Ok(())
    }

    pub fn def(&self) -> &Rc<ComponentDef> {
        &self.inner.def
    }

    /// Raw field value, bypassing accessors.
    pub fn field(&self, name: &str) -> Value {
        self.inner
            .fields
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Property read: accessor getter first, then the field.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(accessor) = self.inner.def.accessor(name) {
            return match &accessor.get {
                Some(getter) => getter(self),
                None => Ok(Value::Undefined),
            };
        }
        Ok(self.field(name))
    }

    /// Property write: accessor setter first, then the field.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(accessor) = self.inner.def.accessor(name) {
            return match &accessor.set {
                Some(setter) => setter(self, value),
                None => Err(Error::ReadOnlyProperty {
                    component: self.inner.def.name.clone(),
                    prop: name.to_string(),
                }),
            };
        }
        self.assign_field(name, value);
        Ok(())
    }

    /// Raw field write, bypassing accessors. Reactive fields dirty the
    /// instance when the value changes.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) {
        self.assign_field(name, value.into());
    }

    /// Mutates a field in place and observes it as a re-assignment.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut value = self.field(name);
        let result = f(&mut value);
        self.inner
            .fields
            .borrow_mut()
            .insert(name.to_string(), value);
        if self.is_reactive_field(name) {
            self.mark_dirty();
        }
        result
    }

    pub(crate) fn assign_field(&self, name: &str, value: Value) -> bool {
        let previous = self
            .inner
            .fields
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        let changed = previous.unwrap_or_default() != value;
        if changed && self.is_reactive_field(name) {
            self.mark_dirty();
        }
        changed
    }

    fn is_reactive_field(&self, name: &str) -> bool {
        let def = &self.inner.def;
        def.is_tracked(name) || def.public_prop(name) == Some(AccessMode::Field)
    }

    pub(crate) fn mark_dirty(&self) {
        if let Some(vm) = self.vm() {
            vm.mark_dirty();
        }
    }

    /// Invokes one of the component's own methods.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let body = self
            .inner
            .def
            .method(method)
            .cloned()
            .ok_or_else(|| Error::NotAMethod {
                component: self.inner.def.name.clone(),
                name: method.to_string(),
            })?;
        body(self, args)
    }

    pub fn vm(&self) -> Option<Vm> {
        self.inner.vm.borrow().upgrade().map(Vm::from_inner)
    }

    /// Host element this component is mounted on.
    pub fn element(&self) -> Result<ElementHandle> {
        self.vm().ok_or(Error::Detached)?.element()
    }

    /// Query scope over the component's mounted subtree.
    pub fn root(&self) -> Result<Root> {
        Ok(Root::new(self.element()?))
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakComponent {
        WeakComponent(Rc::downgrade(&self.inner))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("def", &self.inner.def.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) struct WeakComponent(Weak<ComponentInner>);

impl WeakComponent {
    pub(crate) fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|inner| Component { inner })
    }
}

/// Constructs a detached component object from a component definition value.
pub fn create_component(ctor: &Value) -> Result<Component> {
    match ctor {
        Value::Component(def) => {
            let component = Component::new(Rc::clone(def));
            component.initialize(&IndexMap::new())?;
            Ok(component)
        }
        other => Err(Error::invalid_constructor(other)),
    }
}
