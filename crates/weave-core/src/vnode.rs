use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::key_hash;
use crate::component::{Component, ComponentDef};
use crate::error::Result;
use crate::host::NodeId;
use crate::value::Value;
use crate::vm::Vm;

/// Identity of a child within a keyed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u64);

impl Key {
    pub fn of<K: Hash + ?Sized>(source: &K) -> Self {
        Key(key_hash(source))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::of(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::of(value.as_str())
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key::of(&value)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::of(&(value as u64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VNodeKind {
    Element,
    Text,
    Component,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StyleValue {
    #[default]
    None,
    Text(String),
    Map(IndexMap<String, String>),
}

impl From<Value> for StyleValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined | Value::Null => StyleValue::None,
            Value::String(s) => StyleValue::Text(s.to_string()),
            Value::Object(obj) => StyleValue::Map(
                obj.entries()
                    .into_iter()
                    .filter(|(_, v)| !v.is_nullish())
                    .map(|(k, v)| (k, v.to_display_string()))
                    .collect(),
            ),
            other => StyleValue::Text(other.to_display_string()),
        }
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        StyleValue::Text(value.to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StyleValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        StyleValue::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    pub detail: Value,
}

#[derive(Clone)]
pub struct Listener {
    handler: Rc<dyn Fn(&Event) -> Result<()>>,
}

impl Listener {
    pub fn new(handler: impl Fn(&Event) -> Result<()> + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
        }
    }

    pub fn call(&self, event: &Event) -> Result<()> {
        (self.handler)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.handler, &other.handler)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener")
    }
}

/// Recognized keys of a vnode's data object.
#[derive(Debug, Clone, Default)]
pub struct VNodeData {
    pub key: Option<Key>,
    pub props: IndexMap<String, Value>,
    pub attrs: IndexMap<String, Value>,
    pub style: StyleValue,
    pub class_name: Option<String>,
    pub on: IndexMap<String, Listener>,
    pub slot: Option<String>,
}

impl VNodeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn style(mut self, style: impl Into<StyleValue>) -> Self {
        self.style = style.into();
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn on(mut self, event: impl Into<String>, listener: Listener) -> Self {
        self.on.insert(event.into(), listener);
        self
    }

    pub fn slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }
}

#[derive(Clone)]
pub(crate) enum NodeKind {
    Element,
    Text(String),
    Component(Rc<ComponentDef>),
}

/// Descriptor of the desired output at one tree position.
///
/// Produced fresh by every render; the engine only records where it was
/// mounted (`elm`) and, for component vnodes, the owning instance.
pub struct VNode {
    pub(crate) node: NodeKind,
    pub(crate) tag: Option<String>,
    pub(crate) data: VNodeData,
    pub(crate) children: Vec<VNode>,
    pub(crate) elm: Cell<Option<NodeId>>,
    pub(crate) vm: RefCell<Option<Vm>>,
}

impl VNode {
    pub(crate) fn element(tag: &str, data: VNodeData, children: Vec<VNode>) -> Self {
        Self::new(NodeKind::Element, Some(tag), data, children)
    }

    pub(crate) fn text(text: String) -> Self {
        Self::new(NodeKind::Text(text), None, VNodeData::default(), Vec::new())
    }

    pub(crate) fn component_node(
        tag: &str,
        def: Rc<ComponentDef>,
        data: VNodeData,
        children: Vec<VNode>,
    ) -> Self {
        Self::new(NodeKind::Component(def), Some(tag), data, children)
    }

    fn new(node: NodeKind, tag: Option<&str>, data: VNodeData, children: Vec<VNode>) -> Self {
        Self {
            node,
            tag: tag.map(str::to_ascii_lowercase),
            data,
            children,
            elm: Cell::new(None),
            vm: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> VNodeKind {
        match self.node {
            NodeKind::Element => VNodeKind::Element,
            NodeKind::Text(_) => VNodeKind::Text,
            NodeKind::Component(_) => VNodeKind::Component,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn key(&self) -> Option<Key> {
        self.data.key
    }

    pub fn data(&self) -> &VNodeData {
        &self.data
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn text_value(&self) -> Option<&str> {
        match &self.node {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn def(&self) -> Option<&Rc<ComponentDef>> {
        match &self.node {
            NodeKind::Component(def) => Some(def),
            _ => None,
        }
    }

    /// Native node this vnode was mounted on.
    pub fn elm(&self) -> Option<NodeId> {
        self.elm.get()
    }

    pub fn vm(&self) -> Option<Vm> {
        self.vm.borrow().clone()
    }

    /// Component object of a mounted component vnode.
    pub fn component(&self) -> Option<Component> {
        self.vm().map(|vm| vm.component())
    }

    /// Whether both vnodes describe the same logical node across renders.
    pub fn same_node(&self, other: &VNode) -> bool {
        self.kind() == other.kind() && self.tag == other.tag && self.data.key == other.data.key
    }
}

impl Clone for VNode {
    /// Produces an unmounted copy.
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            tag: self.tag.clone(),
            data: self.data.clone(),
            children: self.children.clone(),
            elm: Cell::new(None),
            vm: RefCell::new(None),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.kind());
        if let Some(tag) = &self.tag {
            s.field("tag", tag);
        }
        if let Some(text) = self.text_value() {
            s.field("text", &text);
        }
        if let Some(key) = self.data.key {
            s.field("key", &key);
        }
        s.field("elm", &self.elm.get());
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}
