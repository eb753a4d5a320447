//! Vnode constructors consumed by compiled templates.

use std::rc::Rc;

use crate::component::ComponentDef;
use crate::value::Value;
use crate::vnode::{VNode, VNodeData};

/// The `$api` object handed to templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Api;

impl Api {
    /// Native element vnode.
    pub fn h(&self, tag: &str, data: VNodeData, children: Vec<VNode>) -> VNode {
        h(tag, data, children)
    }

    /// Component vnode.
    pub fn c(&self, tag: &str, def: &Rc<ComponentDef>, data: VNodeData) -> VNode {
        c(tag, def, data)
    }

    /// Component vnode with slotted children.
    pub fn c_with_slots(
        &self,
        tag: &str,
        def: &Rc<ComponentDef>,
        data: VNodeData,
        children: Vec<VNode>,
    ) -> VNode {
        c_with_slots(tag, def, data, children)
    }

    /// Static text vnode.
    pub fn t(&self, text: &str) -> VNode {
        t(text)
    }

    /// Dynamic text vnode.
    pub fn d(&self, value: impl Into<Value>) -> VNode {
        d(value)
    }
}

pub fn h(tag: &str, data: VNodeData, children: Vec<VNode>) -> VNode {
    VNode::element(tag, data, children)
}

pub fn c(tag: &str, def: &Rc<ComponentDef>, data: VNodeData) -> VNode {
    VNode::component_node(tag, Rc::clone(def), data, Vec::new())
}

pub fn c_with_slots(
    tag: &str,
    def: &Rc<ComponentDef>,
    data: VNodeData,
    children: Vec<VNode>,
) -> VNode {
    VNode::component_node(tag, Rc::clone(def), data, children)
}

pub fn t(text: &str) -> VNode {
    VNode::text(text.to_string())
}

/// `undefined` and `null` render as empty text.
pub fn d(value: impl Into<Value>) -> VNode {
    let value = value.into();
    let text = if value.is_nullish() {
        String::new()
    } else {
        value.to_display_string()
    };
    VNode::text(text)
}
