//! In-memory host document.
//!
//! Arena backed, with per-node write counters so tests can observe how many
//! host calls a patch produced.

use std::any::Any;

use indexmap::IndexMap;

use crate::collections::map::HashMap;
use crate::host::{Host, HostError, NodeId};
use crate::value::Value;

/// Host write counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub style_text_writes: usize,
    pub style_property_removals: usize,
    pub attribute_writes: usize,
}

enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    properties: HashMap<String, Value>,
}

struct DocNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    stats: NodeStats,
}

pub struct MemoryDocument {
    nodes: Vec<Option<DocNode>>,
    body: NodeId,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: 0,
        };
        doc.body = doc.create_element("body");
        doc
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.insert_before(parent, child, None)
    }

    pub fn stats(&self, id: NodeId) -> NodeStats {
        self.node(id).map(|n| n.stats).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release_subtree(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get_mut(id)
            .and_then(Option::take)
            .map(|node| node.children)
            .unwrap_or_default();
        for child in children {
            self.release_subtree(child);
        }
    }

    pub fn dump_tree(&self, root: NodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Ok(node) => {
                match &node.data {
                    NodeData::Element(el) => {
                        output.push_str(&format!("{indent}<{}", el.tag));
                        for (name, value) in &el.attributes {
                            output.push_str(&format!(" {name}=\"{value}\""));
                        }
                        output.push_str(">\n");
                    }
                    NodeData::Text(text) => output.push_str(&format!("{indent}{text:?}\n")),
                }
                for child in &node.children {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            Err(_) => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(DocNode {
            data,
            parent: None,
            children: Vec::new(),
            stats: NodeStats::default(),
        }));
        id
    }

    fn node(&self, id: NodeId) -> Result<&DocNode, HostError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(HostError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DocNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { id })
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, HostError> {
        match &self.node(id)?.data {
            NodeData::Element(el) => Ok(el),
            NodeData::Text(_) => Err(HostError::NotAnElement { id }),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<(&mut ElementData, &mut NodeStats), HostError> {
        let node = self.node_mut(id)?;
        match &mut node.data {
            NodeData::Element(el) => Ok((el, &mut node.stats)),
            NodeData::Text(_) => Err(HostError::NotAnElement { id }),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Ok(node) = self.node(id) {
            match &node.data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Element(_) => {
                    for child in &node.children {
                        self.collect_text(*child, out);
                    }
                }
            }
        }
    }

    fn find_descendant(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        let node = self.node(root).ok()?;
        for &child in &node.children {
            if let Ok(el) = self.element(child) {
                if selector.matches(el) {
                    return Some(child);
                }
            }
            if let Some(found) = self.find_descendant(child, selector) {
                return Some(found);
            }
        }
        None
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_style(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_style(text: &str) -> IndexMap<String, String> {
    text.split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            (!name.is_empty() && !value.is_empty())
                .then(|| (name.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

enum Selector {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl Selector {
    fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        if s == "*" {
            return Some(Self::Universal);
        }
        if let Some(id) = s.strip_prefix('#') {
            return Some(Self::Id(id.to_string()));
        }
        if let Some(class) = s.strip_prefix('.') {
            return Some(Self::Class(class.to_string()));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return Some(match inner.split_once('=') {
                Some((name, value)) => Self::Attribute {
                    name: name.trim().to_ascii_lowercase(),
                    value: Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                },
                None => Self::Attribute {
                    name: inner.trim().to_ascii_lowercase(),
                    value: None,
                },
            });
        }
        Some(Self::Tag(s.to_ascii_lowercase()))
    }

    fn matches(&self, el: &ElementData) -> bool {
        match self {
            Selector::Universal => true,
            Selector::Tag(tag) => el.tag == *tag,
            Selector::Id(id) => el.attributes.get("id") == Some(id),
            Selector::Class(class) => el
                .attributes
                .get("class")
                .is_some_and(|list| list.split_whitespace().any(|c| c == class)),
            Selector::Attribute { name, value } => match (el.attributes.get(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
        }
    }
}

impl Host for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn tag_name(&self, id: NodeId) -> Result<Option<String>, HostError> {
        Ok(match &self.node(id)?.data {
            NodeData::Element(el) => Some(el.tag.clone()),
            NodeData::Text(_) => None,
        })
    }

    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), HostError> {
        let node = self.node_mut(id)?;
        if let NodeData::Text(current) = &mut node.data {
            *current = text.to_string();
            return Ok(());
        }
        let children = std::mem::take(&mut node.children);
        for child in children {
            if let Ok(child) = self.node_mut(child) {
                child.parent = None;
            }
        }
        let text_node = self.create_text(text);
        self.append_child(id, text_node)
    }

    fn text_content(&self, id: NodeId) -> Result<String, HostError> {
        self.node(id)?;
        let mut out = String::new();
        self.collect_text(id, &mut out);
        Ok(out)
    }

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>, HostError> {
        Ok(self.node(id)?.parent)
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, HostError> {
        Ok(self.node(id)?.children.clone())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError> {
        self.element(parent)?;
        if let Some(previous) = self.node(child)?.parent {
            self.node_mut(previous)?.children.retain(|c| *c != child);
        }
        let siblings = &mut self.node_mut(parent)?.children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.node_mut(parent)?.children.retain(|c| *c != child);
        let node = self.node_mut(child)?;
        if node.parent == Some(parent) {
            node.parent = None;
        }
        Ok(())
    }

    fn get_attribute(&self, id: NodeId, name: &str) -> Result<Option<String>, HostError> {
        Ok(self
            .element(id)?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned())
    }

    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        let (el, stats) = self.element_mut(id)?;
        stats.attribute_writes += 1;
        if name == "style" {
            el.style = parse_style(value);
        }
        el.attributes.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), HostError> {
        let (el, stats) = self.element_mut(id)?;
        stats.attribute_writes += 1;
        if name == "style" {
            el.style.clear();
        }
        el.attributes.shift_remove(&name.to_ascii_lowercase());
        Ok(())
    }

    fn style_text(&self, id: NodeId) -> Result<String, HostError> {
        Ok(serialize_style(&self.element(id)?.style))
    }

    fn set_style_text(&mut self, id: NodeId, text: &str) -> Result<(), HostError> {
        let (el, stats) = self.element_mut(id)?;
        stats.style_text_writes += 1;
        el.style = parse_style(text);
        Ok(())
    }

    fn set_style_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), HostError> {
        let (el, _) = self.element_mut(id)?;
        el.style.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn remove_style_property(&mut self, id: NodeId, name: &str) -> Result<(), HostError> {
        let (el, stats) = self.element_mut(id)?;
        stats.style_property_removals += 1;
        el.style.shift_remove(name);
        Ok(())
    }

    fn get_property(&self, id: NodeId, name: &str) -> Result<Value, HostError> {
        Ok(self
            .element(id)?
            .properties
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn set_property(&mut self, id: NodeId, name: &str, value: Value) -> Result<(), HostError> {
        let (el, _) = self.element_mut(id)?;
        el.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        self.node(root)?;
        Ok(Selector::parse(selector).and_then(|sel| self.find_descendant(root, &sel)))
    }

    fn release(&mut self, id: NodeId) -> Result<(), HostError> {
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }
        self.release_subtree(id);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
