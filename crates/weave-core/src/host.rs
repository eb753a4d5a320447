//! Native element tree contract.
//!
//! The engine never owns the element tree; it drives it through [`Host`].
//! Node ids are handed out by the host and stay valid until the host drops
//! the node.

use std::any::Any;

use crate::value::Value;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("node {id} missing")]
    Missing { id: NodeId },
    #[error("node {id} is not an element")]
    NotAnElement { id: NodeId },
}

pub trait Host: Any {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Lower-cased tag name, or `None` for text nodes.
    fn tag_name(&self, id: NodeId) -> Result<Option<String>, HostError>;
    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), HostError>;
    fn text_content(&self, id: NodeId) -> Result<String, HostError>;

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>, HostError>;
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, HostError>;
    /// Inserts `child` before `reference`, appending when `reference` is `None`.
    /// A child that already has a parent is detached first.
    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn get_attribute(&self, id: NodeId, name: &str) -> Result<Option<String>, HostError>;
    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), HostError>;
    fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), HostError>;

    fn style_text(&self, id: NodeId) -> Result<String, HostError>;
    fn set_style_text(&mut self, id: NodeId, text: &str) -> Result<(), HostError>;
    fn set_style_property(&mut self, id: NodeId, name: &str, value: &str)
        -> Result<(), HostError>;
    fn remove_style_property(&mut self, id: NodeId, name: &str) -> Result<(), HostError>;

    fn get_property(&self, id: NodeId, name: &str) -> Result<Value, HostError>;
    fn set_property(&mut self, id: NodeId, name: &str, value: Value) -> Result<(), HostError>;

    /// First descendant of `root` (excluding `root`) matching `selector`.
    fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, HostError>;

    /// Drops a node and its subtree once the engine no longer references
    /// them. Hosts that manage node lifetime themselves keep the default.
    fn release(&mut self, _id: NodeId) -> Result<(), HostError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
