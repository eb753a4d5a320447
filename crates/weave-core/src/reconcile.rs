//! Vnode diffing and patching against the host tree.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::bridge;
use crate::collections::map::HashMap;
use crate::component::{ComponentDef, SlotSet};
use crate::engine::{ElementHandle, Engine};
use crate::error::{Error, Result};
use crate::host::{HostError, NodeId};
use crate::modules;
use crate::runtime::Microtask;
use crate::vm::Vm;
use crate::vnode::{Key, NodeKind, VNode, VNodeData};

/// What a patch is applied to.
#[derive(Debug, Clone, Copy)]
pub enum PatchTarget<'a> {
    /// A bare host element: full mount, adopting it when the tag matches.
    Element(NodeId),
    /// The vnode produced by an earlier patch.
    VNode(&'a VNode),
}

impl From<NodeId> for PatchTarget<'_> {
    fn from(id: NodeId) -> Self {
        PatchTarget::Element(id)
    }
}

impl<'a> From<&'a VNode> for PatchTarget<'a> {
    fn from(vnode: &'a VNode) -> Self {
        PatchTarget::VNode(vnode)
    }
}

impl From<&ElementHandle> for PatchTarget<'_> {
    fn from(element: &ElementHandle) -> Self {
        PatchTarget::Element(element.id())
    }
}

impl Engine {
    /// Mounts or updates `vnode` and returns the host node it ended up on.
    pub fn patch<'a>(&self, target: impl Into<PatchTarget<'a>>, vnode: &VNode) -> Result<NodeId> {
        match target.into() {
            PatchTarget::Element(elm) => self.mount_on(elm, vnode),
            PatchTarget::VNode(old) if old.same_node(vnode) => {
                self.patch_vnode(old, vnode, 0)?;
                vnode.elm().ok_or(Error::NotMounted)
            }
            PatchTarget::VNode(old) => {
                let old_elm = old.elm().ok_or(Error::NotMounted)?;
                let elm = self.create_elm(vnode, None, false, 0)?;
                self.replace_in_parent(old_elm, elm)?;
                self.teardown(old)?;
                self.host_write(|host| host.release(old_elm))?;
                Ok(elm)
            }
        }
    }

    /// Tears down `vnode` and detaches its node from the host parent. The
    /// node stays alive in the host so it can be mounted again.
    pub fn unmount(&self, vnode: &VNode) -> Result<()> {
        self.teardown(vnode)?;
        let Some(elm) = vnode.elm() else {
            return Ok(());
        };
        self.host_write(|host| -> Result<(), HostError> {
            if let Some(parent) = host.parent(elm)? {
                host.remove_child(parent, elm)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn mount_on(&self, elm: NodeId, vnode: &VNode) -> Result<NodeId> {
        let tag = self.host_read(|host| host.tag_name(elm))?;
        let adoptable = !matches!(vnode.node, NodeKind::Text(_))
            && tag.as_deref() == vnode.tag()
            && self.vm_for(elm).is_none();
        if adoptable {
            return self.create_elm(vnode, Some(elm), false, 0);
        }
        let created = self.create_elm(vnode, None, false, 0)?;
        self.replace_in_parent(elm, created)?;
        Ok(created)
    }

    fn replace_in_parent(&self, old: NodeId, new: NodeId) -> Result<()> {
        self.host_write(|host| -> Result<(), HostError> {
            if let Some(parent) = host.parent(old)? {
                host.insert_before(parent, new, Some(old))?;
                host.remove_child(parent, old)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    pub(crate) fn create_elm(
        &self,
        vnode: &VNode,
        adopt: Option<NodeId>,
        is_root: bool,
        depth: usize,
    ) -> Result<NodeId> {
        match &vnode.node {
            NodeKind::Text(text) => {
                let id = self.host_write(|host| host.create_text(text));
                vnode.elm.set(Some(id));
                Ok(id)
            }
            NodeKind::Element => {
                let tag = vnode.tag().unwrap_or_default();
                let id = match adopt {
                    Some(id) => id,
                    None => self.host_write(|host| host.create_element(tag)),
                };
                vnode.elm.set(Some(id));
                tracing::trace!(tag, elm = id, "element created");
                modules::update(self, id, &VNodeData::default(), &vnode.data, true)?;
                for child in &vnode.children {
                    let child_elm = self.create_elm(child, None, false, depth)?;
                    self.host_write(|host| host.insert_before(id, child_elm, None))?;
                }
                Ok(id)
            }
            NodeKind::Component(def) => {
                self.create_component_elm(vnode, Rc::clone(def), adopt, is_root, depth)
            }
        }
    }

    /// Mount order: element, instance with initial props, slots, element
    /// data, first render. The connected notification is deferred.
    pub(crate) fn create_component_elm(
        &self,
        vnode: &VNode,
        def: Rc<ComponentDef>,
        adopt: Option<NodeId>,
        is_root: bool,
        depth: usize,
    ) -> Result<NodeId> {
        let tag = vnode.tag().unwrap_or_default();
        let id = match adopt {
            Some(id) => id,
            None => self.host_write(|host| host.create_element(tag)),
        };
        vnode.elm.set(Some(id));
        tracing::debug!(tag, component = def.name(), elm = id, "mounting component");

        let vm = Vm::create(self, tag, def, id, &vnode.data.props, is_root, depth)?;
        *vnode.vm.borrow_mut() = Some(vm.clone());
        self.vms_mut().insert(id, vm.clone());
        vm.set_slots(SlotSet::from_children(&vnode.children));
        modules::update(self, id, &VNodeData::default(), &vnode.data, false)?;
        self.rerender(&vm)?;
        self.runtime().enqueue(Microtask::Connected(vm.downgrade()));
        Ok(id)
    }

    fn patch_vnode(&self, old: &VNode, vnode: &VNode, depth: usize) -> Result<()> {
        let elm = old.elm().ok_or(Error::NotMounted)?;
        vnode.elm.set(Some(elm));
        match (&old.node, &vnode.node) {
            (NodeKind::Text(previous), NodeKind::Text(next)) => {
                if previous != next {
                    self.host_write(|host| host.set_text(elm, next))?;
                }
                Ok(())
            }
            (NodeKind::Component(_), NodeKind::Component(_)) => {
                let vm = old.vm().ok_or(Error::NotMounted)?;
                *vnode.vm.borrow_mut() = Some(vm.clone());
                modules::update(self, elm, &old.data, &vnode.data, false)?;
                if !(old.children.is_empty() && vnode.children.is_empty()) {
                    vm.set_slots(SlotSet::from_children(&vnode.children));
                    vm.mark_dirty();
                }
                let warn_unknown = self.options().warn_unknown_props;
                bridge::update_props(&vm, &old.data.props, &vnode.data.props, warn_unknown)?;
                if vm.is_dirty() {
                    self.rerender(&vm)?;
                }
                Ok(())
            }
            _ => {
                modules::update(self, elm, &old.data, &vnode.data, true)?;
                self.update_children(elm, &old.children, &vnode.children, depth)
            }
        }
    }

    /// Reconciles children by key; unkeyed children pair up in order.
    pub(crate) fn update_children(
        &self,
        parent: NodeId,
        old: &[VNode],
        next: &[VNode],
        depth: usize,
    ) -> Result<()> {
        let mut keyed: HashMap<Key, usize> = HashMap::new();
        let mut unkeyed: VecDeque<usize> = VecDeque::new();
        for (index, child) in old.iter().enumerate() {
            match child.key() {
                Some(key) => {
                    keyed.entry(key).or_insert(index);
                }
                None => unkeyed.push_back(index),
            }
        }

        let mut reused = vec![false; old.len()];
        for child in next {
            let candidate = match child.key() {
                Some(key) => keyed.remove(&key),
                None => unkeyed.pop_front(),
            };
            match candidate.filter(|&index| old[index].same_node(child)) {
                Some(index) => {
                    reused[index] = true;
                    self.patch_vnode(&old[index], child, depth)?;
                }
                None => {
                    self.create_elm(child, None, false, depth)?;
                }
            }
        }

        for (child, reused) in old.iter().zip(&reused) {
            if !reused {
                self.remove_vnode(parent, child)?;
            }
        }

        let target: Vec<NodeId> = next.iter().filter_map(VNode::elm).collect();
        self.host_write(|host| -> Result<(), HostError> {
            let mut current = host.children(parent)?;
            for (index, &child) in target.iter().enumerate() {
                let reference = current.get(index).copied();
                if reference == Some(child) {
                    continue;
                }
                host.insert_before(parent, child, reference)?;
                if let Some(position) = current.iter().position(|&c| c == child) {
                    current.remove(position);
                }
                current.insert(index, child);
            }
            Ok(())
        })?;
        Ok(())
    }

    fn remove_vnode(&self, parent: NodeId, vnode: &VNode) -> Result<()> {
        self.teardown(vnode)?;
        if let Some(elm) = vnode.elm() {
            self.host_write(|host| -> Result<(), HostError> {
                host.remove_child(parent, elm)?;
                host.release(elm)
            })?;
        }
        Ok(())
    }

    /// Runs teardown for every instance in the subtree, parents first.
    pub(crate) fn teardown(&self, vnode: &VNode) -> Result<()> {
        if let Some(elm) = vnode.elm() {
            self.listeners_mut().remove(&elm);
        }
        match &vnode.node {
            NodeKind::Component(_) => match vnode.vm() {
                Some(vm) => self.destroy_vm(&vm),
                None => Ok(()),
            },
            _ => {
                for child in &vnode.children {
                    self.teardown(child)?;
                }
                Ok(())
            }
        }
    }

    fn destroy_vm(&self, vm: &Vm) -> Result<()> {
        if !vm.unmount() {
            return Ok(());
        }
        self.vms_mut().remove(&vm.elm());
        let hook_result = match vm.def().disconnected_hook().cloned() {
            Some(hook) => hook(&vm.component()),
            None => Ok(()),
        };
        for child in &vm.take_children() {
            self.teardown(child)?;
        }
        hook_result
    }

    /// Renders `vm` and patches its previous output into the new one.
    pub(crate) fn rerender(&self, vm: &Vm) -> Result<()> {
        if vm.is_rendering() {
            vm.mark_dirty();
            return Ok(());
        }
        let next = vm.render()?;
        let previous = vm.take_children();
        let patched = self.update_children(vm.elm(), &previous, &next, vm.depth() + 1);
        vm.set_children(next);
        patched?;
        vm.finish_render();
        tracing::trace!(component = vm.def().name(), renders = vm.render_count(), "rendered");
        match vm.def().rendered_hook().cloned() {
            Some(hook) => hook(&vm.component()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
