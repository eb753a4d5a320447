use indexmap::IndexMap;

use crate::engine::Engine;
use crate::host::NodeId;
use crate::vnode::Listener;

pub(super) fn update(
    engine: &Engine,
    elm: NodeId,
    old: &IndexMap<String, Listener>,
    new: &IndexMap<String, Listener>,
) {
    if old.is_empty() && new.is_empty() {
        return;
    }
    let mut listeners = engine.listeners_mut();
    if new.is_empty() {
        listeners.remove(&elm);
    } else {
        listeners.insert(elm, new.clone());
    }
}
