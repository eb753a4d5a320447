//! Per-concern diffing of vnode data onto a host element.

mod attrs;
mod events;
mod props;
mod style;

use crate::engine::Engine;
use crate::error::Result;
use crate::host::NodeId;
use crate::vnode::VNodeData;

/// Applies the difference between `old` and `new` to `elm`. Host properties
/// are only written for plain elements; component vnodes route `props`
/// through the public surface instead.
pub(crate) fn update(
    engine: &Engine,
    elm: NodeId,
    old: &VNodeData,
    new: &VNodeData,
    host_props: bool,
) -> Result<()> {
    attrs::update_class(engine, elm, old.class_name.as_deref(), new.class_name.as_deref())?;
    attrs::update(engine, elm, &old.attrs, &new.attrs)?;
    style::update(engine, elm, &old.style, &new.style)?;
    if host_props {
        props::update(engine, elm, &old.props, &new.props)?;
    }
    events::update(engine, elm, &old.on, &new.on);
    Ok(())
}
