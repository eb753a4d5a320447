use indexmap::IndexMap;

use crate::engine::Engine;
use crate::error::Result;
use crate::host::{HostError, NodeId};
use crate::value::Value;

/// Writes host properties that differ from the element's current value.
pub(super) fn update(
    engine: &Engine,
    elm: NodeId,
    old: &IndexMap<String, Value>,
    new: &IndexMap<String, Value>,
) -> Result<()> {
    if old.is_empty() && new.is_empty() {
        return Ok(());
    }
    engine.host_write(|host| -> Result<(), HostError> {
        for name in old.keys() {
            if !new.contains_key(name) {
                host.set_property(elm, name, Value::Undefined)?;
            }
        }
        for (name, value) in new {
            if host.get_property(elm, name)? != *value {
                host.set_property(elm, name, value.clone())?;
            }
        }
        Ok(())
    })?;
    Ok(())
}
