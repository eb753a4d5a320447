use indexmap::IndexMap;

use crate::engine::Engine;
use crate::error::Result;
use crate::host::NodeId;
use crate::value::Value;

/// String form of an attribute value; `None` means the attribute is absent.
fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        other => Some(other.to_display_string()),
    }
}

pub(super) fn update(
    engine: &Engine,
    elm: NodeId,
    old: &IndexMap<String, Value>,
    new: &IndexMap<String, Value>,
) -> Result<()> {
    for (name, previous) in old {
        if !new.contains_key(name) && attribute_value(previous).is_some() {
            engine.write_attribute(elm, name, None)?;
        }
    }
    for (name, value) in new {
        let next = attribute_value(value);
        let previous = old.get(name).and_then(attribute_value);
        if previous == next {
            continue;
        }
        engine.write_attribute(elm, name, next.as_deref())?;
    }
    Ok(())
}

pub(super) fn update_class(
    engine: &Engine,
    elm: NodeId,
    old: Option<&str>,
    new: Option<&str>,
) -> Result<()> {
    if old == new {
        return Ok(());
    }
    engine.write_attribute(elm, "class", new)
}
