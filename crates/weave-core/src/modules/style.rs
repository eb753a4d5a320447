use crate::engine::Engine;
use crate::error::Result;
use crate::host::{HostError, NodeId};
use crate::vnode::StyleValue;

/// String styles are written whole; object styles key by key, removing
/// properties the new object no longer carries.
pub(super) fn update(
    engine: &Engine,
    elm: NodeId,
    old: &StyleValue,
    new: &StyleValue,
) -> Result<()> {
    if old == new || (is_blank(old) && is_blank(new)) {
        return Ok(());
    }
    tracing::trace!(elm, "style changed");
    engine.host_write(|host| -> Result<(), HostError> {
        match (old, new) {
            (StyleValue::Map(previous), StyleValue::None) => {
                for name in previous.keys() {
                    host.remove_style_property(elm, name)?;
                }
            }
            (_, StyleValue::None) => host.set_style_text(elm, "")?,
            (_, StyleValue::Text(text)) => host.set_style_text(elm, text)?,
            (StyleValue::Map(previous), StyleValue::Map(next)) => {
                for name in previous.keys() {
                    if !next.contains_key(name) {
                        host.remove_style_property(elm, name)?;
                    }
                }
                for (name, value) in next {
                    if previous.get(name) != Some(value) {
                        host.set_style_property(elm, name, value)?;
                    }
                }
            }
            (StyleValue::Text(_), StyleValue::Map(next)) => {
                host.set_style_text(elm, "")?;
                for (name, value) in next {
                    host.set_style_property(elm, name, value)?;
                }
            }
            (StyleValue::None, StyleValue::Map(next)) => {
                for (name, value) in next {
                    host.set_style_property(elm, name, value)?;
                }
            }
        }
        Ok(())
    })?;
    Ok(())
}

fn is_blank(style: &StyleValue) -> bool {
    match style {
        StyleValue::None => true,
        StyleValue::Text(text) => text.trim().is_empty(),
        StyleValue::Map(map) => map.is_empty(),
    }
}

#[cfg(test)]
#[path = "tests/style_tests.rs"]
mod tests;
