//! Public surface of a component as seen through its host element.
//!
//! Owner writes (mount and patch prop maps) and external writes (assignment
//! on the element) funnel through [`assign`], so a declared setter observes
//! every one of them.

use indexmap::IndexMap;

use crate::component::{AccessMode, ComponentDef};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::vm::Vm;

/// Rejects declarations that cannot be exposed: getter modes without a
/// getter, setters without getters, and public methods with no body.
pub(crate) fn validate_declarations(def: &ComponentDef) -> Result<()> {
    let component = def.name();
    for (prop, mode) in def.public_props() {
        let accessor = def.accessor(prop);
        let has_get = accessor.is_some_and(|a| a.get.is_some());
        let has_set = accessor.is_some_and(|a| a.set.is_some());
        let failure = match mode {
            AccessMode::Field => None,
            AccessMode::Getter | AccessMode::Accessor if !has_get => Some(Error::MissingGetter {
                component: component.to_string(),
                prop: prop.to_string(),
            }),
            AccessMode::Accessor if !has_set => Some(Error::MissingSetter {
                component: component.to_string(),
                prop: prop.to_string(),
            }),
            AccessMode::Getter | AccessMode::Accessor => None,
            AccessMode::Setter if !has_set => Some(Error::MissingSetter {
                component: component.to_string(),
                prop: prop.to_string(),
            }),
            AccessMode::Setter => Some(Error::SetterOnlyProperty {
                component: component.to_string(),
                prop: prop.to_string(),
            }),
        };
        if let Some(err) = failure {
            return Err(err);
        }
    }
    for method in def.public_methods() {
        if def.method(method).is_none() {
            return Err(Error::MissingMethod {
                component: component.to_string(),
                method: method.clone(),
            });
        }
    }
    Ok(())
}

fn read_only(vm: &Vm, prop: &str) -> Error {
    Error::ReadOnlyProperty {
        component: vm.def().name().to_string(),
        prop: prop.to_string(),
    }
}

/// Stores `value` under a writable public prop. Accessor writes always
/// schedule a re-render; field writes only when the value changed.
fn assign(vm: &Vm, prop: &str, mode: AccessMode, value: Value) -> Result<()> {
    let component = vm.component();
    match mode {
        AccessMode::Field => {
            component.assign_field(prop, value);
            Ok(())
        }
        AccessMode::Accessor => {
            let setter = vm
                .def()
                .accessor(prop)
                .and_then(|a| a.set.clone())
                .ok_or_else(|| Error::MissingSetter {
                    component: vm.def().name().to_string(),
                    prop: prop.to_string(),
                })?;
            setter(&component, value)?;
            vm.mark_dirty();
            Ok(())
        }
        AccessMode::Getter => Err(read_only(vm, prop)),
        AccessMode::Setter => Err(Error::SetterOnlyProperty {
            component: vm.def().name().to_string(),
            prop: prop.to_string(),
        }),
    }
}

/// Owner-side write of one prop from a vnode's prop map.
pub(crate) fn apply_prop(vm: &Vm, prop: &str, value: Value, warn_unknown: bool) -> Result<()> {
    match vm.def().public_prop(prop) {
        Some(mode) => assign(vm, prop, mode, value),
        None => {
            if warn_unknown {
                tracing::warn!(
                    component = vm.def().name(),
                    prop,
                    "ignoring prop that is not part of the public surface"
                );
            }
            Ok(())
        }
    }
}

/// Applies the difference between two prop maps. Props missing from `next`
/// are reset to undefined.
pub(crate) fn update_props(
    vm: &Vm,
    previous: &IndexMap<String, Value>,
    next: &IndexMap<String, Value>,
    warn_unknown: bool,
) -> Result<()> {
    for (prop, value) in next {
        if previous.get(prop) == Some(value) {
            continue;
        }
        apply_prop(vm, prop, value.clone(), warn_unknown)?;
    }
    for prop in previous.keys() {
        if !next.contains_key(prop) {
            apply_prop(vm, prop, Value::Undefined, warn_unknown)?;
        }
    }
    Ok(())
}

/// Reads a name through the public surface. `None` when the name is not
/// part of it and the host property should be consulted instead.
pub(crate) fn read_property(vm: &Vm, name: &str) -> Result<Option<Value>> {
    let component = vm.component();
    match vm.def().public_prop(name) {
        Some(AccessMode::Field) => Ok(Some(component.field(name))),
        Some(_) => component.get(name).map(Some),
        None if vm.def().is_public_method(name) => {
            vm.bound_method(name).map(|func| Some(Value::Function(func)))
        }
        None => Ok(None),
    }
}

/// External assignment on the host element. Returns false when the name is
/// not part of the public surface.
pub(crate) fn write_property(vm: &Vm, name: &str, value: Value) -> Result<bool> {
    match vm.def().public_prop(name) {
        Some(AccessMode::Getter) => Err(read_only(vm, name)),
        Some(_) if !vm.is_root() => Err(Error::NotOwner {
            component: vm.def().name().to_string(),
            prop: name.to_string(),
        }),
        Some(mode) => assign(vm, name, mode, value).map(|()| true),
        None if vm.def().is_public_method(name) => Err(read_only(vm, name)),
        None => Ok(false),
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
