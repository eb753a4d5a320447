#![doc = r"Reactive rendering core: vnode reconciliation, component instances and the public surface exposed on host elements."]

pub mod api;
mod bridge;
pub mod collections;
mod component;
mod document;
mod engine;
mod error;
mod host;
mod modules;
pub mod platform;
mod reconcile;
mod runtime;
mod value;
mod vm;
mod vnode;

pub use api::Api;
pub use component::{
    create_component, AccessMode, Accessor, AttributeChanged, Component, ComponentBuilder,
    ComponentDef, Getter, Hook, Method, RenderFn, Setter, SlotSet, Template, TemplateContext,
};
pub use document::{MemoryDocument, NodeStats};
pub use engine::{ElementHandle, Engine, EngineOptions, Root};
pub use error::{Error, Result};
pub use host::{Host, HostError, NodeId};
pub use platform::RuntimeScheduler;
pub use reconcile::PatchTarget;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use value::{Func, ObjectRef, Value};
pub use vm::{Vm, VmState};
pub use vnode::{Event, Key, Listener, StyleValue, VNode, VNodeData, VNodeKind};

pub mod prelude {
    pub use crate::api::{c, c_with_slots, d, h, t, Api};
    pub use crate::{
        AccessMode, Component, ComponentDef, ElementHandle, Engine, Error, MemoryDocument,
        Result, SlotSet, Template, TemplateContext, VNode, VNodeData, Value,
    };
}
