use std::rc::Rc;

use weave_core::{create_component, Func, Host, ObjectRef};
use weave_testing::prelude::*;

/// Detached `<x-foo>` appended to the body, ready to be adopted by a patch.
fn host_element(rule: &WeaveTestRule, tag: &str) -> ElementHandle {
    let id = rule
        .document(|doc| {
            let el = doc.create_element(tag);
            let body = doc.body();
            doc.append_child(body, el).map(|()| el)
        })
        .expect("host element created");
    rule.engine().element(id)
}

fn breakfast(counter: &CallCounter, seen: &Captured<Component>) -> weave_core::ComponentBuilder {
    let counter = counter.clone();
    let seen = seen.clone();
    ComponentDef::builder("x-breakfast")
        .getter("breakfast", |cmp| Ok(cmp.field("value")))
        .setter("breakfast", move |cmp, value| {
            counter.hit();
            seen.push(cmp.clone());
            cmp.set_field("value", value);
            Ok(())
        })
        .public_prop("breakfast", AccessMode::Accessor)
}

#[test]
fn create_component_rejects_non_component_values() {
    let candidates = [
        Value::Undefined,
        Value::from(""),
        Value::from(f64::NAN),
        Value::from(Func::new(|_| Ok(Value::Undefined))),
        Value::from(1),
    ];
    for candidate in &candidates {
        let err = create_component(candidate).expect_err("not a component");
        assert!(matches!(err, Error::InvalidConstructor { .. }), "{err:?}");
    }

    let def = ComponentDef::builder("x-ok").field("ready", true).build();
    let cmp = create_component(&Value::from(def)).expect("component value");
    assert_eq!(cmp.field("ready"), Value::from(true));
}

#[test]
fn attribute_callbacks_start_from_null() {
    for (attribute, value, expected) in [
        ("title", Value::from(2), "2"),
        ("data-xyz", Value::from(2), "2"),
        ("aria-describedby", Value::from("xyz"), "xyz"),
    ] {
        let rule = WeaveTestRule::new();
        let calls: Captured<(String, Option<String>, Option<String>)> = Captured::new();
        let def = {
            let calls = calls.clone();
            ComponentDef::builder("x-foo")
                .observed_attributes([attribute])
                .attribute_changed(move |_, name, old, new| {
                    calls.push((
                        name.to_string(),
                        old.map(str::to_string),
                        new.map(str::to_string),
                    ));
                    Ok(())
                })
                .build()
        };
        let elm = host_element(&rule, "x-foo");

        rule.engine()
            .patch(&elm, &c("x-foo", &def, VNodeData::new().attr(attribute, value)))
            .expect("mount succeeds");
        assert!(calls.is_empty());
        rule.tick().expect("checkpoint succeeds");

        assert_eq!(
            calls.snapshot(),
            vec![(attribute.to_string(), None, Some(expected.to_string()))]
        );
    }
}

#[test]
fn unobserved_and_unchanged_attributes_are_not_delivered() {
    let rule = WeaveTestRule::new();
    let calls = CallCounter::new();
    let def = {
        let calls = calls.clone();
        ComponentDef::builder("x-foo")
            .observed_attributes(["title"])
            .attribute_changed(move |_, _, _, _| {
                calls.hit();
                Ok(())
            })
            .build()
    };
    let elm = rule.create_element("x-foo", &def).expect("mount succeeds");

    elm.set_attribute("lang", "en").expect("write");
    elm.set_attribute("title", "a").expect("write");
    elm.remove_attribute("title").expect("remove");
    rule.tick().expect("checkpoint succeeds");

    assert_eq!(calls.count(), 0);
}

#[test]
fn public_getters_are_readable_from_the_element() {
    let rule = WeaveTestRule::new();
    let child = ComponentDef::builder("x-component")
        .field("value", "pancakes")
        .getter("breakfast", |cmp| Ok(cmp.field("value")))
        .public_prop("breakfast", AccessMode::Getter)
        .build();
    let parent = {
        let child = Rc::clone(&child);
        ComponentDef::builder("x-foo")
            .field("value", "salad")
            .getter("lunch", |cmp| Ok(cmp.field("value")))
            .public_prop("lunch", AccessMode::Getter)
            .render(move |_| {
                let child = Rc::clone(&child);
                Ok(Template::new(move |api, _, _, _| {
                    Ok(vec![api.c("x-component", &child, VNodeData::new())])
                }))
            })
            .build()
    };
    let elm = host_element(&rule, "x-foo");

    rule.engine()
        .patch(&elm, &c("x-foo", &parent, VNodeData::new()))
        .expect("mount succeeds");

    assert_eq!(elm.get("lunch").expect("read"), Value::from("salad"));
    let inner = elm
        .query_selector("x-component")
        .expect("query")
        .expect("child mounted");
    assert_eq!(inner.get("breakfast").expect("read"), Value::from("pancakes"));
}

#[test]
fn components_read_child_props_through_their_root() {
    let rule = WeaveTestRule::new();
    let shared = ObjectRef::new();
    shared.set("foo", "bar");
    let child = ComponentDef::builder("x-child")
        .field("m", shared.clone())
        .public_prop("m", AccessMode::Field)
        .build();
    let seen: Captured<Value> = Captured::new();
    let parent = {
        let child = Rc::clone(&child);
        let seen = seen.clone();
        ComponentDef::builder("x-foo")
            .method("callChildM", move |cmp, _| {
                let found = cmp.root()?.query_selector("x-child")?.ok_or(Error::NotMounted)?;
                seen.push(found.get("m")?);
                Ok(Value::Undefined)
            })
            .public_method("callChildM")
            .render(move |_| {
                let child = Rc::clone(&child);
                Ok(Template::new(move |api, _, _, _| {
                    Ok(vec![api.c("x-child", &child, VNodeData::new())])
                }))
            })
            .build()
    };
    let elm = rule.create_element("x-foo", &parent).expect("mount succeeds");

    elm.call("callChildM", &[]).expect("method succeeds");

    assert_eq!(seen.snapshot(), vec![Value::from(shared)]);
}

#[test]
fn owner_cannot_set_a_getter_prop() {
    let rule = WeaveTestRule::new();
    let def = ComponentDef::builder("x-foo")
        .getter("x", |_| Ok(Value::from(1)))
        .public_prop("x", AccessMode::Getter)
        .build();
    let elm = host_element(&rule, "x-foo");

    let err = rule
        .engine()
        .patch(&elm, &c("x-foo", &def, VNodeData::new().prop("x", 2)))
        .expect_err("getter props are read-only");

    assert!(matches!(err, Error::ReadOnlyProperty { ref prop, .. } if prop == "x"));
}

#[test]
fn computed_getters_track_reactive_state() {
    let rule = WeaveTestRule::new();
    let def = ComponentDef::builder("x-foo")
        .field_with("state", || Value::from([("value", 0)].into_iter().collect::<ObjectRef>()))
        .track("state")
        .getter("validity", |cmp| {
            let value = cmp
                .field("state")
                .as_object()
                .and_then(|state| state.get("value").as_number())
                .unwrap_or_default();
            Ok(Value::from(value > 5.0))
        })
        .public_prop("validity", AccessMode::Getter)
        .method("updateTrackedValue", |cmp, args| {
            let next = args.first().cloned().unwrap_or_default();
            cmp.update("state", |state| {
                if let Some(state) = state.as_object() {
                    state.set("value", next);
                }
            });
            Ok(Value::Undefined)
        })
        .public_method("updateTrackedValue")
        .render(|_| {
            Ok(Template::new(|api, cmp, _, _| {
                Ok(vec![api.h("div", VNodeData::new(), vec![api.d(cmp.get("validity")?)])])
            }))
        })
        .build();
    let elm = rule.create_element("x-foo", &def).expect("mount succeeds");
    assert_eq!(elm.text_content().expect("text"), "false");

    elm.call("updateTrackedValue", &[Value::from(10)])
        .expect("method succeeds");
    assert_eq!(elm.text_content().expect("text"), "false");
    rule.tick().expect("checkpoint succeeds");

    assert_eq!(elm.text_content().expect("text"), "true");
}

#[test]
fn getters_run_against_the_instance() {
    let rule = WeaveTestRule::new();
    let seen: Captured<Component> = Captured::new();
    let def = {
        let seen = seen.clone();
        ComponentDef::builder("x-foo")
            .field("value", "pancakes")
            .getter("breakfast", move |cmp| {
                seen.push(cmp.clone());
                Ok(cmp.field("value"))
            })
            .public_prop("breakfast", AccessMode::Getter)
            .build()
    };
    let elm = host_element(&rule, "x-foo");
    let vnode = c("x-foo", &def, VNodeData::new());
    rule.engine().patch(&elm, &vnode).expect("mount succeeds");

    let cmp = vnode.component().expect("component mounted");
    assert_eq!(cmp.get("breakfast").expect("read"), Value::from("pancakes"));

    assert_eq!(seen.snapshot(), vec![cmp]);
}

#[test]
fn setters_reject_writes_on_owned_elements() {
    let rule = WeaveTestRule::new();
    let counter = CallCounter::new();
    let seen = Captured::new();
    let def = breakfast(&counter, &seen).field("value", "pancakes").build();
    let elm = host_element(&rule, "x-foo");
    rule.engine()
        .patch(&elm, &c("x-foo", &def, VNodeData::new()))
        .expect("mount succeeds");

    let err = elm.set("breakfast", "hey").expect_err("not the owner");

    assert!(matches!(err, Error::NotOwner { .. }));
    assert_eq!(counter.count(), 0);
    assert_eq!(elm.get("breakfast").expect("read"), Value::from("pancakes"));
}

#[test]
fn root_elements_accept_external_writes() {
    let rule = WeaveTestRule::new();
    let counter = CallCounter::new();
    let seen = Captured::new();
    let constructed: Captured<Component> = Captured::new();
    let def = {
        let constructed = constructed.clone();
        breakfast(&counter, &seen)
            .field("value", "pancakes")
            .constructor(move |cmp| {
                constructed.push(cmp.clone());
                Ok(())
            })
            .build()
    };
    let elm = rule.create_element("x-foo", &def).expect("mount succeeds");

    elm.set("breakfast", "eggs").expect("root write");

    assert_eq!(counter.count(), 1);
    assert_eq!(seen.snapshot(), constructed.snapshot());
    assert_eq!(elm.get("breakfast").expect("read"), Value::from("eggs"));
}

#[test]
fn setters_observe_template_updates() {
    let rule = WeaveTestRule::new();
    let counter = CallCounter::new();
    let seen = Captured::new();
    let def = breakfast(&counter, &seen).field("value", "pancakes").build();
    let first = c("x-foo", &def, VNodeData::new());
    let next = c("x-foo", &def, VNodeData::new().prop("breakfast", "eggs"));

    rule.mount(&first).expect("mount succeeds");
    rule.update(&first, &next).expect("patch succeeds");

    assert_eq!(counter.count(), 1);
    assert_eq!(
        seen.snapshot(),
        vec![next.component().expect("component mounted")]
    );
}

#[test]
fn setters_receive_field_defaults() {
    let rule = WeaveTestRule::new();
    let counter = CallCounter::new();
    let seen = Captured::new();
    let def = breakfast(&counter, &seen).field("breakfast", "pancakes").build();
    let vnode = c("x-foo", &def, VNodeData::new());

    let elm = rule.mount(&vnode).expect("mount succeeds");

    assert_eq!(counter.count(), 1);
    assert_eq!(
        seen.snapshot(),
        vec![vnode.component().expect("component mounted")]
    );
    assert_eq!(elm.get("breakfast").expect("read"), Value::from("pancakes"));
}

#[test]
fn owner_values_replace_field_defaults_behind_setters() {
    let rule = WeaveTestRule::new();
    let counter = CallCounter::new();
    let seen = Captured::new();
    let def = breakfast(&counter, &seen).field("breakfast", "pancakes").build();
    let vnode = c("x-foo", &def, VNodeData::new().prop("breakfast", "waffles"));

    let elm = rule.mount(&vnode).expect("mount succeeds");

    assert_eq!(counter.count(), 1);
    assert_eq!(elm.get("breakfast").expect("read"), Value::from("waffles"));
}

#[test]
fn incomplete_accessors_fail_to_mount() {
    let rule = WeaveTestRule::new();
    let setter_only = ComponentDef::builder("x-foo")
        .setter("breakfast", |_, _| Ok(()))
        .public_prop("breakfast", AccessMode::Getter)
        .build();
    let missing_setter = ComponentDef::builder("x-foo")
        .public_prop("breakfast", AccessMode::Setter)
        .build();

    let err = rule
        .mount(&c("x-foo", &setter_only, VNodeData::new()))
        .expect_err("getter is missing");
    assert!(matches!(err, Error::MissingGetter { .. }));

    let err = rule
        .mount(&c("x-foo", &missing_setter, VNodeData::new()))
        .expect_err("setter is missing");
    assert!(matches!(err, Error::MissingSetter { .. }));
}

fn section_styled(initial: Value) -> Rc<ComponentDef> {
    ComponentDef::builder("x-foo")
        .field_with("state", move || {
            let state = ObjectRef::new();
            state.set("customStyle", initial.clone());
            Value::from(state)
        })
        .track("state")
        .render(|_| {
            Ok(Template::new(|api, cmp, _, _| {
                let style = cmp
                    .field("state")
                    .as_object()
                    .map(|state| state.get("customStyle"))
                    .unwrap_or_default();
                Ok(vec![api.h("section", VNodeData::new().style(style), vec![])])
            }))
        })
        .build()
}

fn section(elm: &ElementHandle) -> ElementHandle {
    elm.query_selector("section")
        .expect("query")
        .expect("section rendered")
}

#[test]
fn string_styles_are_written_as_css_text() {
    let rule = WeaveTestRule::new();
    let elm = host_element(&rule, "x-foo");
    rule.engine()
        .patch(&elm, &c("x-foo", &section_styled(Value::from("color: red")), VNodeData::new()))
        .expect("mount succeeds");
    rule.tick().expect("checkpoint succeeds");

    let section = section(&elm);
    assert_eq!(section.style_text().expect("style"), "color: red;");
    assert_eq!(rule.stats(&section).style_text_writes, 1);
}

#[test]
fn nullish_styles_leave_the_element_unstyled() {
    for initial in [Value::Undefined, Value::Null] {
        let rule = WeaveTestRule::new();
        let elm = host_element(&rule, "x-foo");
        rule.engine()
            .patch(&elm, &c("x-foo", &section_styled(initial), VNodeData::new()))
            .expect("mount succeeds");
        rule.tick().expect("checkpoint succeeds");

        let section = section(&elm);
        assert_eq!(elm.style_text().expect("style"), "");
        assert_eq!(section.style_text().expect("style"), "");
        assert_eq!(rule.stats(&section).style_text_writes, 0);
    }
}

#[test]
fn switching_from_object_to_string_style_removes_nothing() {
    let rule = WeaveTestRule::new();
    let initial = Value::from([("color", "red")].into_iter().collect::<ObjectRef>());
    let elm = host_element(&rule, "x-foo");
    let vnode = c("x-foo", &section_styled(initial), VNodeData::new());
    rule.engine().patch(&elm, &vnode).expect("mount succeeds");
    let section = section(&elm);
    assert_eq!(section.style_text().expect("style"), "color: red;");

    let cmp = vnode.component().expect("component mounted");
    cmp.update("state", |state| {
        if let Some(state) = state.as_object() {
            state.set("customStyle", "color:green");
        }
    });
    rule.tick().expect("checkpoint succeeds");

    assert_eq!(section.style_text().expect("style"), "color: green;");
    assert_eq!(rule.stats(&section).style_property_removals, 0);
}

fn with_method(calls: &Captured<(Component, Vec<Value>)>) -> Rc<ComponentDef> {
    let calls = calls.clone();
    ComponentDef::builder("x-foo")
        .method("m", move |cmp, args| {
            calls.push((cmp.clone(), args.to_vec()));
            Ok(Value::Undefined)
        })
        .public_method("m")
        .build()
}

#[test]
fn reading_a_public_method_does_not_invoke_it() {
    let rule = WeaveTestRule::new();
    let calls = Captured::new();
    let elm = host_element(&rule, "x-foo");
    rule.engine()
        .patch(&elm, &c("x-foo", &with_method(&calls), VNodeData::new()))
        .expect("mount succeeds");

    let value = elm.get("m").expect("read");

    assert!(value.as_function().is_some());
    assert!(calls.is_empty());
}

#[test]
fn public_methods_run_once_with_instance_and_arguments() {
    let rule = WeaveTestRule::new();
    let calls = Captured::new();
    let elm = host_element(&rule, "x-foo");
    let vnode = c("x-foo", &with_method(&calls), VNodeData::new());
    rule.engine().patch(&elm, &vnode).expect("mount succeeds");

    elm.call("m", &[Value::from(1), Value::from(2)])
        .expect("method succeeds");

    let calls = calls.snapshot();
    assert_eq!(calls.len(), 1);
    let (context, args) = &calls[0];
    assert_eq!(Some(context.clone()), vnode.component());
    assert_eq!(args, &vec![Value::from(1), Value::from(2)]);
}

#[test]
fn public_methods_keep_their_identity() {
    let rule = WeaveTestRule::new();
    let calls = Captured::new();
    let elm = host_element(&rule, "x-foo");
    rule.engine()
        .patch(&elm, &c("x-foo", &with_method(&calls), VNodeData::new()))
        .expect("mount succeeds");

    assert_eq!(elm.get("m").expect("read"), elm.get("m").expect("read"));
    assert!(elm
        .method("m")
        .expect("bound")
        .ptr_eq(&elm.method("m").expect("bound")));
}

#[test]
fn children_found_through_the_root_expose_methods_and_attributes() {
    let rule = WeaveTestRule::new();
    let child_calls = CallCounter::new();
    let child = {
        let child_calls = child_calls.clone();
        ComponentDef::builder("x-child")
            .method("m", move |_, _| {
                child_calls.hit();
                Ok(Value::Undefined)
            })
            .public_method("m")
            .build()
    };
    let find_child = |cmp: &Component| -> Result<ElementHandle> {
        cmp.root()?.query_selector("x-child")?.ok_or(Error::NotMounted)
    };
    let parent = {
        let child = Rc::clone(&child);
        ComponentDef::builder("x-foo")
            .method("callChildM", move |cmp, _| find_child(cmp)?.call("m", &[]))
            .method("setChildAttribute", move |cmp, _| {
                find_child(cmp)?.set_attribute("title", "foo")?;
                Ok(Value::Undefined)
            })
            .method("getChildAttribute", move |cmp, _| {
                Ok(Value::from(find_child(cmp)?.get_attribute("title")?))
            })
            .method("removeChildAttribute", move |cmp, _| {
                find_child(cmp)?.remove_attribute("title")?;
                Ok(Value::Undefined)
            })
            .public_method("callChildM")
            .public_method("setChildAttribute")
            .public_method("getChildAttribute")
            .public_method("removeChildAttribute")
            .render(move |_| {
                let child = Rc::clone(&child);
                Ok(Template::new(move |api, _, _, _| {
                    Ok(vec![api.c("x-child", &child, VNodeData::new())])
                }))
            })
            .build()
    };
    let elm = rule.create_element("x-foo", &parent).expect("mount succeeds");

    elm.call("callChildM", &[]).expect("method succeeds");
    assert_eq!(child_calls.count(), 1);

    assert_eq!(
        elm.call("getChildAttribute", &[]).expect("method succeeds"),
        Value::Null
    );
    elm.call("setChildAttribute", &[]).expect("method succeeds");
    assert_eq!(
        elm.call("getChildAttribute", &[]).expect("method succeeds"),
        Value::from("foo")
    );
    elm.call("removeChildAttribute", &[]).expect("method succeeds");
    assert_eq!(
        elm.call("getChildAttribute", &[]).expect("method succeeds"),
        Value::Null
    );
}

#[test]
fn many_writes_render_once_per_checkpoint() {
    let rule = WeaveTestRule::new();
    let renders = CallCounter::new();
    let def = {
        let renders = renders.clone();
        ComponentDef::builder("x-foo")
            .field("label", "")
            .public_prop("label", AccessMode::Field)
            .rendered(move |_| {
                renders.hit();
                Ok(())
            })
            .render(|_| {
                Ok(Template::new(|api, cmp, _, _| Ok(vec![api.d(cmp.field("label"))])))
            })
            .build()
    };
    let elm = rule.create_element("x-foo", &def).expect("mount succeeds");
    assert_eq!(renders.count(), 1);

    for label in ["a", "b", "c"] {
        elm.set("label", label).expect("root write");
    }
    rule.pump_until_idle().expect("pump succeeds");

    assert_eq!(renders.count(), 2);
    assert_eq!(elm.text_content().expect("text"), "c");
    assert_eq!(elm.vm().expect("mounted").render_count(), 2);
}

#[test]
fn connected_and_disconnected_fire_once_each() {
    let rule = WeaveTestRule::new();
    let events: Captured<&'static str> = Captured::new();
    let def = {
        let connected = events.clone();
        let disconnected = events.clone();
        ComponentDef::builder("x-foo")
            .connected(move |_| {
                connected.push("connected");
                Ok(())
            })
            .disconnected(move |_| {
                disconnected.push("disconnected");
                Ok(())
            })
            .build()
    };
    let vnode = c("x-foo", &def, VNodeData::new());
    rule.mount(&vnode).expect("mount succeeds");
    assert!(events.is_empty());
    rule.tick().expect("checkpoint succeeds");

    rule.engine().unmount(&vnode).expect("teardown succeeds");
    rule.engine().unmount(&vnode).expect("second teardown is a no-op");
    rule.pump_until_idle().expect("pump succeeds");

    assert_eq!(events.snapshot(), vec!["connected", "disconnected"]);
    assert_eq!(rule.engine().instance_count(), 0);
}
