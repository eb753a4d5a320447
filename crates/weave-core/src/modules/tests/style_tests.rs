use super::*;
use crate::api::h;
use crate::document::{MemoryDocument, NodeStats};
use crate::host::Host;
use crate::value::{ObjectRef, Value};
use crate::vnode::{VNode, VNodeData};

fn styled(style: impl Into<StyleValue>) -> VNode {
    h("div", VNodeData::new().style(style), vec![])
}

fn mount(engine: &Engine, vnode: &VNode) -> NodeId {
    let target = engine
        .with_host(|doc: &mut MemoryDocument| {
            let el = doc.create_element("div");
            let body = doc.body();
            doc.append_child(body, el).expect("append succeeds");
            el
        })
        .expect("memory document host");
    engine.patch(target, vnode).expect("mount succeeds")
}

fn stats(engine: &Engine, id: NodeId) -> NodeStats {
    engine
        .with_host(|doc: &mut MemoryDocument| doc.stats(id))
        .expect("memory document host")
}

fn css_text(engine: &Engine, id: NodeId) -> String {
    engine.element(id).style_text().expect("style text")
}

#[test]
fn string_styles_are_written_once() {
    let engine = Engine::new(MemoryDocument::new());
    let first = styled("color:red");
    let elm = mount(&engine, &first);
    assert_eq!(css_text(&engine, elm), "color: red;");

    let second = styled("color:red");
    engine.patch(&first, &second).expect("patch succeeds");

    assert_eq!(stats(&engine, elm).style_text_writes, 1);
}

#[test]
fn nullish_styles_write_nothing_on_mount() {
    let engine = Engine::new(MemoryDocument::new());
    let undefined = mount(&engine, &styled(Value::Undefined));
    let null = mount(&engine, &styled(Value::Null));

    for elm in [undefined, null] {
        assert_eq!(css_text(&engine, elm), "");
        assert_eq!(stats(&engine, elm), NodeStats::default());
    }
}

#[test]
fn clearing_a_string_style_writes_empty_text() {
    let engine = Engine::new(MemoryDocument::new());
    let first = styled("color:red");
    let elm = mount(&engine, &first);

    let second = styled(Value::Null);
    engine.patch(&first, &second).expect("patch succeeds");

    assert_eq!(css_text(&engine, elm), "");
    assert_eq!(stats(&engine, elm).style_text_writes, 2);
}

#[test]
fn object_styles_remove_missing_properties() {
    let engine = Engine::new(MemoryDocument::new());
    let first = styled([("color", "red"), ("margin", "0")].into_iter().collect::<StyleValue>());
    let elm = mount(&engine, &first);
    assert_eq!(css_text(&engine, elm), "color: red; margin: 0;");

    let second = styled([("margin", "0")].into_iter().collect::<StyleValue>());
    engine.patch(&first, &second).expect("patch succeeds");

    assert_eq!(css_text(&engine, elm), "margin: 0;");
    let stats = stats(&engine, elm);
    assert_eq!(stats.style_property_removals, 1);
    assert_eq!(stats.style_text_writes, 0);
}

#[test]
fn object_to_string_replaces_text_without_removals() {
    let engine = Engine::new(MemoryDocument::new());
    let color = ObjectRef::new();
    color.set("color", "red");
    let first = styled(Value::from(color));
    let elm = mount(&engine, &first);

    let second = styled("color:green");
    engine.patch(&first, &second).expect("patch succeeds");

    assert_eq!(css_text(&engine, elm), "color: green;");
    let stats = stats(&engine, elm);
    assert_eq!(stats.style_property_removals, 0);
    assert_eq!(stats.style_text_writes, 1);
}

#[test]
fn object_values_skip_nullish_entries() {
    let style = StyleValue::from(Value::from(
        [
            ("color", Value::from("blue")),
            ("border", Value::Null),
            ("z-index", Value::from(2)),
        ]
        .into_iter()
        .collect::<ObjectRef>(),
    ));
    let expected: StyleValue = [("color", "blue"), ("z-index", "2")].into_iter().collect();
    assert_eq!(style, expected);
}
