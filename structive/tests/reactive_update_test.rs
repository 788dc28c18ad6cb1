use std::{cell::RefCell, rc::Rc};

use structive::prelude::*;

fn new_document() -> Rc<RefCell<Document>> { Rc::new(RefCell::new(Document::new())) }

fn find_by_tag(doc: &Document, tag: &str) -> Option<NodeId> {
  doc.root().descendants(doc).find(|n| n.tag(doc) == Some(tag))
}

fn tags_of_children(doc: &Document, parent: NodeId, tag: &str) -> Vec<NodeId> {
  parent.children(doc).filter(|n| n.tag(doc) == Some(tag)).collect()
}

#[test]
fn text_binding_tracks_state_writes() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("div").child(text_binding("foo").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({"foo": 1, "bar": 2})).build();
  registry.register("x-app", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-app", &document).unwrap();
  app.mount(root).unwrap();

  let pm = app.engine().path_manager().clone();
  assert!(pm.has_path("foo"));
  assert!(pm.has_path("bar"));
  assert_eq!(
    document.borrow().inner_html(root),
    "<x-app><div>1</div></x-app>"
  );

  app.set_state("foo", json!(7)).unwrap();
  assert_eq!(document.borrow().inner_html(root), "<x-app><div>7</div></x-app>");
}

#[test]
fn repeater_reorders_rows_without_recreating_them() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("ul")
      .child(
        element("li")
          .data_bind("for:items")
          .unwrap()
          .child(text_binding("items.*.v").unwrap())
          .build(),
      )
      .build(),
  ]);
  let state =
    StateClass::builder(json!({"items": [{"v": "a"}, {"v": "b"}, {"v": "c"}]})).build();
  registry.register("x-list", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-list", &document).unwrap();
  app.mount(root).unwrap();

  let ul = find_by_tag(&document.borrow(), "ul").unwrap();
  let before = tags_of_children(&document.borrow(), ul, "li");
  assert_eq!(before.len(), 3);
  assert_eq!(document.borrow().text_content(ul), "abc");

  // items = [items[2], items[0], items[1]]
  app
    .set_state("items", json!([{"v": "c"}, {"v": "a"}, {"v": "b"}]))
    .unwrap();

  let after = tags_of_children(&document.borrow(), ul, "li");
  assert_eq!(document.borrow().text_content(ul), "cab");
  // The same three <li> nodes, moved rather than recreated.
  assert_eq!(after[0], before[2]);
  assert_eq!(after[1], before[0]);
  assert_eq!(after[2], before[1]);
}

#[test]
fn if_binding_unmounts_and_remounts_one_content() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("p")
      .data_bind("if:visible")
      .unwrap()
      .child(text_binding("label").unwrap())
      .build(),
  ]);
  let state = StateClass::builder(json!({"visible": true, "label": "on"})).build();
  registry.register("x-toggle", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-toggle", &document).unwrap();
  app.mount(root).unwrap();

  let first = find_by_tag(&document.borrow(), "p").unwrap();
  app.set_state("visible", json!(false)).unwrap();
  assert!(find_by_tag(&document.borrow(), "p").is_none());

  app.set_state("visible", json!(true)).unwrap();
  let second = find_by_tag(&document.borrow(), "p").unwrap();
  assert_eq!(first, second);
  assert_eq!(document.borrow().text_content(second), "on");

  // Inner bindings are live again after the remount.
  app.set_state("label", json!("still on")).unwrap();
  assert_eq!(document.borrow().text_content(second), "still on");
}

#[test]
fn non_boolean_if_input_raises() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("p").data_bind("if:visible").unwrap().build(),
  ]);
  let state = StateClass::builder(json!({"visible": 1})).build();
  registry.register("x-bad-if", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-bad-if", &document).unwrap();
  let err = app.mount(root).unwrap_err();
  assert_eq!(err.code, ErrorCode::Bind201);
}

#[test]
fn dynamic_dependency_recomputes_computed_paths_once() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("ul")
      .child(
        element("li")
          .data_bind("for:groups")
          .unwrap()
          .child(
            element("span")
              .data_bind("for:groups.*.items")
              .unwrap()
              .child(text_binding("groups.*.items.*.price").unwrap())
              .build(),
          )
          .build(),
      )
      .build(),
    element("em").child(text_binding("total").unwrap()).build(),
  ]);

  let getter_runs: Rc<RefCell<usize>> = <_>::default();
  let runs = getter_runs.clone();
  let state = StateClass::builder(json!({
    "groups": [
      {"items": [{"price": 1}, {"price": 2}]},
      {"items": [{"price": 10}]},
    ]
  }))
  .getter("total", move |state| {
    *runs.borrow_mut() += 1;
    let sum: f64 = state
      .get_all("groups.*.items.*.price", None)?
      .iter()
      .filter_map(|v| v.as_f64())
      .sum();
    Ok(json!(sum))
  })
  .build();
  registry.register("x-totals", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-totals", &document).unwrap();
  app.mount(root).unwrap();

  let em = find_by_tag(&document.borrow(), "em").unwrap();
  assert_eq!(document.borrow().text_content(em), "13");

  *getter_runs.borrow_mut() = 0;
  app
    .engine()
    .update(None, |state| state.set("groups.1.items.0.price", json!(40)))
    .unwrap();
  assert_eq!(document.borrow().text_content(em), "43");
  assert_eq!(*getter_runs.borrow(), 1);
}

#[test]
fn event_bindings_run_methods_under_their_row_context() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("ul")
      .child(
        element("li")
          .data_bind("for:items; on.click:pick")
          .unwrap()
          .child(text_binding("items.*.v").unwrap())
          .build(),
      )
      .build(),
    element("b").child(text_binding("picked").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({"items": [{"v": "a"}, {"v": "b"}], "picked": -1}))
    .method("pick", |state, _args| {
      let row = state.index(1).expect("click arrives under a row context");
      state.set_value("picked", json!(row))
    })
    .build();
  registry.register("x-pick", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-pick", &document).unwrap();
  app.mount(root).unwrap();

  let ul = find_by_tag(&document.borrow(), "ul").unwrap();
  let rows = tags_of_children(&document.borrow(), ul, "li");
  let event = document.borrow().new_event("click", rows[1]);
  let listeners = document.borrow().listeners_for(rows[1], "click");
  for listener in listeners {
    listener(&event);
  }

  let b = find_by_tag(&document.borrow(), "b").unwrap();
  assert_eq!(document.borrow().text_content(b), "1");
}

#[test]
fn filters_shape_bound_values() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("div")
      .data_bind("attr.title:name|uc; class.cheap:price|lt(10); style.width:price|mul(2)")
      .unwrap()
      .child(text_binding("price|fix(2)").unwrap())
      .build(),
  ]);
  let state = StateClass::builder(json!({"name": "widget", "price": 4})).build();
  registry.register("x-filter", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-filter", &document).unwrap();
  app.mount(root).unwrap();

  let div = find_by_tag(&document.borrow(), "div").unwrap();
  {
    let doc = document.borrow();
    assert_eq!(div.attribute(&doc, "title"), Some("WIDGET"));
    assert!(div.has_class(&doc, "cheap"));
    assert_eq!(div.style_property(&doc, "width"), Some("8"));
    assert_eq!(doc.text_content(div), "4.00");
  }

  app.set_state("price", json!(25)).unwrap();
  {
    let doc = document.borrow();
    assert!(!div.has_class(&doc, "cheap"));
    assert_eq!(doc.text_content(div), "25.00");
  }
}

#[test]
fn unchanged_values_apply_no_bindings() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("span").child(text_binding("count").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({"count": 1})).build();
  registry.register("x-same", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-same", &document).unwrap();
  app.mount(root).unwrap();

  let emissions: Rc<RefCell<usize>> = <_>::default();
  let seen = emissions.clone();
  app
    .engine()
    .raw_modifies()
    .subscribe(move |_| *seen.borrow_mut() += 1);

  app.set_state("count", json!(2)).unwrap();
  assert_eq!(*emissions.borrow(), 1);

  // The second identical write renders a pass in which no binding changes,
  // so nothing is emitted.
  app.set_state("count", json!(2)).unwrap();
  assert_eq!(*emissions.borrow(), 1);
}

#[test]
fn nested_loops_expose_their_whole_index_frame() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("ul")
      .child(
        element("li")
          .data_bind("for:groups")
          .unwrap()
          .child(
            element("i")
              .data_bind("for:groups.*.items; on.click:note")
              .unwrap()
              .child(text_binding("groups.*.items.*").unwrap())
              .build(),
          )
          .build(),
      )
      .build(),
  ]);
  let state = StateClass::builder(json!({
    "groups": [{"items": ["a"]}, {"items": ["b", "c"]}],
    "last": null,
  }))
  .method("note", |state, _args| {
    let group = state.index(1).expect("outer frame");
    let item = state.index(2).expect("inner frame");
    state.set_value("last", json!([group, item]))
  })
  .build();
  registry.register("x-nested", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-nested", &document).unwrap();
  app.mount(root).unwrap();

  let ul = find_by_tag(&document.borrow(), "ul").unwrap();
  assert_eq!(document.borrow().text_content(ul), "abc");

  // Click the second item of the second group.
  let target = {
    let doc = document.borrow();
    ul.descendants(&doc)
      .filter(|n| n.tag(&doc) == Some("i"))
      .nth(2)
      .unwrap()
  };
  let event = document.borrow().new_event("click", target);
  let listeners = document.borrow().listeners_for(target, "click");
  for listener in listeners {
    listener(&event);
  }
  assert_eq!(app.state("last").unwrap(), json!([1, 1]));
}

#[test]
fn computed_setters_write_back_through_their_base_paths() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("b").child(text_binding("fahrenheit").unwrap()).build(),
    element("i").child(text_binding("celsius").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({"celsius": 100}))
    .getter("fahrenheit", |state| {
      let c = state.value("celsius")?.as_f64().unwrap_or(0.0);
      Ok(json!(c * 1.8 + 32.0))
    })
    .setter("fahrenheit", |state, value| {
      let f = value.as_f64().unwrap_or(0.0);
      state.set_value("celsius", json!((f - 32.0) / 1.8))
    })
    .build();
  registry.register("x-temp", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-temp", &document).unwrap();
  app.mount(root).unwrap();

  let b = find_by_tag(&document.borrow(), "b").unwrap();
  let i = find_by_tag(&document.borrow(), "i").unwrap();
  assert_eq!(document.borrow().text_content(b), "212");

  // Assigning the computed path runs the setter; the base path and the
  // recomputed value both re-render in the same flush.
  app.set_state("fahrenheit", json!(32)).unwrap();
  assert_eq!(document.borrow().text_content(i), "0");
  assert_eq!(document.borrow().text_content(b), "32");
  assert_eq!(app.state("celsius").unwrap(), json!(0.0));
}

#[test]
fn writing_a_getter_only_path_raises() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("b").child(text_binding("doubled").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({"n": 2}))
    .getter("doubled", |state| {
      Ok(json!(state.value("n")?.as_i64().unwrap_or(0) * 2))
    })
    .build();
  registry.register("x-ro-computed", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-ro-computed", &document).unwrap();
  app.mount(root).unwrap();

  assert!(app.engine().path_manager().only_getters("doubled"));
  let err = app.set_state("doubled", json!(9)).unwrap_err();
  assert_eq!(err.code, ErrorCode::State202);
}

#[test]
fn attr_bindings_stringify_every_value() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("div").data_bind("attr.title:name").unwrap().build(),
  ]);
  let state = StateClass::builder(json!({"name": null})).build();
  registry.register("x-attr", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-attr", &document).unwrap();
  app.mount(root).unwrap();

  let div = find_by_tag(&document.borrow(), "div").unwrap();
  assert_eq!(div.attribute(&document.borrow(), "title"), Some(""));

  app.set_state("name", json!("n")).unwrap();
  assert_eq!(div.attribute(&document.borrow(), "title"), Some("n"));

  // Null stringifies to ""; the attribute stays present.
  app.set_state("name", json!(null)).unwrap();
  assert_eq!(div.attribute(&document.borrow(), "title"), Some(""));
}

#[test]
fn getters_can_pin_single_values() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("b").child(text_binding("first").unwrap()).build(),
    element("ul")
      .child(
        element("li")
          .data_bind("for:rows")
          .unwrap()
          .child(text_binding("rows.*").unwrap())
          .build(),
      )
      .build(),
  ]);
  let state = StateClass::builder(json!({"rows": ["x", "y"]}))
    .getter("first", |state| state.resolve("rows.*", &[0]))
    .build();
  registry.register("x-first", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-first", &document).unwrap();
  app.mount(root).unwrap();

  let b = find_by_tag(&document.borrow(), "b").unwrap();
  assert_eq!(document.borrow().text_content(b), "x");
}

#[test]
fn reorders_emit_a_structure_scope() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("ul")
      .child(
        element("li")
          .data_bind("for:items")
          .unwrap()
          .child(text_binding("items.*.v").unwrap())
          .build(),
      )
      .build(),
  ]);
  let state = StateClass::builder(json!({"items": [{"v": 1}, {"v": 2}]})).build();
  registry.register("x-scope", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-scope", &document).unwrap();
  app.mount(root).unwrap();

  let scopes: Rc<RefCell<Vec<ChangeScope>>> = <_>::default();
  let seen = scopes.clone();
  app
    .engine()
    .raw_modifies()
    .subscribe(move |s| seen.borrow_mut().push(s));

  app.set_state("items.0.v", json!(9)).unwrap();
  app.set_state("items", json!([{"v": 2}, {"v": 9}])).unwrap();

  let scopes = scopes.borrow();
  assert_eq!(scopes.len(), 2);
  assert!(!scopes[0].contains(ChangeScope::STRUCTURE));
  assert!(scopes[1].contains(ChangeScope::STRUCTURE));
}
