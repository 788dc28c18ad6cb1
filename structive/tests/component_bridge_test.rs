use std::{cell::RefCell, rc::Rc};

use structive::prelude::*;

fn new_document() -> Rc<RefCell<Document>> { Rc::new(RefCell::new(Document::new())) }

fn find_by_tag(doc: &Document, tag: &str) -> Option<NodeId> {
  doc.root().descendants(doc).find(|n| n.tag(doc) == Some(tag))
}

fn register_child(registry: &Rc<ComponentRegistry>) {
  let template = ComponentTemplate::new(vec![
    element("span").child(text_binding("name").unwrap()).build(),
  ]);
  let state = StateClass::builder(json!({})).build();
  registry.register("x-child", &template, "", state).unwrap();
}

#[test]
fn child_components_track_parent_state() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  register_child(&registry);

  let parent_template = ComponentTemplate::new(vec![
    element("x-child").data_bind("state.name:user.name").unwrap().build(),
  ]);
  let parent_state = StateClass::builder(json!({"user": {"name": "A"}})).build();
  registry.register("x-parent", &parent_template, "", parent_state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let parent = registry.create_component("x-parent", &document).unwrap();
  parent.mount(root).unwrap();

  let span = find_by_tag(&document.borrow(), "span").unwrap();
  assert_eq!(document.borrow().text_content(span), "A");

  // The child sees the rename through the bridge in the same flush chain.
  parent.set_state("user", json!({"name": "X"})).unwrap();
  assert_eq!(document.borrow().text_content(span), "X");

  // Writing the mapped leaf directly reaches the child too.
  parent.set_state("user.name", json!("Y")).unwrap();
  assert_eq!(document.borrow().text_content(span), "Y");
}

#[test]
fn child_writes_route_to_the_parent() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  register_child(&registry);

  let parent_template = ComponentTemplate::new(vec![
    element("x-child").data_bind("state.name:user.name").unwrap().build(),
    element("b").child(text_binding("user.name").unwrap()).build(),
  ]);
  let parent_state = StateClass::builder(json!({"user": {"name": "A"}})).build();
  registry.register("x-parent2", &parent_template, "", parent_state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let parent = registry.create_component("x-parent2", &document).unwrap();
  parent.mount(root).unwrap();

  let child = find_by_tag(&document.borrow(), "x-child").unwrap();
  let child_engine = parent
    .engine()
    .child_engines()
    .into_iter()
    .find(|c| c.host() == child)
    .unwrap();

  child_engine.state_input_set("name", json!("from child")).unwrap();

  let b = find_by_tag(&document.borrow(), "b").unwrap();
  assert_eq!(document.borrow().text_content(b), "from child");
  assert_eq!(parent.state("user.name").unwrap(), json!("from child"));

  let span = find_by_tag(&document.borrow(), "span").unwrap();
  assert_eq!(document.borrow().text_content(span), "from child");
}

#[test]
fn duplicate_slot_mappings_raise() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  register_child(&registry);

  let parent_template = ComponentTemplate::new(vec![
    element("x-child")
      .data_bind("state.name:user.name; state.name:user.alias")
      .unwrap()
      .build(),
  ]);
  let parent_state =
    StateClass::builder(json!({"user": {"name": "A", "alias": "B"}})).build();
  registry.register("x-dup", &parent_template, "", parent_state).unwrap();

  let document = new_document();
  let err = registry.create_component("x-dup", &document).unwrap_err();
  assert_eq!(err.code, ErrorCode::State303);
}

#[test]
fn wildcard_child_path_with_flat_parent_ref_raises() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();

  let child_template = ComponentTemplate::new(vec![
    element("li")
      .data_bind("for:rows")
      .unwrap()
      .child(text_binding("rows.*.v").unwrap())
      .build(),
  ]);
  let child_state = StateClass::builder(json!({"rows": []})).build();
  registry.register("x-rows", &child_template, "", child_state).unwrap();

  // The mapping feeds a wildcard child path from a wildcard-free parent
  // path; a redraw cannot supply a row frame.
  let parent_template = ComponentTemplate::new(vec![
    element("x-rows").data_bind("state.rows.*:cfg").unwrap().build(),
  ]);
  let parent_state = StateClass::builder(json!({"cfg": {"v": 1}})).build();
  registry.register("x-flat", &parent_template, "", parent_state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let parent = registry.create_component("x-flat", &document).unwrap();
  parent.mount(root).unwrap();

  let err = parent.set_state("cfg", json!({"v": 2})).unwrap_err();
  assert_eq!(err.code, ErrorCode::List201);
}

#[test]
fn block_mode_children_replace_their_host_with_a_marker() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();

  let child_template = ComponentTemplate::new(vec![
    element("span").child(text_binding("name").unwrap()).build(),
  ]);
  let child_state = StateClass::builder(json!({}))
    .config(ComponentConfig { enable_shadow_dom: Some(false), ..<_>::default() })
    .build();
  registry.register("x-inline", &child_template, "", child_state).unwrap();

  let parent_template = ComponentTemplate::new(vec![
    element("section")
      .child(element("x-inline").data_bind("state.name:title").unwrap().build())
      .build(),
  ]);
  let parent_state = StateClass::builder(json!({"title": "T"})).build();
  registry.register("x-host", &parent_template, "", parent_state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let parent = registry.create_component("x-host", &document).unwrap();
  parent.mount(root).unwrap();

  let section = find_by_tag(&document.borrow(), "section").unwrap();
  assert_eq!(
    document.borrow().outer_html(section),
    "<section><!--x-inline--><span>T</span></section>"
  );
}

#[test]
fn readonly_state_reads_and_caches() {
  structive::reset_test_env!();
  let registry = ComponentRegistry::new();
  let template = ComponentTemplate::new(vec![
    element("div").child(text_binding("n").unwrap()).build(),
  ]);

  let getter_runs: Rc<RefCell<usize>> = <_>::default();
  let runs = getter_runs.clone();
  let state = StateClass::builder(json!({"n": 1}))
    .getter("doubled", move |state| {
      *runs.borrow_mut() += 1;
      Ok(json!(state.value("n")?.as_i64().unwrap_or(0) * 2))
    })
    .build();
  registry.register("x-ro", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-ro", &document).unwrap();
  app.mount(root).unwrap();

  let engine = app.engine().clone();
  engine
    .create_readonly_state(|state| {
      assert_eq!(state.get("n")?, json!(1));
      *getter_runs.borrow_mut() = 0;
      state.set_cacheable(|| {
        assert_eq!(state.get("doubled").unwrap(), json!(2));
        assert_eq!(state.get("doubled").unwrap(), json!(2));
      });
      Ok(())
    })
    .unwrap();
  assert_eq!(*getter_runs.borrow(), 1);
}

#[test]
fn get_all_pins_leading_levels_by_explicit_indexes() {
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
              .data_bind("for:groups.*.items")
              .unwrap()
              .child(text_binding("groups.*.items.*").unwrap())
              .build(),
          )
          .build(),
      )
      .build(),
  ]);
  let state = StateClass::builder(json!({"groups": [
    {"items": [1, 2]},
    {"items": [3, 4, 5]},
  ]}))
  .build();
  registry.register("x-pins", &template, "", state).unwrap();

  let document = new_document();
  let root = document.borrow().root();
  let app = registry.create_component("x-pins", &document).unwrap();
  app.mount(root).unwrap();

  app
    .engine()
    .update(None, |state| {
      let all = state.get_all("groups.*.items.*", None)?;
      assert_eq!(all, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
      let second = state.get_all("groups.*.items.*", Some(&[1]))?;
      assert_eq!(second, vec![json!(3), json!(4), json!(5)]);
      let one = state.get_all("groups.*.items.*", Some(&[0, 1]))?;
      assert_eq!(one, vec![json!(2)]);
      Ok(())
    })
    .unwrap();
}
