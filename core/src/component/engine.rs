use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use ahash::HashMap;
use serde_json::Value;
use structive_dom::{Document, NodeId};

use crate::{
  binding::{BindContent, Binding},
  component::{ComponentClass, ComponentStateBinding, RegistryRef},
  constants::is_reserved_word,
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::{PathManager, StructuredPathInfo},
  property_ref::StatePropertyRef,
  updater::{Notifier, Updater},
};

/// A cached resolution of one ref.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub value: Value,
  pub list_indexes: Option<Vec<Rc<ListIndex>>>,
  pub version: u64,
  pub revision: u64,
}

/// The invalidation stamp recorded per path when a batch flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRevision {
  pub version: u64,
  pub revision: u64,
}

/// The engine's saved state for one list ref: the value it last rendered,
/// the row identities, and a clone used to detect diffs on the next pass.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
  pub list: Value,
  pub list_indexes: Vec<Rc<ListIndex>>,
  pub list_clone: Value,
}

/// Per-instance owner of state, bindings, cache and lifecycle.
pub struct ComponentEngine {
  id: u64,
  class: Rc<ComponentClass>,
  registry: RegistryRef,
  document: Rc<RefCell<Document>>,
  host: NodeId,
  data: RefCell<Value>,
  pub(crate) updater: Updater,
  pub(crate) notifier: Notifier,
  bindings_by_ref: RefCell<HashMap<Rc<StatePropertyRef>, Vec<Rc<Binding>>>>,
  cache: RefCell<HashMap<Rc<StatePropertyRef>, CacheEntry>>,
  list_snapshots: RefCell<HashMap<Rc<StatePropertyRef>, ListSnapshot>>,
  version_revision_by_path: RefCell<HashMap<String, VersionRevision>>,
  current_version: Cell<u64>,
  bind_content: RefCell<Option<Rc<BindContent>>>,
  state_binding: Rc<ComponentStateBinding>,
  parent_engine: RefCell<Weak<ComponentEngine>>,
  child_components: RefCell<Vec<Weak<ComponentEngine>>>,
  bindings_by_component: RefCell<HashMap<u64, Vec<Weak<Binding>>>>,
  placeholder: Cell<Option<NodeId>>,
  style_attached: Cell<bool>,
  connected: Cell<bool>,
  ready: Cell<bool>,
  /// Innermost refs currently being resolved; reads against the top record
  /// dynamic dependencies.
  pub(crate) last_ref_stack: RefCell<Vec<Rc<StructuredPathInfo>>>,
  /// While set, resolved values go through the per-ref cache.
  pub(crate) cacheable: Cell<bool>,
}

thread_local! {
  static NEXT_ENGINE_ID: Cell<u64> = const { Cell::new(1) };
}

impl ComponentEngine {
  pub(crate) fn new(
    class: Rc<ComponentClass>, registry: RegistryRef, document: Rc<RefCell<Document>>,
    host: NodeId,
  ) -> Rc<ComponentEngine> {
    let data = class.state_class.instantiate_data();
    Rc::new(ComponentEngine {
      id: NEXT_ENGINE_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
      }),
      class,
      registry,
      document,
      host,
      data: RefCell::new(data),
      updater: Updater::default(),
      notifier: Notifier::default(),
      bindings_by_ref: RefCell::new(HashMap::default()),
      cache: RefCell::new(HashMap::default()),
      list_snapshots: RefCell::new(HashMap::default()),
      version_revision_by_path: RefCell::new(HashMap::default()),
      current_version: Cell::new(0),
      bind_content: RefCell::new(None),
      state_binding: Rc::new(ComponentStateBinding::default()),
      parent_engine: RefCell::new(Weak::new()),
      child_components: RefCell::new(Vec::new()),
      bindings_by_component: RefCell::new(HashMap::default()),
      placeholder: Cell::new(None),
      style_attached: Cell::new(false),
      connected: Cell::new(false),
      ready: Cell::new(false),
      last_ref_stack: RefCell::new(Vec::new()),
      cacheable: Cell::new(false),
    })
  }

  pub fn id(&self) -> u64 { self.id }

  pub fn class(&self) -> &Rc<ComponentClass> { &self.class }

  pub fn document(&self) -> Rc<RefCell<Document>> { self.document.clone() }

  pub fn registry(&self) -> Option<Rc<crate::component::ComponentRegistry>> {
    self.registry.upgrade()
  }

  pub fn host(&self) -> NodeId { self.host }

  pub fn path_manager(&self) -> &Rc<PathManager> { &self.class.path_manager }

  pub fn state_binding(&self) -> &Rc<ComponentStateBinding> { &self.state_binding }

  pub fn bind_content(&self) -> Option<Rc<BindContent>> { self.bind_content.borrow().clone() }

  pub fn is_connected(&self) -> bool { self.connected.get() }

  /// True once the first connect sequence (including the user's connected
  /// callback) has completed.
  pub fn is_ready(&self) -> bool { self.ready.get() }

  pub(crate) fn data(&self) -> &RefCell<Value> { &self.data }

  /// Register instance state keys and realise the root content.
  pub fn setup(self: &Rc<Self>) -> Result<()> {
    let pm = self.path_manager().clone();
    if let Value::Object(map) = &*self.data.borrow() {
      for key in map.keys() {
        if !is_reserved_word(key) && !pm.has_path(key) {
          pm.add_path(key, false)?;
        }
      }
    }
    let fragment = self.class.fragment.clone();
    let content = BindContent::create(self, &fragment, None, None)?;
    *self.bind_content.borrow_mut() = Some(content);
    Ok(())
  }

  /// The connect sequence: apply `data-state`, mount the content (shadow or
  /// block mode), run the initial render, then the user's connected
  /// callback.
  pub fn connected_callback(self: &Rc<Self>) -> Result<()> {
    if self.connected.replace(true) {
      return Ok(());
    }

    let data_state = {
      let doc = self.document.borrow();
      self.host.attribute(&doc, "data-state").map(str::to_string)
    };
    if let Some(json) = data_state {
      let value: Value = serde_json::from_str(&json).map_err(|err| {
        raise_error(ErrorCode::State202, "Failed to parse state from dataset").with_cause(err)
      })?;
      self.assign_state(value)?;
    }

    let content = self.bind_content().ok_or_else(|| {
      raise_error(ErrorCode::Upd004, "engine was not set up before connect")
    })?;

    if self.shadow_mode() {
      if !self.class.css.is_empty() && !self.style_attached.replace(true) {
        let mut doc = self.document.borrow_mut();
        let style = doc.create_element("style");
        let css = doc.create_text(&self.class.css);
        doc.append_child(style, css);
        doc.append_child(self.host, style);
      }
      content.mount(self, self.host);
    } else {
      if self.host.parent(&self.document.borrow()).is_none() {
        return Err(raise_error(ErrorCode::Bind201, "Block parent node is not set"));
      }
      let placeholder = {
        let mut doc = self.document.borrow_mut();
        let placeholder = doc.create_comment(&self.class.tag);
        doc.insert_before(self.host, placeholder);
        doc.detach(self.host);
        placeholder
      };
      self.placeholder.set(Some(placeholder));
      content.mount_after(self, placeholder);
    }

    content.activate()?;
    self.initial_render(&content)?;

    if self.path_manager().has_connected_callback.get() {
      let callback = self.class.state_class.connected().cloned();
      if let Some(callback) = callback {
        self.update(None, move |state| callback(state))?;
      }
    }
    self.ready.set(true);
    Ok(())
  }

  /// The disconnect sequence: user callback, unmount, placeholder cleanup,
  /// parent deregistration.
  pub fn disconnected_callback(self: &Rc<Self>) -> Result<()> {
    if !self.connected.replace(false) {
      return Ok(());
    }
    if self.path_manager().has_disconnected_callback.get() {
      let callback = self.class.state_class.disconnected().cloned();
      if let Some(callback) = callback {
        self.update(None, move |state| callback(state))?;
      }
    }
    if let Some(content) = self.bind_content() {
      content.unmount(self);
      content.inactivate()?;
    }
    if let Some(placeholder) = self.placeholder.take() {
      let mut doc = self.document.borrow_mut();
      if !placeholder.is_removed(&doc) {
        doc.remove_subtree(placeholder);
      }
    }
    if let Some(parent) = self.parent_engine.borrow().upgrade() {
      parent.unregister_child_component(self);
    }
    Ok(())
  }

  fn shadow_mode(&self) -> bool {
    self
      .class
      .state_class
      .config()
      .enable_shadow_dom
      .unwrap_or_else(|| crate::app_ctx::AppCtx::config().enable_shadow_dom_default)
  }

  // ---- per-ref metadata -------------------------------------------------

  pub fn get_cache_entry(&self, r: &Rc<StatePropertyRef>) -> Option<CacheEntry> {
    self.cache.borrow().get(r).cloned()
  }

  pub fn set_cache_entry(&self, r: &Rc<StatePropertyRef>, entry: CacheEntry) {
    self.cache.borrow_mut().insert(r.clone(), entry);
  }

  /// A still-valid cache entry per the version/revision rule, if any.
  pub(crate) fn valid_cache_entry(&self, r: &Rc<StatePropertyRef>) -> Option<CacheEntry> {
    let entry = self.get_cache_entry(r)?;
    match self.version_revision_by_path.borrow().get(&r.info.pattern) {
      None => Some(entry),
      Some(stamp) => (entry.version > stamp.version
        || (entry.version == stamp.version && entry.revision >= stamp.revision))
        .then_some(entry),
    }
  }

  pub(crate) fn stamp_version_revision(&self, pattern: &str, stamp: VersionRevision) {
    self.version_revision_by_path.borrow_mut().insert(pattern.to_string(), stamp);
  }

  pub fn get_bindings(&self, r: &Rc<StatePropertyRef>) -> Vec<Rc<Binding>> {
    self.bindings_by_ref.borrow().get(r).cloned().unwrap_or_default()
  }

  pub fn save_binding(&self, r: &Rc<StatePropertyRef>, binding: &Rc<Binding>) {
    self
      .bindings_by_ref
      .borrow_mut()
      .entry(r.clone())
      .or_default()
      .push(binding.clone());
  }

  /// Remove by identity; unknown bindings are a no-op.
  pub fn remove_binding(&self, r: &Rc<StatePropertyRef>, binding: &Rc<Binding>) {
    if let Some(bindings) = self.bindings_by_ref.borrow_mut().get_mut(r) {
      if let Some(at) = bindings.iter().position(|b| Rc::ptr_eq(b, binding)) {
        bindings.remove(at);
      }
    }
  }

  /// Persist the list value + row identities for a list-path ref; a shallow
  /// clone of the value is kept to detect diffs on the next pass. Non-list
  /// refs store nothing.
  pub fn save_list_and_list_indexes(
    &self, r: &Rc<StatePropertyRef>, list: Value, list_indexes: Vec<Rc<ListIndex>>,
  ) -> Result<()> {
    if !self.path_manager().is_list(&r.info.pattern) {
      return Ok(());
    }
    let snapshot = ListSnapshot { list_clone: list.clone(), list, list_indexes };
    self.list_snapshots.borrow_mut().insert(r.clone(), snapshot);
    self.prune_dead_refs();
    Ok(())
  }

  pub fn get_list_and_list_indexes(&self, r: &Rc<StatePropertyRef>) -> Option<ListSnapshot> {
    self.list_snapshots.borrow().get(r).cloned()
  }

  /// Snapshot row identities for a list ref; parent-backed list paths
  /// delegate to the parent engine.
  pub fn get_list_indexes(self: &Rc<Self>, r: &Rc<StatePropertyRef>) -> Result<Option<Vec<Rc<ListIndex>>>> {
    if self.state_output_starts_with(&r.info) {
      return self.state_output_list_indexes(r);
    }
    Ok(self.get_list_and_list_indexes(r).map(|s| s.list_indexes))
  }

  /// Drop metadata whose ref lost its row (the list shrank and the
  /// `ListIndex` was collected).
  fn prune_dead_refs(&self) {
    let dead = |r: &Rc<StatePropertyRef>| r.list_index().is_err();
    self.bindings_by_ref.borrow_mut().retain(|r, _| !dead(r));
    self.cache.borrow_mut().retain(|r, _| !dead(r));
    self.list_snapshots.borrow_mut().retain(|r, _| !dead(r));
  }

  // ---- parent / child wiring -------------------------------------------

  pub fn set_parent(self: &Rc<Self>, parent: &Rc<ComponentEngine>) {
    *self.parent_engine.borrow_mut() = Rc::downgrade(parent);
  }

  pub fn parent_engine(&self) -> Option<Rc<ComponentEngine>> {
    self.parent_engine.borrow().upgrade()
  }

  pub fn register_child_component(self: &Rc<Self>, child: &Rc<ComponentEngine>) {
    let mut children = self.child_components.borrow_mut();
    if !children.iter().any(|c| c.upgrade().is_some_and(|c| c.id == child.id)) {
      children.push(Rc::downgrade(child));
    }
  }

  pub fn unregister_child_component(self: &Rc<Self>, child: &Rc<ComponentEngine>) {
    self
      .child_components
      .borrow_mut()
      .retain(|c| c.upgrade().is_some_and(|c| c.id != child.id));
    self.bindings_by_component.borrow_mut().remove(&child.id);
  }

  pub fn child_engines(&self) -> Vec<Rc<ComponentEngine>> {
    self
      .child_components
      .borrow()
      .iter()
      .filter_map(Weak::upgrade)
      .collect()
  }

  pub(crate) fn save_component_binding(&self, child: &Rc<ComponentEngine>, binding: &Rc<Binding>) {
    self
      .bindings_by_component
      .borrow_mut()
      .entry(child.id)
      .or_default()
      .push(Rc::downgrade(binding));
  }

  // ---- versioning -------------------------------------------------------

  pub fn current_version(&self) -> u64 { self.current_version.get() }

  pub fn version_up(&self) -> u64 {
    let v = self.current_version.get() + 1;
    self.current_version.set(v);
    v
  }

  // ---- public value access ---------------------------------------------

  /// Resolve a ref under a readonly context.
  pub fn get_property_value(self: &Rc<Self>, r: &Rc<StatePropertyRef>) -> Result<Value> {
    self.get_by_ref(r)
  }

  /// Write a ref inside a one-off update (flushes a render pass).
  pub fn set_property_value(self: &Rc<Self>, r: &Rc<StatePropertyRef>, value: Value) -> Result<()> {
    let engine = self.clone();
    let r = r.clone();
    self.update(None, move |_| engine.set_by_ref(&r, value))
  }
}

impl std::fmt::Debug for ComponentEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ComponentEngine")
      .field("id", &self.id)
      .field("tag", &self.class.tag)
      .field("connected", &self.connected.get())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{
    property_ref::get_state_property_ref,
    state::{ComponentConfig, StateClass},
    template::{element, text_binding, ComponentTemplate},
    test_helper::{mount_component, prepare_component},
  };

  fn single_text_template(path: &str) -> ComponentTemplate {
    ComponentTemplate::new(vec![
      element("div").child(text_binding(path).unwrap()).build(),
    ])
  }

  #[test]
  fn setup_registers_instance_state_keys() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"foo": 1, "bar": 2})).build();
    let bed = mount_component("x-keys", single_text_template("foo"), state);
    let pm = bed.component.engine().path_manager().clone();
    assert!(pm.has_path("foo"));
    assert!(pm.has_path("bar"));
  }

  #[test]
  fn cache_entries_survive_until_their_path_is_stamped() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"foo": 1})).build();
    let bed = mount_component("x-cache", single_text_template("foo"), state);
    let engine = bed.component.engine().clone();

    let info = crate::path::get_structured_path_info("foo").unwrap();
    let r = get_state_property_ref(&info, None);
    let entry = CacheEntry { value: json!(42), list_indexes: None, version: 99, revision: 1 };
    engine.set_cache_entry(&r, entry.clone());
    assert_eq!(engine.get_cache_entry(&r).unwrap().value, json!(42));
    assert_eq!(engine.valid_cache_entry(&r).unwrap().value, json!(42));

    // A newer stamp for the path invalidates the entry.
    engine.stamp_version_revision("foo", VersionRevision { version: 100, revision: 1 });
    assert!(engine.valid_cache_entry(&r).is_none());
    assert!(engine.get_cache_entry(&r).is_some());
  }

  #[test]
  fn block_mode_mounts_behind_a_placeholder() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"msg": "hi"}))
      .config(ComponentConfig { enable_shadow_dom: Some(false), ..<_>::default() })
      .build();
    let bed = mount_component("x-block", single_text_template("msg"), state);
    assert_eq!(bed.html(), "<!--x-block--><div>hi</div>");

    // Disconnect removes the placeholder with the content.
    bed.component.unmount().unwrap();
    assert_eq!(bed.html(), "");
  }

  #[test]
  fn block_mode_without_a_parent_raises() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"msg": "hi"}))
      .config(ComponentConfig { enable_shadow_dom: Some(false), ..<_>::default() })
      .build();
    let bed = prepare_component("x-orphan", single_text_template("msg"), state);
    let err = bed.component.engine().connected_callback().unwrap_err();
    assert_eq!(err.code, ErrorCode::Bind201);
  }

  #[test]
  fn data_state_attribute_seeds_the_instance() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"msg": "default"})).build();
    let bed = prepare_component("x-data", single_text_template("msg"), state);
    let root = bed.document.borrow().root();
    bed
      .document
      .borrow_mut()
      .set_attribute(bed.component.host(), "data-state", r#"{"msg":"seeded"}"#);
    bed.component.mount(root).unwrap();
    assert_eq!(bed.text(), "seeded");
  }

  #[test]
  fn malformed_data_state_raises() {
    crate::reset_test_env!();
    let state = StateClass::builder(json!({"msg": "default"})).build();
    let bed = prepare_component("x-bad-data", single_text_template("msg"), state);
    let root = bed.document.borrow().root();
    bed
      .document
      .borrow_mut()
      .set_attribute(bed.component.host(), "data-state", "{nope");
    let err = bed.component.mount(root).unwrap_err();
    assert_eq!(err.code, ErrorCode::State202);
    assert_eq!(err.message, "Failed to parse state from dataset");
  }

  #[test]
  fn lifecycle_callbacks_run_in_order() {
    crate::reset_test_env!();
    use std::cell::RefCell;
    let log: Rc<RefCell<Vec<&'static str>>> = <_>::default();
    let (c, d) = (log.clone(), log.clone());
    let state = StateClass::builder(json!({"msg": "x"}))
      .on_connected(move |_| {
        c.borrow_mut().push("connected");
        Ok(())
      })
      .on_disconnected(move |_| {
        d.borrow_mut().push("disconnected");
        Ok(())
      })
      .build();
    let bed = mount_component("x-life", single_text_template("msg"), state);
    assert!(bed.component.engine().is_ready());
    bed.component.unmount().unwrap();
    let root = bed.document.borrow().root();
    bed.component.mount(root).unwrap();
    assert_eq!(&*log.borrow(), &["connected", "disconnected", "connected"]);
  }
}
