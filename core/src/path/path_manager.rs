use std::{
  cell::{Cell, RefCell},
  rc::Rc,
};

use ahash::{HashMap, HashSet};

use crate::{
  constants::WILDCARD,
  error::Result,
  path::{get_structured_path_info, PathNode},
};

/// Per component class: every path the class observes, plus its dependency
/// edges and role sets.
///
/// Shared between all instances of the class; effectively append-only at
/// runtime (dynamic reads may add paths and edges, adds are idempotent).
#[derive(Debug)]
pub struct PathManager {
  root_node: Rc<PathNode>,
  alls: RefCell<HashSet<String>>,
  /// Paths whose value must be array-like; they drive repeaters.
  lists: RefCell<HashSet<String>>,
  /// `${list}.*` row patterns of every list.
  elements: RefCell<HashSet<String>>,
  /// Method-valued paths.
  funcs: RefCell<HashSet<String>>,
  /// Paths materialised by user getters.
  getters: RefCell<HashSet<String>>,
  /// Computed paths that also carry a setter.
  setters: RefCell<HashSet<String>>,
  /// Template-derived edges: source path -> dependent paths.
  static_dependencies: RefCell<HashMap<String, HashSet<String>>>,
  /// Runtime-observed edges from reads inside getter bodies and `$getAll`.
  dynamic_dependencies: RefCell<HashMap<String, HashSet<String>>>,
  pub has_connected_callback: Cell<bool>,
  pub has_disconnected_callback: Cell<bool>,
  /// Bumped whenever `getters` changes; keys the accessor cache.
  getters_generation: Cell<u64>,
}

impl Default for PathManager {
  fn default() -> Self { Self::new() }
}

impl PathManager {
  pub fn new() -> Self {
    PathManager {
      root_node: PathNode::root(),
      alls: <_>::default(),
      lists: <_>::default(),
      elements: <_>::default(),
      funcs: <_>::default(),
      getters: <_>::default(),
      setters: <_>::default(),
      static_dependencies: <_>::default(),
      dynamic_dependencies: <_>::default(),
      has_connected_callback: Cell::new(false),
      has_disconnected_callback: Cell::new(false),
      getters_generation: Cell::new(0),
    }
  }

  pub fn root_node(&self) -> &Rc<PathNode> { &self.root_node }

  /// Register `pattern`, creating tree nodes along its cumulative paths.
  ///
  /// Statically added paths also record a parent -> child edge per new node.
  /// Idempotent.
  pub fn add_path(&self, pattern: &str, is_dynamic: bool) -> Result<()> {
    if pattern.is_empty() || self.alls.borrow().contains(pattern) {
      return Ok(());
    }
    let info = get_structured_path_info(pattern)?;
    let mut node = self.root_node.clone();
    let mut parent_path = String::new();
    for (segment, cumulative) in info.path_segments.iter().zip(&info.cumulative_paths) {
      let had = node.child(segment).is_some();
      node = node.append_child(segment);
      if !had && !is_dynamic {
        self
          .static_dependencies
          .borrow_mut()
          .entry(parent_path.clone())
          .or_default()
          .insert(cumulative.clone());
      }
      self.alls.borrow_mut().insert(cumulative.clone());
      parent_path = cumulative.clone();
    }
    Ok(())
  }

  /// Mark `pattern` as a list path and register its `pattern.*` row path.
  pub fn mark_list(&self, pattern: &str) -> Result<()> {
    self.add_path(pattern, false)?;
    self.lists.borrow_mut().insert(pattern.to_string());
    let element = format!("{pattern}.{WILDCARD}");
    self.add_path(&element, false)?;
    self.elements.borrow_mut().insert(element);
    Ok(())
  }

  pub fn mark_func(&self, name: &str) { self.funcs.borrow_mut().insert(name.to_string()); }

  pub fn mark_getter(&self, pattern: &str) -> Result<()> {
    self.add_path(pattern, false)?;
    self.getters.borrow_mut().insert(pattern.to_string());
    self.getters_generation.set(self.getters_generation.get() + 1);
    Ok(())
  }

  pub fn mark_setter(&self, pattern: &str) -> Result<()> {
    self.add_path(pattern, false)?;
    self.setters.borrow_mut().insert(pattern.to_string());
    Ok(())
  }

  pub fn has_path(&self, pattern: &str) -> bool { self.alls.borrow().contains(pattern) }

  pub fn is_list(&self, pattern: &str) -> bool { self.lists.borrow().contains(pattern) }

  pub fn is_element(&self, pattern: &str) -> bool { self.elements.borrow().contains(pattern) }

  pub fn is_func(&self, name: &str) -> bool { self.funcs.borrow().contains(name) }

  pub fn is_getter(&self, pattern: &str) -> bool { self.getters.borrow().contains(pattern) }

  pub fn is_setter(&self, pattern: &str) -> bool { self.setters.borrow().contains(pattern) }

  /// A computed pattern with no setter side.
  pub fn only_getters(&self, pattern: &str) -> bool {
    self.is_getter(pattern) && !self.is_setter(pattern)
  }

  pub fn getters(&self) -> HashSet<String> { self.getters.borrow().clone() }

  pub fn getters_generation(&self) -> u64 { self.getters_generation.get() }

  pub fn alls(&self) -> HashSet<String> { self.alls.borrow().clone() }

  /// Record that reading `source` feeds the value of `dependent`.
  pub fn register_dynamic_dependency(&self, source: &str, dependent: &str) {
    if source == dependent {
      return;
    }
    self
      .dynamic_dependencies
      .borrow_mut()
      .entry(source.to_string())
      .or_default()
      .insert(dependent.to_string());
  }

  pub fn dynamic_dependents_of(&self, source: &str) -> Vec<String> {
    self
      .dynamic_dependencies
      .borrow()
      .get(source)
      .map(|s| s.iter().cloned().collect())
      .unwrap_or_default()
  }

  pub fn static_dependents_of(&self, source: &str) -> Vec<String> {
    self
      .static_dependencies
      .borrow()
      .get(source)
      .map(|s| s.iter().cloned().collect())
      .unwrap_or_default()
  }
}
