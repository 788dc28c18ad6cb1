//! The single render pass.
//!
//! One pass consumes a batch of refs: list-element refs group under their
//! owning list (so a reorder renders once), remaining refs walk the class's
//! path tree — static children with the same frame, wildcard children per
//! new row, dynamic dependents across every live row — and every affected
//! binding applies at most once.

use std::rc::Rc;

use ahash::HashSet;
use serde_json::Value;

use crate::{
  component::{ComponentEngine, VersionRevision},
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::{find_path_node_by_path, get_structured_path_info, PathNode, StructuredPathInfo},
  property_ref::{get_state_property_ref, StatePropertyRef},
  updater::ChangeScope,
};

pub struct Renderer {
  engine: Rc<ComponentEngine>,
  /// The batch as enqueued; step 2 consults it to skip per-row work when
  /// the whole list renders anyway.
  queued: HashSet<Rc<StatePropertyRef>>,
  processed: HashSet<Rc<StatePropertyRef>>,
  processed_order: Vec<Rc<StatePropertyRef>>,
  /// Bindings this pass already visited (the at-most-once guard).
  visited_bindings: HashSet<u64>,
  /// Bindings that actually changed the document this pass.
  updated_bindings: HashSet<u64>,
  scope: ChangeScope,
}

impl Renderer {
  pub(crate) fn new(engine: Rc<ComponentEngine>, queued: HashSet<Rc<StatePropertyRef>>) -> Self {
    Renderer {
      engine,
      queued,
      processed: HashSet::default(),
      processed_order: Vec::new(),
      visited_bindings: HashSet::default(),
      updated_bindings: HashSet::default(),
      scope: ChangeScope::empty(),
    }
  }

  pub fn engine(&self) -> &Rc<ComponentEngine> { &self.engine }

  /// Resolve a ref under this pass's readonly, cacheable context.
  pub fn value_of(&mut self, r: &Rc<StatePropertyRef>) -> Result<Value> {
    self.engine.get_by_ref(r)
  }

  /// Claim a binding for this pass; false when it already ran.
  pub(crate) fn visit_binding(&mut self, id: u64) -> bool { self.visited_bindings.insert(id) }

  /// Record a binding that actually changed the document.
  pub(crate) fn record_binding_updated(&mut self, id: u64) {
    self.updated_bindings.insert(id);
    self.scope |= ChangeScope::DATA;
  }

  pub fn updated_binding_count(&self) -> usize { self.updated_bindings.len() }

  pub fn mark_structure_changed(&mut self) { self.scope |= ChangeScope::STRUCTURE; }

  pub(crate) fn scope(&self) -> ChangeScope { self.scope }

  pub fn render(&mut self, refs: &[Rc<StatePropertyRef>]) -> Result<()> {
    let pm = self.engine.path_manager().clone();

    // 1. Partition into list-element refs and the rest.
    let mut element_refs = Vec::new();
    let mut others = Vec::new();
    for r in refs {
      if pm.is_element(&r.info.pattern) {
        element_refs.push(r.clone());
      } else {
        others.push(r.clone());
      }
    }

    // 2. Reorder pass: group element refs by their owning list.
    let mut groups: Vec<(Rc<StatePropertyRef>, Vec<Rc<StatePropertyRef>>)> = Vec::new();
    for er in element_refs {
      let list_ref = er.parent_ref()?.ok_or_else(|| {
        raise_error(ErrorCode::Upd005, format!("element ref has no list parent: {}", er.info.pattern))
      })?;
      match groups.iter_mut().find(|(l, _)| Rc::ptr_eq(l, &list_ref)) {
        Some((_, members)) => members.push(er),
        None => groups.push((list_ref, vec![er])),
      }
    }
    for (list_ref, members) in groups {
      if !self.queued.contains(&list_ref) && !self.processed.contains(&list_ref) {
        // The list itself was not written; re-apply its bindings once so
        // the repeater diffs the per-row changes.
        self.mark_processed(&list_ref);
        for binding in self.engine.get_bindings(&list_ref) {
          binding.apply_change(self)?;
        }
      }
      for er in members {
        self.mark_processed(&er);
      }
    }

    // 3. Individual refs walk the path tree.
    let root = pm.root_node().clone();
    for r in others {
      let node = find_path_node_by_path(&root, &r.info.pattern).ok_or_else(|| {
        raise_error(ErrorCode::Path101, format!("path node not found: {}", r.info.pattern))
      })?;
      if !self.processed.contains(&r) {
        self.render_item(&r, &node)?;
      }
    }

    // 4. Cross-component propagation, after the parent's own pass.
    let refs_to_notify = self.processed_order.clone();
    for child in self.engine.child_engines() {
      child.notify_redraw(&refs_to_notify)?;
    }
    Ok(())
  }

  fn mark_processed(&mut self, r: &Rc<StatePropertyRef>) {
    if self.processed.insert(r.clone()) {
      self.processed_order.push(r.clone());
    }
  }

  fn render_item_guarded(&mut self, r: &Rc<StatePropertyRef>, node: &Rc<PathNode>) -> Result<()> {
    if self.processed.contains(r) {
      return Ok(());
    }
    self.render_item(r, node)
  }

  fn render_item(&mut self, r: &Rc<StatePropertyRef>, node: &Rc<PathNode>) -> Result<()> {
    self.mark_processed(r);
    // Invalidate the cache line for this path so dependents recompute.
    let (version, revision) = self.engine.updater.version_revision();
    self
      .engine
      .stamp_version_revision(&r.info.pattern, VersionRevision { version, revision });

    let pm = self.engine.path_manager().clone();
    let is_list = pm.is_list(&r.info.pattern);
    let old_rows: HashSet<u64> = if is_list {
      self
        .engine
        .get_list_and_list_indexes(r)
        .map(|s| s.list_indexes.iter().map(|li| li.id()).collect())
        .unwrap_or_default()
    } else {
      HashSet::default()
    };

    for binding in self.engine.get_bindings(r) {
      binding.apply_change(self)?;
    }

    // New rows feed the wildcard-child walk.
    let new_rows: Vec<Rc<ListIndex>> = if is_list {
      self
        .engine
        .ensure_list_indexes(r)?
        .into_iter()
        .filter(|li| !old_rows.contains(&li.id()))
        .collect()
    } else {
      Vec::new()
    };

    for child in node.children() {
      let child_info = get_structured_path_info(&child.current_path)?;
      if child.is_wildcard() {
        for li in &new_rows {
          let child_ref = get_state_property_ref(&child_info, Some(li));
          self.render_item_guarded(&child_ref, &child)?;
        }
      } else {
        let li = r.list_index()?;
        let child_ref = get_state_property_ref(&child_info, li.as_ref());
        self.render_item_guarded(&child_ref, &child)?;
      }
    }

    for dep in pm.dynamic_dependents_of(&r.info.pattern) {
      let dep_info = get_structured_path_info(&dep)?;
      let Some(dep_node) = find_path_node_by_path(pm.root_node(), &dep) else {
        continue;
      };
      if dep_info.wildcard_count == 0 {
        let dep_ref = get_state_property_ref(&dep_info, None);
        self.render_item_guarded(&dep_ref, &dep_node)?;
      } else {
        self.walk_dependent(&dep_info, &dep_node, 0, None)?;
      }
    }
    Ok(())
  }

  /// Visit a wildcard-bearing dependent across every live row at each
  /// level.
  fn walk_dependent(
    &mut self, info: &Rc<StructuredPathInfo>, node: &Rc<PathNode>, depth: usize,
    li: Option<Rc<ListIndex>>,
  ) -> Result<()> {
    if depth == info.wildcard_count {
      let r = get_state_property_ref(info, li.as_ref());
      return self.render_item_guarded(&r, node);
    }
    let list_info = get_structured_path_info(&info.wildcard_parent_paths[depth])?;
    let list_ref = get_state_property_ref(&list_info, li.as_ref());
    for row in self.engine.ensure_list_indexes(&list_ref)? {
      self.walk_dependent(info, node, depth + 1, Some(row))?;
    }
    Ok(())
  }
}
