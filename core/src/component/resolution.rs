//! Ref and path resolution against the engine's state.
//!
//! All value access funnels through here: readonly renders, writable
//! updates, getter bodies and `$getAll` sweeps. Resolving a ref while
//! another resolution is in flight records a dynamic dependency edge in the
//! class's `PathManager` (the "last ref stack").

use std::rc::Rc;

use serde_json::Value;

use crate::{
  binding::create_list_indexes,
  component::{CacheEntry, ComponentEngine},
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::{
    create_accessor_functions, get_resolved_path_info, get_structured_path_info,
    StructuredPathInfo,
  },
  property_ref::{get_state_property_ref, StatePropertyRef},
  state::{set_by_steps, value_by_steps, StateAccess},
};

impl ComponentEngine {
  /// Resolve a ref to its current value, consulting the per-ref cache when
  /// a render pass is active.
  pub fn get_by_ref(self: &Rc<Self>, r: &Rc<StatePropertyRef>) -> Result<Value> {
    self.record_dependency(&r.info);
    if self.cacheable.get() {
      if let Some(entry) = self.valid_cache_entry(r) {
        return Ok(entry.value);
      }
    }
    let value = self.compute_ref_value(r)?;
    if self.cacheable.get() {
      let (version, revision) = self.updater.version_revision();
      let list_indexes = self
        .path_manager()
        .is_list(&r.info.pattern)
        .then(|| self.get_list_and_list_indexes(r).map(|s| s.list_indexes))
        .flatten();
      self.set_cache_entry(
        r,
        CacheEntry { value: value.clone(), list_indexes, version, revision },
      );
    }
    Ok(value)
  }

  /// Write a value at a ref and enqueue it for the next flush.
  pub fn set_by_ref(self: &Rc<Self>, r: &Rc<StatePropertyRef>, value: Value) -> Result<()> {
    let pattern = &r.info.pattern;
    if self.state_output_starts_with(&r.info) {
      self.state_output_set(r, value)?;
      self.enqueue_ref(r);
      return Ok(());
    }
    if self.path_manager().is_getter(pattern) {
      let Some(setter) = self.class().state_class.setter(pattern).cloned() else {
        return Err(
          raise_error(ErrorCode::State202, format!("cannot write a computed path: {pattern}"))
            .with_hint("register a setter for the computed pattern"),
        );
      };
      let scope = AccessScope { engine: self.clone(), list_index: r.list_index()? };
      setter(&scope, value)?;
      self.enqueue_ref(r);
      return Ok(());
    }
    let accessor = create_accessor_functions(
      &r.info,
      &self.path_manager().getters(),
      self.path_manager().getters_generation(),
    )?;
    if accessor.getter_prefix.is_some() {
      return Err(raise_error(
        ErrorCode::State202,
        format!("cannot write through a computed prefix: {pattern}"),
      ));
    }
    let frame = match r.list_index()? {
      Some(li) => li.indexes(),
      None => Vec::new(),
    };
    set_by_steps(&mut self.data().borrow_mut(), &accessor.steps, &frame, value)?;
    self.enqueue_ref(r);
    Ok(())
  }

  fn record_dependency(&self, info: &Rc<StructuredPathInfo>) {
    if let Some(top) = self.last_ref_stack.borrow().last() {
      if top.id != info.id {
        self
          .path_manager()
          .register_dynamic_dependency(&info.pattern, &top.pattern);
      }
    }
  }

  /// Uncached resolution: parent-backed paths read through the state
  /// output, computed paths run their getter, everything else interprets
  /// the compiled accessor over the instance data.
  pub(crate) fn compute_ref_value(self: &Rc<Self>, r: &Rc<StatePropertyRef>) -> Result<Value> {
    self.last_ref_stack.borrow_mut().push(r.info.clone());
    let value = self.compute_ref_value_inner(r);
    self.last_ref_stack.borrow_mut().pop();
    value
  }

  fn compute_ref_value_inner(self: &Rc<Self>, r: &Rc<StatePropertyRef>) -> Result<Value> {
    if self.state_output_starts_with(&r.info) {
      return self.state_output_get(r);
    }

    let pattern = &r.info.pattern;
    if self.path_manager().is_getter(pattern) {
      let getter = self
        .class()
        .state_class
        .getter(pattern)
        .cloned()
        .ok_or_else(|| raise_error(ErrorCode::State202, format!("getter vanished: {pattern}")))?;
      let scope = AccessScope { engine: self.clone(), list_index: r.list_index()? };
      return getter(&scope);
    }

    let accessor = create_accessor_functions(
      &r.info,
      &self.path_manager().getters(),
      self.path_manager().getters_generation(),
    )?;
    let frame = match r.list_index()? {
      Some(li) => li.indexes(),
      None => Vec::new(),
    };
    match &accessor.getter_prefix {
      None => value_by_steps(&self.data().borrow(), &accessor.steps, &frame),
      Some(prefix) => {
        // The prefix getter materialises the starting value; its frame is
        // the leading slice of ours.
        let prefix_info = get_structured_path_info(prefix)?;
        let prefix_li = match r.list_index()? {
          Some(li) if accessor.prefix_wildcards > 0 => {
            Some(li.at(accessor.prefix_wildcards as isize - 1).ok_or_else(|| {
              raise_error(ErrorCode::List201, format!("no frame for prefix: {prefix}"))
            })?)
          }
          _ => None,
        };
        let prefix_ref = get_state_property_ref(&prefix_info, prefix_li.as_ref());
        let start = self.get_by_ref(&prefix_ref)?;
        value_by_steps(&start, &accessor.steps, &frame)
      }
    }
  }

  /// Resolve a dotted name (wildcards allowed) plus the ambient loop frame
  /// into a uniqued ref. `*` positions take the ambient frame at their
  /// depth; numeric positions select a row of the list at that level.
  pub fn resolve_path_ref(
    self: &Rc<Self>, path: &str, ambient: Option<&Rc<ListIndex>>,
  ) -> Result<Rc<StatePropertyRef>> {
    let resolved = get_resolved_path_info(path)?;
    let info = resolved.info.clone();
    if info.wildcard_count == 0 {
      return Ok(get_state_property_ref(&info, None));
    }

    let mut list_index: Option<Rc<ListIndex>> = None;
    for (depth, wildcard) in resolved.wildcard_indexes.iter().enumerate() {
      list_index = Some(match wildcard {
        None => {
          let ambient = ambient.ok_or_else(|| {
            raise_error(ErrorCode::List201, format!("no loop context for: {path}"))
          })?;
          ambient.at(depth as isize).ok_or_else(|| {
            raise_error(ErrorCode::List201, format!("loop context too shallow for: {path}"))
          })?
        }
        Some(index) => {
          let list_info = get_structured_path_info(&info.wildcard_parent_paths[depth])?;
          let list_ref = get_state_property_ref(&list_info, list_index.as_ref());
          let rows = self.ensure_list_indexes(&list_ref)?;
          let at = normalize_index(*index, rows.len()).ok_or_else(|| {
            raise_error(ErrorCode::List201, format!("row {index} out of range for: {path}"))
          })?;
          rows[at].clone()
        }
      });
    }
    Ok(get_state_property_ref(&info, list_index.as_ref()))
  }

  /// Row identities for a list ref, creating and persisting them from the
  /// current value when the list has not rendered yet.
  pub(crate) fn ensure_list_indexes(
    self: &Rc<Self>, list_ref: &Rc<StatePropertyRef>,
  ) -> Result<Vec<Rc<ListIndex>>> {
    if let Some(snapshot) = self.get_list_and_list_indexes(list_ref) {
      return Ok(snapshot.list_indexes);
    }
    let value = self.compute_ref_value(list_ref)?;
    let parent = list_ref.list_index()?;
    let rows = create_list_indexes(parent.as_ref(), None, &value, &[]);
    if self.path_manager().is_list(&list_ref.info.pattern) {
      self.save_list_and_list_indexes(list_ref, value, rows.clone())?;
    }
    Ok(rows)
  }

  /// Resolve one value under `pattern` with every wildcard pinned by
  /// `indexes` — `$resolve` in state method bodies.
  pub fn resolve_pinned(self: &Rc<Self>, pattern: &str, indexes: &[usize]) -> Result<Value> {
    let info = get_structured_path_info(pattern)?;
    if indexes.len() < info.wildcard_count {
      return Err(raise_error(
        ErrorCode::List201,
        format!("{} indexes cannot pin: {pattern}", indexes.len()),
      ));
    }
    let mut at = 0usize;
    let name: Vec<String> = info
      .path_segments
      .iter()
      .map(|segment| {
        if segment == crate::constants::WILDCARD {
          let pin = indexes[at].to_string();
          at += 1;
          pin
        } else {
          segment.clone()
        }
      })
      .collect();
    let r = self.resolve_path_ref(&name.join("."), None)?;
    self.get_by_ref(&r)
  }

  /// Materialise every value under a wildcard pattern.
  ///
  /// `indexes` pins leading wildcard levels; with `indexes` omitted the
  /// ambient frame pins them instead. Unpinned levels enumerate every row.
  /// The read registers the pattern as a dynamic dependency of whatever is
  /// currently resolving.
  pub fn get_all(
    self: &Rc<Self>, pattern: &str, indexes: Option<&[usize]>, ambient: Option<&Rc<ListIndex>>,
  ) -> Result<Vec<Value>> {
    let info = get_structured_path_info(pattern)?;
    self.path_manager().add_path(pattern, true)?;
    self.record_dependency(&info);

    let pins: Vec<usize> = match indexes {
      Some(indexes) => indexes.to_vec(),
      None => ambient.map(|li| li.indexes()).unwrap_or_default(),
    };

    let mut out = Vec::new();
    self.get_all_walk(&info, 0, None, &pins, &mut out)?;
    Ok(out)
  }

  fn get_all_walk(
    self: &Rc<Self>, info: &Rc<StructuredPathInfo>, depth: usize, li: Option<Rc<ListIndex>>,
    pins: &[usize], out: &mut Vec<Value>,
  ) -> Result<()> {
    if depth == info.wildcard_count {
      let r = get_state_property_ref(info, li.as_ref());
      out.push(self.get_by_ref(&r)?);
      return Ok(());
    }
    let list_info = get_structured_path_info(&info.wildcard_parent_paths[depth])?;
    let list_ref = get_state_property_ref(&list_info, li.as_ref());
    let rows = self.ensure_list_indexes(&list_ref)?;
    match pins.get(depth) {
      Some(&pin) => {
        let row = rows.get(pin).cloned().ok_or_else(|| {
          raise_error(ErrorCode::List201, format!("row {pin} out of range for: {}", info.pattern))
        })?;
        self.get_all_walk(info, depth + 1, Some(row), pins, out)
      }
      None => {
        for row in rows {
          self.get_all_walk(info, depth + 1, Some(row), pins, out)?;
        }
        Ok(())
      }
    }
  }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
  let at = if index < 0 { index + len as i64 } else { index };
  (0..len as i64).contains(&at).then_some(at as usize)
}

/// The scope getter and setter bodies receive: path reads, `$k` variables
/// and `$getAll` under the computed pattern's frame; setters additionally
/// write their base paths through it.
pub(crate) struct AccessScope {
  pub(crate) engine: Rc<ComponentEngine>,
  pub(crate) list_index: Option<Rc<ListIndex>>,
}

impl StateAccess for AccessScope {
  fn value(&self, path: &str) -> Result<Value> {
    let r = self.engine.resolve_path_ref(path, self.list_index.as_ref())?;
    self.engine.get_by_ref(&r)
  }

  fn index(&self, k: usize) -> Option<usize> {
    self
      .list_index
      .as_ref()
      .and_then(|li| li.indexes().get(k - 1).copied())
  }

  fn get_all(&self, pattern: &str, indexes: Option<&[usize]>) -> Result<Vec<Value>> {
    self.engine.get_all(pattern, indexes, self.list_index.as_ref())
  }

  fn resolve(&self, pattern: &str, indexes: &[usize]) -> Result<Value> {
    self.engine.resolve_pinned(pattern, indexes)
  }
}

impl crate::state::StateMutate for AccessScope {
  fn set_value(&self, path: &str, value: Value) -> Result<()> {
    let r = self.engine.resolve_path_ref(path, self.list_index.as_ref())?;
    self.engine.set_by_ref(&r, value)
  }
}
