//! The parent→child write channel.
//!
//! Parents (and embedders) push state into a component through these
//! engine entry points: whole-object assignment (`data-state`), string-key
//! reads/writes, and redraw notification with parent→child ref translation.

use std::rc::Rc;

use serde_json::Value;

use crate::{
  component::ComponentEngine,
  error::{raise_error, ErrorCode, Result},
  path::get_structured_path_info,
  property_ref::{get_state_property_ref, StatePropertyRef},
};

impl ComponentEngine {
  /// Read a state path with no ambient loop context.
  pub fn state_input_get(self: &Rc<Self>, path: &str) -> Result<Value> {
    if path.is_empty() {
      return Err(raise_error(ErrorCode::State203, "unsupported state key: empty path"));
    }
    let r = self.resolve_path_ref(path, None)?;
    self.get_by_ref(&r)
  }

  /// Write a state path inside a one-off update.
  pub fn state_input_set(self: &Rc<Self>, path: &str, value: Value) -> Result<()> {
    if path.is_empty() {
      return Err(raise_error(ErrorCode::State203, "unsupported state key: empty path"));
    }
    let engine = self.clone();
    let path = path.to_string();
    self.update(None, move |_| {
      let r = engine.resolve_path_ref(&path, None)?;
      engine.set_by_ref(&r, value)
    })
  }

  /// Assign every top-level key of `value` in one update transaction.
  pub fn assign_state(self: &Rc<Self>, value: Value) -> Result<()> {
    let Value::Object(map) = value else {
      return Err(
        raise_error(ErrorCode::State204, "state assignment expects an object")
          .with_context("got", value.to_string()),
      );
    };
    let engine = self.clone();
    self.update(None, move |_| {
      for (key, value) in map {
        let info = get_structured_path_info(&key)?;
        engine.set_by_ref(&get_state_property_ref(&info, None), value)?;
      }
      Ok(())
    })
  }

  /// Translate parent refs into this component's state space and enqueue
  /// them for a redraw.
  ///
  /// Parent refs outside every registered mapping are skipped. A child path
  /// with wildcards needs the parent ref's frame; a wildcard-free parent
  /// ref cannot supply one and raises LIST-201.
  pub fn notify_redraw(self: &Rc<Self>, parent_refs: &[Rc<StatePropertyRef>]) -> Result<()> {
    let mut child_refs = Vec::new();
    for parent_ref in parent_refs {
      let Ok(child_path) = self
        .state_binding()
        .to_child_path_from_parent_path(&parent_ref.info.pattern)
      else {
        continue;
      };
      let child_info = get_structured_path_info(&child_path)?;
      let list_index = if child_info.wildcard_count == 0 {
        None
      } else {
        let frame = parent_ref
          .list_index()?
          .and_then(|li| li.at(child_info.wildcard_count as isize - 1))
          .ok_or_else(|| {
            raise_error(
              ErrorCode::List201,
              format!("no list index to translate into: {child_path}"),
            )
          })?;
        Some(frame)
      };
      child_refs.push(get_state_property_ref(&child_info, list_index.as_ref()));
    }
    if child_refs.is_empty() {
      return Ok(());
    }
    let engine = self.clone();
    self.update(None, move |_| {
      for r in &child_refs {
        engine.enqueue_ref(r);
      }
      Ok(())
    })
  }
}
