//! The child→parent read/write channel.
//!
//! A child path covered by a registered mapping is parent-backed: the child
//! never stores it, every read and write translates to the parent engine.

use std::rc::Rc;

use serde_json::Value;

use crate::{
  component::ComponentEngine,
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::{get_structured_path_info, StructuredPathInfo},
  property_ref::{get_state_property_ref, StatePropertyRef},
};

impl ComponentEngine {
  /// True when `info` falls under a registered child-path mapping.
  pub fn state_output_starts_with(&self, info: &StructuredPathInfo) -> bool {
    self.state_binding().starts_with_by_child_path(info).is_some()
  }

  pub(crate) fn state_output_get(self: &Rc<Self>, child_ref: &Rc<StatePropertyRef>) -> Result<Value> {
    let (parent, parent_ref) = self.translate_to_parent(child_ref)?;
    parent.get_property_value(&parent_ref)
  }

  pub(crate) fn state_output_set(
    self: &Rc<Self>, child_ref: &Rc<StatePropertyRef>, value: Value,
  ) -> Result<()> {
    let (parent, parent_ref) = self.translate_to_parent(child_ref)?;
    parent.set_property_value(&parent_ref, value)
  }

  /// List indexes of a parent-backed list path. The parent learns the path
  /// as a dynamic dependency source the first time.
  pub(crate) fn state_output_list_indexes(
    self: &Rc<Self>, child_ref: &Rc<StatePropertyRef>,
  ) -> Result<Option<Vec<Rc<ListIndex>>>> {
    let (parent, parent_ref) = self.translate_to_parent(child_ref)?;
    parent.path_manager().add_path(&parent_ref.info.pattern, true)?;
    parent.get_list_indexes(&parent_ref)
  }

  /// Translate a child ref to `(parent engine, parent ref)`.
  ///
  /// The frame is the child ref's own list index when it carries one,
  /// otherwise the loop context of the component-slot binding that
  /// registered the mapping.
  fn translate_to_parent(
    self: &Rc<Self>, child_ref: &Rc<StatePropertyRef>,
  ) -> Result<(Rc<ComponentEngine>, Rc<StatePropertyRef>)> {
    let parent = self.parent_engine().ok_or_else(|| {
      raise_error(ErrorCode::State302, "no parent engine for a parent-backed path")
    })?;
    let parent_path = self
      .state_binding()
      .to_parent_path_from_child_path(&child_ref.info.pattern)?;
    let parent_info = get_structured_path_info(&parent_path)?;

    let list_index = match child_ref.list_index()? {
      Some(li) => Some(li),
      None => {
        let binding = self
          .state_binding()
          .binding_by_child_path(&child_ref.info.pattern);
        match binding {
          Some(binding) => binding.resolve_ref()?.list_index()?,
          None => None,
        }
      }
    };
    Ok((parent, get_state_property_ref(&parent_info, list_index.as_ref())))
  }
}
