use std::{
  cell::RefCell,
  rc::{Rc, Weak},
};

use ahash::HashMap;

use crate::{
  binding::{Binding, BindingNode},
  constants::DELIMITER,
  error::{raise_error, ErrorCode, Result},
  path::StructuredPathInfo,
};

/// The bidirectional, longest-prefix path translator between a parent
/// component's state and an embedded child's state.
///
/// Mappings are 1:1: each parent path and each child path may appear once.
#[derive(Debug, Default)]
pub struct ComponentStateBinding {
  child_by_parent: RefCell<HashMap<String, String>>,
  parent_by_child: RefCell<HashMap<String, String>>,
  binding_by_child_path: RefCell<HashMap<String, Weak<Binding>>>,
}

impl ComponentStateBinding {
  /// Record the mapping a component-slot binding carries: its state pattern
  /// is the parent path, its node's sub name the child path.
  pub fn add_binding(&self, binding: &Rc<Binding>) -> Result<()> {
    let BindingNode::Component(node) = &binding.node else {
      return Err(raise_error(ErrorCode::Bind301, "only component bindings map state paths"));
    };
    let parent_path = binding.state.info.pattern.clone();
    let child_path = node.sub_name().to_string();

    if self.child_by_parent.borrow().contains_key(&parent_path) {
      return Err(
        raise_error(ErrorCode::State303, format!("duplicate parent path mapping: {parent_path}"))
          .with_context("parent_path", &parent_path),
      );
    }
    if self.parent_by_child.borrow().contains_key(&child_path) {
      return Err(
        raise_error(ErrorCode::State303, format!("duplicate child path mapping: {child_path}"))
          .with_context("child_path", &child_path),
      );
    }

    self.child_by_parent.borrow_mut().insert(parent_path.clone(), child_path.clone());
    self.parent_by_child.borrow_mut().insert(child_path.clone(), parent_path);
    self
      .binding_by_child_path
      .borrow_mut()
      .insert(child_path, Rc::downgrade(binding));
    Ok(())
  }

  pub fn to_child_path_from_parent_path(&self, parent_path: &str) -> Result<String> {
    translate(&self.child_by_parent.borrow(), parent_path).ok_or_else(|| {
      raise_error(ErrorCode::State302, format!("no child path found for: {parent_path}"))
    })
  }

  pub fn to_parent_path_from_child_path(&self, child_path: &str) -> Result<String> {
    translate(&self.parent_by_child.borrow(), child_path).ok_or_else(|| {
      raise_error(ErrorCode::State302, format!("no parent path found for: {child_path}"))
    })
  }

  /// The longest registered child path that prefixes `info.pattern`.
  pub fn starts_with_by_child_path(&self, info: &StructuredPathInfo) -> Option<String> {
    longest_prefix(&self.parent_by_child.borrow(), &info.pattern)
  }

  /// The component-slot binding registered for `child_path`'s longest prefix.
  pub fn binding_by_child_path(&self, child_path: &str) -> Option<Rc<Binding>> {
    let prefix = longest_prefix(&self.parent_by_child.borrow(), child_path)?;
    self.binding_by_child_path.borrow().get(&prefix)?.upgrade()
  }
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
  path == prefix
    || (path.len() > prefix.len()
      && path.starts_with(prefix)
      && path.as_bytes()[prefix.len()] == DELIMITER as u8)
}

fn longest_prefix(map: &HashMap<String, String>, path: &str) -> Option<String> {
  map
    .keys()
    .filter(|candidate| is_path_prefix(candidate, path))
    .max_by_key(|candidate| candidate.len())
    .cloned()
}

fn translate(map: &HashMap<String, String>, path: &str) -> Option<String> {
  let prefix = longest_prefix(map, path)?;
  let mapped = &map[&prefix];
  let remainder = &path[prefix.len()..];
  Some(format!("{mapped}{remainder}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn seeded() -> ComponentStateBinding {
    let binding = ComponentStateBinding::default();
    binding.child_by_parent.borrow_mut().insert("user.name".into(), "name".into());
    binding.parent_by_child.borrow_mut().insert("name".into(), "user.name".into());
    binding
  }

  #[test]
  fn longest_prefix_translation() {
    let b = seeded();
    assert_eq!(b.to_child_path_from_parent_path("user.name").unwrap(), "name");
    assert_eq!(b.to_child_path_from_parent_path("user.name.first").unwrap(), "name.first");
    assert_eq!(b.to_parent_path_from_child_path("name.first").unwrap(), "user.name.first");

    let err = b.to_child_path_from_parent_path("user").unwrap_err();
    assert_eq!(err.code, ErrorCode::State302);
    // "user.names" must not match the "user.name" mapping.
    assert!(b.to_child_path_from_parent_path("user.names").is_err());
  }

  #[test]
  fn starts_with_by_child_path_picks_the_longest() {
    let b = seeded();
    b.parent_by_child.borrow_mut().insert("name.first".into(), "user.first".into());
    let info = crate::path::get_structured_path_info("name.first.initial").unwrap();
    assert_eq!(b.starts_with_by_child_path(&info).as_deref(), Some("name.first"));
  }
}
