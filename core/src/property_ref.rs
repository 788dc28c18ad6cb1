//! The `(pattern, list index)` composite every dependency edge hangs off.
//!
//! Refs are uniqued: the same `(info, list_index)` pair always yields the
//! same `Rc`. Index-less refs intern in a thread-local table; refs scoped to
//! a row intern inside the row's `ListIndex`, so they die with the row.

use std::{
  cell::RefCell,
  collections::HashMap as StdHashMap,
  rc::{Rc, Weak},
};

use crate::{
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::StructuredPathInfo,
};

#[derive(Debug)]
pub struct StatePropertyRef {
  pub info: Rc<StructuredPathInfo>,
  list_index: Option<Weak<ListIndex>>,
  list_index_id: Option<u64>,
  /// `info.sid` or `info.sid#list_index.sid`.
  pub key: String,
  parent: RefCell<Option<Option<Rc<StatePropertyRef>>>>,
}

thread_local! {
  static INTERNED: RefCell<StdHashMap<u64, Rc<StatePropertyRef>>> =
    RefCell::new(StdHashMap::new());
}

pub(crate) fn reset_interner() { INTERNED.with(|m| m.borrow_mut().clear()); }

/// Intern the ref for `(info, list_index)`.
pub fn get_state_property_ref(
  info: &Rc<StructuredPathInfo>, list_index: Option<&Rc<ListIndex>>,
) -> Rc<StatePropertyRef> {
  match list_index {
    None => INTERNED.with(|m| {
      m.borrow_mut()
        .entry(info.id)
        .or_insert_with(|| new_ref(info, None))
        .clone()
    }),
    Some(li) => {
      let mut table = li.ref_table.borrow_mut();
      table
        .entry(info.id)
        .or_insert_with(|| new_ref(info, Some(li)))
        .clone()
    }
  }
}

fn new_ref(info: &Rc<StructuredPathInfo>, list_index: Option<&Rc<ListIndex>>) -> Rc<StatePropertyRef> {
  let key = match list_index {
    None => info.sid.clone(),
    Some(li) => format!("{}#{}", info.sid, li.sid()),
  };
  Rc::new(StatePropertyRef {
    info: info.clone(),
    list_index: list_index.map(Rc::downgrade),
    list_index_id: list_index.map(|li| li.id()),
    key,
    parent: RefCell::new(None),
  })
}

impl StatePropertyRef {
  /// The live list index, `None` for index-less refs. A collected index
  /// raises LIST-201.
  pub fn list_index(&self) -> Result<Option<Rc<ListIndex>>> {
    match &self.list_index {
      None => Ok(None),
      Some(weak) => weak.upgrade().map(Some).ok_or_else(|| {
        raise_error(ErrorCode::List201, format!("list index was collected: {}", self.info.pattern))
          .with_context("pattern", &self.info.pattern)
      }),
    }
  }

  pub fn list_index_id(&self) -> Option<u64> { self.list_index_id }

  /// The ref of `info.parent_path`.
  ///
  /// When the parent pattern has fewer wildcards, the deepest loop frame is
  /// dropped (`list_index.at(-2)`); otherwise the frame is shared.
  pub fn parent_ref(self: &Rc<Self>) -> Result<Option<Rc<StatePropertyRef>>> {
    if let Some(memo) = &*self.parent.borrow() {
      return Ok(memo.clone());
    }
    let parent = match self.info.parent_info() {
      None => None,
      Some(parent_info) => {
        let list_index = if parent_info.wildcard_count < self.info.wildcard_count {
          self.list_index()?.and_then(|li| li.at(-2))
        } else {
          self.list_index()?
        };
        Some(get_state_property_ref(&parent_info, list_index.as_ref()))
      }
    };
    *self.parent.borrow_mut() = Some(parent.clone());
    Ok(parent)
  }
}

impl PartialEq for StatePropertyRef {
  fn eq(&self, other: &Self) -> bool {
    self.info.id == other.info.id && self.list_index_id == other.list_index_id
  }
}
impl Eq for StatePropertyRef {}
impl std::hash::Hash for StatePropertyRef {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.info.id.hash(state);
    self.list_index_id.hash(state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::path::get_structured_path_info;

  #[test]
  fn interning_is_identity() {
    crate::reset_test_env!();
    let info = get_structured_path_info("items.*.name").unwrap();
    let li = ListIndex::new_root(0);
    let a = get_state_property_ref(&info, Some(&li));
    let b = get_state_property_ref(&info, Some(&li));
    assert!(Rc::ptr_eq(&a, &b));

    let no_index = get_state_property_ref(&get_structured_path_info("items").unwrap(), None);
    assert!(Rc::ptr_eq(
      &no_index,
      &get_state_property_ref(&get_structured_path_info("items").unwrap(), None)
    ));
  }

  #[test]
  fn keys_are_distinct_per_pair() {
    crate::reset_test_env!();
    let info = get_structured_path_info("items.*").unwrap();
    let li0 = ListIndex::new_root(0);
    let li1 = ListIndex::new_root(1);
    let a = get_state_property_ref(&info, Some(&li0));
    let b = get_state_property_ref(&info, Some(&li1));
    let c = get_state_property_ref(&info, None);
    assert_ne!(a.key, b.key);
    assert_ne!(a.key, c.key);
    assert_eq!(c.key, info.sid);
  }

  #[test]
  fn parent_ref_drops_the_deepest_frame_on_wildcard_decrease() {
    crate::reset_test_env!();
    let leaf = get_structured_path_info("groups.*.items.*").unwrap();
    let outer = ListIndex::new_root(1);
    let inner = ListIndex::new_child(&outer, 2);
    let r = get_state_property_ref(&leaf, Some(&inner));

    // "groups.*.items" keeps both wildcard counts equal (2 -> 1): drop one.
    let p = r.parent_ref().unwrap().unwrap();
    assert_eq!(p.info.pattern, "groups.*.items");
    assert_eq!(p.list_index().unwrap().unwrap().id(), outer.id());

    // "groups.*" has the same wildcard count as its parent "groups"? No:
    // one more drop down to the root segment loses the frame entirely.
    let gp = p.parent_ref().unwrap().unwrap();
    assert_eq!(gp.info.pattern, "groups.*");
    assert_eq!(gp.list_index().unwrap().unwrap().id(), outer.id());
    let ggp = gp.parent_ref().unwrap().unwrap();
    assert_eq!(ggp.info.pattern, "groups");
    assert!(ggp.list_index().unwrap().is_none());
    assert!(ggp.parent_ref().unwrap().is_none());
  }

  #[test]
  fn dead_list_index_raises() {
    crate::reset_test_env!();
    let info = get_structured_path_info("items.*").unwrap();
    let r = {
      let li = ListIndex::new_root(0);
      get_state_property_ref(&info, Some(&li))
    };
    // The row owned the only strong reference to itself and to the ref's
    // intern slot; the ref we cloned out lives on with a dead weak.
    let err = r.list_index().unwrap_err();
    assert_eq!(err.code, ErrorCode::List201);
  }
}
