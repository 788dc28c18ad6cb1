//! Stable per-row identity for nested repeaters.
//!
//! Every row of every `for` binding gets a `ListIndex`. The identity (and
//! the `id`) survives reorders; only `index` changes. Children link to their
//! parent frame, so a row of a nested loop knows the whole `$1..$N` index
//! vector of its ancestors.

use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use ahash::HashMap;

use crate::property_ref::StatePropertyRef;

#[derive(Debug)]
pub struct ListIndex {
  id: u64,
  sid: String,
  parent: Option<Rc<ListIndex>>,
  position: usize,
  index: Cell<usize>,
  /// Global version stamp of the last `set_index`.
  version: Cell<u64>,
  cache: RefCell<Option<AncestorCache>>,
  /// Refs scoped to this row, interned by pattern id. Dropping the row drops
  /// them, which is what ties ref lifetime to row lifetime.
  pub(crate) ref_table: RefCell<HashMap<u64, Rc<StatePropertyRef>>>,
}

#[derive(Debug)]
struct AncestorCache {
  at_version: u64,
  /// `[root.index, …, self.index]`
  indexes: Vec<usize>,
  /// Weak refs to `[root, …, self]`.
  list_indexes: Vec<Weak<ListIndex>>,
}

thread_local! {
  static NEXT_ID: Cell<u64> = const { Cell::new(1) };
  static GLOBAL_VERSION: Cell<u64> = const { Cell::new(1) };
}

pub(crate) fn reset_ids() {
  NEXT_ID.with(|c| c.set(1));
  GLOBAL_VERSION.with(|c| c.set(1));
}

fn next_id() -> u64 {
  NEXT_ID.with(|c| {
    let id = c.get();
    c.set(id + 1);
    id
  })
}

fn bump_global_version() -> u64 {
  GLOBAL_VERSION.with(|c| {
    let v = c.get() + 1;
    c.set(v);
    v
  })
}

fn current_global_version() -> u64 { GLOBAL_VERSION.with(|c| c.get()) }

impl ListIndex {
  pub fn new_root(index: usize) -> Rc<ListIndex> { Self::build(None, index) }

  pub fn new_child(parent: &Rc<ListIndex>, index: usize) -> Rc<ListIndex> {
    Self::build(Some(parent.clone()), index)
  }

  fn build(parent: Option<Rc<ListIndex>>, index: usize) -> Rc<ListIndex> {
    let id = next_id();
    let position = parent.as_ref().map_or(0, |p| p.position + 1);
    Rc::new(ListIndex {
      id,
      sid: id.to_string(),
      parent,
      position,
      index: Cell::new(index),
      version: Cell::new(current_global_version()),
      cache: RefCell::new(None),
      ref_table: RefCell::new(HashMap::default()),
    })
  }

  pub fn id(&self) -> u64 { self.id }

  pub fn sid(&self) -> &str { &self.sid }

  pub fn parent_list_index(&self) -> Option<&Rc<ListIndex>> { self.parent.as_ref() }

  /// Depth in the loop hierarchy; 0 for a root frame.
  pub fn position(&self) -> usize { self.position }

  /// Number of frames from root to self.
  pub fn length(&self) -> usize { self.position + 1 }

  pub fn index(&self) -> usize { self.index.get() }

  /// The `$k` variable name this frame binds, 1-based.
  pub fn var_name(&self) -> String { (self.position + 1).to_string() }

  /// Move the row to a new position. Bumps the global and local version so
  /// every cached `indexes` vector that includes this frame goes stale.
  pub fn set_index(&self, index: usize) {
    self.index.set(index);
    self.version.set(bump_global_version());
  }

  /// True when the cached `indexes` no longer reflects some ancestor.
  pub fn dirty(&self) -> bool {
    match &*self.cache.borrow() {
      None => true,
      Some(cache) => {
        let mut frame = Some(self);
        while let Some(li) = frame {
          if li.version.get() > cache.at_version {
            return true;
          }
          frame = li.parent.as_deref();
        }
        false
      }
    }
  }

  /// `[root.index, …, self.index]`, rebuilt when stale.
  pub fn indexes(self: &Rc<Self>) -> Vec<usize> {
    self.ensure_cache();
    self.cache.borrow().as_ref().expect("cache was just built").indexes.clone()
  }

  /// The frame at offset `k` of `[root, …, self]`; negative `k` counts from
  /// the tail. Returns `None` when out of range or when the frame was
  /// already collected.
  pub fn at(self: &Rc<Self>, k: isize) -> Option<Rc<ListIndex>> {
    self.ensure_cache();
    let cache = self.cache.borrow();
    let list_indexes = &cache.as_ref().expect("cache was just built").list_indexes;
    let len = list_indexes.len() as isize;
    let at = if k < 0 { len + k } else { k };
    if !(0..len).contains(&at) {
      return None;
    }
    list_indexes[at as usize].upgrade()
  }

  fn ensure_cache(self: &Rc<Self>) {
    if !self.dirty() {
      return;
    }
    let mut indexes = Vec::with_capacity(self.length());
    let mut list_indexes: Vec<Weak<ListIndex>> = Vec::with_capacity(self.length());
    let mut chain: Vec<Rc<ListIndex>> = Vec::with_capacity(self.length());
    let mut frame = Some(self.clone());
    while let Some(li) = frame {
      frame = li.parent.clone();
      chain.push(li);
    }
    for li in chain.iter().rev() {
      indexes.push(li.index.get());
      list_indexes.push(Rc::downgrade(li));
    }
    *self.cache.borrow_mut() =
      Some(AncestorCache { at_version: current_global_version(), indexes, list_indexes });
  }
}

impl PartialEq for ListIndex {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}
impl Eq for ListIndex {}
impl std::hash::Hash for ListIndex {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn positions_and_var_names() {
    crate::reset_test_env!();
    let root = ListIndex::new_root(3);
    let child = ListIndex::new_child(&root, 0);
    let grand = ListIndex::new_child(&child, 7);
    assert_eq!(root.position(), 0);
    assert_eq!(grand.position(), 2);
    assert_eq!(grand.length(), 3);
    assert_eq!(root.var_name(), "1");
    assert_eq!(grand.var_name(), "3");
    assert_eq!(grand.indexes(), [3, 0, 7]);
  }

  #[test]
  fn set_index_invalidates_descendant_caches() {
    crate::reset_test_env!();
    let root = ListIndex::new_root(0);
    let child = ListIndex::new_child(&root, 1);
    assert_eq!(child.indexes(), [0, 1]);
    assert!(!child.dirty());

    root.set_index(5);
    assert!(child.dirty());
    assert_eq!(child.indexes(), [5, 1]);
    assert!(!child.dirty());
  }

  #[test]
  fn at_counts_from_both_ends() {
    crate::reset_test_env!();
    let root = ListIndex::new_root(0);
    let child = ListIndex::new_child(&root, 1);
    assert_eq!(child.at(0).unwrap().id(), root.id());
    assert_eq!(child.at(-1).unwrap().id(), child.id());
    assert_eq!(child.at(-2).unwrap().id(), root.id());
    assert!(child.at(2).is_none());
    assert!(child.at(-3).is_none());
    assert!(root.at(-2).is_none());
  }

  #[test]
  fn identity_survives_reindex() {
    crate::reset_test_env!();
    let li = ListIndex::new_root(0);
    let id = li.id();
    li.set_index(9);
    assert_eq!(li.id(), id);
    assert_eq!(li.index(), 9);
  }
}
