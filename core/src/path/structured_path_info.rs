use std::{cell::Cell, collections::HashMap as StdHashMap, rc::Rc};

use ahash::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::{
  constants::{is_reserved_word, DELIMITER, WILDCARD},
  error::{raise_error, ErrorCode, Result},
};

/// An interned descriptor of a dotted pattern with `*` wildcards.
///
/// Two [`get_structured_path_info`] calls with the same pattern return the
/// same `Rc`; identity comparisons are cheap and ids are stable for the life
/// of the thread.
#[derive(Debug)]
pub struct StructuredPathInfo {
  pub id: u64,
  /// Decimal string form of `id`, used to build ref keys.
  pub sid: String,
  pub pattern: String,
  pub path_segments: SmallVec<[String; 4]>,
  /// `{"users", "users.*", …, pattern}` in order.
  pub cumulative_paths: Vec<String>,
  pub cumulative_path_set: HashSet<String>,
  pub wildcard_count: usize,
  /// For each `*`, the cumulative path ending at that `*`.
  pub wildcard_paths: Vec<String>,
  /// For each `*`, the cumulative path immediately before it.
  pub wildcard_parent_paths: Vec<String>,
  pub index_by_wildcard_path: HashMap<String, usize>,
  pub last_wildcard_path: Option<String>,
  pub parent_path: Option<String>,
}

impl PartialEq for StructuredPathInfo {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}
impl Eq for StructuredPathInfo {}
impl std::hash::Hash for StructuredPathInfo {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

thread_local! {
  static INTERNED: std::cell::RefCell<StdHashMap<String, Rc<StructuredPathInfo>>> =
    std::cell::RefCell::new(StdHashMap::new());
  static NEXT_ID: Cell<u64> = const { Cell::new(1) };
}

pub(crate) fn reset() {
  INTERNED.with(|m| m.borrow_mut().clear());
  NEXT_ID.with(|c| c.set(1));
}

/// Intern `pattern`. Reserved-word patterns are rejected with STATE-202.
pub fn get_structured_path_info(pattern: &str) -> Result<Rc<StructuredPathInfo>> {
  if let Some(info) = INTERNED.with(|m| m.borrow().get(pattern).cloned()) {
    return Ok(info);
  }
  if is_reserved_word(pattern) {
    return Err(
      raise_error(ErrorCode::State202, format!("pattern is reserved: {pattern}"))
        .with_context("pattern", pattern),
    );
  }

  let info = Rc::new(build(pattern));
  INTERNED.with(|m| m.borrow_mut().insert(pattern.to_string(), info.clone()));
  Ok(info)
}

fn build(pattern: &str) -> StructuredPathInfo {
  let id = NEXT_ID.with(|c| {
    let id = c.get();
    c.set(id + 1);
    id
  });

  let path_segments: SmallVec<[String; 4]> = if pattern.is_empty() {
    SmallVec::new()
  } else {
    pattern.split(DELIMITER).map(str::to_string).collect()
  };

  let mut cumulative_paths = Vec::with_capacity(path_segments.len());
  let mut wildcard_paths = Vec::new();
  let mut wildcard_parent_paths = Vec::new();
  let mut index_by_wildcard_path = HashMap::default();
  let mut current = String::new();
  for segment in &path_segments {
    let parent = current.clone();
    if !current.is_empty() {
      current.push(DELIMITER);
    }
    current.push_str(segment);
    cumulative_paths.push(current.clone());
    if segment == WILDCARD {
      index_by_wildcard_path.insert(current.clone(), wildcard_paths.len());
      wildcard_paths.push(current.clone());
      wildcard_parent_paths.push(parent);
    }
  }

  let cumulative_path_set: HashSet<String> = cumulative_paths.iter().cloned().collect();
  let parent_path = (path_segments.len() > 1)
    .then(|| cumulative_paths[cumulative_paths.len() - 2].clone());

  StructuredPathInfo {
    id,
    sid: id.to_string(),
    pattern: pattern.to_string(),
    wildcard_count: wildcard_paths.len(),
    last_wildcard_path: wildcard_paths.last().cloned(),
    path_segments,
    cumulative_paths,
    cumulative_path_set,
    wildcard_paths,
    wildcard_parent_paths,
    index_by_wildcard_path,
    parent_path,
  }
}

impl StructuredPathInfo {
  /// The interned info of `parent_path`, if any.
  ///
  /// A valid pattern's parent is always a valid pattern, so this cannot fail
  /// once `self` exists.
  pub fn parent_info(&self) -> Option<Rc<StructuredPathInfo>> {
    self.parent_path.as_ref().map(|p| {
      get_structured_path_info(p).expect("parent of an interned pattern must intern")
    })
  }

  /// Interned infos of `wildcard_parent_paths`, one per wildcard.
  pub fn wildcard_parent_infos(&self) -> Vec<Rc<StructuredPathInfo>> {
    self
      .wildcard_parent_paths
      .iter()
      .map(|p| get_structured_path_info(p).expect("wildcard parent of an interned pattern must intern"))
      .collect()
  }

  /// Interned infos of `wildcard_paths`, one per wildcard.
  pub fn wildcard_infos(&self) -> Vec<Rc<StructuredPathInfo>> {
    self
      .wildcard_paths
      .iter()
      .map(|p| get_structured_path_info(p).expect("wildcard path of an interned pattern must intern"))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_returns_the_same_instance() {
    crate::reset_test_env!();
    let a = get_structured_path_info("users.*.orders.*.total").unwrap();
    let b = get_structured_path_info("users.*.orders.*.total").unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(a.id, b.id);
  }

  #[test]
  fn cumulative_and_wildcard_derivation() {
    crate::reset_test_env!();
    let info = get_structured_path_info("users.*.orders.*.total").unwrap();
    assert_eq!(
      info.cumulative_paths,
      ["users", "users.*", "users.*.orders", "users.*.orders.*", "users.*.orders.*.total"]
    );
    assert_eq!(info.wildcard_count, 2);
    assert_eq!(info.wildcard_paths, ["users.*", "users.*.orders.*"]);
    assert_eq!(info.wildcard_parent_paths, ["users", "users.*.orders"]);
    assert_eq!(info.index_by_wildcard_path["users.*"], 0);
    assert_eq!(info.index_by_wildcard_path["users.*.orders.*"], 1);
    assert_eq!(info.last_wildcard_path.as_deref(), Some("users.*.orders.*"));
    assert_eq!(info.parent_path.as_deref(), Some("users.*.orders.*"));
    assert!(info.cumulative_path_set.contains("users.*.orders"));
  }

  #[test]
  fn single_segment_and_empty_patterns() {
    crate::reset_test_env!();
    let info = get_structured_path_info("foo").unwrap();
    assert_eq!(info.parent_path, None);
    assert!(info.parent_info().is_none());
    assert_eq!(info.wildcard_count, 0);

    let root = get_structured_path_info("").unwrap();
    assert!(root.path_segments.is_empty());
    assert!(root.cumulative_paths.is_empty());
  }

  #[test]
  fn reserved_word_pattern_is_rejected() {
    crate::reset_test_env!();
    let err = get_structured_path_info("constructor").unwrap_err();
    assert_eq!(err.code, ErrorCode::State202);
  }
}
