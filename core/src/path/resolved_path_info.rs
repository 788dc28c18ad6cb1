use std::{collections::HashMap as StdHashMap, rc::Rc};

use smallvec::SmallVec;

use crate::{
  constants::{DELIMITER, WILDCARD},
  error::Result,
  path::{get_structured_path_info, StructuredPathInfo},
};

/// How the wildcard positions of a concrete name are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardType {
  /// No wildcard positions at all.
  None,
  /// Every wildcard position is `*`, deferred to the ambient loop context.
  Context,
  /// Every wildcard position carries a numeric index.
  All,
  /// A mixture of `*` and numeric positions.
  Partial,
}

/// An interned parse of a concrete dotted name such as `a.0.b.*`.
#[derive(Debug)]
pub struct ResolvedPathInfo {
  pub name: String,
  /// Segments exactly as entered.
  pub elements: Vec<String>,
  /// Cumulative prefixes of `name`.
  pub paths: Vec<String>,
  /// One entry per wildcard position, left to right: `None` for `*`, the
  /// integer for numeric segments.
  pub wildcard_indexes: SmallVec<[Option<i64>; 4]>,
  pub wildcard_type: WildcardType,
  /// The pattern descriptor with every numeric segment replaced by `*`.
  pub info: Rc<StructuredPathInfo>,
}

thread_local! {
  static INTERNED: std::cell::RefCell<StdHashMap<String, Rc<ResolvedPathInfo>>> =
    std::cell::RefCell::new(StdHashMap::new());
}

pub(crate) fn reset() { INTERNED.with(|m| m.borrow_mut().clear()); }

/// Intern the parse of `name`.
pub fn get_resolved_path_info(name: &str) -> Result<Rc<ResolvedPathInfo>> {
  if let Some(info) = INTERNED.with(|m| m.borrow().get(name).cloned()) {
    return Ok(info);
  }

  let elements: Vec<String> = if name.is_empty() {
    Vec::new()
  } else {
    name.split(DELIMITER).map(str::to_string).collect()
  };

  let mut paths = Vec::with_capacity(elements.len());
  let mut pattern = String::new();
  let mut wildcard_indexes = SmallVec::new();
  let mut incomplete = 0usize;
  let mut complete = 0usize;
  let mut current = String::new();
  for element in &elements {
    if !current.is_empty() {
      current.push(DELIMITER);
      pattern.push(DELIMITER);
    }
    current.push_str(element);
    paths.push(current.clone());

    if element == WILDCARD {
      wildcard_indexes.push(None);
      incomplete += 1;
      pattern.push_str(WILDCARD);
    } else if let Ok(index) = element.parse::<i64>() {
      wildcard_indexes.push(Some(index));
      complete += 1;
      pattern.push_str(WILDCARD);
    } else {
      pattern.push_str(element);
    }
  }

  let wildcard_type = match (incomplete, complete) {
    (0, 0) => WildcardType::None,
    (_, 0) => WildcardType::Context,
    (0, _) => WildcardType::All,
    _ => WildcardType::Partial,
  };

  let info = get_structured_path_info(&pattern)?;
  let resolved = Rc::new(ResolvedPathInfo {
    name: name.to_string(),
    elements,
    paths,
    wildcard_indexes,
    wildcard_type,
    info,
  });
  INTERNED.with(|m| m.borrow_mut().insert(name.to_string(), resolved.clone()));
  Ok(resolved)
}
