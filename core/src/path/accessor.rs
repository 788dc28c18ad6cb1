use std::{cell::RefCell, collections::HashMap as StdHashMap, rc::Rc};

use ahash::HashSet;

use crate::{
  constants::{is_valid_segment_name, WILDCARD},
  error::{raise_error, ErrorCode, Result},
  path::StructuredPathInfo,
};

/// One step of a compiled accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  /// Walk into an object member.
  Literal(String),
  /// Index an array with the `$k` wildcard variable (1-based ordinal into
  /// the ambient wildcard frame).
  Wildcard(usize),
}

/// A compiled get/set plan for one pattern.
///
/// Resolution starts from the value of `getter_prefix` when present (the
/// longest user-getter path covering the pattern, two segments or more),
/// else from the state root, then interprets `steps` in order.
#[derive(Debug, PartialEq, Eq)]
pub struct Accessor {
  pub getter_prefix: Option<String>,
  /// Wildcards consumed by the prefix; the prefix getter resolves them from
  /// the same frame.
  pub prefix_wildcards: usize,
  pub steps: Vec<Step>,
}

thread_local! {
  static CACHE: RefCell<StdHashMap<(u64, u64), Rc<Accessor>>> = RefCell::new(StdHashMap::new());
}

pub(crate) fn reset_cache() { CACHE.with(|c| c.borrow_mut().clear()); }

/// Compile the accessor for `info` given the class's getter paths.
///
/// `generation` keys the cache; bump it whenever `getters` changes.
pub fn create_accessor_functions(
  info: &Rc<StructuredPathInfo>, getters: &HashSet<String>, generation: u64,
) -> Result<Rc<Accessor>> {
  if let Some(hit) = CACHE.with(|c| c.borrow().get(&(info.id, generation)).cloned()) {
    return Ok(hit);
  }

  for segment in &info.path_segments {
    if segment != WILDCARD && !is_valid_segment_name(segment) {
      return Err(
        raise_error(ErrorCode::State202, format!("invalid segment name: {segment}"))
          .with_context("pattern", &info.pattern),
      );
    }
  }

  // Longest getter prefix of two or more segments wins; single-segment
  // getter paths never match.
  let mut prefix_len = 0usize;
  for (i, cumulative) in info.cumulative_paths.iter().enumerate().rev() {
    if i + 1 >= 2 && getters.contains(cumulative) {
      prefix_len = i + 1;
      break;
    }
  }

  let mut steps = Vec::with_capacity(info.path_segments.len() - prefix_len);
  let mut wildcard_ordinal = info.path_segments[..prefix_len]
    .iter()
    .filter(|s| *s == WILDCARD)
    .count();
  for segment in &info.path_segments[prefix_len..] {
    if segment == WILDCARD {
      wildcard_ordinal += 1;
      steps.push(Step::Wildcard(wildcard_ordinal));
    } else {
      steps.push(Step::Literal(segment.clone()));
    }
  }

  let accessor = Rc::new(Accessor {
    getter_prefix: (prefix_len > 0).then(|| info.cumulative_paths[prefix_len - 1].clone()),
    prefix_wildcards: info.path_segments[..prefix_len]
      .iter()
      .filter(|s| *s == WILDCARD)
      .count(),
    steps,
  });
  CACHE.with(|c| c.borrow_mut().insert((info.id, generation), accessor.clone()));
  Ok(accessor)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::path::get_structured_path_info;

  fn getters(paths: &[&str]) -> HashSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
  }

  #[test]
  fn root_walk_without_getters() {
    crate::reset_test_env!();
    let info = get_structured_path_info("users.*.name").unwrap();
    let acc = create_accessor_functions(&info, &getters(&[]), 0).unwrap();
    assert_eq!(acc.getter_prefix, None);
    assert_eq!(
      acc.steps,
      [
        Step::Literal("users".into()),
        Step::Wildcard(1),
        Step::Literal("name".into())
      ]
    );
  }

  #[test]
  fn longest_prefix_of_two_or_more_segments_wins() {
    crate::reset_test_env!();
    let info = get_structured_path_info("a.b.c.d").unwrap();
    let acc =
      create_accessor_functions(&info, &getters(&["a.b", "a.b.c"]), 1).unwrap();
    assert_eq!(acc.getter_prefix.as_deref(), Some("a.b.c"));
    assert_eq!(acc.steps, [Step::Literal("d".into())]);
  }

  #[test]
  fn single_segment_getter_prefix_is_skipped() {
    crate::reset_test_env!();
    let info = get_structured_path_info("a.b").unwrap();
    let acc = create_accessor_functions(&info, &getters(&["a"]), 2).unwrap();
    assert_eq!(acc.getter_prefix, None);
    assert_eq!(acc.steps, [Step::Literal("a".into()), Step::Literal("b".into())]);
  }

  #[test]
  fn wildcard_ordinals_continue_past_the_prefix() {
    crate::reset_test_env!();
    let info = get_structured_path_info("a.*.b.*.c").unwrap();
    let acc = create_accessor_functions(&info, &getters(&["a.*.b"]), 3).unwrap();
    assert_eq!(acc.getter_prefix.as_deref(), Some("a.*.b"));
    assert_eq!(acc.prefix_wildcards, 1);
    assert_eq!(acc.steps, [Step::Wildcard(2), Step::Literal("c".into())]);
  }

  #[test]
  fn invalid_segment_names_are_rejected() {
    crate::reset_test_env!();
    let info = get_structured_path_info("a.b-c").unwrap();
    let err = create_accessor_functions(&info, &getters(&[]), 4).unwrap_err();
    assert_eq!(err.code, ErrorCode::State202);
  }
}
