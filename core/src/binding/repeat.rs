use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use ahash::HashMap;
use serde_json::Value;
use structive_dom::NodeId;

use crate::{
  binding::{BindContent, Binding},
  constants::WILDCARD,
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::get_structured_path_info,
  renderer::Renderer,
  template::TemplateFragment,
};

/// `for:path` — one realised row content per list element.
///
/// Rows are keyed by their `ListIndex` identity: a reorder moves the same
/// content (and the same document nodes) to the new position instead of
/// recreating it.
#[derive(Debug)]
pub struct ForBindingNode {
  marker: NodeId,
  row_fragment: Rc<TemplateFragment>,
  rows_by_index: RefCell<HashMap<u64, Rc<BindContent>>>,
}

impl ForBindingNode {
  pub fn new(marker: NodeId, row_fragment: Rc<TemplateFragment>) -> Self {
    ForBindingNode { marker, row_fragment, rows_by_index: RefCell::new(HashMap::default()) }
  }

  pub fn marker(&self) -> NodeId { self.marker }

  pub fn row_count(&self) -> usize { self.rows_by_index.borrow().len() }

  pub(crate) fn apply_change(&self, binding: &Rc<Binding>, renderer: &mut Renderer) -> Result<()> {
    let engine = binding.engine()?;
    let list_ref = binding.resolve_ref()?;
    let new_list = renderer.value_of(&list_ref)?;

    let snapshot = engine.get_list_and_list_indexes(&list_ref);
    let (old_clone, old_indexes) = match &snapshot {
      Some(s) => (Some(&s.list_clone), s.list_indexes.as_slice()),
      None => (None, [].as_slice()),
    };

    // A snapshot may predate the first row render (resolution walks seed
    // list indexes on demand), so "unchanged" also requires the rows to
    // exist.
    if old_clone == Some(&new_list) && self.rows_by_index.borrow().len() == old_indexes.len() {
      engine.save_list_and_list_indexes(&list_ref, new_list.clone(), old_indexes.to_vec())?;
      return Ok(());
    }

    let parent_list_index = list_ref.list_index()?;
    let new_indexes =
      create_list_indexes(parent_list_index.as_ref(), old_clone, &new_list, old_indexes);

    if self.marker.parent(&engine.document().borrow()).is_none() {
      return Err(raise_error(ErrorCode::Bind201, "for marker has no parent node"));
    }

    let element_info =
      get_structured_path_info(&format!("{}.{}", list_ref.info.pattern, WILDCARD))?;

    let mut retired = self.rows_by_index.borrow_mut().drain().collect::<HashMap<_, _>>();
    let mut anchor = self.marker;
    for list_index in &new_indexes {
      let (content, fresh) = match retired.remove(&list_index.id()) {
        Some(content) => (content, false),
        None => {
          let content = BindContent::create(
            &engine,
            &self.row_fragment,
            Some(binding),
            Some((element_info.clone(), list_index.clone())),
          )?;
          (content, true)
        }
      };
      content.mount_after(&engine, anchor);
      anchor = content.last_node().unwrap_or(anchor);
      if fresh {
        content.activate()?;
        content.apply_all(renderer)?;
      }
      self.rows_by_index.borrow_mut().insert(list_index.id(), content);
    }

    for (_, content) in retired {
      content.unmount(&engine);
      content.inactivate()?;
      content.remove_nodes(&engine);
    }

    renderer.record_binding_updated(binding.id);
    renderer.mark_structure_changed();
    engine.save_list_and_list_indexes(&list_ref, new_list, new_indexes)?;
    Ok(())
  }

  pub(crate) fn reactivate(&self) {
    for content in self.rows_by_index.borrow().values() {
      if content.is_mounted() {
        let _ = content.activate();
      }
    }
  }

  pub(crate) fn inactivate_rows(&self) {
    for content in self.rows_by_index.borrow().values() {
      let _ = content.inactivate();
    }
  }
}

/// Match `new_list` against `old_list`, reusing the `ListIndex` of equal
/// elements (last occurrence wins for duplicates) and allocating fresh
/// identities for the rest. Reused indexes are re-pointed at their new
/// position.
pub fn create_list_indexes(
  parent_list_index: Option<&Rc<ListIndex>>, old_list: Option<&Value>, new_list: &Value,
  old_indexes: &[Rc<ListIndex>],
) -> Vec<Rc<ListIndex>> {
  let Some(new_items) = new_list.as_array() else {
    return Vec::new();
  };

  let fresh = |index: usize| match parent_list_index {
    Some(parent) => ListIndex::new_child(parent, index),
    None => ListIndex::new_root(index),
  };

  let old_items = old_list.and_then(Value::as_array);
  let Some(old_items) = old_items else {
    return (0..new_items.len()).map(fresh).collect();
  };

  // Occurrence positions per serialised value; taken from the back so a
  // duplicated element matches its last old occurrence first.
  let mut positions: HashMap<String, VecDeque<usize>> = HashMap::default();
  for (i, item) in old_items.iter().enumerate().take(old_indexes.len()) {
    positions
      .entry(serde_json::to_string(item).unwrap_or_default())
      .or_default()
      .push_back(i);
  }

  new_items
    .iter()
    .enumerate()
    .map(|(i, item)| {
      let key = serde_json::to_string(item).unwrap_or_default();
      match positions.get_mut(&key).and_then(VecDeque::pop_back) {
        Some(at) => {
          let reused = old_indexes[at].clone();
          if reused.index() != i {
            reused.set_index(i);
          }
          reused
        }
        None => fresh(i),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn permutation_preserves_identity() {
    crate::reset_test_env!();
    let old = json!(["a", "b", "c"]);
    let old_indexes = create_list_indexes(None, None, &old, &[]);
    let ids: Vec<u64> = old_indexes.iter().map(|li| li.id()).collect();

    let new = json!(["c", "a", "b"]);
    let new_indexes = create_list_indexes(None, Some(&old), &new, &old_indexes);
    assert_eq!(
      new_indexes.iter().map(|li| li.id()).collect::<Vec<_>>(),
      [ids[2], ids[0], ids[1]]
    );
    assert_eq!(new_indexes.iter().map(|li| li.index()).collect::<Vec<_>>(), [0, 1, 2]);
  }

  #[test]
  fn duplicates_match_the_last_occurrence_first(){
    crate::reset_test_env!();
    let old = json!(["x", "x"]);
    let old_indexes = create_list_indexes(None, None, &old, &[]);
    let new = json!(["x"]);
    let new_indexes = create_list_indexes(None, Some(&old), &new, &old_indexes);
    assert_eq!(new_indexes[0].id(), old_indexes[1].id());
  }

  #[test]
  fn unmatched_elements_allocate_fresh_identities() {
    crate::reset_test_env!();
    let old = json!(["a"]);
    let old_indexes = create_list_indexes(None, None, &old, &[]);
    let new = json!(["a", "b"]);
    let new_indexes = create_list_indexes(None, Some(&old), &new, &old_indexes);
    assert_eq!(new_indexes[0].id(), old_indexes[0].id());
    assert_ne!(new_indexes[1].id(), old_indexes[0].id());
  }

  #[test]
  fn non_array_old_list_allocates_everything() {
    crate::reset_test_env!();
    let new = json!([1, 2]);
    let indexes = create_list_indexes(None, Some(&json!(null)), &new, &[]);
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[1].index(), 1);
  }

  #[test]
  fn nested_rows_chain_to_the_parent_frame() {
    crate::reset_test_env!();
    let outer = ListIndex::new_root(1);
    let rows = create_list_indexes(Some(&outer), None, &json!(["a", "b"]), &[]);
    assert_eq!(rows[1].indexes(), [1, 1]);
    assert_eq!(rows[1].position(), 1);
  }
}
