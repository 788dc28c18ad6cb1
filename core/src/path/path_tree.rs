use std::{cell::RefCell, rc::Rc};

use ahash::HashMap;

use crate::constants::{DELIMITER, WILDCARD};

/// A node of the per-class path tree.
///
/// One child per literal segment; the `*` child stands in for any wildcard
/// step. `current_path` is the cumulative pattern down to this node.
#[derive(Debug)]
pub struct PathNode {
  pub name: String,
  pub current_path: String,
  children: RefCell<HashMap<String, Rc<PathNode>>>,
}

impl PathNode {
  pub fn root() -> Rc<PathNode> {
    Rc::new(PathNode {
      name: String::new(),
      current_path: String::new(),
      children: RefCell::new(HashMap::default()),
    })
  }

  /// Child for `segment`, creating it on first sight.
  pub fn append_child(self: &Rc<Self>, segment: &str) -> Rc<PathNode> {
    if let Some(child) = self.children.borrow().get(segment) {
      return child.clone();
    }
    let current_path = if self.current_path.is_empty() {
      segment.to_string()
    } else {
      format!("{}{}{}", self.current_path, DELIMITER, segment)
    };
    let child = Rc::new(PathNode {
      name: segment.to_string(),
      current_path,
      children: RefCell::new(HashMap::default()),
    });
    self.children.borrow_mut().insert(segment.to_string(), child.clone());
    child
  }

  pub fn child(&self, segment: &str) -> Option<Rc<PathNode>> {
    self.children.borrow().get(segment).cloned()
  }

  pub fn wildcard_child(&self) -> Option<Rc<PathNode>> { self.child(WILDCARD) }

  pub fn is_wildcard(&self) -> bool { self.name == WILDCARD }

  /// Snapshot of the children, wildcard child included.
  pub fn children(&self) -> Vec<Rc<PathNode>> {
    self.children.borrow().values().cloned().collect()
  }
}

/// Walk `pattern` down from `root`, following literal and `*` children.
pub fn find_path_node_by_path(root: &Rc<PathNode>, pattern: &str) -> Option<Rc<PathNode>> {
  if pattern.is_empty() {
    return Some(root.clone());
  }
  let mut node = root.clone();
  for segment in pattern.split(DELIMITER) {
    node = node.child(segment)?;
  }
  Some(node)
}
