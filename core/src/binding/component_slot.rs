use std::rc::Rc;

use crate::component::ComponentEngine;

/// `state.<childPath>:parentPath` — the parent side of a parent↔child state
/// bridge.
///
/// The clause registers a 1:1 path mapping on the child's
/// `ComponentStateBinding` when the content is built; change propagation
/// runs through the renderer's cross-component pass, which translates the
/// parent refs it processed and enqueues them on the child.
pub struct ComponentBindingNode {
  child: Rc<ComponentEngine>,
  sub_name: String,
}

impl ComponentBindingNode {
  pub fn new(child: &Rc<ComponentEngine>, sub_name: &str) -> Self {
    ComponentBindingNode { child: child.clone(), sub_name: sub_name.to_string() }
  }

  /// The child state path this binding feeds.
  pub fn sub_name(&self) -> &str { &self.sub_name }

  pub fn child_engine(&self) -> &Rc<ComponentEngine> { &self.child }
}

impl std::fmt::Debug for ComponentBindingNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ComponentBindingNode").field("sub_name", &self.sub_name).finish()
  }
}
