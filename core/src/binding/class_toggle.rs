use std::rc::Rc;

use serde_json::Value;
use structive_dom::NodeId;

use crate::{binding::Binding, error::Result, filter::is_truthy};

/// `class.<name>:path` — toggles a class per truthiness.
#[derive(Debug)]
pub struct ClassBindingNode {
  node: NodeId,
  name: String,
}

impl ClassBindingNode {
  pub fn new(node: NodeId, name: &str) -> Self {
    ClassBindingNode { node, name: name.to_string() }
  }

  pub(crate) fn assign_value(&self, binding: &Rc<Binding>, value: &Value) -> Result<()> {
    let engine = binding.engine()?;
    let doc = engine.document();
    doc.borrow_mut().toggle_class(self.node, &self.name, is_truthy(value));
    Ok(())
  }
}
