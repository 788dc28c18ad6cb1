use std::rc::Rc;

use serde_json::Value;
use structive_dom::NodeId;

use crate::{binding::Binding, error::Result, filter::to_display_string};

/// `attr.<name>:path` — writes the stringified filtered value into an
/// attribute. Boolean-attribute semantics are left to input/output filters.
#[derive(Debug)]
pub struct AttrBindingNode {
  node: NodeId,
  name: String,
}

impl AttrBindingNode {
  pub fn new(node: NodeId, name: &str) -> Self {
    AttrBindingNode { node, name: name.to_string() }
  }

  pub(crate) fn assign_value(&self, binding: &Rc<Binding>, value: &Value) -> Result<()> {
    let engine = binding.engine()?;
    let doc = engine.document();
    doc
      .borrow_mut()
      .set_attribute(self.node, &self.name, &to_display_string(value));
    Ok(())
  }
}
