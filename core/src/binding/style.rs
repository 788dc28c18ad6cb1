use std::rc::Rc;

use serde_json::Value;
use structive_dom::NodeId;

use crate::{binding::Binding, error::Result, filter::to_display_string};

/// `style.<prop>:path` — sets an inline style property; nullish values clear
/// it.
#[derive(Debug)]
pub struct StyleBindingNode {
  node: NodeId,
  prop: String,
}

impl StyleBindingNode {
  pub fn new(node: NodeId, prop: &str) -> Self {
    StyleBindingNode { node, prop: prop.to_string() }
  }

  pub(crate) fn assign_value(&self, binding: &Rc<Binding>, value: &Value) -> Result<()> {
    let engine = binding.engine()?;
    let doc = engine.document();
    doc
      .borrow_mut()
      .set_style_property(self.node, &self.prop, &to_display_string(value));
    Ok(())
  }
}
