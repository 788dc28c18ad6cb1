use std::rc::Rc;

use serde_json::Value;
use structive_dom::NodeId;

use crate::{binding::Binding, error::Result, filter::to_display_string};

/// `{{ path }}` — writes the filtered value into a text node; null and NaN
/// render as "".
#[derive(Debug)]
pub struct TextBindingNode {
  node: NodeId,
}

impl TextBindingNode {
  pub fn new(node: NodeId) -> Self { TextBindingNode { node } }

  pub fn node(&self) -> NodeId { self.node }

  pub(crate) fn assign_value(&self, binding: &Rc<Binding>, value: &Value) -> Result<()> {
    let engine = binding.engine()?;
    let doc = engine.document();
    let mut doc = doc.borrow_mut();
    if self.node.is_element(&doc) {
      // `text:` on an element replaces its content with a single text node.
      let children: Vec<NodeId> = self.node.children(&doc).collect();
      for child in children {
        doc.remove_subtree(child);
      }
      let text = doc.create_text(&to_display_string(value));
      doc.append_child(self.node, text);
    } else {
      doc.set_text(self.node, &to_display_string(value));
    }
    Ok(())
  }
}
