use std::{cell::RefCell, rc::Rc};

use serde_json::Value;
use structive_dom::NodeId;

use crate::{
  binding::{BindContent, Binding},
  error::{raise_error, ErrorCode, Result},
  renderer::Renderer,
  template::TemplateFragment,
};

/// `if:path` — realises the inner fragment while the value is `true`.
///
/// The content is created once and re-mounted on later flips, so inner
/// bindings keep their nodes across show/hide cycles.
#[derive(Debug)]
pub struct IfBindingNode {
  marker: NodeId,
  fragment: Rc<TemplateFragment>,
  content: RefCell<Option<Rc<BindContent>>>,
}

impl IfBindingNode {
  pub fn new(marker: NodeId, fragment: Rc<TemplateFragment>) -> Self {
    IfBindingNode { marker, fragment, content: RefCell::new(None) }
  }

  pub fn marker(&self) -> NodeId { self.marker }

  pub fn content(&self) -> Option<Rc<BindContent>> { self.content.borrow().clone() }

  pub(crate) fn apply_change(&self, binding: &Rc<Binding>, renderer: &mut Renderer) -> Result<()> {
    let engine = binding.engine()?;
    let value = binding.resolve_value(renderer)?;
    let Value::Bool(show) = value else {
      return Err(
        raise_error(
          ErrorCode::Bind201,
          format!("if expects a boolean for {}", binding.state.info.pattern),
        )
        .with_context("got", value.to_string()),
      );
    };

    if show {
      if self.marker.parent(&engine.document().borrow()).is_none() {
        return Err(raise_error(ErrorCode::Bind201, "if marker has no parent node"));
      }
      let content = match self.content.borrow().clone() {
        Some(content) => content,
        None => {
          let content =
            BindContent::create(&engine, &self.fragment, Some(binding), None)?;
          *self.content.borrow_mut() = Some(content.clone());
          content
        }
      };
      if !content.is_mounted() {
        content.mount_after(&engine, self.marker);
        renderer.record_binding_updated(binding.id);
        renderer.mark_structure_changed();
      }
      content.activate()?;
      content.apply_all(renderer)?;
    } else if let Some(content) = self.content.borrow().clone() {
      if content.is_mounted() {
        content.unmount(&engine);
        renderer.record_binding_updated(binding.id);
        renderer.mark_structure_changed();
      }
      content.inactivate()?;
    }
    Ok(())
  }

  /// Re-register a still-mounted content after the owner was re-activated.
  pub(crate) fn reactivate(&self) {
    if let Some(content) = self.content.borrow().clone() {
      if content.is_mounted() {
        let _ = content.activate();
      }
    }
  }

  pub(crate) fn inactivate_content(&self) {
    if let Some(content) = self.content.borrow().clone() {
      let _ = content.inactivate();
    }
  }
}
