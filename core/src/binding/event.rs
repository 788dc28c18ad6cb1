use std::rc::Rc;

use structive_dom::NodeId;

use crate::{
  binding::{Binding, BindingNode},
  error::Result,
  state::MethodArgs,
};

/// `on.<event>:method` — dispatches document events into a state method,
/// inside a writable update bound to the binding's loop context.
#[derive(Debug)]
pub struct EventBindingNode {
  node: NodeId,
  event: String,
  method: String,
}

impl EventBindingNode {
  pub fn new(node: NodeId, event: &str, method: &str) -> Self {
    EventBindingNode { node, event: event.to_string(), method: method.to_string() }
  }

  pub fn node(&self) -> NodeId { self.node }

  pub(crate) fn attach_listener(&self, binding: &Rc<Binding>) -> Result<()> {
    let engine = binding.engine()?;
    let weak = Rc::downgrade(binding);
    engine.document().borrow_mut().add_event_listener(
      self.node,
      &self.event,
      Rc::new(move |event| {
        let Some(binding) = weak.upgrade() else { return };
        let BindingNode::Event(node) = &binding.node else { return };
        if let Err(err) = node.dispatch(&binding, event) {
          log::error!("event handler {} failed: {err}", node.method);
        }
      }),
    );
    Ok(())
  }

  fn dispatch(&self, binding: &Rc<Binding>, event: &structive_dom::Event) -> Result<()> {
    let engine = binding.engine()?;
    let loop_context = binding.bind_content().and_then(|bc| bc.nearest_loop_context());
    let method = self.method.clone();
    let args = MethodArgs { event: Some(event.clone()) };
    engine.update(loop_context, move |state| state.invoke(&method, &args))
  }
}
