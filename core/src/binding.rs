//! Node-level directive instances.
//!
//! A [`Binding`] pairs a DOM-side [`BindingNode`] with a state-side
//! [`BindingState`]. A [`BindContent`] is the realised instance of a
//! template fragment: it owns its bindings and its created nodes, and it is
//! what `if` re-mounts and `for` clones per row.

mod attr;
mod bind_content;
mod class_toggle;
mod component_slot;
mod cond;
mod event;
mod repeat;
mod style;
mod text;

pub use attr::AttrBindingNode;
pub use bind_content::BindContent;
pub use class_toggle::ClassBindingNode;
pub use component_slot::ComponentBindingNode;
pub use cond::IfBindingNode;
pub use event::EventBindingNode;
pub use repeat::{create_list_indexes, ForBindingNode};
pub use style::StyleBindingNode;
pub use text::TextBindingNode;

use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use serde_json::Value;

use crate::{
  component::ComponentEngine,
  error::{raise_error, ErrorCode, Result},
  filter::{apply_filters, compile_filters, CompiledFilter},
  path::{get_structured_path_info, StructuredPathInfo},
  property_ref::{get_state_property_ref, StatePropertyRef},
  renderer::Renderer,
  template::BindClause,
};

thread_local! {
  static NEXT_BINDING_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_binding_id() -> u64 {
  NEXT_BINDING_ID.with(|c| {
    let id = c.get();
    c.set(id + 1);
    id
  })
}

/// The state side of a binding: which pattern it reads and through which
/// filters the value flows.
#[derive(Debug)]
pub struct BindingState {
  pub info: Rc<StructuredPathInfo>,
  filters: Vec<CompiledFilter>,
}

impl BindingState {
  pub fn from_clause(clause: &BindClause) -> Result<BindingState> {
    Ok(BindingState {
      info: get_structured_path_info(&clause.path)?,
      filters: compile_filters(&clause.filters)?,
    })
  }

  pub fn filter(&self, value: Value) -> Result<Value> { apply_filters(value, &self.filters) }
}

/// The DOM side of a binding.
#[derive(Debug)]
pub enum BindingNode {
  Text(TextBindingNode),
  Attr(AttrBindingNode),
  Style(StyleBindingNode),
  Class(ClassBindingNode),
  If(IfBindingNode),
  For(ForBindingNode),
  Event(EventBindingNode),
  Component(ComponentBindingNode),
}

pub struct Binding {
  pub id: u64,
  pub node: BindingNode,
  pub state: BindingState,
  engine: Weak<ComponentEngine>,
  bind_content: RefCell<Weak<BindContent>>,
  /// The ref this binding registered under while active.
  registered_ref: RefCell<Option<Rc<StatePropertyRef>>>,
  /// Last value a scalar node assigned; unchanged values skip the document
  /// write.
  last_value: RefCell<Option<Value>>,
}

impl Binding {
  pub fn new(
    engine: &Rc<ComponentEngine>, node: BindingNode, state: BindingState,
  ) -> Rc<Binding> {
    Rc::new(Binding {
      id: next_binding_id(),
      node,
      state,
      engine: Rc::downgrade(engine),
      bind_content: RefCell::new(Weak::new()),
      registered_ref: RefCell::new(None),
      last_value: RefCell::new(None),
    })
  }

  pub fn engine(&self) -> Result<Rc<ComponentEngine>> {
    self.engine.upgrade().ok_or_else(|| {
      raise_error(ErrorCode::Upd004, "binding outlived its engine")
    })
  }

  pub fn bind_content(&self) -> Option<Rc<BindContent>> { self.bind_content.borrow().upgrade() }

  pub(crate) fn attach(&self, content: &Rc<BindContent>) {
    *self.bind_content.borrow_mut() = Rc::downgrade(content);
  }

  /// Resolve the ref this binding currently addresses: an index-less ref for
  /// wildcard-free patterns, otherwise the frame comes from the enclosing
  /// loop context chain.
  pub fn resolve_ref(&self) -> Result<Rc<StatePropertyRef>> {
    let info = &self.state.info;
    if info.wildcard_count == 0 {
      return Ok(get_state_property_ref(info, None));
    }
    let last_wildcard = info
      .last_wildcard_path
      .as_deref()
      .expect("a pattern with wildcards has a last wildcard path");
    let loop_context = self
      .bind_content()
      .and_then(|bc| bc.nearest_loop_context())
      .and_then(|lc| lc.find(last_wildcard))
      .ok_or_else(|| {
        raise_error(
          ErrorCode::List201,
          format!("no loop context for wildcard path: {}", info.pattern),
        )
      })?;
    let list_index = loop_context.list_index()?;
    Ok(get_state_property_ref(info, Some(&list_index)))
  }

  /// Register with the engine's per-ref binding list.
  pub fn activate(self: &Rc<Self>) -> Result<()> {
    if matches!(self.node, BindingNode::Event(_)) {
      return Ok(());
    }
    let engine = self.engine()?;
    let r = self.resolve_ref()?;
    engine.save_binding(&r, self);
    *self.registered_ref.borrow_mut() = Some(r);
    Ok(())
  }

  pub fn inactivate(self: &Rc<Self>) -> Result<()> {
    if let Some(r) = self.registered_ref.borrow_mut().take() {
      self.engine()?.remove_binding(&r, self);
    }
    Ok(())
  }

  /// Apply the binding's current value to the document. Runs at most once
  /// per render pass per binding; a scalar value equal to the last one
  /// assigned is skipped and does not count as an update.
  pub fn apply_change(self: &Rc<Self>, renderer: &mut Renderer) -> Result<()> {
    if !renderer.visit_binding(self.id) {
      return Ok(());
    }
    match &self.node {
      BindingNode::Text(_) | BindingNode::Attr(_) | BindingNode::Style(_)
      | BindingNode::Class(_) => {
        let value = self.resolve_value(renderer)?;
        if self.last_value.borrow().as_ref() == Some(&value) {
          return Ok(());
        }
        renderer.record_binding_updated(self.id);
        match &self.node {
          BindingNode::Text(node) => node.assign_value(self, &value)?,
          BindingNode::Attr(node) => node.assign_value(self, &value)?,
          BindingNode::Style(node) => node.assign_value(self, &value)?,
          BindingNode::Class(node) => node.assign_value(self, &value)?,
          _ => unreachable!(),
        }
        *self.last_value.borrow_mut() = Some(value);
        Ok(())
      }
      BindingNode::If(node) => node.apply_change(self, renderer),
      BindingNode::For(node) => node.apply_change(self, renderer),
      BindingNode::Event(_) | BindingNode::Component(_) => Ok(()),
    }
  }

  /// The filtered value the binding's pattern currently resolves to.
  pub fn resolve_value(&self, renderer: &mut Renderer) -> Result<Value> {
    let r = self.resolve_ref()?;
    let value = renderer.value_of(&r)?;
    self.state.filter(value)
  }
}

impl std::fmt::Debug for Binding {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Binding")
      .field("id", &self.id)
      .field("pattern", &self.state.info.pattern)
      .finish()
  }
}
