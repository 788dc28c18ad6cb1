//! Components: registered classes, instantiation and the per-instance engine.
//!
//! A [`ComponentRegistry`] maps tag names to [`ComponentClass`]es (compiled
//! template fragment + state class + per-class [`PathManager`]). Creating a
//! component builds a host element and a [`ComponentEngine`]; embedding a
//! registered tag inside another template hydrates a child component onto
//! the template's element.

mod engine;
mod resolution;
mod state_binding;
mod state_input;
mod state_output;

pub use engine::{CacheEntry, ComponentEngine, ListSnapshot, VersionRevision};
pub use state_binding::ComponentStateBinding;

use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use ahash::HashMap;
use serde_json::Value;
use structive_dom::{Document, NodeId};

use crate::{
  error::{raise_error, ErrorCode, Result},
  path::PathManager,
  state::StateClass,
  template::{analyze_fragment, compile_template, ComponentTemplate, TemplateFragment},
};

/// Everything shared by all instances of a registered component.
#[derive(Debug)]
pub struct ComponentClass {
  pub tag: String,
  pub id: usize,
  pub fragment: Rc<TemplateFragment>,
  pub css: String,
  pub state_class: Rc<StateClass>,
  pub path_manager: Rc<PathManager>,
}

pub struct ComponentRegistry {
  classes: RefCell<HashMap<String, Rc<ComponentClass>>>,
  next_class_id: Cell<usize>,
}

impl ComponentRegistry {
  pub fn new() -> Rc<ComponentRegistry> {
    Rc::new(ComponentRegistry { classes: RefCell::new(HashMap::default()), next_class_id: Cell::new(1) })
  }

  /// Register a component class under `tag`: compile the template, analyse
  /// its paths and wire the state class's getters/methods/callbacks into the
  /// class's [`PathManager`].
  pub fn register(
    self: &Rc<Self>, tag: &str, template: &ComponentTemplate, css: &str,
    state_class: Rc<StateClass>,
  ) -> Result<Rc<ComponentClass>> {
    let fragment = compile_template(template)?;
    let path_manager = Rc::new(PathManager::new());
    analyze_fragment(&fragment, &path_manager)?;
    for pattern in state_class.getter_patterns() {
      path_manager.mark_getter(pattern)?;
    }
    for pattern in state_class.setter_patterns() {
      path_manager.mark_setter(pattern)?;
    }
    for name in state_class.method_names() {
      path_manager.mark_func(name);
    }
    path_manager.has_connected_callback.set(state_class.connected().is_some());
    path_manager.has_disconnected_callback.set(state_class.disconnected().is_some());

    let id = self.next_class_id.get();
    self.next_class_id.set(id + 1);
    let class = Rc::new(ComponentClass {
      tag: tag.to_string(),
      id,
      fragment,
      css: css.to_string(),
      state_class,
      path_manager,
    });
    self.classes.borrow_mut().insert(tag.to_string(), class.clone());
    Ok(class)
  }

  pub fn is_registered(&self, tag: &str) -> bool { self.classes.borrow().contains_key(tag) }

  pub fn class(&self, tag: &str) -> Option<Rc<ComponentClass>> {
    self.classes.borrow().get(tag).cloned()
  }

  /// Instantiate `tag` with a freshly created host element.
  pub fn create_component(
    self: &Rc<Self>, tag: &str, document: &Rc<RefCell<Document>>,
  ) -> Result<Component> {
    let host = document.borrow_mut().create_element(tag);
    self.hydrate(tag, document, host)
  }

  /// Instantiate `tag` onto an existing host element (used for component
  /// tags embedded in another component's template).
  pub fn hydrate(
    self: &Rc<Self>, tag: &str, document: &Rc<RefCell<Document>>, host: NodeId,
  ) -> Result<Component> {
    let class = self.class(tag).ok_or_else(|| {
      raise_error(ErrorCode::Tmp101, format!("component tag is not registered: {tag}"))
    })?;
    let engine = ComponentEngine::new(class, Rc::downgrade(self), document.clone(), host);
    engine.setup()?;
    Ok(Component { engine })
  }
}

/// A component instance: a thin handle over its engine.
#[derive(Clone)]
pub struct Component {
  engine: Rc<ComponentEngine>,
}

impl Component {
  pub fn engine(&self) -> &Rc<ComponentEngine> { &self.engine }

  pub fn host(&self) -> NodeId { self.engine.host() }

  /// Attach the host under `parent` and run the connect sequence.
  pub fn mount(&self, parent: NodeId) -> Result<()> {
    self
      .engine
      .document()
      .borrow_mut()
      .append_child(parent, self.engine.host());
    self.engine.connected_callback()
  }

  /// Run the disconnect sequence and detach the host.
  pub fn unmount(&self) -> Result<()> {
    self.engine.disconnected_callback()?;
    let doc = self.engine.document();
    let mut doc = doc.borrow_mut();
    if self.engine.host().parent(&doc).is_some() {
      doc.detach(self.engine.host());
    }
    Ok(())
  }

  /// Read a state path outside any update.
  pub fn state(&self, path: &str) -> Result<Value> { self.engine.state_input_get(path) }

  /// Write a state path; flushes a render pass.
  pub fn set_state(&self, path: &str, value: Value) -> Result<()> {
    self.engine.state_input_set(path, value)
  }
}

impl std::fmt::Debug for Component {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Component").field("tag", &self.engine.class().tag).finish()
  }
}

pub(crate) type RegistryRef = Weak<ComponentRegistry>;
