use std::rc::Rc;

use ahash::HashMap;
use serde_json::Value;
use structive_dom::Event;

use crate::{
  error::Result,
  state::{StateAccess, StateMutate},
};

pub type GetterFn = Rc<dyn Fn(&dyn StateAccess) -> Result<Value>>;
pub type SetterFn = Rc<dyn Fn(&dyn StateMutate, Value) -> Result<()>>;
pub type MethodFn = Rc<dyn Fn(&dyn StateMutate, &MethodArgs) -> Result<()>>;
pub type CallbackFn = Rc<dyn Fn(&dyn StateMutate) -> Result<()>>;

/// Arguments an event-handler method receives.
#[derive(Debug, Default, Clone)]
pub struct MethodArgs {
  pub event: Option<Event>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentConfig {
  /// Attach the component's content to a shadow root; `None` falls back to
  /// the global default. When false the component mounts in block mode
  /// behind a comment placeholder.
  pub enable_shadow_dom: Option<bool>,
  /// Built-in element this component extends, if any.
  pub extends: Option<String>,
}

/// The behaviour half of a component: initial data plus computed getters,
/// methods and lifecycle callbacks.
pub struct StateClass {
  data: Value,
  getters: HashMap<String, GetterFn>,
  setters: HashMap<String, SetterFn>,
  methods: HashMap<String, MethodFn>,
  connected: Option<CallbackFn>,
  disconnected: Option<CallbackFn>,
  config: ComponentConfig,
}

impl StateClass {
  pub fn builder(data: Value) -> StateClassBuilder {
    StateClassBuilder {
      class: StateClass {
        data,
        getters: HashMap::default(),
        setters: HashMap::default(),
        methods: HashMap::default(),
        connected: None,
        disconnected: None,
        config: ComponentConfig::default(),
      },
    }
  }

  /// A fresh copy of the initial data for a new instance.
  pub fn instantiate_data(&self) -> Value { self.data.clone() }

  pub fn getter(&self, pattern: &str) -> Option<&GetterFn> { self.getters.get(pattern) }

  pub fn getter_patterns(&self) -> impl Iterator<Item = &str> {
    self.getters.keys().map(|k| k.as_str())
  }

  pub fn setter(&self, pattern: &str) -> Option<&SetterFn> { self.setters.get(pattern) }

  pub fn setter_patterns(&self) -> impl Iterator<Item = &str> {
    self.setters.keys().map(|k| k.as_str())
  }

  pub fn method(&self, name: &str) -> Option<&MethodFn> { self.methods.get(name) }

  pub fn method_names(&self) -> impl Iterator<Item = &str> {
    self.methods.keys().map(|k| k.as_str())
  }

  pub fn connected(&self) -> Option<&CallbackFn> { self.connected.as_ref() }

  pub fn disconnected(&self) -> Option<&CallbackFn> { self.disconnected.as_ref() }

  pub fn config(&self) -> &ComponentConfig { &self.config }
}

impl std::fmt::Debug for StateClass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StateClass")
      .field("data", &self.data)
      .field("getters", &self.getters.keys().collect::<Vec<_>>())
      .field("setters", &self.setters.keys().collect::<Vec<_>>())
      .field("methods", &self.methods.keys().collect::<Vec<_>>())
      .field("config", &self.config)
      .finish()
  }
}

pub struct StateClassBuilder {
  class: StateClass,
}

impl StateClassBuilder {
  /// Register a computed getter for `pattern` (wildcards allowed).
  pub fn getter(
    mut self, pattern: &str, f: impl Fn(&dyn StateAccess) -> Result<Value> + 'static,
  ) -> Self {
    self.class.getters.insert(pattern.to_string(), Rc::new(f));
    self
  }

  /// Register the setter side of a computed pattern; it receives the value
  /// being assigned and writes the base paths it derives from.
  pub fn setter(
    mut self, pattern: &str, f: impl Fn(&dyn StateMutate, Value) -> Result<()> + 'static,
  ) -> Self {
    self.class.setters.insert(pattern.to_string(), Rc::new(f));
    self
  }

  pub fn method(
    mut self, name: &str, f: impl Fn(&dyn StateMutate, &MethodArgs) -> Result<()> + 'static,
  ) -> Self {
    self.class.methods.insert(name.to_string(), Rc::new(f));
    self
  }

  pub fn on_connected(mut self, f: impl Fn(&dyn StateMutate) -> Result<()> + 'static) -> Self {
    self.class.connected = Some(Rc::new(f));
    self
  }

  pub fn on_disconnected(mut self, f: impl Fn(&dyn StateMutate) -> Result<()> + 'static) -> Self {
    self.class.disconnected = Some(Rc::new(f));
    self
  }

  pub fn config(mut self, config: ComponentConfig) -> Self {
    self.class.config = config;
    self
  }

  pub fn build(self) -> Rc<StateClass> { Rc::new(self.class) }
}
