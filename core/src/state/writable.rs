use std::rc::Rc;

use serde_json::Value;

use crate::{
  component::ComponentEngine,
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  loop_context::LoopContext,
  property_ref::StatePropertyRef,
  state::{MethodArgs, StateAccess, StateMutate},
};

/// The write handle an update callback receives. Every successful write
/// enqueues its ref; reads see the callback's own prior writes.
pub struct WritableState {
  engine: Rc<ComponentEngine>,
  loop_context: Option<Rc<LoopContext>>,
}

impl WritableState {
  pub(crate) fn new(engine: Rc<ComponentEngine>, loop_context: Option<Rc<LoopContext>>) -> Self {
    WritableState { engine, loop_context }
  }

  pub fn engine(&self) -> &Rc<ComponentEngine> { &self.engine }

  pub fn loop_context(&self) -> Option<&Rc<LoopContext>> { self.loop_context.as_ref() }

  fn ambient(&self) -> Result<Option<Rc<ListIndex>>> {
    match &self.loop_context {
      None => Ok(None),
      Some(lc) => lc.list_index().map(Some),
    }
  }

  pub fn get(&self, path: &str) -> Result<Value> {
    let r = self.engine.resolve_path_ref(path, self.ambient()?.as_ref())?;
    self.engine.get_by_ref(&r)
  }

  pub fn set(&self, path: &str, value: Value) -> Result<()> {
    let r = self.engine.resolve_path_ref(path, self.ambient()?.as_ref())?;
    self.engine.set_by_ref(&r, value)
  }

  pub fn get_by_ref(&self, r: &Rc<StatePropertyRef>) -> Result<Value> { self.engine.get_by_ref(r) }

  pub fn set_by_ref(&self, r: &Rc<StatePropertyRef>, value: Value) -> Result<()> {
    self.engine.set_by_ref(r, value)
  }

  /// Invoke a state method by name, with this handle as its scope.
  pub fn invoke(&self, method: &str, args: &MethodArgs) -> Result<()> {
    let f = self
      .engine
      .class()
      .state_class
      .method(method)
      .cloned()
      .ok_or_else(|| raise_error(ErrorCode::State202, format!("unknown state method: {method}")))?;
    f(self, args)
  }
}

impl StateAccess for WritableState {
  fn value(&self, path: &str) -> Result<Value> { self.get(path) }

  fn index(&self, k: usize) -> Option<usize> {
    self
      .ambient()
      .ok()
      .flatten()
      .and_then(|li| li.indexes().get(k - 1).copied())
  }

  fn get_all(&self, pattern: &str, indexes: Option<&[usize]>) -> Result<Vec<Value>> {
    self.engine.get_all(pattern, indexes, self.ambient()?.as_ref())
  }

  fn resolve(&self, pattern: &str, indexes: &[usize]) -> Result<Value> {
    self.engine.resolve_pinned(pattern, indexes)
  }
}

impl StateMutate for WritableState {
  fn set_value(&self, path: &str, value: Value) -> Result<()> { self.set(path, value) }
}
