use std::rc::Rc;

use serde_json::Value;

use crate::{
  component::ComponentEngine, error::Result, list_index::ListIndex,
  property_ref::StatePropertyRef,
};

/// The read handle render passes and embedders use: ref reads route through
/// the engine's accessor machinery and, inside a cacheable section, the
/// per-ref cache.
pub struct ReadonlyState {
  engine: Rc<ComponentEngine>,
}

impl ReadonlyState {
  pub(crate) fn new(engine: Rc<ComponentEngine>) -> Self { ReadonlyState { engine } }

  pub fn get_by_ref(&self, r: &Rc<StatePropertyRef>) -> Result<Value> { self.engine.get_by_ref(r) }

  /// Resolve a dotted name with no ambient loop context.
  pub fn get(&self, path: &str) -> Result<Value> {
    let r = self.engine.resolve_path_ref(path, None)?;
    self.engine.get_by_ref(&r)
  }

  pub fn get_list_indexes_by_ref(
    &self, r: &Rc<StatePropertyRef>,
  ) -> Result<Option<Vec<Rc<ListIndex>>>> {
    self.engine.get_list_indexes(r)
  }

  /// Run `f` inside a caching boundary: repeated ref reads within it hit
  /// the per-ref cache.
  pub fn set_cacheable<R>(&self, f: impl FnOnce() -> R) -> R {
    let was = self.engine.cacheable.replace(true);
    let out = f();
    self.engine.cacheable.set(was);
    out
  }
}
