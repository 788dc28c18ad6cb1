//! User state: dynamic data plus the class that animates it.
//!
//! State data is a plain [`serde_json::Value`] tree. A [`StateClass`] adds
//! computed getters, event-handler methods and lifecycle callbacks. Reads and
//! writes never touch the tree directly; they go through the engine's
//! readonly/writable handlers, which resolve refs with compiled accessors and
//! record dependencies as they go.

mod readonly;
mod state_class;
mod value_ops;
mod writable;

pub use readonly::ReadonlyState;
pub use state_class::{
  CallbackFn, ComponentConfig, GetterFn, MethodArgs, MethodFn, SetterFn, StateClass,
  StateClassBuilder,
};
pub use value_ops::{set_by_steps, value_by_steps};
pub use writable::WritableState;

use crate::error::Result;
use serde_json::Value;

/// Read access handed to getter bodies and methods.
///
/// `value` resolves a dotted path (wildcards allowed, bound from the ambient
/// frame), `index` exposes the `$k` wildcard variables, `get_all`
/// materialises every value under a wildcard pattern.
pub trait StateAccess {
  fn value(&self, path: &str) -> Result<Value>;
  /// The `$k` wildcard variable, 1-based.
  fn index(&self, k: usize) -> Option<usize>;
  fn get_all(&self, pattern: &str, indexes: Option<&[usize]>) -> Result<Vec<Value>>;
  /// Resolve one value under `pattern` with every wildcard pinned by
  /// `indexes`.
  fn resolve(&self, pattern: &str, indexes: &[usize]) -> Result<Value>;
}

/// Write access handed to methods and lifecycle callbacks.
pub trait StateMutate: StateAccess {
  fn set_value(&self, path: &str, value: Value) -> Result<()>;
}
