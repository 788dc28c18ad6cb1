//! The per-thread runtime context.
//!
//! Structive is single threaded the way a browser main thread is: one
//! executor, one set of intern tables, one configuration. `AppCtx` bundles
//! them and is only reachable from the thread that first touched it.

use std::cell::{Cell, RefCell};

use futures::{
  executor::{LocalPool, LocalSpawner},
  task::{LocalSpawnExt, SpawnError},
  Future,
};

#[derive(Clone, Copy, Debug)]
pub struct StructiveConfig {
  /// Log the full payload of every raised error.
  pub debug: bool,
  /// Default for component classes that do not pin `enable_shadow_dom`.
  pub enable_shadow_dom_default: bool,
}

impl Default for StructiveConfig {
  fn default() -> Self { StructiveConfig { debug: false, enable_shadow_dom_default: true } }
}

pub struct AppCtx {
  config: Cell<StructiveConfig>,
  executor: RefCell<LocalPool>,
  spawner: LocalSpawner,
}

thread_local! {
  static APP_CTX: AppCtx = {
    let executor = LocalPool::new();
    let spawner = executor.spawner();
    AppCtx { config: Cell::new(StructiveConfig::default()), executor: RefCell::new(executor), spawner }
  };
}

impl AppCtx {
  pub fn config() -> StructiveConfig { APP_CTX.with(|ctx| ctx.config.get()) }

  pub fn set_config(config: StructiveConfig) { APP_CTX.with(|ctx| ctx.config.set(config)) }

  pub fn debug() -> bool { Self::config().debug }

  pub fn set_debug(debug: bool) {
    APP_CTX.with(|ctx| {
      let mut c = ctx.config.get();
      c.debug = debug;
      ctx.config.set(c);
    })
  }

  /// Spawn a task on the thread-local executor. The task runs on the next
  /// [`AppCtx::run_until_stalled`].
  pub fn spawn_local(fut: impl Future<Output = ()> + 'static) -> Result<(), SpawnError> {
    APP_CTX.with(|ctx| ctx.spawner.spawn_local(fut))
  }

  /// Drive every spawned task until no further progress can be made.
  ///
  /// Must not be called from inside a spawned task.
  pub fn run_until_stalled() {
    APP_CTX.with(|ctx| {
      ctx.executor.borrow_mut().run_until_stalled();
    })
  }

  /// Reset config, intern tables and id counters. Test only.
  pub fn reset_test_env() {
    Self::set_config(StructiveConfig::default());
    Self::run_until_stalled();
    crate::path::reset_interners();
    crate::list_index::reset_ids();
    crate::property_ref::reset_interner();
  }
}

/// Reset the runtime context at the top of a test.
#[macro_export]
macro_rules! reset_test_env {
  () => {
    $crate::app_ctx::AppCtx::reset_test_env();
  };
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use super::*;

  #[test]
  fn spawned_tasks_run_on_demand() {
    let hit = Rc::new(Cell::new(false));
    let h = hit.clone();
    AppCtx::spawn_local(async move { h.set(true) }).unwrap();
    assert!(!hit.get());
    AppCtx::run_until_stalled();
    assert!(hit.get());
  }

  #[test]
  fn config_round_trip() {
    AppCtx::set_debug(true);
    assert!(AppCtx::debug());
    AppCtx::set_debug(false);
    assert!(!AppCtx::debug());
  }
}
