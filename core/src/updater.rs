//! Batching and flush orchestration.
//!
//! Writes enqueue refs; when the update callback completes, the queue is
//! drained in sub-batches (one revision each) through the renderer until it
//! runs dry. A [`Notifier`] emits one accumulated [`ChangeScope`] per flush.

use std::{
  cell::{Cell, RefCell},
  convert::Infallible,
  rc::Rc,
};

use ahash::HashSet;
use bitflags::bitflags;
use rxrust::{ops::box_it::BoxOp, prelude::*};

use crate::{
  binding::BindContent,
  component::{ComponentEngine, VersionRevision},
  error::Result,
  loop_context::LoopContext,
  property_ref::StatePropertyRef,
  renderer::Renderer,
  state::{ReadonlyState, WritableState},
};

bitflags! {
  /// What a flush changed.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct ChangeScope: u8 {
    /// Scalar binding values were rewritten.
    const DATA = 0x01;
    /// List rows mounted, unmounted or moved.
    const STRUCTURE = 0x02;
  }
}

/// An `Rx` stream that emits after every flush of the owning engine.
#[derive(Default, Clone)]
pub struct Notifier(Subject<'static, ChangeScope, Infallible>);

impl Notifier {
  /// Data changes only; use [`Notifier::raw_modifies`] for everything.
  pub fn modifies(&self) -> BoxOp<'static, ChangeScope, Infallible> {
    self
      .raw_modifies()
      .filter(|s| s.contains(ChangeScope::DATA))
      .box_it()
  }

  pub fn raw_modifies(&self) -> Subject<'static, ChangeScope, Infallible> { self.0.clone() }

  pub(crate) fn next(&self, scope: ChangeScope) {
    let mut subject = self.raw_modifies();
    subject.next(scope);
  }
}

/// Per-engine batch state.
pub struct Updater {
  version: Cell<u64>,
  revision: Cell<u64>,
  queue: RefCell<Vec<Rc<StatePropertyRef>>>,
  queue_set: RefCell<HashSet<Rc<StatePropertyRef>>>,
  updating: Cell<bool>,
  rendering: Cell<bool>,
  pending_scope: Cell<ChangeScope>,
}

impl Default for Updater {
  fn default() -> Self {
    Updater {
      version: Cell::new(0),
      revision: Cell::new(0),
      queue: RefCell::new(Vec::new()),
      queue_set: RefCell::new(HashSet::default()),
      updating: Cell::new(false),
      rendering: Cell::new(false),
      pending_scope: Cell::new(ChangeScope::empty()),
    }
  }
}

impl Updater {
  pub fn version_revision(&self) -> (u64, u64) { (self.version.get(), self.revision.get()) }

  fn enqueue(&self, r: &Rc<StatePropertyRef>) {
    if self.queue_set.borrow_mut().insert(r.clone()) {
      self.queue.borrow_mut().push(r.clone());
    }
  }

  fn drain(&self) -> Vec<Rc<StatePropertyRef>> {
    self.queue_set.borrow_mut().clear();
    std::mem::take(&mut *self.queue.borrow_mut())
  }

  fn clear(&self) {
    self.queue.borrow_mut().clear();
    self.queue_set.borrow_mut().clear();
  }

  pub(crate) fn merge_scope(&self, scope: ChangeScope) {
    self.pending_scope.set(self.pending_scope.get() | scope);
  }
}

impl ComponentEngine {
  /// Append a ref to the current batch (deduplicated).
  pub fn enqueue_ref(&self, r: &Rc<StatePropertyRef>) { self.updater.enqueue(r); }

  /// Run `cb` against a writable state bound to `loop_context`, then flush
  /// the accumulated queue through the renderer.
  ///
  /// Reads inside `cb` see its own prior writes. Nested calls on the same
  /// engine fold into the outer batch. On error the queue is drained before
  /// the error propagates.
  pub fn update<R>(
    self: &Rc<Self>, loop_context: Option<Rc<LoopContext>>,
    cb: impl FnOnce(&WritableState) -> Result<R>,
  ) -> Result<R> {
    let state = WritableState::new(self.clone(), loop_context);
    if self.updater.updating.get() {
      return cb(&state);
    }
    self.updater.updating.set(true);
    self.updater.version.set(self.version_up());
    self.updater.revision.set(0);
    let result = cb(&state);
    self.updater.updating.set(false);
    match result {
      Ok(value) => {
        self.flush()?;
        Ok(value)
      }
      Err(err) => {
        self.updater.clear();
        Err(err)
      }
    }
  }

  /// Like [`ComponentEngine::update`] for callbacks that need to await:
  /// the future completes before the flush runs.
  pub async fn update_async<R>(
    self: &Rc<Self>, loop_context: Option<Rc<LoopContext>>,
    cb: impl AsyncFnOnce(&WritableState) -> Result<R>,
  ) -> Result<R> {
    let state = WritableState::new(self.clone(), loop_context);
    if self.updater.updating.get() {
      return cb(&state).await;
    }
    self.updater.updating.set(true);
    self.updater.version.set(self.version_up());
    self.updater.revision.set(0);
    let result = cb(&state).await;
    self.updater.updating.set(false);
    match result {
      Ok(value) => {
        self.flush()?;
        Ok(value)
      }
      Err(err) => {
        self.updater.clear();
        Err(err)
      }
    }
  }

  /// Run `cb` against a readonly state handle.
  pub fn create_readonly_state<R>(
    self: &Rc<Self>, cb: impl FnOnce(&ReadonlyState) -> Result<R>,
  ) -> Result<R> {
    let state = ReadonlyState::new(self.clone());
    cb(&state)
  }

  /// Drain the queue in sub-batches until dry, then emit the accumulated
  /// change scope on the notifier.
  pub(crate) fn flush(self: &Rc<Self>) -> Result<()> {
    if self.updater.rendering.get() {
      return Ok(());
    }
    self.updater.rendering.set(true);
    let result = (|| -> Result<()> {
      loop {
        let refs = self.updater.drain();
        if refs.is_empty() {
          break;
        }
        self.updater.revision.set(self.updater.revision.get() + 1);
        let (version, revision) = self.updater.version_revision();
        for r in &refs {
          self.stamp_version_revision(&r.info.pattern, VersionRevision { version, revision });
        }
        log::debug!(
          "flush v{version}.r{revision}: {} refs on <{}>",
          refs.len(),
          self.class().tag
        );

        let was_cacheable = self.cacheable.replace(true);
        let queued: HashSet<Rc<StatePropertyRef>> = refs.iter().cloned().collect();
        let mut renderer = Renderer::new(self.clone(), queued);
        let outcome = renderer.render(&refs);
        self.cacheable.set(was_cacheable);
        self.updater.merge_scope(renderer.scope());
        outcome?;
      }
      Ok(())
    })();
    self.updater.rendering.set(false);
    if result.is_err() {
      self.updater.clear();
    }
    let scope = self.updater.pending_scope.replace(ChangeScope::empty());
    if !scope.is_empty() {
      self.notifier.next(scope);
    }
    result
  }

  /// One-shot render used by the connect sequence: apply every binding of
  /// the freshly mounted content under a readonly, cacheable context.
  pub(crate) fn initial_render(self: &Rc<Self>, content: &Rc<BindContent>) -> Result<()> {
    self.updater.version.set(self.version_up());
    self.updater.revision.set(self.updater.revision.get() + 1);
    let was_cacheable = self.cacheable.replace(true);
    let mut renderer = Renderer::new(self.clone(), HashSet::default());
    let result = content.apply_all(&mut renderer);
    self.cacheable.set(was_cacheable);
    self.updater.merge_scope(renderer.scope());
    result?;
    self.flush()
  }

  /// The engine's flush notifier.
  pub fn modifies(&self) -> BoxOp<'static, ChangeScope, Infallible> { self.notifier.modifies() }

  pub fn raw_modifies(&self) -> Subject<'static, ChangeScope, Infallible> {
    self.notifier.raw_modifies()
  }
}
