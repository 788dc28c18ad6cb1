//! Activation records for enclosing `for` bindings.
//!
//! Every realised row fragment carries a `LoopContext` naming the row
//! pattern ("items.*") and the row's `ListIndex`. Bindings inside the row
//! find the frame for a wildcard path by walking the context chain.

use std::{
  cell::RefCell,
  rc::{Rc, Weak},
};

use ahash::HashMap;

use crate::{
  binding::BindContent,
  error::{raise_error, ErrorCode, Result},
  list_index::ListIndex,
  path::StructuredPathInfo,
  property_ref::{get_state_property_ref, StatePropertyRef},
};

pub struct LoopContext {
  info: Rc<StructuredPathInfo>,
  current: RefCell<Option<Rc<StatePropertyRef>>>,
  bind_content: RefCell<Weak<BindContent>>,
  parent_cache: RefCell<Option<Option<Rc<LoopContext>>>>,
  find_cache: RefCell<HashMap<String, Option<Rc<LoopContext>>>>,
}

impl LoopContext {
  /// A frame for the row pattern `info` bound to `list_index`.
  pub fn new(info: &Rc<StructuredPathInfo>, list_index: &Rc<ListIndex>) -> Rc<LoopContext> {
    Rc::new(LoopContext {
      info: info.clone(),
      current: RefCell::new(Some(get_state_property_ref(info, Some(list_index)))),
      bind_content: RefCell::new(Weak::new()),
      parent_cache: RefCell::new(None),
      find_cache: RefCell::new(HashMap::default()),
    })
  }

  pub(crate) fn attach(&self, bind_content: &Rc<BindContent>) {
    *self.bind_content.borrow_mut() = Rc::downgrade(bind_content);
  }

  /// The row pattern, e.g. `items.*`.
  pub fn path(&self) -> &str { &self.info.pattern }

  pub fn info(&self) -> &Rc<StructuredPathInfo> { &self.info }

  pub fn current_ref(&self) -> Result<Rc<StatePropertyRef>> {
    self.current.borrow().clone().ok_or_else(|| {
      raise_error(ErrorCode::State202, format!("loop context has no ref: {}", self.info.pattern))
    })
  }

  pub fn list_index(&self) -> Result<Rc<ListIndex>> {
    let current = self.current_ref()?;
    current.list_index()?.ok_or_else(|| {
      raise_error(ErrorCode::List201, format!("loop context lost its row: {}", self.info.pattern))
    })
  }

  /// Rebind the frame to another row. The structural chain is unchanged, so
  /// the memoised parent stays valid.
  pub fn assign_list_index(&self, list_index: &Rc<ListIndex>) {
    *self.current.borrow_mut() = Some(get_state_property_ref(&self.info, Some(list_index)));
  }

  pub fn clear_list_index(&self) { *self.current.borrow_mut() = None; }

  /// The nearest enclosing loop context, memoised.
  pub fn parent_loop_context(self: &Rc<Self>) -> Option<Rc<LoopContext>> {
    if let Some(memo) = &*self.parent_cache.borrow() {
      return memo.clone();
    }
    let mut content = self.bind_content.borrow().upgrade();
    let mut found = None;
    while let Some(bc) = content {
      let Some(binding) = bc.parent_binding() else { break };
      let Some(parent) = binding.bind_content() else { break };
      if let Some(lc) = parent.loop_context() {
        if !Rc::ptr_eq(&lc, self) {
          found = Some(lc);
          break;
        }
      }
      content = Some(parent);
    }
    *self.parent_cache.borrow_mut() = Some(found.clone());
    found
  }

  /// The nearest context (self included) whose path is `name`; memoised,
  /// negative results too.
  pub fn find(self: &Rc<Self>, name: &str) -> Option<Rc<LoopContext>> {
    if let Some(memo) = self.find_cache.borrow().get(name) {
      return memo.clone();
    }
    let mut found = None;
    for lc in self.walk() {
      if lc.path() == name {
        found = Some(lc);
        break;
      }
    }
    self.find_cache.borrow_mut().insert(name.to_string(), found.clone());
    found
  }

  /// Self towards the root.
  pub fn walk(self: &Rc<Self>) -> Vec<Rc<LoopContext>> {
    let mut out = vec![self.clone()];
    let mut current = self.clone();
    while let Some(parent) = current.parent_loop_context() {
      out.push(parent.clone());
      current = parent;
    }
    out
  }

  /// Root towards self.
  pub fn serialize(self: &Rc<Self>) -> Vec<Rc<LoopContext>> {
    let mut out = self.walk();
    out.reverse();
    out
  }
}

impl std::fmt::Debug for LoopContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoopContext").field("path", &self.info.pattern).finish()
  }
}
