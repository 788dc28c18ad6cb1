//! The Structive reactive runtime.
//!
//! Authors describe a component as a template (elements, `{{path}}` text
//! interpolations and `data-bind` directive clauses) plus a state class
//! (plain data, computed getters, methods, lifecycle hooks). The runtime
//! realises the template against a [`structive_dom::Document`] and keeps it
//! in sync with state writes: a writable update enqueues refs, the updater
//! batches them, and the renderer walks the class's path tree to apply every
//! affected binding exactly once per pass.

pub mod app_ctx;
pub mod binding;
pub mod component;
pub mod constants;
pub mod error;
pub mod filter;
pub mod list_index;
pub mod loop_context;
pub mod path;
pub mod property_ref;
pub mod renderer;
pub mod state;
pub mod template;
#[cfg(test)]
pub(crate) mod test_helper;
pub mod updater;

pub use rxrust;
pub use serde_json::{json, Value};
pub use structive_dom;

pub mod prelude {
  pub use log;
  pub use rxrust::prelude::*;
  pub use serde_json::{json, Value};
  #[doc(hidden)]
  pub use structive_dom::{Document, Event, NodeId};

  pub use crate::{
    app_ctx::{AppCtx, StructiveConfig},
    binding::{BindContent, Binding},
    component::{Component, ComponentEngine, ComponentRegistry, ComponentStateBinding},
    error::{raise_error, ErrorCode, Result, StructiveError},
    filter::{register_filter, to_display_string},
    list_index::ListIndex,
    loop_context::LoopContext,
    path::{
      get_resolved_path_info, get_structured_path_info, PathManager, ResolvedPathInfo,
      StructuredPathInfo, WildcardType,
    },
    property_ref::{get_state_property_ref, StatePropertyRef},
    state::{ComponentConfig, MethodArgs, ReadonlyState, StateAccess, StateClass, StateMutate, WritableState},
    template::{element, text, text_binding, ComponentTemplate},
    updater::{ChangeScope, Notifier},
  };
}
