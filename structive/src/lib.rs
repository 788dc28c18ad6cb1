//! Structive — a reactive component runtime.
//!
//! This crate is the public facade: it re-exports the runtime core and the
//! document tree, plus a `prelude` with the types most embedders need.
//!
//! ```
//! use structive::prelude::*;
//!
//! let registry = ComponentRegistry::new();
//! let template = ComponentTemplate::new(vec![
//!   element("div").child(text_binding("greeting").unwrap()).build(),
//! ]);
//! let state = StateClass::builder(json!({ "greeting": "hello" })).build();
//! registry.register("x-hello", &template, "", state).unwrap();
//!
//! let document = std::rc::Rc::new(std::cell::RefCell::new(Document::new()));
//! let root = document.borrow().root();
//! let component = registry.create_component("x-hello", &document).unwrap();
//! component.mount(root).unwrap();
//! assert_eq!(document.borrow().text_content(component.host()), "hello");
//! ```

pub use structive_core as core;
pub use structive_core::reset_test_env;
pub use structive_dom as dom;

pub mod prelude {
  pub use structive_core::prelude::*;
}
