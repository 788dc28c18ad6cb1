//! Shared fixtures for unit tests.

use std::{cell::RefCell, rc::Rc};

use structive_dom::Document;

use crate::{
  component::{Component, ComponentRegistry},
  state::StateClass,
  template::ComponentTemplate,
};

pub(crate) struct TestBed {
  pub registry: Rc<ComponentRegistry>,
  pub document: Rc<RefCell<Document>>,
  pub component: Component,
}

impl TestBed {
  pub fn html(&self) -> String {
    let doc = self.document.borrow();
    doc.inner_html(doc.root())
  }

  pub fn text(&self) -> String {
    let doc = self.document.borrow();
    doc.text_content(doc.root())
  }
}

/// Register `template`+`state_class` under `tag`, create one instance and
/// mount it at the document root.
pub(crate) fn mount_component(
  tag: &str, template: ComponentTemplate, state_class: Rc<StateClass>,
) -> TestBed {
  let bed = prepare_component(tag, template, state_class);
  let root = bed.document.borrow().root();
  bed.component.mount(root).expect("mount must succeed");
  bed
}

/// Like [`mount_component`] without the mount, for tests that drive the
/// lifecycle themselves.
pub(crate) fn prepare_component(
  tag: &str, template: ComponentTemplate, state_class: Rc<StateClass>,
) -> TestBed {
  let registry = ComponentRegistry::new();
  registry
    .register(tag, &template, "", state_class)
    .expect("register must succeed");
  let document = Rc::new(RefCell::new(Document::new()));
  let component = registry
    .create_component(tag, &document)
    .expect("create must succeed");
  TestBed { registry, document, component }
}
