use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use structive_dom::NodeId;

use crate::{
  binding::{
    AttrBindingNode, Binding, BindingNode, BindingState, ClassBindingNode, ComponentBindingNode,
    EventBindingNode, ForBindingNode, IfBindingNode, StyleBindingNode, TextBindingNode,
  },
  component::{Component, ComponentEngine},
  error::Result,
  list_index::ListIndex,
  loop_context::LoopContext,
  path::StructuredPathInfo,
  renderer::Renderer,
  template::{BindKind, FragmentElement, FragmentNode, TemplateFragment},
};

thread_local! {
  static NEXT_CONTENT_ID: Cell<u64> = const { Cell::new(1) };
}

/// A realised template fragment: its created top-level nodes, its bindings,
/// its embedded child components, and the loop frame it runs under (for row
/// contents).
pub struct BindContent {
  pub id: u64,
  root_nodes: Vec<NodeId>,
  bindings: Vec<Rc<Binding>>,
  child_components: Vec<Component>,
  loop_context: Option<Rc<LoopContext>>,
  parent_binding: RefCell<Weak<Binding>>,
  mounted: Cell<bool>,
  active: Cell<bool>,
}

impl BindContent {
  /// Instantiate `fragment` into unattached document nodes plus bindings.
  ///
  /// `loop_frame` is set for `for` rows: the row pattern and the row's
  /// `ListIndex` become the content's [`LoopContext`].
  pub fn create(
    engine: &Rc<ComponentEngine>, fragment: &Rc<TemplateFragment>,
    parent_binding: Option<&Rc<Binding>>,
    loop_frame: Option<(Rc<StructuredPathInfo>, Rc<ListIndex>)>,
  ) -> Result<Rc<BindContent>> {
    let loop_context = loop_frame.map(|(info, li)| LoopContext::new(&info, &li));

    let mut builder = ContentBuilder {
      engine: engine.clone(),
      root_nodes: Vec::new(),
      bindings: Vec::new(),
      child_components: Vec::new(),
    };
    for node in &fragment.nodes {
      builder.instantiate(node, None)?;
    }

    let content = Rc::new(BindContent {
      id: NEXT_CONTENT_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
      }),
      root_nodes: builder.root_nodes,
      bindings: builder.bindings,
      child_components: builder.child_components,
      loop_context,
      parent_binding: RefCell::new(parent_binding.map_or_else(Weak::new, Rc::downgrade)),
      mounted: Cell::new(false),
      active: Cell::new(false),
    });

    if let Some(lc) = &content.loop_context {
      lc.attach(&content);
    }
    for binding in &content.bindings {
      binding.attach(&content);
      if let BindingNode::Event(node) = &binding.node {
        node.attach_listener(binding)?;
      }
    }
    Ok(content)
  }

  pub fn bindings(&self) -> &[Rc<Binding>] { &self.bindings }

  pub fn child_components(&self) -> &[Component] { &self.child_components }

  pub fn loop_context(&self) -> Option<Rc<LoopContext>> { self.loop_context.clone() }

  pub fn parent_binding(&self) -> Option<Rc<Binding>> { self.parent_binding.borrow().upgrade() }

  pub fn is_mounted(&self) -> bool { self.mounted.get() }

  pub fn is_active(&self) -> bool { self.active.get() }

  /// The content's own loop context, or the nearest one up the owner chain.
  pub fn nearest_loop_context(&self) -> Option<Rc<LoopContext>> {
    if let Some(lc) = &self.loop_context {
      return Some(lc.clone());
    }
    let mut content = self.parent_binding().and_then(|b| b.bind_content());
    while let Some(bc) = content {
      if let Some(lc) = bc.loop_context() {
        return Some(lc);
      }
      content = bc.parent_binding().and_then(|b| b.bind_content());
    }
    None
  }

  pub fn mount(&self, engine: &Rc<ComponentEngine>, parent: NodeId) {
    let doc = engine.document();
    let mut doc = doc.borrow_mut();
    for node in &self.root_nodes {
      doc.append_child(parent, *node);
    }
    self.mounted.set(true);
  }

  /// Insert the content's nodes directly after `anchor`, preserving order.
  pub fn mount_after(&self, engine: &Rc<ComponentEngine>, anchor: NodeId) {
    let doc = engine.document();
    let mut doc = doc.borrow_mut();
    let mut anchor = anchor;
    for node in &self.root_nodes {
      doc.detach(*node);
      doc.insert_after(anchor, *node);
      anchor = *node;
    }
    self.mounted.set(true);
  }

  /// Drop the content's nodes from the document for good (retired rows).
  pub fn remove_nodes(&self, engine: &Rc<ComponentEngine>) {
    let doc = engine.document();
    let mut doc = doc.borrow_mut();
    for node in &self.root_nodes {
      if !node.is_removed(&doc) {
        doc.remove_subtree(*node);
      }
    }
    self.mounted.set(false);
  }

  /// Detach the content's nodes, subtrees intact, for a later re-mount.
  pub fn unmount(&self, engine: &Rc<ComponentEngine>) {
    let doc = engine.document();
    let mut doc = doc.borrow_mut();
    for node in &self.root_nodes {
      doc.detach(*node);
    }
    self.mounted.set(false);
  }

  pub fn last_node(&self) -> Option<NodeId> { self.root_nodes.last().copied() }

  /// Register every binding with the engine and connect embedded child
  /// components. Nested contents that are still realised re-activate too.
  pub fn activate(self: &Rc<Self>) -> Result<()> {
    if self.active.replace(true) {
      return Ok(());
    }
    for binding in &self.bindings {
      binding.activate()?;
      match &binding.node {
        BindingNode::If(node) => node.reactivate(),
        BindingNode::For(node) => node.reactivate(),
        _ => {}
      }
    }
    for child in &self.child_components {
      child.engine().connected_callback()?;
    }
    Ok(())
  }

  /// Deregister every binding; cascade into realised nested contents and
  /// embedded child components.
  pub fn inactivate(self: &Rc<Self>) -> Result<()> {
    if !self.active.replace(false) {
      return Ok(());
    }
    for binding in &self.bindings {
      binding.inactivate()?;
      match &binding.node {
        BindingNode::If(node) => node.inactivate_content(),
        BindingNode::For(node) => node.inactivate_rows(),
        _ => {}
      }
    }
    for child in &self.child_components {
      child.engine().disconnected_callback()?;
    }
    Ok(())
  }

  /// Apply every binding of this content once.
  pub fn apply_all(&self, renderer: &mut Renderer) -> Result<()> {
    for binding in &self.bindings {
      binding.apply_change(renderer)?;
    }
    Ok(())
  }
}

impl std::fmt::Debug for BindContent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BindContent")
      .field("id", &self.id)
      .field("bindings", &self.bindings.len())
      .field("mounted", &self.mounted.get())
      .finish()
  }
}

struct ContentBuilder {
  engine: Rc<ComponentEngine>,
  root_nodes: Vec<NodeId>,
  bindings: Vec<Rc<Binding>>,
  child_components: Vec<Component>,
}

impl ContentBuilder {
  fn instantiate(&mut self, node: &FragmentNode, parent: Option<NodeId>) -> Result<()> {
    match node {
      FragmentNode::Text(content) => {
        let id = self.engine.document().borrow_mut().create_text(content);
        self.place(id, parent);
      }
      FragmentNode::TextBinding(clause) => {
        let id = self.engine.document().borrow_mut().create_text("");
        self.place(id, parent);
        self.bindings.push(Binding::new(
          &self.engine,
          BindingNode::Text(TextBindingNode::new(id)),
          BindingState::from_clause(clause)?,
        ));
      }
      FragmentNode::If { clause, inner } => {
        let marker = self
          .engine
          .document()
          .borrow_mut()
          .create_comment(&format!("if:{}", clause.path));
        self.place(marker, parent);
        self.bindings.push(Binding::new(
          &self.engine,
          BindingNode::If(IfBindingNode::new(marker, inner.clone())),
          BindingState::from_clause(clause)?,
        ));
      }
      FragmentNode::For { clause, row } => {
        let marker = self
          .engine
          .document()
          .borrow_mut()
          .create_comment(&format!("for:{}", clause.path));
        self.place(marker, parent);
        self.bindings.push(Binding::new(
          &self.engine,
          BindingNode::For(ForBindingNode::new(marker, row.clone())),
          BindingState::from_clause(clause)?,
        ));
      }
      FragmentNode::Element(element) => self.instantiate_element(element, parent)?,
    }
    Ok(())
  }

  fn instantiate_element(&mut self, element: &FragmentElement, parent: Option<NodeId>) -> Result<()> {
    let id = {
      let doc = self.engine.document();
      let mut doc = doc.borrow_mut();
      let id = doc.create_element(&element.tag);
      for (name, value) in &element.attributes {
        doc.set_attribute(id, name, value);
      }
      id
    };
    self.place(id, parent);

    let child_component = self
      .engine
      .registry()
      .filter(|registry| registry.is_registered(&element.tag))
      .map(|registry| registry.hydrate(&element.tag, &self.engine.document(), id))
      .transpose()?;

    if let Some(child) = &child_component {
      child.engine().set_parent(&self.engine);
      self.engine.register_child_component(child.engine());
    }

    for clause in &element.clauses {
      let node = match &clause.kind {
        BindKind::Text => BindingNode::Text(TextBindingNode::new(id)),
        BindKind::Attr(name) => BindingNode::Attr(AttrBindingNode::new(id, name)),
        BindKind::Style(prop) => BindingNode::Style(StyleBindingNode::new(id, prop)),
        BindKind::Class(name) => BindingNode::Class(ClassBindingNode::new(id, name)),
        BindKind::Event(event) => BindingNode::Event(EventBindingNode::new(id, event, &clause.path)),
        BindKind::ChildState(child_path) => {
          let child = child_component.as_ref().ok_or_else(|| {
            crate::error::raise_error(
              crate::error::ErrorCode::Bind201,
              format!("state.{child_path} used on a non-component element <{}>", element.tag),
            )
          })?;
          BindingNode::Component(ComponentBindingNode::new(child.engine(), child_path))
        }
        BindKind::If | BindKind::For => unreachable!("structural clauses were split at compile"),
      };
      let binding = Binding::new(&self.engine, node, BindingState::from_clause(clause)?);
      if let BindingNode::Component(_) = &binding.node {
        if let Some(child) = &child_component {
          child.engine().state_binding().add_binding(&binding)?;
          self.engine.save_component_binding(child.engine(), &binding);
        }
      }
      self.bindings.push(binding);
    }

    if let Some(child) = child_component {
      self.child_components.push(child);
    }

    for child in &element.children {
      self.instantiate(child, Some(id))?;
    }
    Ok(())
  }

  fn place(&mut self, id: NodeId, parent: Option<NodeId>) {
    match parent {
      Some(parent) => self.engine.document().borrow_mut().append_child(parent, id),
      None => self.root_nodes.push(id),
    }
  }
}
