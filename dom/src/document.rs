use ahash::{HashMap, HashSet};
use indextree::Arena;

use crate::event::{Event, EventListener, ListenerStore};

/// Identity of a node inside a [`Document`] arena.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Hash)]
pub struct NodeId(pub(crate) indextree::NodeId);

/// The payload stored for every node.
#[derive(Debug)]
pub enum NodeData {
  Element(ElementData),
  Text(String),
  Comment(String),
}

#[derive(Debug, Default)]
pub struct ElementData {
  pub tag: String,
  pub attributes: HashMap<String, String>,
  pub classes: HashSet<String>,
  pub styles: HashMap<String, String>,
}

/// An arena backed retained tree of elements, text and comment nodes.
///
/// The document always owns a `#document` root; everything else hangs off it.
pub struct Document {
  arena: Arena<NodeData>,
  root: NodeId,
  pub(crate) listeners: ListenerStore,
}

impl Default for Document {
  fn default() -> Self { Self::new() }
}

impl Document {
  pub fn new() -> Self {
    let mut arena = Arena::new();
    let root = NodeId(arena.new_node(NodeData::Element(ElementData {
      tag: "#document".to_string(),
      ..<_>::default()
    })));
    Document { arena, root, listeners: ListenerStore::default() }
  }

  pub fn root(&self) -> NodeId { self.root }

  pub fn create_element(&mut self, tag: &str) -> NodeId {
    NodeId(self.arena.new_node(NodeData::Element(ElementData {
      tag: tag.to_string(),
      ..<_>::default()
    })))
  }

  pub fn create_text(&mut self, text: &str) -> NodeId {
    NodeId(self.arena.new_node(NodeData::Text(text.to_string())))
  }

  pub fn create_comment(&mut self, text: &str) -> NodeId {
    NodeId(self.arena.new_node(NodeData::Comment(text.to_string())))
  }

  /// Remove `id` and its whole subtree from the document, dropping the nodes
  /// and any listeners registered on them.
  pub fn remove_subtree(&mut self, id: NodeId) {
    let ids: Vec<NodeId> = id.descendants(self).collect();
    for n in &ids {
      self.listeners.remove_node(*n);
    }
    id.0.remove_subtree(&mut self.arena);
  }

  /// Detach `id` from its parent without dropping the subtree, so it can be
  /// mounted elsewhere later.
  pub fn detach(&mut self, id: NodeId) { id.0.detach(&mut self.arena); }

  pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
    parent.0.append(child.0, &mut self.arena);
  }

  pub fn insert_before(&mut self, anchor: NodeId, new: NodeId) {
    anchor.0.insert_before(new.0, &mut self.arena);
  }

  pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) {
    anchor.0.insert_after(new.0, &mut self.arena);
  }

  pub fn set_text(&mut self, id: NodeId, text: &str) {
    match id.assert_get_mut(self) {
      NodeData::Text(t) | NodeData::Comment(t) => {
        t.clear();
        t.push_str(text);
      }
      NodeData::Element(e) => panic!("set_text on element <{}>", e.tag),
    }
  }

  pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
    let e = id.assert_element_mut(self);
    e.attributes.insert(name.to_string(), value.to_string());
  }

  pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
    id.assert_element_mut(self).attributes.remove(name);
  }

  pub fn toggle_class(&mut self, id: NodeId, name: &str, on: bool) {
    let e = id.assert_element_mut(self);
    if on {
      e.classes.insert(name.to_string());
    } else {
      e.classes.remove(name);
    }
  }

  /// Set an inline style property; an empty value clears it, mirroring
  /// `style.setProperty(prop, "")`.
  pub fn set_style_property(&mut self, id: NodeId, prop: &str, value: &str) {
    let e = id.assert_element_mut(self);
    if value.is_empty() {
      e.styles.remove(prop);
    } else {
      e.styles.insert(prop.to_string(), value.to_string());
    }
  }

  pub fn add_event_listener(&mut self, id: NodeId, event: &str, listener: EventListener) {
    self.listeners.add(id, event, listener);
  }

  pub fn remove_event_listeners(&mut self, id: NodeId, event: &str) {
    self.listeners.remove(id, event);
  }

  /// Collect the listeners an [`Event`] dispatched on `target` would run, in
  /// bubbling order (target first, then ancestors).
  ///
  /// Dispatch itself is left to the caller so listeners are free to mutate
  /// the document while running.
  pub fn listeners_for(&self, target: NodeId, event: &str) -> Vec<EventListener> {
    let mut out = Vec::new();
    for id in target.ancestors_inclusive(self) {
      out.extend(self.listeners.get(id, event));
    }
    out
  }

  /// Build the event value for `target`; convenience for tests and embedders.
  pub fn new_event(&self, name: &str, target: NodeId) -> Event {
    Event { name: name.to_string(), target }
  }
}

impl NodeId {
  pub fn get(self, doc: &Document) -> Option<&NodeData> {
    doc.arena.get(self.0).map(|n| n.get())
  }

  pub fn assert_get(self, doc: &Document) -> &NodeData {
    self.get(doc).expect("node not in the document")
  }

  pub(crate) fn assert_get_mut(self, doc: &mut Document) -> &mut NodeData {
    doc.arena.get_mut(self.0).map(|n| n.get_mut()).expect("node not in the document")
  }

  fn assert_element_mut(self, doc: &mut Document) -> &mut ElementData {
    match self.assert_get_mut(doc) {
      NodeData::Element(e) => e,
      _ => panic!("node is not an element"),
    }
  }

  pub fn is_removed(self, doc: &Document) -> bool { self.0.is_removed(&doc.arena) }

  pub fn is_element(self, doc: &Document) -> bool {
    matches!(self.assert_get(doc), NodeData::Element(_))
  }

  pub fn is_text(self, doc: &Document) -> bool { matches!(self.assert_get(doc), NodeData::Text(_)) }

  pub fn is_comment(self, doc: &Document) -> bool {
    matches!(self.assert_get(doc), NodeData::Comment(_))
  }

  pub fn tag(self, doc: &Document) -> Option<&str> {
    match self.assert_get(doc) {
      NodeData::Element(e) => Some(e.tag.as_str()),
      _ => None,
    }
  }

  pub fn element(self, doc: &Document) -> Option<&ElementData> {
    match self.assert_get(doc) {
      NodeData::Element(e) => Some(e),
      _ => None,
    }
  }

  /// The text of a text or comment node.
  pub fn text(self, doc: &Document) -> Option<&str> {
    match self.assert_get(doc) {
      NodeData::Text(t) | NodeData::Comment(t) => Some(t.as_str()),
      NodeData::Element(_) => None,
    }
  }

  pub fn attribute<'a>(self, doc: &'a Document, name: &str) -> Option<&'a str> {
    self.element(doc).and_then(|e| e.attributes.get(name)).map(|s| s.as_str())
  }

  pub fn has_class(self, doc: &Document, name: &str) -> bool {
    self.element(doc).is_some_and(|e| e.classes.contains(name))
  }

  pub fn style_property<'a>(self, doc: &'a Document, prop: &str) -> Option<&'a str> {
    self.element(doc).and_then(|e| e.styles.get(prop)).map(|s| s.as_str())
  }

  pub fn parent(self, doc: &Document) -> Option<NodeId> {
    self.node_feature(doc, |n| n.parent())
  }

  pub fn first_child(self, doc: &Document) -> Option<NodeId> {
    self.node_feature(doc, |n| n.first_child())
  }

  pub fn last_child(self, doc: &Document) -> Option<NodeId> {
    self.node_feature(doc, |n| n.last_child())
  }

  pub fn next_sibling(self, doc: &Document) -> Option<NodeId> {
    self.node_feature(doc, |n| n.next_sibling())
  }

  pub fn prev_sibling(self, doc: &Document) -> Option<NodeId> {
    self.node_feature(doc, |n| n.previous_sibling())
  }

  pub fn children(self, doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    self.0.children(&doc.arena).map(NodeId)
  }

  pub fn descendants(self, doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    self.0.descendants(&doc.arena).map(NodeId)
  }

  pub fn ancestors_inclusive(self, doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    self.0.ancestors(&doc.arena).map(NodeId)
  }

  fn node_feature(
    self, doc: &Document, method: impl Fn(&indextree::Node<NodeData>) -> Option<indextree::NodeId>,
  ) -> Option<NodeId> {
    doc.arena.get(self.0).and_then(method).map(NodeId)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tree_edit() {
    let mut doc = Document::new();
    let ul = doc.create_element("ul");
    doc.append_child(doc.root(), ul);
    let a = doc.create_element("li");
    let b = doc.create_element("li");
    let c = doc.create_element("li");
    doc.append_child(ul, a);
    doc.append_child(ul, c);
    doc.insert_after(a, b);

    let order: Vec<_> = ul.children(&doc).collect();
    assert_eq!(order, vec![a, b, c]);

    doc.detach(b);
    doc.insert_before(a, b);
    let order: Vec<_> = ul.children(&doc).collect();
    assert_eq!(order, vec![b, a, c]);

    doc.remove_subtree(c);
    assert!(c.is_removed(&doc));
    assert_eq!(ul.children(&doc).count(), 2);
  }

  #[test]
  fn element_mutation() {
    let mut doc = Document::new();
    let div = doc.create_element("div");
    doc.set_attribute(div, "title", "hello");
    assert_eq!(div.attribute(&doc, "title"), Some("hello"));
    doc.remove_attribute(div, "title");
    assert_eq!(div.attribute(&doc, "title"), None);

    doc.toggle_class(div, "on", true);
    assert!(div.has_class(&doc, "on"));
    doc.toggle_class(div, "on", false);
    assert!(!div.has_class(&doc, "on"));

    doc.set_style_property(div, "color", "red");
    assert_eq!(div.style_property(&doc, "color"), Some("red"));
    doc.set_style_property(div, "color", "");
    assert_eq!(div.style_property(&doc, "color"), None);
  }

  #[test]
  fn listener_bubbling_order() {
    use std::{cell::RefCell, rc::Rc};

    let mut doc = Document::new();
    let outer = doc.create_element("div");
    let inner = doc.create_element("button");
    doc.append_child(doc.root(), outer);
    doc.append_child(outer, inner);

    let hits: Rc<RefCell<Vec<&'static str>>> = <_>::default();
    let h = hits.clone();
    doc.add_event_listener(inner, "click", Rc::new(move |_| h.borrow_mut().push("inner")));
    let h = hits.clone();
    doc.add_event_listener(outer, "click", Rc::new(move |_| h.borrow_mut().push("outer")));

    let ev = doc.new_event("click", inner);
    for l in doc.listeners_for(inner, "click") {
      l(&ev);
    }
    assert_eq!(&*hits.borrow(), &["inner", "outer"]);
  }
}
