//! HTML serialisation of a document subtree.
//!
//! Attributes, classes and style properties are emitted in sorted order so
//! the output is stable across runs regardless of hash-map iteration.

use crate::{Document, NodeData, NodeId};

const VOID_TAGS: &[&str] = &["area", "br", "col", "embed", "hr", "img", "input", "source", "wbr"];

impl Document {
  /// Serialise the subtree rooted at `id`, including `id` itself.
  pub fn outer_html(&self, id: NodeId) -> String {
    let mut out = String::new();
    self.write_node(id, &mut out);
    out
  }

  /// Serialise the children of `id`.
  pub fn inner_html(&self, id: NodeId) -> String {
    let mut out = String::new();
    for child in id.children(self) {
      self.write_node(child, &mut out);
    }
    out
  }

  /// Concatenated text of all text descendants, comment markers excluded.
  pub fn text_content(&self, id: NodeId) -> String {
    let mut out = String::new();
    for n in id.descendants(self) {
      if let NodeData::Text(t) = n.assert_get(self) {
        out.push_str(t);
      }
    }
    out
  }

  fn write_node(&self, id: NodeId, out: &mut String) {
    match id.assert_get(self) {
      NodeData::Text(t) => out.push_str(&escape_text(t)),
      NodeData::Comment(t) => {
        out.push_str("<!--");
        out.push_str(t);
        out.push_str("-->");
      }
      NodeData::Element(e) => {
        if e.tag == "#document" {
          for child in id.children(self) {
            self.write_node(child, out);
          }
          return;
        }

        out.push('<');
        out.push_str(&e.tag);

        let mut attrs: Vec<(&str, String)> = e
          .attributes
          .iter()
          .map(|(k, v)| (k.as_str(), v.clone()))
          .collect();
        if !e.classes.is_empty() {
          let mut classes: Vec<&str> = e.classes.iter().map(|c| c.as_str()).collect();
          classes.sort_unstable();
          attrs.push(("class", classes.join(" ")));
        }
        if !e.styles.is_empty() {
          let mut styles: Vec<(&str, &str)> = e
            .styles
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
          styles.sort_unstable();
          let style = styles
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
          attrs.push(("style", style));
        }
        attrs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (name, value) in attrs {
          out.push(' ');
          out.push_str(name);
          out.push_str("=\"");
          out.push_str(&escape_attr(&value));
          out.push('"');
        }
        out.push('>');

        if VOID_TAGS.contains(&e.tag.as_str()) {
          return;
        }
        for child in id.children(self) {
          self.write_node(child, out);
        }
        out.push_str("</");
        out.push_str(&e.tag);
        out.push('>');
      }
    }
  }
}

fn escape_text(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String { escape_text(s).replace('"', "&quot;") }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stable_output() {
    let mut doc = Document::new();
    let div = doc.create_element("div");
    doc.append_child(doc.root(), div);
    doc.set_attribute(div, "id", "x");
    doc.set_attribute(div, "data-a", "1");
    doc.toggle_class(div, "b", true);
    doc.toggle_class(div, "a", true);
    doc.set_style_property(div, "color", "red");
    let text = doc.create_text("1 < 2 & 3");
    doc.append_child(div, text);
    let marker = doc.create_comment("mark");
    doc.append_child(div, marker);

    assert_eq!(
      doc.outer_html(doc.root()),
      "<div class=\"a b\" data-a=\"1\" id=\"x\" style=\"color: red;\">\
       1 &lt; 2 &amp; 3<!--mark--></div>"
    );
    assert_eq!(doc.text_content(div), "1 < 2 & 3");
  }

  #[test]
  fn void_elements_have_no_close_tag() {
    let mut doc = Document::new();
    let br = doc.create_element("br");
    doc.append_child(doc.root(), br);
    assert_eq!(doc.inner_html(doc.root()), "<br>");
  }
}
