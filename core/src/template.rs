//! The template model the runtime consumes.
//!
//! Single-file-component parsing happens outside the core; what arrives here
//! is an element tree whose `data-bind` attributes are clause lists of the
//! form `name:path|filter1|filter2(arg)`, separated by `;`. `{{path}}` text
//! interpolations arrive as [`TemplateNode::TextBinding`] nodes.
//!
//! Registration compiles the tree into [`TemplateFragment`]s: structural
//! directives (`for`, then `if`) split the tree into nested fragments that
//! the binding layer instantiates per row / per truthy state.

use std::rc::Rc;

use crate::{
  error::{raise_error, ErrorCode, Result},
  filter::FilterSpec,
  path::PathManager,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindKind {
  /// Bind the node's text content.
  Text,
  Attr(String),
  Style(String),
  Class(String),
  If,
  For,
  Event(String),
  /// Component slot: bind a child state path to a parent state path.
  ChildState(String),
}

#[derive(Debug, Clone)]
pub struct BindClause {
  pub kind: BindKind,
  /// The state path of the owning component (the method name for `on.*`).
  pub path: String,
  pub filters: Vec<FilterSpec>,
}

#[derive(Debug, Clone)]
pub enum TemplateNode {
  Element(TemplateElement),
  Text(String),
  TextBinding(BindClause),
}

#[derive(Debug, Clone)]
pub struct TemplateElement {
  pub tag: String,
  pub attributes: Vec<(String, String)>,
  pub clauses: Vec<BindClause>,
  pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentTemplate {
  pub roots: Vec<TemplateNode>,
}

impl ComponentTemplate {
  pub fn new(roots: Vec<TemplateNode>) -> Self { ComponentTemplate { roots } }
}

/// `{{ path|filters }}`
pub fn text_binding(source: &str) -> Result<TemplateNode> {
  let (path, filters) = split_filters(source)?;
  Ok(TemplateNode::TextBinding(BindClause { kind: BindKind::Text, path, filters }))
}

pub fn text(content: &str) -> TemplateNode { TemplateNode::Text(content.to_string()) }

pub fn element(tag: &str) -> ElementBuilder {
  ElementBuilder {
    tag: tag.to_string(),
    attributes: Vec::new(),
    clauses: Vec::new(),
    children: Vec::new(),
  }
}

pub struct ElementBuilder {
  tag: String,
  attributes: Vec<(String, String)>,
  clauses: Vec<BindClause>,
  children: Vec<TemplateNode>,
}

impl ElementBuilder {
  pub fn attr(mut self, name: &str, value: &str) -> Self {
    self.attributes.push((name.to_string(), value.to_string()));
    self
  }

  /// Parse and attach a `data-bind` clause list.
  pub fn data_bind(mut self, source: &str) -> Result<Self> {
    self.clauses.extend(parse_data_bind(source)?);
    Ok(self)
  }

  pub fn child(mut self, child: TemplateNode) -> Self {
    self.children.push(child);
    self
  }

  pub fn children(mut self, children: Vec<TemplateNode>) -> Self {
    self.children.extend(children);
    self
  }

  pub fn build(self) -> TemplateNode {
    TemplateNode::Element(TemplateElement {
      tag: self.tag,
      attributes: self.attributes,
      clauses: self.clauses,
      children: self.children,
    })
  }
}

/// Parse a `data-bind` attribute value into clauses.
pub fn parse_data_bind(source: &str) -> Result<Vec<BindClause>> {
  source
    .split(';')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(parse_clause)
    .collect()
}

fn parse_clause(source: &str) -> Result<BindClause> {
  let (name, rest) = match source.split_once(':') {
    Some((name, rest)) => (name.trim(), rest.trim()),
    None => ("", source.trim()),
  };
  let (path, filters) = split_filters(rest)?;
  if path.is_empty() {
    return Err(bad_clause(source, "missing state path"));
  }

  let kind = if name.is_empty() || name == "text" {
    BindKind::Text
  } else if name == "if" {
    BindKind::If
  } else if name == "for" {
    BindKind::For
  } else if let Some(attr) = name.strip_prefix("attr.") {
    BindKind::Attr(attr.to_string())
  } else if let Some(prop) = name.strip_prefix("style.") {
    BindKind::Style(prop.to_string())
  } else if let Some(class) = name.strip_prefix("class.") {
    BindKind::Class(class.to_string())
  } else if let Some(event) = name.strip_prefix("on.") {
    BindKind::Event(event.to_string())
  } else if let Some(child_path) = name.strip_prefix("state.") {
    BindKind::ChildState(child_path.to_string())
  } else {
    return Err(bad_clause(source, "unrecognised directive name"));
  };

  if matches!(kind, BindKind::If | BindKind::For | BindKind::Event(_)) && !filters.is_empty() {
    return Err(bad_clause(source, "filters are not allowed on this directive"));
  }

  Ok(BindClause { kind, path, filters })
}

fn split_filters(source: &str) -> Result<(String, Vec<FilterSpec>)> {
  let mut parts = source.split('|').map(str::trim);
  let path = parts.next().unwrap_or("").to_string();
  let filters = parts.map(parse_filter).collect::<Result<Vec<_>>>()?;
  Ok((path, filters))
}

fn parse_filter(source: &str) -> Result<FilterSpec> {
  if let Some((name, rest)) = source.split_once('(') {
    let Some(args) = rest.strip_suffix(')') else {
      return Err(bad_clause(source, "unterminated filter arguments"));
    };
    let args = args
      .split(',')
      .map(str::trim)
      .filter(|a| !a.is_empty())
      .map(str::to_string)
      .collect();
    Ok(FilterSpec { name: name.trim().to_string(), args })
  } else {
    Ok(FilterSpec { name: source.to_string(), args: Vec::new() })
  }
}

fn bad_clause(source: &str, reason: &str) -> crate::error::StructiveError {
  raise_error(ErrorCode::Bind201, format!("bad data-bind clause \"{source}\": {reason}"))
}

/// A compiled template fragment: the unit a `BindContent` realises.
#[derive(Debug)]
pub struct TemplateFragment {
  pub nodes: Vec<FragmentNode>,
}

#[derive(Debug)]
pub enum FragmentNode {
  Element(FragmentElement),
  Text(String),
  TextBinding(BindClause),
  If { clause: BindClause, inner: Rc<TemplateFragment> },
  For { clause: BindClause, row: Rc<TemplateFragment> },
}

#[derive(Debug)]
pub struct FragmentElement {
  pub tag: String,
  pub attributes: Vec<(String, String)>,
  pub clauses: Vec<BindClause>,
  pub children: Vec<FragmentNode>,
}

/// Compile a template into nested fragments. `for` splits before `if` when
/// both sit on one element, so the condition applies per row.
pub fn compile_template(template: &ComponentTemplate) -> Result<Rc<TemplateFragment>> {
  compile_nodes(&template.roots)
}

fn compile_nodes(nodes: &[TemplateNode]) -> Result<Rc<TemplateFragment>> {
  let nodes = nodes.iter().map(compile_node).collect::<Result<Vec<_>>>()?;
  Ok(Rc::new(TemplateFragment { nodes }))
}

fn compile_node(node: &TemplateNode) -> Result<FragmentNode> {
  match node {
    TemplateNode::Text(t) => Ok(FragmentNode::Text(t.clone())),
    TemplateNode::TextBinding(clause) => Ok(FragmentNode::TextBinding(clause.clone())),
    TemplateNode::Element(element) => {
      if let Some(pos) = element.clauses.iter().position(|c| c.kind == BindKind::For) {
        let mut rest = element.clone();
        let clause = rest.clauses.remove(pos);
        let row = compile_nodes(&[TemplateNode::Element(rest)])?;
        return Ok(FragmentNode::For { clause, row });
      }
      if let Some(pos) = element.clauses.iter().position(|c| c.kind == BindKind::If) {
        let mut rest = element.clone();
        let clause = rest.clauses.remove(pos);
        let inner = compile_nodes(&[TemplateNode::Element(rest)])?;
        return Ok(FragmentNode::If { clause, inner });
      }
      let children = element.children.iter().map(compile_node).collect::<Result<Vec<_>>>()?;
      Ok(FragmentNode::Element(FragmentElement {
        tag: element.tag.clone(),
        attributes: element.attributes.clone(),
        clauses: element.clauses.clone(),
        children,
      }))
    }
  }
}

/// Seed the class's [`PathManager`] with every path the fragment observes.
pub fn analyze_fragment(fragment: &TemplateFragment, pm: &PathManager) -> Result<()> {
  for node in &fragment.nodes {
    analyze_node(node, pm)?;
  }
  Ok(())
}

fn analyze_node(node: &FragmentNode, pm: &PathManager) -> Result<()> {
  match node {
    FragmentNode::Text(_) => Ok(()),
    FragmentNode::TextBinding(clause) => pm.add_path(&clause.path, false),
    FragmentNode::If { clause, inner } => {
      pm.add_path(&clause.path, false)?;
      analyze_fragment(inner, pm)
    }
    FragmentNode::For { clause, row } => {
      pm.mark_list(&clause.path)?;
      analyze_fragment(row, pm)
    }
    FragmentNode::Element(element) => {
      for clause in &element.clauses {
        match &clause.kind {
          BindKind::Event(_) => pm.mark_func(&clause.path),
          _ => pm.add_path(&clause.path, false)?,
        }
      }
      for child in &element.children {
        analyze_node(child, pm)?;
      }
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clause_grammar() {
    let clauses =
      parse_data_bind("attr.title:user.name|uc; class.on:flag; on.click:add").unwrap();
    assert_eq!(clauses.len(), 3);
    assert_eq!(clauses[0].kind, BindKind::Attr("title".into()));
    assert_eq!(clauses[0].path, "user.name");
    assert_eq!(clauses[0].filters[0].name, "uc");
    assert_eq!(clauses[1].kind, BindKind::Class("on".into()));
    assert_eq!(clauses[2].kind, BindKind::Event("click".into()));

    let with_args = parse_data_bind("style.width:bar|fix(2)").unwrap();
    assert_eq!(with_args[0].filters[0].args, ["2"]);

    assert!(parse_data_bind("nonsense.x:path").is_err());
    assert!(parse_data_bind("if:").is_err());
  }

  #[test]
  fn structural_clauses_split_fragments() {
    let node = element("li")
      .data_bind("for:items; if:visible")
      .unwrap()
      .child(text_binding("items.*.name").unwrap())
      .build();
    let fragment = compile_template(&ComponentTemplate::new(vec![node])).unwrap();

    let FragmentNode::For { clause, row } = &fragment.nodes[0] else {
      panic!("expected a for fragment");
    };
    assert_eq!(clause.path, "items");
    let FragmentNode::If { inner, .. } = &row.nodes[0] else {
      panic!("expected a nested if fragment");
    };
    let FragmentNode::Element(li) = &inner.nodes[0] else { panic!("expected the element") };
    assert_eq!(li.tag, "li");
    assert!(matches!(li.children[0], FragmentNode::TextBinding(_)));
  }

  #[test]
  fn analysis_seeds_the_path_manager() {
    crate::reset_test_env!();
    let node = element("ul")
      .child(
        element("li")
          .data_bind("for:items")
          .unwrap()
          .child(text_binding("items.*.name").unwrap())
          .build(),
      )
      .build();
    let fragment = compile_template(&ComponentTemplate::new(vec![node])).unwrap();
    let pm = PathManager::new();
    analyze_fragment(&fragment, &pm).unwrap();
    assert!(pm.is_list("items"));
    assert!(pm.is_element("items.*"));
    assert!(pm.has_path("items.*.name"));
  }
}
