//! A retained document tree for the Structive runtime.
//!
//! The runtime's bindings mutate a `Document` the way browser bindings mutate
//! the DOM: elements with attributes, class lists and inline styles, text
//! nodes, and comment nodes used as mount markers. The tree is arena backed;
//! a [`NodeId`] stays cheap to copy and compare while the node data lives in
//! the arena.

mod document;
mod event;
mod serialize;

pub use document::{Document, ElementData, NodeData, NodeId};
pub use event::{Event, EventListener};
