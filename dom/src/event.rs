use std::rc::Rc;

use ahash::HashMap;

use crate::NodeId;

/// A dispatched document event.
#[derive(Clone, Debug)]
pub struct Event {
  pub name: String,
  pub target: NodeId,
}

pub type EventListener = Rc<dyn Fn(&Event)>;

#[derive(Default)]
pub(crate) struct ListenerStore {
  by_node: HashMap<NodeId, HashMap<String, Vec<EventListener>>>,
}

impl ListenerStore {
  pub(crate) fn add(&mut self, id: NodeId, event: &str, listener: EventListener) {
    self
      .by_node
      .entry(id)
      .or_default()
      .entry(event.to_string())
      .or_default()
      .push(listener);
  }

  pub(crate) fn remove(&mut self, id: NodeId, event: &str) {
    if let Some(events) = self.by_node.get_mut(&id) {
      events.remove(event);
    }
  }

  pub(crate) fn remove_node(&mut self, id: NodeId) { self.by_node.remove(&id); }

  pub(crate) fn get(&self, id: NodeId, event: &str) -> Vec<EventListener> {
    self
      .by_node
      .get(&id)
      .and_then(|events| events.get(event))
      .map(|ls| ls.to_vec())
      .unwrap_or_default()
  }
}
