use crate::types::{NodeId, Term};
use std::sync::Mutex;

/// The durable `(currentTerm, votedFor)` cell. Both fields are written
/// atomically together -- an implementation must never let a reader observe
/// a torn write -- and the write must complete before the core emits any RPC
/// that reflects the new term or vote. Called only from the main executor,
/// so implementations do not need to be reentrant, only safe to read
/// concurrently from other threads.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersistentState {
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
}

pub trait NodeStore: Send + Sync {
    /// Loads the persisted state, or the zero value if nothing was ever
    /// written (a brand new node).
    fn load(&self) -> Result<PersistentState, String>;

    /// Atomically replaces the persisted state. Must be durable before it
    /// returns: the core relies on this to order persistence before the
    /// corresponding RPC send. A failure here is fatal to the node.
    fn save(&self, state: &PersistentState) -> Result<(), String>;
}

/// In-memory `NodeStore` for tests and the demo binary. Not durable across
/// process restarts -- a real deployment must back this with a disk write.
#[derive(Default)]
pub struct InMemoryNodeStore {
    state: Mutex<PersistentState>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        InMemoryNodeStore::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn load(&self) -> Result<PersistentState, String> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn save(&self, state: &PersistentState) -> Result<(), String> {
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let store = InMemoryNodeStore::new();
        let state = PersistentState {
            current_term: 7,
            voted_for: Some(NodeId::new("b")),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }
}
