use crate::rpc::Message;
use crate::types::NodeId;
use std::sync::Mutex;

/// Outbound RPC sink. `send` is fire-and-forget: the core never waits
/// synchronously for a response, and delivery may be lost, delayed, or
/// reordered by the implementation -- the protocol tolerates all three.
/// Implementations must be safe to call concurrently from multiple threads.
pub trait Connector: Send + Sync {
    fn send(&self, to: &NodeId, message: Message);
}

/// In-memory `Connector` used by tests and the in-process demo: captures
/// every message sent so a test can assert on exactly what went out, and
/// optionally forwards to a routing closure so a simulated cluster can
/// deliver messages between `NodeImpl`s in the same process.
#[derive(Default)]
pub struct RecordingConnector {
    sent: Mutex<Vec<(NodeId, Message)>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        RecordingConnector::default()
    }

    pub fn drain(&self) -> Vec<(NodeId, Message)> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Connector for RecordingConnector {
    fn send(&self, to: &NodeId, message: Message) {
        self.sent.lock().unwrap().push((to.clone(), message));
    }
}
