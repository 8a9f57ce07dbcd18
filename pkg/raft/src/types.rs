use std::fmt;

/// Opaque identifier for a cluster member. Compared by value; the wire format
/// is a short string rather than a numeric id so that nodes can be named
/// without a central id-allocation authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_owned())
    }
}

/// Address at which a peer can be reached. `id` is globally unique within a
/// cluster; `host`/`port` are only used by the `Connector` implementation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeEndpoint {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

/// Monotonically non-decreasing election term. Never regresses once
/// persisted in the `NodeStore`.
pub type Term = u64;

/// 1-based index into the replicated log. Index 0 means "before the first
/// entry" and is used as the sentinel `prevLogIndex` for an empty log.
pub type LogIndex = u64;
