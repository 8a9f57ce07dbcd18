use crate::types::{LogIndex, NodeEndpoint, NodeId, Term};
use std::collections::HashSet;

/// The member set an entry's membership change was proposed against. Carried
/// on `AddNode`/`RemoveNode` entries so that a `GroupConfigEntryBatchRemoved`
/// event can revert to exactly the set that was current before the change,
/// per the log-matching truncation rule in the core.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PreChangeMembers(pub HashSet<NodeId>);

/// The payload carried by a single log entry. `AddNode`/`RemoveNode` are the
/// only entry kinds that are also `GroupConfigEntry`s.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EntryData {
    /// Placeholder appended by a new leader so that a current-term quorum
    /// can safely commit entries left over from prior terms.
    NoOp,

    /// Opaque client payload, applied to the embedder's state machine once
    /// committed.
    General(Vec<u8>),

    /// Adds `endpoint` to the group as a new member once committed.
    AddNode {
        endpoint: NodeEndpoint,
        pre_change_members: PreChangeMembers,
    },

    /// Removes `node_id` from the group once committed.
    RemoveNode {
        node_id: NodeId,
        pre_change_members: PreChangeMembers,
    },
}

impl EntryData {
    /// Whether this entry is a `GroupConfigEntry` per the data model: at most
    /// one uncommitted entry of this kind may exist at a time.
    pub fn is_group_config_entry(&self) -> bool {
        matches!(self, EntryData::AddNode { .. } | EntryData::RemoveNode { .. })
    }
}

/// A single position in the replicated log. `(index, term)` uniquely
/// identifies an entry; indices are contiguous starting at the log's first
/// index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub index: LogIndex,
    pub term: Term,
    pub data: EntryData,
}

/// A `(index, term)` pair used to identify a specific log position, e.g. the
/// position a membership change proposal landed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LogPosition {
    pub index: LogIndex,
    pub term: Term,
}
