use crate::types::{LogIndex, NodeEndpoint, NodeId};
use std::collections::HashMap;
use std::time::Instant;

/// Per-peer replication bookkeeping the leader maintains while driving
/// AppendEntries/InstallSnapshot for a single member.
#[derive(Debug, Clone)]
pub struct ReplicatingState {
    /// Index of the next entry to send to this peer.
    pub next_index: LogIndex,
    /// Highest index this peer is known to have durably replicated.
    pub match_index: LogIndex,
    /// True while an AppendEntries/InstallSnapshot is considered in-flight
    /// to this peer (used to throttle re-sends to `min_replication_interval`).
    pub replicating: bool,
    /// When the last request was sent to this peer.
    pub last_replicated_at: Option<Instant>,
    /// Counts catch-up rounds for a node being added; unused once the peer
    /// is major.
    pub round: u32,
    /// Byte offset of the next InstallSnapshot chunk to send, when a
    /// snapshot transfer to this peer is in progress.
    pub snapshot_offset: u64,
}

impl ReplicatingState {
    pub fn new(next_index: LogIndex) -> Self {
        ReplicatingState {
            next_index: next_index.max(1),
            match_index: 0,
            replicating: false,
            last_replicated_at: None,
            round: 0,
            snapshot_offset: 0,
        }
    }
}

/// A single known member of the group, voting or not.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub endpoint: NodeEndpoint,
    /// Counted towards quorum when true.
    pub major: bool,
    /// Set once a `RemoveNode` entry targeting this peer has been appended
    /// (but not necessarily committed).
    pub removing: bool,
    pub replicating: ReplicatingState,
}

/// Membership of the cluster as currently known to this node: a map from
/// `NodeId` to `NodeState`. `self` is always present while this node has not
/// been removed from the group.
#[derive(Debug, Clone, Default)]
pub struct NodeGroup {
    members: HashMap<NodeId, NodeState>,
}

impl NodeGroup {
    pub fn new() -> Self {
        NodeGroup {
            members: HashMap::new(),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeState> {
        self.members.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut NodeState> {
        self.members.get_mut(id)
    }

    pub fn insert(&mut self, id: NodeId, state: NodeState) {
        self.members.insert(id, state);
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<NodeState> {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.contains_key(id)
    }

    /// All known members, both major and non-major.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeState)> {
        self.members.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut NodeState)> {
        self.members.iter_mut()
    }

    /// Ids of every voting (major) member, including `self` if it is one.
    pub fn major_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.members
            .iter()
            .filter(|(_, s)| s.major)
            .map(|(id, _)| id)
    }

    pub fn count_of_major(&self) -> usize {
        self.members.values().filter(|s| s.major).count()
    }

    /// `ceil(major/2) + 1`, i.e. strictly more than half the voting members.
    pub fn majority_size(&self) -> usize {
        self.count_of_major() / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str) -> NodeEndpoint {
        NodeEndpoint {
            id: NodeId::new(id),
            host: "127.0.0.1".into(),
            port: 0,
        }
    }

    #[test]
    fn majority_size_matches_raft_quorum_formula() {
        let mut group = NodeGroup::new();
        for id in ["a", "b", "c"] {
            group.insert(
                NodeId::new(id),
                NodeState {
                    endpoint: endpoint(id),
                    major: true,
                    removing: false,
                    replicating: ReplicatingState::new(1),
                },
            );
        }
        assert_eq!(group.majority_size(), 2);

        group.insert(
            NodeId::new("d"),
            NodeState {
                endpoint: endpoint("d"),
                major: true,
                removing: false,
                replicating: ReplicatingState::new(1),
            },
        );
        assert_eq!(group.majority_size(), 3);
    }

    #[test]
    fn non_major_peers_do_not_count_towards_quorum() {
        let mut group = NodeGroup::new();
        group.insert(
            NodeId::new("a"),
            NodeState {
                endpoint: endpoint("a"),
                major: true,
                removing: false,
                replicating: ReplicatingState::new(1),
            },
        );
        group.insert(
            NodeId::new("catching-up"),
            NodeState {
                endpoint: endpoint("catching-up"),
                major: false,
                removing: false,
                replicating: ReplicatingState::new(1),
            },
        );
        assert_eq!(group.count_of_major(), 1);
        assert_eq!(group.majority_size(), 1);
    }
}
