use crate::types::{NodeId, Term};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// State private to a follower. `last_heartbeat` is reset on every accepted
/// AppendEntries (including empty heartbeats) and drives the election
/// timeout. `election_timeout` is re-randomized each time a fresh follower
/// state is installed.
#[derive(Debug, Clone)]
pub struct FollowerState {
    pub last_leader_id: Option<NodeId>,
    pub last_heartbeat: Instant,
    pub election_timeout: Duration,
}

/// State private to a candidate during an in-progress election.
#[derive(Debug, Clone)]
pub struct CandidateState {
    pub votes_received: HashSet<NodeId>,
    pub election_start: Instant,
    pub election_timeout: Duration,
    /// Set once any peer has rejected our vote request in this term. A
    /// candidate that retries an election without having been rejected
    /// reuses the same term and its already-received votes instead of
    /// bumping the term again.
    pub some_rejected: bool,
}

impl CandidateState {
    /// Self-vote is implicit and always counted.
    pub fn votes_count(&self) -> usize {
        1 + self.votes_received.len()
    }
}

/// State private to a leader. Per-peer replication progress lives on
/// `NodeGroup`/`NodeState` instead, since it must survive a leader
/// continuing to be leader across many ticks.
#[derive(Debug, Clone, Default)]
pub struct LeaderState {
    pub election_term_start_index: Option<crate::types::LogIndex>,
}

/// Tagged role variant: exactly one is active at a time. Every transition
/// constructs a fresh value; the caller is responsible for cancelling the
/// outgoing role's timer before installing the new one (see `NodeImpl`).
#[derive(Debug, Clone)]
pub enum Role {
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

impl Role {
    pub fn new_follower(now: Instant, election_timeout: Duration) -> Self {
        Role::Follower(FollowerState {
            last_leader_id: None,
            last_heartbeat: now,
            election_timeout,
        })
    }

    pub fn tag(&self) -> RoleTag {
        match self {
            Role::Follower(_) => RoleTag::Follower,
            Role::Candidate(_) => RoleTag::Candidate,
            Role::Leader(_) => RoleTag::Leader,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoleTag {
    Follower,
    Candidate,
    Leader,
}

/// Snapshot returned by `NodeImpl::role_state` -- a point-in-time,
/// disconnected view suitable for metrics/diagnostics or test assertions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoleStateSnapshot {
    pub role: RoleTag,
    pub term: Term,
    pub voted_for: Option<NodeId>,
    pub leader_id: Option<NodeId>,
    pub votes_count: Option<usize>,
}
