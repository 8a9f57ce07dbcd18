use crate::config::RaftConfig;
use crate::connector::Connector;
use crate::entry::{EntryData, LogEntry, LogPosition, PreChangeMembers};
use crate::error::{RaftError, RaftResult};
use crate::executor::TaskExecutor;
use crate::group::{NodeGroup, NodeState, ReplicatingState};
use crate::log::Log;
use crate::role::{CandidateState, FollowerState, LeaderState, Role, RoleStateSnapshot, RoleTag};
use crate::rpc::{
    AppendEntriesRequest, AppendEntriesResult, InstallSnapshotRequest, InstallSnapshotResult,
    Message, RequestVoteRequest, RequestVoteResult,
};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::store::{NodeStore, PersistentState};
use crate::task::{
    GroupConfigChangeKind, GroupConfigChangeState, GroupConfigChangeTask,
    GroupConfigChangeTaskHolder, TaskReference, TaskResult,
};
use crate::types::{LogIndex, NodeEndpoint, NodeId, Term};

use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

fn random_election_timeout(config: &RaftConfig) -> Duration {
    let min = config.election_timeout_min.as_millis() as u64;
    let max = config.election_timeout_max.as_millis() as u64;
    let span = max.saturating_sub(min).max(1);
    Duration::from_millis(min + rand::thread_rng().gen_range(0..=span))
}

/// Everything the engine needs to decide what to do, guarded by a single
/// mutex. `NodeImpl`'s public methods never hold this lock across an await
/// point -- they submit a closure to the `TaskExecutor` and wait on a
/// `oneshot` for the result instead, so the lock is only ever held by code
/// running serially through the executor.
struct NodeCore {
    id: NodeId,
    current_term: Term,
    voted_for: Option<NodeId>,
    role: Role,
    group: NodeGroup,
    log: Arc<dyn Log>,
    store: Arc<dyn NodeStore>,
    connector: Arc<dyn Connector>,
    config: RaftConfig,
    config_change: GroupConfigChangeTaskHolder,
    rpc_message_id_seq: u64,
}

impl NodeCore {
    fn new(
        id: NodeId,
        initial_members: Vec<NodeEndpoint>,
        config: RaftConfig,
        persisted: PersistentState,
        log: Arc<dyn Log>,
        store: Arc<dyn NodeStore>,
        connector: Arc<dyn Connector>,
        now: Instant,
    ) -> Self {
        let mut group = NodeGroup::new();
        let next_index = log.last_index() + 1;
        for endpoint in initial_members {
            let member_id = endpoint.id.clone();
            group.insert(
                member_id,
                NodeState {
                    endpoint,
                    major: true,
                    removing: false,
                    replicating: ReplicatingState::new(next_index),
                },
            );
        }

        // Unless we cast a vote, persisting the term isn't strictly required:
        // if the log holds a newer term than our metadata, we can infer we
        // never cast a meaningful vote during it.
        let mut current_term = persisted.current_term;
        let mut voted_for = persisted.voted_for;
        let last_log_term = log.term_at(log.last_index()).unwrap_or(0);
        if last_log_term > current_term {
            current_term = last_log_term;
            voted_for = None;
        }

        let mut core = NodeCore {
            id,
            current_term,
            voted_for,
            role: Role::new_follower(now, random_election_timeout(&config)),
            group,
            log,
            store,
            connector,
            config,
            config_change: GroupConfigChangeTaskHolder::new(),
            rpc_message_id_seq: 0,
        };

        // Replay any group config entries already in the log so that a
        // restarted node recovers the membership view it had before.
        let commit_index = core.log.commit_index();
        let last_index = core.log.last_index();
        for i in 1..=last_index {
            if let Some(entry) = core.log.entry(i) {
                if entry.data.is_group_config_entry() {
                    core.apply_group_config_entry(&entry);
                    if i <= commit_index {
                        core.finalize_group_config_entry(&entry, now);
                    }
                }
            }
        }

        core
    }

    fn persist(&self) -> RaftResult<()> {
        self.store
            .save(&PersistentState {
                current_term: self.current_term,
                voted_for: self.voted_for.clone(),
            })
            .map_err(RaftError::Store)
    }

    /// A term bump or vote cast that isn't durable must not be allowed to
    /// stand: logs the failure and aborts rather than let the in-memory
    /// role state run ahead of what's on disk.
    fn persist_or_abort(&self) {
        if let Err(e) = self.persist() {
            tracing::error!(error = %e, "failed to persist term/vote state");
            panic!("raft persistent store failure: {e}");
        }
    }

    fn majority_size(&self) -> usize {
        self.group.majority_size()
    }

    fn can_be_leader(&self) -> bool {
        self.log.last_index() >= self.log.commit_index()
    }

    /// Run on every observed term from a remote request or response. A
    /// higher term always wins and demotes us to a follower.
    fn observe_term(&mut self, term: Term, now: Instant) {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.persist_or_abort();
            self.become_follower(now);
        }
    }

    fn become_follower(&mut self, now: Instant) {
        if self.config_change.is_active() {
            self.config_change.resolve(TaskResult::Error(
                "leadership was lost while the membership change was in flight".into(),
            ));
        }
        self.role = Role::new_follower(now, random_election_timeout(&self.config));
    }

    fn start_election(&mut self, now: Instant) {
        if !self.can_be_leader() {
            // Our log doesn't cover everything we've already committed; we
            // can never safely win an election until it does.
            self.role = Role::new_follower(now, random_election_timeout(&self.config));
            return;
        }

        let must_increment = match &self.role {
            Role::Candidate(s) => s.some_rejected,
            _ => true,
        };
        if must_increment {
            self.current_term += 1;
            self.voted_for = Some(self.id.clone());
            self.persist_or_abort();
        }

        info!(term = self.current_term, "starting election");
        self.role = Role::Candidate(CandidateState {
            votes_received: HashSet::new(),
            election_start: now,
            election_timeout: random_election_timeout(&self.config),
            some_rejected: false,
        });
        self.perform_election();
    }

    fn perform_election(&mut self) {
        let last_index = self.log.last_index();
        let last_term = self.log.term_at(last_index).unwrap_or(0);
        let req = RequestVoteRequest {
            term: self.current_term,
            candidate_id: self.id.clone(),
            last_log_index: last_index,
            last_log_term: last_term,
        };
        let ids: Vec<NodeId> = self
            .group
            .major_ids()
            .filter(|id| **id != self.id)
            .cloned()
            .collect();
        for id in ids {
            self.connector.send(&id, Message::RequestVote(req.clone()));
        }
    }

    fn become_leader(&mut self, now: Instant) {
        let last_index = self.log.last_index();
        let peer_ids: Vec<NodeId> = self
            .group
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| *id != self.id)
            .collect();
        for id in peer_ids {
            if let Some(state) = self.group.get_mut(&id) {
                state.replicating = ReplicatingState::new(last_index + 1);
            }
        }
        self.role = Role::Leader(LeaderState {
            election_term_start_index: Some(last_index + 1),
        });
        info!("became leader");

        // We may be starting our term with uncommitted entries left over
        // from a previous one; a no-op lets the current-term quorum commit
        // them (entries can only be committed by counting replicas in the
        // leader's own term).
        if self.log.commit_index() < last_index {
            if let Err(e) = self.propose_entry(EntryData::NoOp) {
                warn!(error = %e, "failed to propose noop on becoming leader");
            }
        }
    }

    fn propose_entry(&mut self, data: EntryData) -> RaftResult<LogPosition> {
        match &self.role {
            Role::Leader(_) => {}
            Role::Follower(s) => {
                return Err(RaftError::NotLeader {
                    leader_hint: s.last_leader_id.clone().or_else(|| self.voted_for.clone()),
                })
            }
            Role::Candidate(_) => return Err(RaftError::NotLeader { leader_hint: None }),
        }

        let index = self.log.last_index() + 1;
        let term = self.current_term;
        let entry = LogEntry {
            index,
            term,
            data,
        };
        if entry.data.is_group_config_entry() {
            self.apply_group_config_entry(&entry);
        }
        self.log.append(vec![entry]);
        Ok(LogPosition { index, term })
    }

    /// Optimistically applies an uncommitted group config entry as soon as
    /// it lands in the log, on both the leader (via `propose_entry`) and a
    /// follower (via `append_entries`). Idempotent: safe to call again for
    /// an entry whose effect is already reflected in `group`.
    fn apply_group_config_entry(&mut self, entry: &LogEntry) {
        match &entry.data {
            EntryData::AddNode { endpoint, .. } => {
                if !self.group.contains(&endpoint.id) {
                    let next_index = self.log.last_index() + 1;
                    self.group.insert(
                        endpoint.id.clone(),
                        NodeState {
                            endpoint: endpoint.clone(),
                            major: false,
                            removing: false,
                            replicating: ReplicatingState::new(next_index),
                        },
                    );
                }
            }
            EntryData::RemoveNode { node_id, .. } => {
                if let Some(s) = self.group.get_mut(node_id) {
                    s.removing = true;
                }
            }
            _ => {}
        }
    }

    /// Finalizes a group config entry once it reaches the commit index: an
    /// added node becomes a voting member, a removed node is dropped.
    fn finalize_group_config_entry(&mut self, entry: &LogEntry, now: Instant) {
        match &entry.data {
            EntryData::AddNode { endpoint, .. } => {
                if let Some(s) = self.group.get_mut(&endpoint.id) {
                    s.major = true;
                }
            }
            EntryData::RemoveNode { node_id, .. } => {
                self.group.remove(node_id);
                if let Some(task) = self.config_change.current() {
                    if task.kind == GroupConfigChangeKind::RemoveNode && &task.target_id == node_id
                    {
                        self.config_change.resolve(TaskResult::Ok);
                    }
                }
                if node_id == &self.id {
                    // We just removed ourselves from the group; `cycle`
                    // will now early-return forever without this, so we'd
                    // otherwise be stuck reporting ourselves as leader.
                    self.role = Role::new_follower(now, random_election_timeout(&self.config));
                }
            }
            _ => {}
        }
    }

    /// Reverts the optimistic effect of any group config entries at or
    /// after `from_index` right before they are truncated from the log, per
    /// the log-matching conflict rule.
    fn revert_uncommitted_group_config_from(&mut self, from_index: LogIndex) {
        let last = self.log.last_index();
        for i in from_index..=last {
            if let Some(entry) = self.log.entry(i) {
                match &entry.data {
                    EntryData::AddNode { endpoint, .. } => {
                        self.group.remove(&endpoint.id);
                    }
                    EntryData::RemoveNode { node_id, .. } => {
                        if let Some(s) = self.group.get_mut(node_id) {
                            s.removing = false;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn update_committed(&mut self, index: LogIndex, now: Instant) {
        self.log.advance_commit_index(index);
        let commit_index = index;
        // Any group config entry that just crossed the commit index is
        // finalized now; entries are scanned rather than tracked
        // incrementally since config changes are rare relative to ticks.
        let prior_commit = commit_index.saturating_sub(1);
        for i in (prior_commit + 1)..=commit_index {
            if let Some(entry) = self.log.entry(i) {
                if entry.data.is_group_config_entry() {
                    self.finalize_group_config_entry(&entry, now);
                }
            }
        }
    }

    /// On the leader, the highest index for which a majority of voting
    /// members have durably replicated an entry in the current term, if any
    /// such index exists beyond the current commit index.
    fn find_next_commit_index(&self) -> Option<LogIndex> {
        let majority = self.majority_size();
        let mut ci = self.log.last_index();
        while ci > self.log.commit_index() {
            let term = match self.log.term_at(ci) {
                Some(t) => t,
                None => break,
            };
            if term < self.current_term {
                break;
            }
            if term == self.current_term {
                let mut count = 1; // ourselves
                for (id, state) in self.group.iter() {
                    if *id == self.id || !state.major {
                        continue;
                    }
                    if state.replicating.match_index >= ci {
                        count += 1;
                    }
                }
                if count >= majority {
                    return Some(ci);
                }
            }
            ci -= 1;
        }
        None
    }

    fn replicate_entries(&mut self, now: Instant) -> Duration {
        let leader_id = self.id.clone();
        let term = self.current_term;
        let leader_commit = self.log.commit_index();
        let last_log_index = self.log.last_index();
        let min_interval = self.config.min_replication_interval;
        let replication_interval = self.config.replication_interval;
        let mut next_heartbeat = replication_interval;

        let ids: Vec<NodeId> = self
            .group
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| *id != leader_id)
            .collect();

        for id in ids {
            let (next_index, snapshot_offset, is_fresh, last_sent, in_flight) = {
                let s = match self.group.get(&id) {
                    Some(s) => s,
                    None => continue,
                };
                (
                    s.replicating.next_index,
                    s.replicating.snapshot_offset,
                    s.replicating.match_index >= last_log_index,
                    s.replicating.last_replicated_at,
                    s.replicating.replicating,
                )
            };

            if in_flight {
                // A peer still marked in-flight is only skipped while inside
                // minReplicationInterval of its last send; past that we force
                // a re-send rather than wait forever for a response that a
                // fire-and-forget Connector never guarantees will arrive.
                let stale = match last_sent {
                    Some(sent) => now.duration_since(sent) >= min_interval,
                    None => true,
                };
                if !stale {
                    if let Some(sent) = last_sent {
                        let remaining = min_interval - now.duration_since(sent);
                        if remaining < next_heartbeat {
                            next_heartbeat = remaining;
                        }
                    }
                    continue;
                }
            } else {
                let due_interval = if is_fresh {
                    replication_interval
                } else {
                    min_interval
                };
                if let Some(sent) = last_sent {
                    let elapsed = now.duration_since(sent);
                    if elapsed < due_interval {
                        let remaining = due_interval - elapsed;
                        if remaining < next_heartbeat {
                            next_heartbeat = remaining;
                        }
                        continue;
                    }
                }
            }

            if next_index < self.log.first_index() {
                if let Some((data, done)) = self.log.snapshot_chunk(snapshot_offset) {
                    let last_included_index = self.log.first_index().saturating_sub(1);
                    let last_included_term =
                        self.log.term_at(last_included_index).unwrap_or(0);
                    self.connector.send(
                        &id,
                        Message::InstallSnapshot(InstallSnapshotRequest {
                            term,
                            leader_id: leader_id.clone(),
                            last_included_index,
                            last_included_term,
                            offset: snapshot_offset,
                            data,
                            done,
                        }),
                    );
                }
            } else {
                let prev_log_index = next_index - 1;
                let prev_log_term = self.log.term_at(prev_log_index).unwrap_or(0);
                let entries: Vec<LogEntry> = ((prev_log_index + 1)..=last_log_index)
                    .filter_map(|i| self.log.entry(i))
                    .collect();
                self.rpc_message_id_seq += 1;
                self.connector.send(
                    &id,
                    Message::AppendEntries(AppendEntriesRequest {
                        rpc_message_id: self.rpc_message_id_seq,
                        term,
                        leader_id: leader_id.clone(),
                        prev_log_index,
                        prev_log_term,
                        entries,
                        leader_commit,
                    }),
                );
            }

            if let Some(state) = self.group.get_mut(&id) {
                state.replicating.replicating = true;
                state.replicating.last_replicated_at = Some(now);
            }
        }

        next_heartbeat
    }

    fn advance_add_node(&mut self, now: Instant) {
        let target_id = match self.config_change.current() {
            Some(t) => t.target_id.clone(),
            None => return,
        };

        let major = self.group.get(&target_id).map(|s| s.major).unwrap_or(false);
        if major {
            self.config_change.resolve(TaskResult::Ok);
            return;
        }
        if !self.group.contains(&target_id) {
            self.config_change.resolve(TaskResult::Error(
                "catching-up node was removed from the group".into(),
            ));
            return;
        }

        let max_round = self.config.new_node_max_round;
        let round_timeout = self.config.new_node_advance_timeout;
        let last_index = self.log.last_index();

        let task = match self.config_change.current_mut() {
            Some(t) => t,
            None => {
                debug_assert!(false, "advance_add_node: task vanished while still active");
                return;
            }
        };
        if task.round_deadline.is_none() {
            task.round_deadline = Some(now + round_timeout);
            task.round_target_index = last_index;
        }
        let deadline = match task.round_deadline {
            Some(d) => d,
            None => unreachable!("round_deadline was just set above if it was empty"),
        };
        let round_target = task.round_target_index;

        let match_index = self
            .group
            .get(&target_id)
            .map(|s| s.replicating.match_index)
            .unwrap_or(0);

        if match_index >= round_target {
            let endpoint = match self.group.get(&target_id) {
                Some(s) => s.endpoint.clone(),
                None => {
                    debug_assert!(false, "target node disappeared from the group");
                    self.config_change.resolve(TaskResult::Error(
                        "catching-up node was removed from the group".into(),
                    ));
                    return;
                }
            };
            let pre_change_members = PreChangeMembers(self.group.major_ids().cloned().collect());
            match self.propose_entry(EntryData::AddNode {
                endpoint,
                pre_change_members,
            }) {
                Ok(_) => {
                    if let Some(task) = self.config_change.current_mut() {
                        task.state = GroupConfigChangeState::Replicating;
                    }
                }
                Err(e) => self.config_change.resolve(TaskResult::Error(e.to_string())),
            }
            return;
        }

        if now >= deadline {
            let new_round = {
                let task = match self.config_change.current_mut() {
                    Some(t) => t,
                    None => {
                        debug_assert!(false, "advance_add_node: task vanished while still active");
                        return;
                    }
                };
                task.round += 1;
                task.round
            };
            if new_round >= max_round {
                self.group.remove(&target_id);
                self.config_change.resolve(TaskResult::ReplicationFailed);
            } else {
                let last_index = self.log.last_index();
                let task = match self.config_change.current_mut() {
                    Some(t) => t,
                    None => {
                        debug_assert!(false, "advance_add_node: task vanished while still active");
                        return;
                    }
                };
                task.round_deadline = Some(now + round_timeout);
                task.round_target_index = last_index;
                if let Some(state) = self.group.get_mut(&target_id) {
                    state.replicating.round = new_round;
                }
            }
        }
    }

    fn begin_group_config_change(
        &mut self,
        task: GroupConfigChangeTask,
    ) -> Result<TaskReference, TaskResult> {
        if !matches!(self.role, Role::Leader(_)) {
            return Err(TaskResult::Error("not the leader".into()));
        }

        match task.kind {
            GroupConfigChangeKind::AddNode => {
                let endpoint = match task.target_endpoint.clone() {
                    Some(e) => e,
                    None => {
                        debug_assert!(false, "an AddNode task always carries an endpoint");
                        return Err(TaskResult::Error(
                            "internal error: AddNode task missing its endpoint".into(),
                        ));
                    }
                };
                if self.group.contains(&endpoint.id) {
                    return Err(TaskResult::Error("node is already a member".into()));
                }
                let next_index = self.log.last_index() + 1;
                self.group.insert(
                    endpoint.id.clone(),
                    NodeState {
                        endpoint,
                        major: false,
                        removing: false,
                        replicating: ReplicatingState::new(next_index),
                    },
                );
            }
            GroupConfigChangeKind::RemoveNode => {
                let is_major = self
                    .group
                    .get(&task.target_id)
                    .map(|s| s.major)
                    .unwrap_or(false);
                if !is_major {
                    return Err(TaskResult::Error(
                        "node is not a current voting member".into(),
                    ));
                }
                let pre_change_members =
                    PreChangeMembers(self.group.major_ids().cloned().collect());
                self.propose_entry(EntryData::RemoveNode {
                    node_id: task.target_id.clone(),
                    pre_change_members,
                })
                .map_err(|e| TaskResult::Error(e.to_string()))?;
            }
        }

        Ok(self.config_change.start(task))
    }

    fn cycle_follower(&mut self, s: &FollowerState, now: Instant) -> Option<Duration> {
        if !self.can_be_leader() {
            self.role = Role::new_follower(now, random_election_timeout(&self.config));
            return Some(self.config.election_timeout_max);
        }
        let elapsed = now.duration_since(s.last_heartbeat);
        if self.group.count_of_major() == 1 || elapsed >= s.election_timeout {
            self.start_election(now);
            None
        } else {
            Some(s.election_timeout - elapsed)
        }
    }

    fn cycle_candidate(&mut self, s: &CandidateState, now: Instant) -> Option<Duration> {
        if s.votes_count() >= self.majority_size() {
            self.become_leader(now);
            None
        } else {
            let elapsed = now.duration_since(s.election_start);
            if elapsed >= s.election_timeout {
                self.start_election(now);
                None
            } else {
                Some(s.election_timeout - elapsed)
            }
        }
    }

    fn cycle_leader(&mut self, now: Instant) -> Duration {
        if let Some(ci) = self.find_next_commit_index() {
            self.update_committed(ci, now);
        }

        if self.config_change.current().map(|t| t.kind) == Some(GroupConfigChangeKind::AddNode) {
            self.advance_add_node(now);
        }

        let mut next = self.replicate_entries(now);
        if self.group.iter().count() == 1 {
            // No one to replicate to; no need to ever wake up quickly.
            next = Duration::from_secs(2);
        }
        next
    }

    /// Re-evaluates the current role and returns how long to wait before the
    /// next tick. Loops a bounded number of times so that a role transition
    /// (follower -> candidate -> leader in a single-node cluster, say) is
    /// reflected in the same call instead of needing an external re-drive.
    fn cycle(&mut self, now: Instant) -> Duration {
        for _ in 0..4 {
            if self.group.count_of_major() == 0
                || !self.group.get(&self.id).map(|s| s.major).unwrap_or(false)
                || self.config.standby
            {
                return Duration::from_secs(1);
            }

            let next = match self.role.clone() {
                Role::Follower(s) => self.cycle_follower(&s, now),
                Role::Candidate(s) => self.cycle_candidate(&s, now),
                Role::Leader(_) => return self.cycle_leader(now),
            };
            if let Some(d) = next {
                return d;
            }
        }
        debug!("cycle hit its iteration bound; deferring to the next tick");
        Duration::from_millis(50)
    }

    fn request_vote(&mut self, req: RequestVoteRequest, now: Instant) -> RequestVoteResult {
        self.observe_term(req.term, now);

        let granted = self.should_grant_vote(&req);
        if granted {
            if let Role::Follower(s) = &mut self.role {
                s.last_heartbeat = now;
            }
            self.voted_for = Some(req.candidate_id.clone());
            self.persist_or_abort();
        }
        RequestVoteResult {
            term: self.current_term,
            vote_granted: granted,
        }
    }

    fn should_grant_vote(&self, req: &RequestVoteRequest) -> bool {
        if req.term < self.current_term {
            return false;
        }
        let is_major = self
            .group
            .get(&req.candidate_id)
            .map(|s| s.major)
            .unwrap_or(false);
        if !is_major {
            return false;
        }
        let last_index = self.log.last_index();
        let last_term = self.log.term_at(last_index).unwrap_or(0);
        let up_to_date = req.last_log_term > last_term
            || (req.last_log_term == last_term && req.last_log_index >= last_index);
        if !up_to_date {
            return false;
        }
        if req.term > self.current_term {
            return true;
        }
        match &self.voted_for {
            Some(id) => *id == req.candidate_id,
            None => true,
        }
    }

    fn request_vote_result(&mut self, from_id: NodeId, resp: RequestVoteResult, now: Instant) {
        self.observe_term(resp.term, now);
        if self.current_term != resp.term || from_id == self.id {
            return;
        }
        if let Role::Candidate(s) = &mut self.role {
            if resp.vote_granted {
                s.votes_received.insert(from_id);
            } else {
                s.some_rejected = true;
            }
        }
    }

    fn append_entries(&mut self, req: AppendEntriesRequest, now: Instant) -> AppendEntriesResult {
        self.observe_term(req.term, now);
        if req.term == self.current_term && matches!(self.role, Role::Candidate(_)) {
            self.become_follower(now);
        }

        let current_term = self.current_term;
        let reject = |prev_log_index: LogIndex| AppendEntriesResult {
            rpc_message_id: req.rpc_message_id,
            term: current_term,
            success: false,
            prev_log_index,
            entry_count: 0,
        };

        if req.term < self.current_term {
            return reject(req.prev_log_index);
        }

        match &mut self.role {
            Role::Follower(s) => {
                s.last_heartbeat = now;
                s.last_leader_id = Some(req.leader_id.clone());
            }
            Role::Leader(_) => {
                if req.leader_id != self.id {
                    warn!("received append_entries from another leader in our own term");
                    return reject(req.prev_log_index);
                }
            }
            Role::Candidate(_) => {
                // Unreachable: the term==current_term case above always
                // demotes a candidate to follower first.
                return reject(req.prev_log_index);
            }
        }

        if req.prev_log_index + 1 < self.log.first_index() {
            return reject(req.prev_log_index);
        }

        match self.log.term_at(req.prev_log_index) {
            Some(term) if term == req.prev_log_term => {}
            Some(_) => return reject(self.log.commit_index()),
            None => return reject(self.log.last_index()),
        }

        let mut first_new = 0;
        for e in req.entries.iter() {
            match self.log.term_at(e.index) {
                Some(t) if t == e.term => first_new += 1,
                Some(_) => {
                    if self.log.commit_index() >= e.index {
                        warn!(index = e.index, "refusing to truncate a committed entry");
                        return reject(self.log.commit_index());
                    }
                    self.revert_uncommitted_group_config_from(e.index);
                    self.log.truncate_suffix(e.index);
                    break;
                }
                None => break,
            }
        }

        let new_entries = &req.entries[first_new..];
        if !new_entries.is_empty() {
            for e in new_entries {
                if e.data.is_group_config_entry() {
                    self.apply_group_config_entry(e);
                }
            }
            self.log.append(new_entries.to_vec());
        }

        let last_new = new_entries
            .last()
            .map(|e| e.index)
            .unwrap_or(req.prev_log_index);
        if req.leader_commit > self.log.commit_index() {
            let next_commit = req.leader_commit.min(last_new);
            if next_commit > self.log.commit_index() {
                self.update_committed(next_commit, now);
            }
        }

        AppendEntriesResult {
            rpc_message_id: req.rpc_message_id,
            term: self.current_term,
            success: true,
            prev_log_index: req.prev_log_index,
            entry_count: new_entries.len() as u64,
        }
    }

    fn append_entries_result(&mut self, from_id: NodeId, resp: AppendEntriesResult, now: Instant) {
        self.observe_term(resp.term, now);
        if !matches!(self.role, Role::Leader(_)) {
            return;
        }
        let is_removing = self.group.get(&from_id).map(|s| s.removing).unwrap_or(false);
        let last_log_index = self.log.last_index();
        let state = match self.group.get_mut(&from_id) {
            Some(s) => s,
            None => return,
        };
        if is_removing {
            // Once the RemoveNode entry commits this peer is dropped from
            // the group entirely; no point advancing its match_index now.
            state.replicating.replicating = false;
            return;
        }
        if resp.success {
            let replicated_through = resp.prev_log_index + resp.entry_count;
            if replicated_through > state.replicating.match_index {
                state.replicating.match_index = replicated_through;
                state.replicating.next_index = replicated_through + 1;
            }
            // Only stop treating this peer as in-flight once it has caught
            // up; otherwise the next tick still owes it the remaining
            // entries and must not wait out a full replication interval.
            if state.replicating.match_index >= last_log_index {
                state.replicating.replicating = false;
            }
        } else {
            // prev_log_index here is overloaded as a backoff hint (see the
            // failing branches of `append_entries`), not an echo.
            let hint = resp.prev_log_index + 1;
            if hint > 0 && hint < state.replicating.next_index {
                state.replicating.next_index = hint;
            } else if state.replicating.next_index > 1 {
                state.replicating.next_index -= 1;
            } else {
                // Already at the floor; no further backoff is possible, so
                // stop treating this peer as in-flight rather than spin.
                state.replicating.replicating = false;
            }
        }
    }

    fn install_snapshot(&mut self, req: InstallSnapshotRequest, now: Instant) -> InstallSnapshotResult {
        self.observe_term(req.term, now);
        if req.term < self.current_term {
            return InstallSnapshotResult {
                term: self.current_term,
                done: false,
            };
        }
        if let Role::Follower(s) = &mut self.role {
            s.last_heartbeat = now;
            s.last_leader_id = Some(req.leader_id.clone());
        }
        self.log.install_snapshot_chunk(
            req.last_included_index,
            req.last_included_term,
            req.offset,
            req.data,
            req.done,
        );
        InstallSnapshotResult {
            term: self.current_term,
            done: req.done,
        }
    }

    fn install_snapshot_result(&mut self, from_id: NodeId, resp: InstallSnapshotResult, now: Instant) {
        self.observe_term(resp.term, now);
        if !matches!(self.role, Role::Leader(_)) {
            return;
        }
        if let Some(state) = self.group.get_mut(&from_id) {
            state.replicating.replicating = false;
            if resp.done {
                state.replicating.snapshot_offset = 0;
                state.replicating.next_index = self.log.first_index();
            } else {
                state.replicating.snapshot_offset += 1;
            }
        }
    }

    fn handle_message(&mut self, from: NodeId, message: Message, now: Instant) {
        match message {
            Message::RequestVote(req) => {
                let resp = self.request_vote(req, now);
                self.connector.send(&from, Message::RequestVoteResult(resp));
            }
            Message::RequestVoteResult(resp) => self.request_vote_result(from, resp, now),
            Message::AppendEntries(req) => {
                let resp = self.append_entries(req, now);
                self.connector.send(&from, Message::AppendEntriesResult(resp));
            }
            Message::AppendEntriesResult(resp) => self.append_entries_result(from, resp, now),
            Message::InstallSnapshot(req) => {
                let resp = self.install_snapshot(req, now);
                self.connector
                    .send(&from, Message::InstallSnapshotResult(resp));
            }
            Message::InstallSnapshotResult(resp) => self.install_snapshot_result(from, resp, now),
        }
    }

    fn role_state(&self) -> RoleStateSnapshot {
        let (tag, votes_count, leader_id) = match &self.role {
            Role::Follower(s) => (RoleTag::Follower, None, s.last_leader_id.clone()),
            Role::Candidate(s) => (RoleTag::Candidate, Some(s.votes_count()), None),
            Role::Leader(_) => (RoleTag::Leader, None, Some(self.id.clone())),
        };
        RoleStateSnapshot {
            role: tag,
            term: self.current_term,
            voted_for: self.voted_for.clone(),
            leader_id,
            votes_count,
        }
    }
}

/// Shared state behind every clone of a `NodeImpl`: the mutex-protected
/// core, the collaborators needed to drive it from outside the lock
/// (scheduler/executor), the currently armed timer, and a notifier used to
/// wake up an `add_node`/`remove_node` call waiting on a prior task.
struct Shared {
    core: Mutex<NodeCore>,
    scheduler: Arc<dyn Scheduler>,
    executor: Arc<dyn TaskExecutor>,
    timer: Mutex<Option<Box<dyn TimerHandle>>>,
    config_change_notify: Notify,
}

fn run_core_job<F, R>(shared: &Arc<Shared>, f: F) -> R
where
    F: FnOnce(&mut NodeCore) -> R,
{
    let was_active;
    let result;
    {
        let mut core = shared.core.lock().unwrap();
        was_active = core.config_change.is_active();
        result = f(&mut core);
    }
    let now_active = shared.core.lock().unwrap().config_change.is_active();
    if was_active && !now_active {
        shared.config_change_notify.notify_waiters();
    }
    result
}

fn arm_timer(shared: &Arc<Shared>, after: Duration) {
    let mut guard = shared.timer.lock().unwrap();
    if let Some(old) = guard.take() {
        old.cancel();
    }
    let shared_for_timer = shared.clone();
    let handle = shared.scheduler.arm(
        after,
        Box::new(move || {
            let shared_for_job = shared_for_timer.clone();
            shared_for_timer.executor.submit(Box::new(move || {
                run_cycle(&shared_for_job);
            }));
        }),
    );
    *guard = Some(handle);
}

fn run_cycle(shared: &Arc<Shared>) {
    let now = Instant::now();
    let next = run_core_job(shared, |core| core.cycle(now));
    arm_timer(shared, next);
}

/// A single Raft group member. Cloning is cheap (an `Arc` bump) and every
/// clone refers to the same underlying engine -- useful for handing the
/// same node out to an in-process router and to the caller that started it.
#[derive(Clone)]
pub struct NodeImpl {
    shared: Arc<Shared>,
    id: NodeId,
}

impl NodeImpl {
    pub fn new(
        id: NodeId,
        initial_members: Vec<NodeEndpoint>,
        config: RaftConfig,
        store: Arc<dyn NodeStore>,
        log: Arc<dyn Log>,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
        executor: Arc<dyn TaskExecutor>,
    ) -> RaftResult<Self> {
        let persisted = store.load().map_err(RaftError::Store)?;
        let core = NodeCore::new(
            id.clone(),
            initial_members,
            config,
            persisted,
            log,
            store,
            connector,
            Instant::now(),
        );
        Ok(NodeImpl {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                scheduler,
                executor,
                timer: Mutex::new(None),
                config_change_notify: Notify::new(),
            }),
            id,
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Starts the node's internal clock. Idempotent only in the sense that
    /// calling it twice just re-runs a cycle; it does not guard against
    /// double-starting a node that's already running.
    pub fn start(&self) {
        let shared = self.shared.clone();
        self.shared.executor.submit(Box::new(move || {
            run_cycle(&shared);
        }));
    }

    /// Cancels the node's timer. In-flight executor jobs already submitted
    /// are still allowed to run; this only stops new ticks from being armed.
    pub fn stop(&self) {
        if let Some(timer) = self.shared.timer.lock().unwrap().take() {
            timer.cancel();
        }
    }

    /// Entry point for an inbound RPC from another node's `Connector`.
    /// Fire-and-forget, matching `Connector::send`'s own contract.
    pub fn handle_message(&self, from: NodeId, message: Message) {
        let shared = self.shared.clone();
        self.shared.executor.submit(Box::new(move || {
            let now = Instant::now();
            run_core_job(&shared, |core| core.handle_message(from, message, now));
            let next = run_core_job(&shared, |core| core.cycle(now));
            arm_timer(&shared, next);
        }));
    }

    pub async fn append_log(&self, data: Vec<u8>) -> RaftResult<LogPosition> {
        let shared = self.shared.clone();
        let (tx, rx) = oneshot::channel();
        self.shared.executor.submit(Box::new(move || {
            let result = run_core_job(&shared, |core| core.propose_entry(EntryData::General(data)));
            if result.is_ok() {
                let now = Instant::now();
                let next = run_core_job(&shared, |core| core.cycle(now));
                arm_timer(&shared, next);
            }
            let _ = tx.send(result);
        }));
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RaftError::NotReady),
        }
    }

    pub async fn add_node(&self, endpoint: NodeEndpoint) -> TaskResult {
        self.start_group_config_change(GroupConfigChangeTask::add(endpoint))
            .await
    }

    pub async fn remove_node(&self, node_id: NodeId) -> TaskResult {
        self.start_group_config_change(GroupConfigChangeTask::remove(node_id))
            .await
    }

    async fn start_group_config_change(&self, task: GroupConfigChangeTask) -> TaskResult {
        let previous_timeout = self.shared.core.lock().unwrap().config.previous_group_config_change_timeout;

        loop {
            let is_active = self.shared.core.lock().unwrap().config_change.is_active();
            if !is_active {
                break;
            }
            let waited = tokio::time::timeout(
                previous_timeout,
                self.shared.config_change_notify.notified(),
            )
            .await;
            if waited.is_err() {
                return TaskResult::Timeout;
            }
        }

        let shared = self.shared.clone();
        let (tx, rx) = oneshot::channel();
        self.shared.executor.submit(Box::new(move || {
            let outcome = {
                let mut core = shared.core.lock().unwrap();
                core.begin_group_config_change(task)
            };
            if outcome.is_ok() {
                let now = Instant::now();
                let next = run_core_job(&shared, |core| core.cycle(now));
                arm_timer(&shared, next);
            }
            let _ = tx.send(outcome);
        }));

        let task_ref = match rx.await {
            Ok(Ok(task_ref)) => task_ref,
            Ok(Err(result)) => return result,
            Err(_) => return TaskResult::Error("node shut down before starting the task".into()),
        };

        // A generous backstop; the task's own round/catch-up deadlines, or
        // the commit of its log entry, normally resolve it long before this.
        task_ref.get_result(3_600_000).await
    }

    pub fn cancel_group_config_change_task(&self) {
        let shared = self.shared.clone();
        self.shared.executor.submit(Box::new(move || {
            run_core_job(&shared, |core| core.config_change.cancel());
        }));
    }

    pub fn role_state(&self) -> RoleStateSnapshot {
        self.shared.core.lock().unwrap().role_state()
    }

    pub fn count_of_major(&self) -> usize {
        self.shared.core.lock().unwrap().group.count_of_major()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::RecordingConnector;
    use crate::executor::DirectTaskExecutor;
    use crate::log::{endpoint, member_set, InMemoryLog};
    use crate::scheduler::ManualScheduler;
    use crate::store::InMemoryNodeStore;
    use tokio::sync::mpsc;

    fn single_node(config: RaftConfig) -> NodeImpl {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        NodeImpl::new(
            NodeId::new("a"),
            vec![endpoint("a", "127.0.0.1", 9001)],
            config,
            Arc::new(InMemoryNodeStore::new()),
            Arc::new(InMemoryLog::new(events_tx)),
            Arc::new(RecordingConnector::new()),
            Arc::new(ManualScheduler::new()),
            Arc::new(DirectTaskExecutor::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_node_cluster_becomes_leader_immediately() {
        let node = single_node(RaftConfig::default());
        node.start();
        assert_eq!(node.role_state().role, RoleTag::Leader);
    }

    #[tokio::test]
    async fn single_node_leader_accepts_append_log() {
        let node = single_node(RaftConfig::default());
        node.start();
        let pos = node.append_log(b"hello".to_vec()).await.unwrap();
        // A fresh log has nothing uncommitted from a prior term, so no
        // startup noop is proposed and this is the first entry.
        assert_eq!(pos.index, 1);
    }

    #[tokio::test]
    async fn follower_grants_vote_to_up_to_date_candidate() {
        let mut config = RaftConfig::default();
        config.election_timeout_min = Duration::from_secs(3600);
        config.election_timeout_max = Duration::from_secs(3600);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let node = NodeImpl::new(
            NodeId::new("b"),
            vec![
                endpoint("a", "127.0.0.1", 9001),
                endpoint("b", "127.0.0.1", 9002),
            ],
            config,
            Arc::new(InMemoryNodeStore::new()),
            Arc::new(InMemoryLog::new(events_tx)),
            Arc::new(RecordingConnector::new()),
            Arc::new(ManualScheduler::new()),
            Arc::new(DirectTaskExecutor::new()),
        )
        .unwrap();
        node.start();

        node.handle_message(
            NodeId::new("a"),
            Message::RequestVote(RequestVoteRequest {
                term: 1,
                candidate_id: NodeId::new("a"),
                last_log_index: 0,
                last_log_term: 0,
            }),
        );

        let snapshot = node.role_state();
        assert_eq!(snapshot.voted_for, Some(NodeId::new("a")));
        let _ = member_set(&["a", "b"]);
    }

    #[tokio::test]
    async fn count_of_major_reflects_initial_membership() {
        let node = single_node(RaftConfig::default());
        assert_eq!(node.count_of_major(), 1);
    }

    fn build_node(
        id: &str,
        members: Vec<NodeEndpoint>,
        config: RaftConfig,
    ) -> (NodeImpl, Arc<RecordingConnector>, Arc<ManualScheduler>) {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(RecordingConnector::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let node = NodeImpl::new(
            NodeId::new(id),
            members,
            config,
            Arc::new(InMemoryNodeStore::new()),
            Arc::new(InMemoryLog::new(events_tx)),
            connector.clone(),
            scheduler.clone(),
            Arc::new(DirectTaskExecutor::new()),
        )
        .unwrap();
        (node, connector, scheduler)
    }

    /// A leader only needs votes from itself plus enough peers to reach
    /// majority; delivering a single peer's granted vote is enough in a
    /// three-member cluster.
    #[tokio::test]
    async fn three_node_cluster_elects_a_leader_on_timeout() {
        let members = vec![
            endpoint("a", "127.0.0.1", 9001),
            endpoint("b", "127.0.0.1", 9002),
            endpoint("c", "127.0.0.1", 9003),
        ];

        let mut fast_config = RaftConfig::default();
        fast_config.election_timeout_min = Duration::from_millis(5);
        fast_config.election_timeout_max = Duration::from_millis(8);

        let mut slow_config = RaftConfig::default();
        slow_config.election_timeout_min = Duration::from_secs(3600);
        slow_config.election_timeout_max = Duration::from_secs(3600);

        let (a, a_conn, a_sched) = build_node("a", members.clone(), fast_config);
        let (b, b_conn, _b_sched) = build_node("b", members.clone(), slow_config.clone());
        let (c, c_conn, _c_sched) = build_node("c", members, slow_config);

        a.start();
        b.start();
        c.start();
        assert_eq!(a.role_state().role, RoleTag::Follower);

        tokio::time::sleep(Duration::from_millis(20)).await;
        a_sched.fire_latest();
        assert_eq!(a.role_state().role, RoleTag::Candidate);

        for (to, message) in a_conn.drain() {
            if to == NodeId::new("b") {
                b.handle_message(NodeId::new("a"), message);
            } else if to == NodeId::new("c") {
                c.handle_message(NodeId::new("a"), message);
            }
        }

        // Only one peer's granted vote is needed to reach majority (2 of 3).
        let mut delivered = false;
        for (to, message) in b_conn.drain() {
            if to == NodeId::new("a") && !delivered {
                a.handle_message(NodeId::new("b"), message);
                delivered = true;
            }
        }
        let _ = c_conn.drain();

        assert_eq!(a.role_state().role, RoleTag::Leader);
    }

    /// Drives a leader's catch-up-round bookkeeping for a non-voting peer by
    /// hand-delivering AppendEntriesResult acks, then checks the node is
    /// promoted to a voting member once it reports having caught up.
    #[tokio::test]
    async fn added_node_becomes_major_after_catching_up() {
        let mut config = RaftConfig::default();
        config.new_node_max_round = 3;
        config.new_node_advance_timeout = Duration::from_secs(10);
        let (leader, conn, _sched) = build_node("a", vec![endpoint("a", "127.0.0.1", 9001)], config);
        leader.start();
        assert_eq!(leader.role_state().role, RoleTag::Leader);

        let new_peer = endpoint("d", "127.0.0.1", 9004);
        let task = tokio::spawn({
            let leader = leader.clone();
            async move { leader.add_node(new_peer).await }
        });

        // Let `begin_group_config_change` run and register the catching-up
        // peer; then give it a moment to enqueue a replication attempt.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let mut sent_to_d = Vec::new();
        for (to, message) in conn.drain() {
            if to == NodeId::new("d") {
                sent_to_d.push(message);
            }
        }
        assert!(!sent_to_d.is_empty(), "leader should have replicated to the catching-up peer");

        // Against a fresh log the round target is met instantly, so the
        // official AddNode entry was already proposed before this ack; the
        // ack itself just lets the leader observe its own single-node
        // majority and commit+finalize it in the same handle_message call.
        let last_index = leader.shared.core.lock().unwrap().log.last_index();
        leader.handle_message(
            NodeId::new("d"),
            Message::AppendEntriesResult(AppendEntriesResult {
                rpc_message_id: 0,
                term: leader.role_state().term,
                success: true,
                prev_log_index: last_index,
                entry_count: 0,
            }),
        );

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("task should resolve")
            .unwrap();
        assert_eq!(result, TaskResult::Ok);
        assert_eq!(leader.count_of_major(), 2);
    }

    /// RemoveNode resolves as soon as its log entry commits; with both
    /// members still major at propose time, the leader needs the target's
    /// ack before a majority is reached.
    #[tokio::test]
    async fn remove_node_resolves_once_committed() {
        let members = vec![
            endpoint("a", "127.0.0.1", 9001),
            endpoint("b", "127.0.0.1", 9002),
        ];
        let mut config = RaftConfig::default();
        config.election_timeout_min = Duration::from_millis(5);
        config.election_timeout_max = Duration::from_millis(8);
        let (leader, conn, sched) = build_node("a", members, config);
        leader.start();
        assert_eq!(leader.role_state().role, RoleTag::Follower);

        tokio::time::sleep(Duration::from_millis(20)).await;
        sched.fire_latest();
        assert_eq!(leader.role_state().role, RoleTag::Candidate);
        let election_term = leader.role_state().term;
        // No second node is actually running in this test; fabricate its
        // granted vote directly to reach majority (2 of 2).
        leader.handle_message(
            NodeId::new("b"),
            Message::RequestVoteResult(RequestVoteResult {
                term: election_term,
                vote_granted: true,
            }),
        );
        assert_eq!(leader.role_state().role, RoleTag::Leader);
        let _ = conn.drain();

        let task = tokio::spawn({
            let leader = leader.clone();
            async move { leader.remove_node(NodeId::new("b")).await }
        });
        tokio::task::yield_now().await;

        let last_index = leader.shared.core.lock().unwrap().log.last_index();
        leader.handle_message(
            NodeId::new("b"),
            Message::AppendEntriesResult(AppendEntriesResult {
                rpc_message_id: 0,
                term: leader.role_state().term,
                success: true,
                prev_log_index: last_index,
                entry_count: 0,
            }),
        );
        let _ = conn.drain();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("task should resolve")
            .unwrap();
        assert_eq!(result, TaskResult::Ok);
        assert_eq!(leader.count_of_major(), 1);
    }

    /// A vote request from a node that isn't a known major member must never
    /// be granted, even if its log looks up to date.
    #[tokio::test]
    async fn follower_rejects_vote_from_non_major_candidate() {
        let mut config = RaftConfig::default();
        config.election_timeout_min = Duration::from_secs(3600);
        config.election_timeout_max = Duration::from_secs(3600);
        let (node, _conn, _sched) = build_node(
            "b",
            vec![
                endpoint("a", "127.0.0.1", 9001),
                endpoint("b", "127.0.0.1", 9002),
            ],
            config,
        );
        node.start();

        node.handle_message(
            NodeId::new("z"),
            Message::RequestVote(RequestVoteRequest {
                term: 1,
                candidate_id: NodeId::new("z"),
                last_log_index: 0,
                last_log_term: 0,
            }),
        );

        assert_eq!(node.role_state().voted_for, None);
    }

    /// Matches the rejected-AppendEntries scenario: a failed probe must
    /// decrement nextIndex and leave matchIndex untouched, but must keep
    /// `replicating` set so the leader knows to retry rather than wait out a
    /// full replication interval.
    #[tokio::test]
    async fn failed_append_entries_result_keeps_replicating_and_backs_off() {
        let (leader, _conn, _sched) =
            build_node("a", vec![endpoint("a", "127.0.0.1", 9001)], RaftConfig::default());
        leader.start();
        assert_eq!(leader.role_state().role, RoleTag::Leader);

        // Drop "b" into the group directly as an already in-flight peer,
        // sidestepping the real add-node flow since this test only cares
        // about how a rejection is handled once replication is underway.
        {
            let mut core = leader.shared.core.lock().unwrap();
            core.group.insert(
                NodeId::new("b"),
                NodeState {
                    endpoint: endpoint("b", "127.0.0.1", 9002),
                    major: true,
                    removing: false,
                    replicating: ReplicatingState::new(2),
                },
            );
            if let Some(state) = core.group.get_mut(&NodeId::new("b")) {
                state.replicating.replicating = true;
            }
        }

        leader.handle_message(
            NodeId::new("b"),
            Message::AppendEntriesResult(AppendEntriesResult {
                rpc_message_id: 0,
                term: leader.role_state().term,
                success: false,
                prev_log_index: 0,
                entry_count: 0,
            }),
        );

        let core = leader.shared.core.lock().unwrap();
        let state = &core.group.get(&NodeId::new("b")).unwrap().replicating;
        assert_eq!(state.next_index, 1);
        assert_eq!(state.match_index, 0);
        assert!(
            state.replicating,
            "a rejected probe must stay in-flight so the next tick retries immediately"
        );
    }

    /// A node that removes itself from the group can no longer act as
    /// leader and must not keep reporting itself as one forever.
    #[tokio::test]
    async fn leader_steps_down_after_removing_itself() {
        let (leader, _conn, _sched) =
            build_node("a", vec![endpoint("a", "127.0.0.1", 9001)], RaftConfig::default());
        leader.start();
        assert_eq!(leader.role_state().role, RoleTag::Leader);

        let result = leader.remove_node(NodeId::new("a")).await;
        assert_eq!(result, TaskResult::Ok);
        assert_eq!(leader.role_state().role, RoleTag::Follower);
        assert_eq!(leader.count_of_major(), 0);
    }
}
