use crate::types::{LogIndex, NodeEndpoint, NodeId};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

/// Final outcome of a membership-change task, returned through a
/// `TaskReference`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskResult {
    Ok,
    Timeout,
    Error(String),
    ReplicationFailed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupConfigChangeKind {
    AddNode,
    RemoveNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupConfigChangeState {
    Awaiting,
    CatchingUp,
    Replicating,
    Committed,
    TimedOut,
    Cancelled,
}

/// At most one of these is active on a node at a time (see
/// `GroupConfigChangeTaskHolder`). `target` identifies the node being added
/// or removed. `round*` fields are only meaningful for `AddNode`: they track
/// the new node's catch-up progress across `new_node_max_round` rounds of
/// `new_node_advance_timeout` each before the node is proposed as an
/// official voting member.
#[derive(Debug, Clone)]
pub struct GroupConfigChangeTask {
    pub kind: GroupConfigChangeKind,
    pub target_endpoint: Option<NodeEndpoint>,
    pub target_id: NodeId,
    pub state: GroupConfigChangeState,
    pub round: u32,
    pub round_deadline: Option<Instant>,
    pub round_target_index: LogIndex,
}

impl GroupConfigChangeTask {
    pub fn add(endpoint: NodeEndpoint) -> Self {
        GroupConfigChangeTask {
            target_id: endpoint.id.clone(),
            target_endpoint: Some(endpoint),
            kind: GroupConfigChangeKind::AddNode,
            state: GroupConfigChangeState::Awaiting,
            round: 0,
            round_deadline: None,
            round_target_index: 0,
        }
    }

    pub fn remove(target_id: NodeId) -> Self {
        GroupConfigChangeTask {
            target_id,
            target_endpoint: None,
            kind: GroupConfigChangeKind::RemoveNode,
            state: GroupConfigChangeState::Awaiting,
            round: 0,
            round_deadline: None,
            round_target_index: 0,
        }
    }
}

/// Handle returned by `addNode`/`removeNode`. Cloning the receiver out is not
/// possible (a membership result is delivered to exactly one waiter), so
/// `get_result` consumes `self`.
pub struct TaskReference {
    receiver: oneshot::Receiver<TaskResult>,
}

impl TaskReference {
    pub fn new(receiver: oneshot::Receiver<TaskResult>) -> Self {
        TaskReference { receiver }
    }

    /// Awaits the task's outcome, or `TaskResult::Timeout` if `timeout_ms`
    /// elapses first. Note this is a *caller-side* timeout distinct from the
    /// task's own `previous_group_config_change_timeout`/
    /// `new_node_advance_timeout` deadlines, which can independently resolve
    /// the task with `TaskResult::Timeout` before this one ever fires.
    pub async fn get_result(self, timeout_ms: u64) -> TaskResult {
        match timeout(Duration::from_millis(timeout_ms), self.receiver).await {
            Ok(Ok(result)) => result,
            // Sender dropped without resolving (e.g. node shut down).
            Ok(Err(_)) => TaskResult::Error("task dropped without a result".into()),
            Err(_) => TaskResult::Timeout,
        }
    }
}

/// Owns the at-most-one in-flight membership change: the task's own state,
/// the sender half used to resolve its `TaskReference`, and a cancellation
/// flag the next `cancelGroupConfigChangeTask` call will trip.
#[derive(Default)]
pub struct GroupConfigChangeTaskHolder {
    active: Option<(GroupConfigChangeTask, oneshot::Sender<TaskResult>)>,
}

impl GroupConfigChangeTaskHolder {
    pub fn new() -> Self {
        GroupConfigChangeTaskHolder::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<&GroupConfigChangeTask> {
        self.active.as_ref().map(|(t, _)| t)
    }

    pub fn current_mut(&mut self) -> Option<&mut GroupConfigChangeTask> {
        self.active.as_mut().map(|(t, _)| t)
    }

    /// Installs a new task, returning the `TaskReference` the public API
    /// hands back to the caller. Panics if a task is already active -- the
    /// core must always await-or-timeout the prior task first (§4.7).
    pub fn start(&mut self, task: GroupConfigChangeTask) -> TaskReference {
        assert!(self.active.is_none(), "a membership change is already active");
        let (sender, receiver) = oneshot::channel();
        self.active = Some((task, sender));
        TaskReference::new(receiver)
    }

    /// Resolves and clears the active task, if any.
    pub fn resolve(&mut self, result: TaskResult) {
        if let Some((_, sender)) = self.active.take() {
            let _ = sender.send(result);
        }
    }

    pub fn cancel(&mut self) {
        self.resolve(TaskResult::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::endpoint;

    #[tokio::test]
    async fn resolved_task_delivers_result_to_reference() {
        let mut holder = GroupConfigChangeTaskHolder::new();
        let task_ref = holder.start(GroupConfigChangeTask::add(endpoint("d", "127.0.0.1", 9000)));
        holder.resolve(TaskResult::Ok);
        assert_eq!(task_ref.get_result(1_000).await, TaskResult::Ok);
    }

    #[tokio::test]
    async fn unresolved_task_times_out() {
        let mut holder = GroupConfigChangeTaskHolder::new();
        let task_ref = holder.start(GroupConfigChangeTask::remove(NodeId::new("t")));
        assert_eq!(task_ref.get_result(10).await, TaskResult::Timeout);
    }

    #[test]
    #[should_panic]
    fn starting_a_second_task_while_one_is_active_panics() {
        let mut holder = GroupConfigChangeTaskHolder::new();
        let _first = holder.start(GroupConfigChangeTask::remove(NodeId::new("t")));
        let _second = holder.start(GroupConfigChangeTask::remove(NodeId::new("u")));
    }
}
