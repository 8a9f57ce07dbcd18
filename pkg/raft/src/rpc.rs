use crate::entry::LogEntry;
use crate::types::{LogIndex, NodeId, Term};
use bytes::Bytes;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RequestVoteRequest {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RequestVoteResult {
    pub term: Term,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AppendEntriesRequest {
    /// Identifies this request so the response can be matched back to the
    /// `ReplicatingState` it was sent for even under reordering or retries.
    pub rpc_message_id: u64,
    pub term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: LogIndex,
}

/// `rpc_message_id` echoes a value the leader attached to the request so
/// that the result can be matched back to the in-flight `ReplicatingState`
/// it belongs to even if requests to the same peer are reordered in-flight.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AppendEntriesResult {
    pub rpc_message_id: u64,
    pub term: Term,
    pub success: bool,
    /// Echoed back from the request this is replying to, so that the leader
    /// can advance `matchIndex` idempotently even if results arrive out of
    /// order or are retried.
    pub prev_log_index: LogIndex,
    pub entry_count: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InstallSnapshotRequest {
    pub term: Term,
    pub leader_id: NodeId,
    pub last_included_index: LogIndex,
    pub last_included_term: Term,
    pub offset: u64,
    pub data: Bytes,
    pub done: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InstallSnapshotResult {
    pub term: Term,
    pub done: bool,
}

/// The union of every message the core ever asks a `Connector` to deliver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    RequestVote(RequestVoteRequest),
    RequestVoteResult(RequestVoteResult),
    AppendEntries(AppendEntriesRequest),
    AppendEntriesResult(AppendEntriesResult),
    InstallSnapshot(InstallSnapshotRequest),
    InstallSnapshotResult(InstallSnapshotResult),
}
