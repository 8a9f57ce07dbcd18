use crate::types::NodeId;

/// Outcomes explicitly surfaced to callers of the public API. Protocol-level
/// rejections (stale term, unknown peer, log mismatch) are never represented
/// here -- they are encoded as `success: false` / `vote_granted: false` on
/// the relevant RPC result and never cross this boundary.
#[derive(Debug, thiserror::Error)]
pub enum RaftError {
    #[error("not the leader (hint: {leader_hint:?})")]
    NotLeader { leader_hint: Option<NodeId> },

    #[error("node has not been started")]
    NotReady,

    #[error("membership change timed out")]
    Timeout,

    #[error("added node failed to catch up within the configured round budget")]
    ReplicationFailed,

    #[error("membership change task was cancelled")]
    Cancelled,

    /// The durable (term, votedFor) cell could not be written or read. The
    /// node cannot safely continue operating without this guarantee and
    /// should be treated as crashed by the embedder.
    #[error("persistent store failure: {0}")]
    Store(String),
}

pub type RaftResult<T> = std::result::Result<T, RaftError>;
