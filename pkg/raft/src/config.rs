use std::time::Duration;

/// Tunables enumerated in the external-interfaces section of the design:
/// election/replication timing, membership-change deadlines, and the
/// standby flag. Loaded once at startup (see the `raft_node` demo binary for
/// a TOML-backed loader) -- no dynamic reload is implemented.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    /// Lower bound of the randomized follower/candidate election delay.
    pub election_timeout_min: Duration,
    /// Upper bound of the randomized follower/candidate election delay.
    pub election_timeout_max: Duration,

    /// Minimum spacing between two AppendEntries sent to the same peer; a
    /// replication tick skips a peer still inside this window.
    pub min_replication_interval: Duration,
    /// Period of the leader's replication tick.
    pub replication_interval: Duration,

    /// Maximum number of catch-up rounds attempted for a newly added node
    /// before giving up with `ReplicationFailed`.
    pub new_node_max_round: u32,
    /// Deadline for a single catch-up round to complete.
    pub new_node_advance_timeout: Duration,

    /// How long `addNode`/`removeNode` will wait for a prior membership
    /// change task to finish before returning `Timeout`.
    pub previous_group_config_change_timeout: Duration,

    /// Standby (observer) nodes never start an election.
    pub standby: bool,
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            election_timeout_min: Duration::from_millis(400),
            election_timeout_max: Duration::from_millis(800),
            min_replication_interval: Duration::from_millis(150),
            replication_interval: Duration::from_millis(150),
            new_node_max_round: 10,
            new_node_advance_timeout: Duration::from_secs(2),
            previous_group_config_change_timeout: Duration::from_secs(5),
            standby: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_election_bounds_are_ordered() {
        let cfg = RaftConfig::default();
        assert!(cfg.election_timeout_min < cfg.election_timeout_max);
        assert!(cfg.min_replication_interval <= cfg.replication_interval);
    }
}
