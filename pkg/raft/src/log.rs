use crate::entry::{EntryData, LogEntry, PreChangeMembers};
use crate::types::{LogIndex, NodeEndpoint, NodeId, Term};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The three events the log publishes to drive membership bookkeeping in the
/// core. Delivered over an `mpsc` channel the `Log` implementation is handed
/// at construction time -- the `Log` trait itself has no subscribe method,
/// keeping the event-channel ownership out of the trait object boundary.
#[derive(Debug, Clone)]
pub enum LogEvent {
    /// A follower observed an uncommitted config entry freshly appended by
    /// the leader; the core applies it to its in-memory group optimistically.
    GroupConfigEntryFromLeaderAppend { entry: LogEntry },

    /// A previously-appended config entry reached the commit index; the core
    /// finalizes it (an added node becomes major; a removed node is dropped).
    GroupConfigEntryCommitted { entry: LogEntry },

    /// A batch of entries including at least one uncommitted config entry
    /// was truncated by a log-matching conflict; the core reverts to the
    /// pre-change member set carried on the truncated entry.
    GroupConfigEntryBatchRemoved { reverted_to: PreChangeMembers },
}

/// Append/truncate/read, commit-index tracking, and snapshot installation.
/// Exposes linearizable operations -- a concrete implementation must
/// synchronize internally, since it may be called from both the main
/// executor and (for snapshot streaming) replication bookkeeping. Methods
/// are synchronous: like the rest of the core's collaborators, any real
/// I/O an implementation needs to do is its own concern (e.g. hand off to a
/// blocking-IO thread pool), not something the consensus core waits on.
pub trait Log: Send + Sync {
    /// Index of the oldest entry still retained (1 if nothing has been
    /// compacted into a snapshot yet).
    fn first_index(&self) -> LogIndex;

    /// Index of the newest entry, or 0 if the log is empty.
    fn last_index(&self) -> LogIndex;

    /// Term of the entry at `index`, or the snapshot's `last_included_term`
    /// if `index` is exactly the snapshot boundary. `None` if `index` is
    /// outside what this log can answer for (already compacted away, or
    /// beyond `last_index`).
    fn term_at(&self, index: LogIndex) -> Option<Term>;

    fn entry(&self, index: LogIndex) -> Option<LogEntry>;

    /// Appends `entries` (assumed contiguous and immediately following
    /// `last_index`). Never mutates an existing entry in place.
    fn append(&self, entries: Vec<LogEntry>);

    /// Truncates every entry at or after `from_index`. Used to resolve a
    /// log-matching conflict; never called at or before `commit_index`.
    fn truncate_suffix(&self, from_index: LogIndex);

    fn commit_index(&self) -> LogIndex;

    /// Advances `commit_index` to `index` and publishes any
    /// `GroupConfigEntryCommitted` event this unblocks. Must be called
    /// before any downstream event is observed, per the ordering guarantee
    /// that commit-index advancement precedes event publication.
    fn advance_commit_index(&self, index: LogIndex);

    /// Installs a chunk of an inbound snapshot (follower side). On
    /// `done == true` the log is reset so that `first_index`/`last_index`
    /// both become `last_included_index`.
    fn install_snapshot_chunk(
        &self,
        last_included_index: LogIndex,
        last_included_term: Term,
        offset: u64,
        data: Bytes,
        done: bool,
    );

    /// Leader side: the next chunk of the locally held snapshot starting at
    /// `offset`, and whether it is the last chunk.
    fn snapshot_chunk(&self, offset: u64) -> Option<(Bytes, bool)>;
}

struct InMemoryLogInner {
    entries: Vec<LogEntry>,
    first_index: LogIndex,
    commit_index: LogIndex,
    snapshot_last_included_index: LogIndex,
    snapshot_last_included_term: Term,
}

/// In-memory `Log` used by tests and the demo binary. Keeps every entry in a
/// `Vec`; "snapshotting" just records a boundary without actually discarding
/// data, which is enough to exercise the `InstallSnapshot` code paths.
pub struct InMemoryLog {
    inner: Mutex<InMemoryLogInner>,
    events: mpsc::UnboundedSender<LogEvent>,
}

impl InMemoryLog {
    pub fn new(events: mpsc::UnboundedSender<LogEvent>) -> Self {
        InMemoryLog {
            inner: Mutex::new(InMemoryLogInner {
                entries: Vec::new(),
                first_index: 1,
                commit_index: 0,
                snapshot_last_included_index: 0,
                snapshot_last_included_term: 0,
            }),
            events,
        }
    }

    fn pos_of(inner: &InMemoryLogInner, index: LogIndex) -> Option<usize> {
        if index < inner.first_index {
            return None;
        }
        let pos = (index - inner.first_index) as usize;
        if pos < inner.entries.len() {
            Some(pos)
        } else {
            None
        }
    }

    fn pre_change_members_of(entry: &LogEntry) -> Option<PreChangeMembers> {
        match &entry.data {
            EntryData::AddNode {
                pre_change_members,
                ..
            } => Some(pre_change_members.clone()),
            EntryData::RemoveNode {
                pre_change_members,
                ..
            } => Some(pre_change_members.clone()),
            _ => None,
        }
    }
}

impl Log for InMemoryLog {
    fn first_index(&self) -> LogIndex {
        self.inner.lock().unwrap().first_index
    }

    fn last_index(&self) -> LogIndex {
        let inner = self.inner.lock().unwrap();
        inner.first_index + inner.entries.len() as LogIndex - 1
    }

    fn term_at(&self, index: LogIndex) -> Option<Term> {
        let inner = self.inner.lock().unwrap();
        if index == 0 {
            return Some(0);
        }
        if index == inner.snapshot_last_included_index {
            return Some(inner.snapshot_last_included_term);
        }
        Self::pos_of(&inner, index).map(|p| inner.entries[p].term)
    }

    fn entry(&self, index: LogIndex) -> Option<LogEntry> {
        let inner = self.inner.lock().unwrap();
        Self::pos_of(&inner, index).map(|p| inner.entries[p].clone())
    }

    fn append(&self, entries: Vec<LogEntry>) {
        let mut newly_uncommitted_config_entries = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            for e in entries {
                if e.data.is_group_config_entry() {
                    newly_uncommitted_config_entries.push(e.clone());
                }
                inner.entries.push(e);
            }
        }
        for e in newly_uncommitted_config_entries {
            let _ = self
                .events
                .send(LogEvent::GroupConfigEntryFromLeaderAppend { entry: e });
        }
    }

    fn truncate_suffix(&self, from_index: LogIndex) {
        let reverted = {
            let mut inner = self.inner.lock().unwrap();
            let mut reverted = None;
            if let Some(pos) = Self::pos_of(&inner, from_index) {
                for e in &inner.entries[pos..] {
                    if let Some(pre) = Self::pre_change_members_of(e) {
                        reverted = Some(pre);
                    }
                }
                inner.entries.truncate(pos);
            }
            reverted
        };
        if let Some(reverted_to) = reverted {
            let _ = self
                .events
                .send(LogEvent::GroupConfigEntryBatchRemoved { reverted_to });
        }
    }

    fn commit_index(&self) -> LogIndex {
        self.inner.lock().unwrap().commit_index
    }

    fn advance_commit_index(&self, index: LogIndex) {
        let newly_committed: Vec<LogEntry> = {
            let mut inner = self.inner.lock().unwrap();
            let from = inner.commit_index + 1;
            inner.commit_index = index;
            let mut committed = Vec::new();
            for i in from..=index {
                if let Some(pos) = Self::pos_of(&inner, i) {
                    let e = inner.entries[pos].clone();
                    if e.data.is_group_config_entry() {
                        committed.push(e);
                    }
                }
            }
            committed
        };
        for e in newly_committed {
            let _ = self
                .events
                .send(LogEvent::GroupConfigEntryCommitted { entry: e });
        }
    }

    fn install_snapshot_chunk(
        &self,
        last_included_index: LogIndex,
        last_included_term: Term,
        _offset: u64,
        _data: Bytes,
        done: bool,
    ) {
        if !done {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.first_index = last_included_index + 1;
        inner.snapshot_last_included_index = last_included_index;
        inner.snapshot_last_included_term = last_included_term;
        if inner.commit_index < last_included_index {
            inner.commit_index = last_included_index;
        }
    }

    fn snapshot_chunk(&self, offset: u64) -> Option<(Bytes, bool)> {
        // The reference log has no real snapshot payload to stream; a
        // single empty chunk is enough to exercise the handshake.
        if offset == 0 {
            Some((Bytes::new(), true))
        } else {
            None
        }
    }
}

/// Helper shared by tests/demo code to build a group member's endpoint.
pub fn endpoint(id: &str, host: &str, port: u16) -> NodeEndpoint {
    NodeEndpoint {
        id: NodeId::new(id),
        host: host.to_owned(),
        port,
    }
}

pub fn member_set(ids: &[&str]) -> HashSet<NodeId> {
    ids.iter().map(|s| NodeId::new(*s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let log = InMemoryLog::new(tx);
        assert_eq!(log.last_index(), 0);

        log.append(vec![LogEntry {
            index: 1,
            term: 1,
            data: EntryData::NoOp,
        }]);

        assert_eq!(log.last_index(), 1);
        assert_eq!(log.term_at(1), Some(1));
        assert_eq!(log.term_at(0), Some(0));
    }

    #[test]
    fn truncate_suffix_reverts_config_and_emits_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = InMemoryLog::new(tx);
        log.append(vec![
            LogEntry {
                index: 1,
                term: 1,
                data: EntryData::NoOp,
            },
            LogEntry {
                index: 2,
                term: 1,
                data: EntryData::AddNode {
                    endpoint: endpoint("d", "127.0.0.1", 9000),
                    pre_change_members: PreChangeMembers(member_set(&["a", "b", "c"])),
                },
            },
        ]);
        // Drain the leader-append event for the config entry.
        let _ = rx.try_recv().unwrap();

        log.truncate_suffix(2);
        assert_eq!(log.last_index(), 1);

        match rx.try_recv() {
            Ok(LogEvent::GroupConfigEntryBatchRemoved { reverted_to }) => {
                assert_eq!(reverted_to.0, member_set(&["a", "b", "c"]));
            }
            other => panic!("expected a revert event, got {:?}", other),
        }
    }

    #[test]
    fn advance_commit_index_emits_committed_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = InMemoryLog::new(tx);
        log.append(vec![LogEntry {
            index: 1,
            term: 1,
            data: EntryData::AddNode {
                endpoint: endpoint("d", "127.0.0.1", 9000),
                pre_change_members: PreChangeMembers(member_set(&["a"])),
            },
        }]);
        let _ = rx.try_recv().unwrap(); // leader-append event

        log.advance_commit_index(1);
        match rx.try_recv() {
            Ok(LogEvent::GroupConfigEntryCommitted { entry }) => {
                assert_eq!(entry.index, 1);
            }
            other => panic!("expected a committed event, got {:?}", other),
        }
    }
}
