use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use raft::config::RaftConfig;
use raft::connector::Connector;
use raft::executor::TokioTaskExecutor;
use raft::log::{endpoint, InMemoryLog};
use raft::node::NodeImpl;
use raft::rpc::Message;
use raft::scheduler::TokioScheduler;
use raft::store::InMemoryNodeStore;
use raft::types::{NodeEndpoint, NodeId};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Runs an in-process simulated cluster of consensus nodes, wiring each
/// node's outbound RPCs directly to its peers' inboxes instead of talking
/// over a real network.
#[derive(Debug, Parser)]
#[command(name = "raft_node", about = "In-process Raft cluster simulation")]
struct Args {
    /// Path to a TOML file overriding the default RaftConfig. Unset fields
    /// keep their default value.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ids of the nodes to start, e.g. `--nodes a --nodes b --nodes c`.
    #[arg(long = "nodes", default_values = ["a", "b", "c"])]
    nodes: Vec<String>,

    /// How long to run the simulation before printing final role state and
    /// exiting.
    #[arg(long, default_value_t = 5)]
    run_seconds: u64,
}

fn load_config(path: Option<&PathBuf>) -> Result<RaftConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(RaftConfig::default()),
    }
}

/// Routes a `Connector::send` call to the matching `NodeImpl` in the
/// registry, if it has been started yet. Silently drops messages to unknown
/// peers, matching the fire-and-forget contract of `Connector`.
struct RouterConnector {
    from: NodeId,
    registry: Arc<Mutex<HashMap<NodeId, NodeImpl>>>,
}

impl Connector for RouterConnector {
    fn send(&self, to: &NodeId, message: Message) {
        let node = self.registry.lock().unwrap().get(to).cloned();
        if let Some(node) = node {
            node.handle_message(self.from.clone(), message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let members: Vec<NodeEndpoint> = args
        .nodes
        .iter()
        .enumerate()
        .map(|(i, id)| endpoint(id, "127.0.0.1", 9000 + i as u16))
        .collect();

    let registry: Arc<Mutex<HashMap<NodeId, NodeImpl>>> = Arc::new(Mutex::new(HashMap::new()));

    for id in &args.nodes {
        let node_id = NodeId::new(id.as_str());
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // Drain group-config events so the channel never backs up; the
            // demo doesn't otherwise observe them.
            while events_rx.recv().await.is_some() {}
        });

        let connector = Arc::new(RouterConnector {
            from: node_id.clone(),
            registry: registry.clone(),
        });
        let node = NodeImpl::new(
            node_id.clone(),
            members.clone(),
            config.clone(),
            Arc::new(InMemoryNodeStore::new()),
            Arc::new(InMemoryLog::new(events_tx)),
            connector,
            Arc::new(TokioScheduler::new()),
            Arc::new(TokioTaskExecutor::new()),
        )?;
        registry.lock().unwrap().insert(node_id, node.clone());
    }

    for node in registry.lock().unwrap().values() {
        node.start();
    }

    tracing::info!(nodes = ?args.nodes, "cluster started");
    tokio::time::sleep(Duration::from_secs(args.run_seconds)).await;

    for (id, node) in registry.lock().unwrap().iter() {
        let snapshot = node.role_state();
        tracing::info!(node = %id, role = ?snapshot.role, term = snapshot.term, leader = ?snapshot.leader_id, "final state");
    }

    Ok(())
}
