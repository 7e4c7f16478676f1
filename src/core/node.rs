use std::{
	future::Future,
	sync::{Arc, RwLock},
	time::Duration
};
use rand::{Rng, SeedableRng};
use tarpc::{
	context,
	tokio_serde::formats::Bincode,
	server::Channel,
	serde::Serialize,
	serde::Deserialize
};
use futures::{future, prelude::*};
use log::{info, warn, debug, error};
use super::{
	ring::*,
	config::*,
	data_store::*,
	remote,
	retry::RetryPolicy,
	error::{
		*,
		DhtError::*
	}
};
use crate::{rpc::*, server::ServerManager};

/// Addressable handle to a ring member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: Digest,
	pub addr: String
}

impl std::fmt::Display for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Node({}, {})", self.id, self.addr)
	}
}

type Shutdown = Arc<RwLock<Option<Arc<tokio::sync::watch::Sender<bool>>>>>;

#[derive(Clone)]
pub struct NodeServer {
	node: Node,
	ring: Ring,
	store: DataStore,
	config: Config,
	predecessor: Arc<RwLock<Option<Node>>>,
	// finger_table[0] caches the immediate successor
	finger_table: Arc<RwLock<Vec<Node>>>,
	// fallback successors, pulled transitively from the successor
	successor_list: Arc<RwLock<Vec<Node>>>,
	// set once the listener starts; signalled to abort the node
	shutdown: Shutdown
}

impl NodeServer {
	pub fn new(node: Node, config: Config) -> Self {
		assert!(config.num_successors >= 2, "num_successors must be at least 2");
		let ring = Ring::new(config.ring_bits);
		assert!(node.id < ring.size(), "node id outside the identifier space");

		// a freshly constructed node is a singleton ring
		let finger_table = vec![node.clone(); ring.bits()];
		NodeServer {
			node: node.clone(),
			ring,
			store: DataStore::new(),
			config,
			predecessor: Arc::new(RwLock::new(None)),
			finger_table: Arc::new(RwLock::new(finger_table)),
			successor_list: Arc::new(RwLock::new(Vec::new())),
			shutdown: Arc::new(RwLock::new(None))
		}
	}

	pub fn node(&self) -> &Node {
		&self.node
	}

	pub fn ring(&self) -> Ring {
		self.ring
	}

	pub fn get_predecessor(&self) -> Option<Node> {
		self.predecessor.read().unwrap().clone()
	}

	pub fn set_predecessor(&self, node: Option<Node>) {
		*self.predecessor.write().unwrap() = node;
	}

	pub fn get_successor_list(&self) -> Vec<Node> {
		self.successor_list.read().unwrap().clone()
	}

	fn set_successor_list(&self, list: Vec<Node>) {
		*self.successor_list.write().unwrap() = list;
	}

	pub fn finger(&self, index: usize) -> Node {
		self.finger_table.read().unwrap()[index].clone()
	}

	fn set_finger(&self, index: usize, node: Node) {
		self.finger_table.write().unwrap()[index] = node;
	}

	fn cached_successor(&self) -> Node {
		self.finger(0)
	}

	fn call_timeout(&self) -> Duration {
		Duration::from_millis(self.config.call_timeout)
	}

	fn ping_timeout(&self) -> Duration {
		Duration::from_millis(self.config.ping_timeout)
	}

	fn retry_policy(&self, op: &'static str, limit: u32) -> RetryPolicy {
		RetryPolicy::new(op, limit, self.config.retry_base_delay)
	}

	fn is_self(&self, node: &Node) -> bool {
		node.id == self.node.id
	}

	fn key_digest(&self, key: &Key) -> Digest {
		self.ring.identifier(key.as_bytes())
	}

	/// Escalate an unrecoverable condition: stop serving rather than
	/// keep answering from possibly stale ring state.
	fn abort(&self) {
		if let Some(tx) = self.shutdown.read().unwrap().as_ref() {
			let _ = tx.send(true);
		}
	}

	/// Start the listener and the maintenance tasks, joining the ring
	/// through `join_node` first when one is given.
	pub async fn start(&self, join_node: Option<Node>) -> DhtResult<ServerManager> {
		// watch channel used to stop the node (true means shutdown)
		let (tx, rx) = tokio::sync::watch::channel(false);
		let tx = Arc::new(tx);
		*self.shutdown.write().unwrap() = Some(tx.clone());

		// Listen locally first
		let mut listener = tarpc::serde_transport::tcp::listen(&self.node.addr, Bincode::default).await?;
		let server = self.clone();
		let mut listener_rx = rx.clone();
		let listener_handle = tokio::spawn(async move {
			listener.config_mut().max_frame_length(usize::MAX);
			let listener_fut = listener
				.filter_map(|r| future::ready(r.ok()))
				.map(tarpc::server::BaseChannel::with_defaults)
				.map(|channel| async {
					// every channel shares the ring state through the Arcs
					channel.execute(server.clone().serve()).await;
				})
				.buffer_unordered(server.config.max_connections as usize)
				.for_each(|_| async {});

			debug!("{}: listening", server.node);
			tokio::select! {
				_ = listener_fut => {
					warn!("{}: listener terminated", server.node);
				},
				_ = listener_rx.changed() => {
					debug!("{}: listener stopped gracefully", server.node);
				}
			};
		});

		// Join after the listener is up so the bootstrap peer can call back
		if let Some(n) = join_node.as_ref() {
			if let Err(e) = self.join(n).await {
				// take the listener down again before reporting
				let _ = tx.send(true);
				return Err(JoinFailure {
					node: n.clone(),
					message: e.to_string()
				});
			}
		}

		let mut handles = vec![listener_handle];
		handles.push(self.spawn_maintenance(
			"stabilize",
			self.config.stabilize_interval,
			rx.clone(),
			true,
			|s| async move { s.stabilize().await }
		));
		handles.push(self.spawn_maintenance(
			"fix_fingers",
			self.config.fix_finger_interval,
			rx.clone(),
			false,
			|s| async move { s.fix_random_finger().await }
		));
		handles.push(self.spawn_maintenance(
			"update_successors",
			self.config.update_successors_interval,
			rx.clone(),
			true,
			|s| async move { s.update_successor_list().await }
		));
		handles.push(self.spawn_maintenance(
			"migrate",
			self.config.migrate_interval,
			rx.clone(),
			false,
			|s| async move { s.migrate_data().await }
		));

		info!("{}: serving at {}", self.node, self.node.addr);
		Ok(ServerManager {
			handle: future::join_all(handles),
			tx
		})
	}

	/// Run one maintenance pass per (jittered) interval until shutdown.
	/// A failing pass either aborts the node or is logged and retried
	/// next round, depending on how ring-critical the task is.
	fn spawn_maintenance<F, Fut>(
		&self,
		name: &'static str,
		interval: u64,
		mut rx: tokio::sync::watch::Receiver<bool>,
		fatal_on_error: bool,
		pass: F
	) -> tokio::task::JoinHandle<()>
	where
		F: Fn(NodeServer) -> Fut + Send + 'static,
		Fut: Future<Output = DhtResult<()>> + Send
	{
		let server = self.clone();
		tokio::spawn(async move {
			if interval == 0 {
				return;
			}
			// StdRng can be sent across threads
			let mut rng = rand::prelude::StdRng::from_entropy();
			loop {
				// jitter the pause so rings do not synchronize their passes
				let pause = Duration::from_millis(interval / 2 + rng.gen_range(0..=interval));
				tokio::select! {
					_ = tokio::time::sleep(pause) => (),
					_ = rx.changed() => {
						debug!("{}: {} task stopped gracefully", server.node, name);
						break;
					}
				};
				if *rx.borrow() {
					break;
				}
				if let Err(e) = pass(server.clone()).await {
					if fatal_on_error {
						error!("{}: {} failed, aborting node: {}", server.node, name, e);
						server.abort();
						break;
					}
					warn!("{}: {} pass failed: {}", server.node, name, e);
				}
			}
		})
	}

	// Figure 6: n.join. Ask the bootstrap peer for our true successor.
	async fn join(&self, node: &Node) -> DhtResult<()> {
		debug!("{}: joining the ring via {}", self.node, node);
		self.set_predecessor(None);
		let succ = self
			.retry_policy("join", self.config.find_successor_retries)
			.run(|| remote::find_successor(node, self.node.id, self.call_timeout()))
			.await?;
		self.set_finger(0, succ);
		debug!("{}: joined via {}", self.node, node);
		Ok(())
	}

	// Peer calls below answer from memory when the target is this node
	// and perform one fresh-connection exchange otherwise.

	async fn peer_ping(&self, node: &Node) -> bool {
		if self.is_self(node) {
			return true;
		}
		remote::ping(node, self.ping_timeout()).await
	}

	async fn peer_successor(&self, node: &Node) -> DhtResult<Node> {
		if self.is_self(node) {
			return self.successor().await;
		}
		remote::successor(node, self.call_timeout()).await
	}

	async fn peer_predecessor(&self, node: &Node) -> DhtResult<Option<Node>> {
		if self.is_self(node) {
			return Ok(self.get_predecessor());
		}
		remote::predecessor(node, self.call_timeout()).await
	}

	async fn peer_closest_preceding_finger(&self, node: &Node, id: Digest) -> DhtResult<Node> {
		if self.is_self(node) {
			return Ok(self.closest_preceding_finger(id).await);
		}
		remote::closest_preceding_finger(node, id, self.call_timeout()).await
	}

	async fn peer_notify(&self, node: &Node) -> DhtResult<()> {
		if self.is_self(node) {
			self.notify(self.node.clone()).await;
			return Ok(());
		}
		remote::notify(node, self.node.clone(), self.call_timeout()).await
	}

	/// Current successor: the first live candidate among the cached
	/// successor and the successor list, cached back into the first
	/// finger. With no live candidate the ring is unreachable from
	/// this node and no local progress is possible.
	pub async fn successor(&self) -> DhtResult<Node> {
		let mut candidates = vec![self.cached_successor()];
		candidates.extend(self.get_successor_list());
		candidates.dedup_by_key(|n| n.id);

		for candidate in candidates {
			if self.peer_ping(&candidate).await {
				self.set_finger(0, candidate.clone());
				return Ok(candidate);
			}
		}
		Err(NoLiveSuccessor)
	}

	/// One ring-repair pass (Figure 7: n.stabilize), wrapped in the
	/// bounded retry policy; an exhausted budget bubbles up to the
	/// caller, which treats it as fatal.
	pub async fn stabilize(&self) -> DhtResult<()> {
		self.retry_policy("stabilize", self.config.stabilize_retries)
			.run(|| self.stabilize_once())
			.await
	}

	async fn stabilize_once(&self) -> DhtResult<()> {
		let mut succ = self.successor().await?;

		// x = predecessor(successor) becomes our successor iff it
		// exists, is alive and lies strictly between us and succ. The
		// extra guard keeps the full-circle convention from matching
		// when succ is our direct neighbor.
		if let Some(x) = self.peer_predecessor(&succ).await? {
			if self.ring.in_range(x.id, self.node.id + 1, succ.id)
				&& self.ring.reduce(self.node.id + 1) != succ.id
				&& self.peer_ping(&x).await
			{
				debug!("{}: adopting closer successor {}", self.node, x);
				self.set_finger(0, x.clone());
				succ = x;
			}
		}

		// announce ourselves as succ's predecessor candidate
		self.peer_notify(&succ).await
	}

	// Figure 7: n.notify. The remote claims to be our predecessor; accept
	// when we have none, when it falls between the current predecessor
	// and us, or when the current predecessor stopped answering probes.
	pub async fn notify(&self, remote_node: Node) {
		let adopt = match self.get_predecessor() {
			None => true,
			Some(p) => {
				self.ring.in_range(remote_node.id, p.id + 1, self.node.id)
					|| !self.peer_ping(&p).await
			}
		};
		if adopt {
			debug!("{}: new predecessor set in notify: {}", self.node, remote_node);
			self.set_predecessor(Some(remote_node));
		}
	}

	/// Refresh one random finger (Figure 7: n.fix_fingers). Randomized
	/// so one slow lookup cannot stall the rest of the table.
	pub async fn fix_random_finger(&self) -> DhtResult<()> {
		if self.ring.bits() < 2 {
			return Ok(());
		}
		let index = rand::thread_rng().gen_range(1..self.ring.bits());
		self.fix_finger(index).await
	}

	pub async fn fix_finger(&self, index: usize) -> DhtResult<()> {
		let succ = self.find_successor(self.ring.finger_start(self.node.id, index)).await?;
		self.set_finger(index, succ);
		Ok(())
	}

	/// Successor of `id` on the ring, retried with backoff on
	/// communication failure.
	pub async fn find_successor(&self, id: Digest) -> DhtResult<Node> {
		self.retry_policy("find_successor", self.config.find_successor_retries)
			.run(|| self.find_successor_once(id))
			.await
	}

	// Figure 4: n.find_successor
	async fn find_successor_once(&self, id: Digest) -> DhtResult<Node> {
		// we own id iff we have a predecessor and id in (pred, self]
		if let Some(p) = self.get_predecessor() {
			if self.ring.in_range(id, p.id + 1, self.node.id + 1) {
				return Ok(self.node.clone());
			}
		}
		let node = self.find_predecessor_once(id).await?;
		self.peer_successor(&node).await
	}

	pub async fn find_predecessor(&self, id: Digest) -> DhtResult<Node> {
		self.retry_policy("find_predecessor", self.config.find_predecessor_retries)
			.run(|| self.find_predecessor_once(id))
			.await
	}

	// Figure 4: n.find_predecessor
	async fn find_predecessor_once(&self, id: Digest) -> DhtResult<Node> {
		let mut node = self.node.clone();
		let mut succ = self.successor().await?;
		// alone in the ring
		if succ.id == node.id {
			return Ok(node);
		}

		// Every hop moves strictly closer to id; the bound catches
		// livelock on stale fingers.
		let max_hops = self.ring.bits() * 4;
		let mut hops = 0;
		// stop once id in (node, succ]
		while !self.ring.in_range(id, node.id + 1, succ.id + 1) {
			if hops >= max_hops {
				return Err(HopBound { id, hops });
			}
			hops += 1;
			node = self.peer_closest_preceding_finger(&node, id).await?;
			succ = self.peer_successor(&node).await?;
		}
		debug!("{}: find_predecessor({}) returns {}", self.node, id, node);
		Ok(node)
	}

	// Figure 4: n.closest_preceding_finger, extended to consider the
	// successor list and to skip peers that fail a liveness probe, so
	// routing heals between stabilization passes.
	pub async fn closest_preceding_finger(&self, id: Digest) -> Node {
		// fingers farthest-first, then the successor-list fallbacks
		let mut candidates: Vec<Node> = {
			let table = self.finger_table.read().unwrap();
			table.iter().rev().cloned().collect()
		};
		candidates.extend(self.get_successor_list());

		for candidate in candidates {
			if candidate.id == self.node.id {
				continue;
			}
			if self.ring.in_range(candidate.id, self.node.id + 1, id)
				&& self.peer_ping(&candidate).await
			{
				return candidate;
			}
		}
		self.node.clone()
	}

	/// Rebuild the successor list from the successor's own list,
	/// truncated to num_successors - 1 entries. This is what makes the
	/// failure of the immediate successor survivable.
	pub async fn update_successor_list(&self) -> DhtResult<()> {
		self.retry_policy("update_successors", self.config.update_successors_retries)
			.run(|| self.update_successor_list_once())
			.await
	}

	async fn update_successor_list_once(&self) -> DhtResult<()> {
		let succ = self.successor().await?;
		if self.is_self(&succ) {
			return Ok(());
		}
		let mut list = vec![succ.clone()];
		list.extend(remote::successor_list(&succ, self.call_timeout()).await?);
		list.truncate(self.config.num_successors - 1);
		self.set_successor_list(list);
		Ok(())
	}

	/// Whether `id` falls in the owned range (predecessor, self]. With
	/// no predecessor recorded the node owns nothing yet.
	fn owns(&self, id: Digest) -> bool {
		match self.get_predecessor() {
			Some(p) => self.ring.in_range(id, p.id + 1, self.node.id + 1),
			None => false
		}
	}

	/// Get a key on the ring: local map first, then one redirect hop
	/// towards the owner.
	pub async fn get(&self, key: &Key) -> DhtResult<Option<Value>> {
		if let Some(v) = self.store.get(key) {
			return Ok(Some(v));
		}

		let id = self.key_digest(key);
		if self.owns(id) {
			// ours, just absent
			return Ok(None);
		}
		let owner = self.find_successor(id).await?;
		if self.is_self(&owner) {
			return Ok(None);
		}
		remote::get(&owner, key.clone(), self.call_timeout()).await
	}

	/// Set a key: always a local write; the migration task relocates
	/// entries that belong elsewhere.
	pub fn set(&self, key: Key, value: Option<Value>) {
		self.store.set(key, value);
	}

	pub fn get_local(&self, key: &Key) -> Option<Value> {
		self.store.get(key)
	}

	/// Push every stored key whose identifier left the owned range to
	/// its rightful owner. A key is deleted locally only after a
	/// successful push; failures leave it in place for the next pass.
	pub async fn migrate_data(&self) -> DhtResult<()> {
		for key in self.store.keys() {
			// re-read per key: the owned range may move under us
			let pred = match self.get_predecessor() {
				Some(p) => p,
				// ownership is unknown without a predecessor
				None => return Ok(())
			};
			let id = self.key_digest(&key);
			if self.ring.in_range(id, pred.id + 1, self.node.id + 1) {
				continue;
			}
			let value = match self.store.get(&key) {
				Some(v) => v,
				None => continue
			};
			match self.find_successor(id).await {
				Ok(owner) if !self.is_self(&owner) => {
					match remote::set_local(&owner, key.clone(), Some(value), self.call_timeout()).await {
						Ok(()) => {
							info!("{}: migrated key digest {} to {}", self.node, id, owner);
							self.store.set(key, None);
						},
						Err(e) => {
							warn!("{}: migrating key digest {} failed, keeping it for the next pass: {}", self.node, id, e);
						}
					}
				},
				Ok(_) => (),
				Err(e) => {
					warn!("{}: cannot resolve the owner of key digest {}: {}", self.node, id, e);
				}
			}
		}
		Ok(())
	}
}

#[tarpc::server]
impl NodeService for NodeServer {
	async fn ping_rpc(self, _: context::Context) {}

	async fn get_node_rpc(self, _: context::Context) -> Node {
		self.node.clone()
	}

	async fn get_predecessor_rpc(self, _: context::Context) -> Option<Node> {
		self.get_predecessor()
	}

	async fn get_successor_rpc(self, _: context::Context) -> Option<Node> {
		match self.successor().await {
			Ok(succ) => Some(succ),
			Err(e) => {
				// cannot route without a successor; stop serving
				error!("{}: get_successor_rpc: {}", self.node, e);
				self.abort();
				None
			}
		}
	}

	async fn get_successor_list_rpc(self, _: context::Context) -> Vec<Node> {
		self.get_successor_list()
	}

	async fn find_successor_rpc(self, _: context::Context, id: Digest) -> Option<Node> {
		match self.find_successor(id).await {
			Ok(n) => Some(n),
			Err(e) => {
				// the retry budget is already spent at this point
				error!("{}: find_successor_rpc({}): {}", self.node, id, e);
				self.abort();
				None
			}
		}
	}

	async fn closest_preceding_finger_rpc(self, _: context::Context, id: Digest) -> Node {
		self.closest_preceding_finger(id).await
	}

	async fn notify_rpc(self, _: context::Context, node: Node) {
		self.notify(node).await
	}

	async fn get_local_rpc(self, _: context::Context, key: Key) -> Option<Value> {
		self.get_local(&key)
	}

	async fn set_local_rpc(self, _: context::Context, key: Key, value: Option<Value>) {
		self.store.set(key, value)
	}

	async fn get_rpc(self, _: context::Context, key: Key) -> Option<Value> {
		match self.get(&key).await {
			Ok(v) => v,
			Err(e) => {
				// best effort: absent is the only answer left
				error!("{}: get_rpc failed: {}", self.node, e);
				None
			}
		}
	}

	async fn set_rpc(self, _: context::Context, key: Key, value: Option<Value>) {
		self.set(key, value)
	}

	async fn shutdown_rpc(self, _: context::Context) {
		info!("{}: shutdown requested", self.node);
		self.abort();
	}
}
