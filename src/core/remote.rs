//! Calls against a remote peer. Each call acquires a fresh transport,
//! performs exactly one exchange and releases it; no connection is
//! shared across calls.

use std::time::Duration;
use tarpc::context;
use tokio::time::timeout;
use super::{
	node::Node,
	ring::Digest,
	data_store::{Key, Value},
	error::{DhtError, DhtResult}
};
use crate::client::connect_within;

/// Probe a peer for liveness. Failure is an expected outcome here and
/// is reported as `false`, never as an error.
pub async fn ping(node: &Node, t: Duration) -> bool {
	let client = match connect_within(&node.addr, t).await {
		Ok(c) => c,
		Err(_) => return false
	};
	matches!(timeout(t, client.ping_rpc(context::current())).await, Ok(Ok(())))
}

pub async fn successor(node: &Node, t: Duration) -> DhtResult<Node> {
	let client = connect_within(&node.addr, t).await?;
	timeout(t, client.get_successor_rpc(context::current()))
		.await??
		.ok_or(DhtError::EmptyResponse("get_successor"))
}

pub async fn predecessor(node: &Node, t: Duration) -> DhtResult<Option<Node>> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.get_predecessor_rpc(context::current())).await??)
}

pub async fn successor_list(node: &Node, t: Duration) -> DhtResult<Vec<Node>> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.get_successor_list_rpc(context::current())).await??)
}

pub async fn find_successor(node: &Node, id: Digest, t: Duration) -> DhtResult<Node> {
	let client = connect_within(&node.addr, t).await?;
	timeout(t, client.find_successor_rpc(context::current(), id))
		.await??
		.ok_or(DhtError::EmptyResponse("find_successor"))
}

pub async fn closest_preceding_finger(node: &Node, id: Digest, t: Duration) -> DhtResult<Node> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.closest_preceding_finger_rpc(context::current(), id)).await??)
}

pub async fn notify(node: &Node, me: Node, t: Duration) -> DhtResult<()> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.notify_rpc(context::current(), me)).await??)
}

pub async fn get(node: &Node, key: Key, t: Duration) -> DhtResult<Option<Value>> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.get_rpc(context::current(), key)).await??)
}

pub async fn set_local(node: &Node, key: Key, value: Option<Value>, t: Duration) -> DhtResult<()> {
	let client = connect_within(&node.addr, t).await?;
	Ok(timeout(t, client.set_local_rpc(context::current(), key, value)).await??)
}
