use crate::core::{
	ring::Digest,
	node::Node,
	data_store::{Key, Value}
};

/// Wire surface of a node: one framed request, one framed response.
/// Transport failures surface as client errors, never as protocol
/// answers; a `None` where a peer was required means the callee could
/// not answer.
#[tarpc::service]
pub trait NodeService {
	/// Liveness probe; carries no data
	async fn ping_rpc();

	// Fields at this node
	async fn get_node_rpc() -> Node;
	async fn get_predecessor_rpc() -> Option<Node>;
	async fn get_successor_rpc() -> Option<Node>;
	async fn get_successor_list_rpc() -> Vec<Node>;

	// Core routing
	async fn find_successor_rpc(id: Digest) -> Option<Node>;
	async fn closest_preceding_finger_rpc(id: Digest) -> Node;
	async fn notify_rpc(node: Node);

	// Get or set a key locally at this node
	async fn get_local_rpc(key: Key) -> Option<Value>;
	async fn set_local_rpc(key: Key, value: Option<Value>);

	// Get or set a key on the ring
	async fn get_rpc(key: Key) -> Option<Value>;
	async fn set_rpc(key: Key, value: Option<Value>);

	/// Tear the node down
	async fn shutdown_rpc();
}
