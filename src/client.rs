use std::time::Duration;
use tarpc::tokio_serde::formats::Bincode;
use crate::core::error::DhtResult;
use crate::rpc::NodeServiceClient;

/// Connect to a node without bounding the connection setup. Meant for
/// interactive clients; protocol-internal calls use `connect_within`.
pub async fn setup_client(addr: &str) -> DhtResult<NodeServiceClient> {
	let transport = tarpc::serde_transport::tcp::connect(addr, Bincode::default).await?;
	Ok(NodeServiceClient::new(tarpc::client::Config::default(), transport).spawn())
}

/// Connect to a node with a deadline on the connection setup. A peer
/// that is unresponsive but not yet refusing connections must not
/// block the protocol indefinitely.
pub async fn connect_within(addr: &str, timeout: Duration) -> DhtResult<NodeServiceClient> {
	let transport = tokio::time::timeout(
		timeout,
		tarpc::serde_transport::tcp::connect(addr, Bincode::default)
	).await??;
	Ok(NodeServiceClient::new(tarpc::client::Config::default(), transport).spawn())
}
