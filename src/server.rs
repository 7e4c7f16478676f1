use std::sync::Arc;
use futures::future;
use crate::core::error::*;

/// Handle to a running node: the aggregated join handle of its tasks
/// plus the shutdown signal shared with them.
pub struct ServerManager {
	pub handle: future::JoinAll<tokio::task::JoinHandle<()>>,
	pub tx: Arc<tokio::sync::watch::Sender<bool>>
}

impl ServerManager {
	/// Wait for the node to terminate
	pub async fn wait(self) -> DhtResult<()> {
		self.handle.await
			.into_iter()
			.collect::<Result<Vec<_>, tokio::task::JoinError>>()?;
		Ok(())
	}

	/// Stop the node gracefully
	pub async fn stop(self) -> DhtResult<()> {
		// the tasks may already be gone if the node aborted on its own
		let _ = self.tx.send(true);
		self.wait().await
	}
}
