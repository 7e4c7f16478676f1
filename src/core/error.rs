use thiserror::Error;
use std::result::Result;
use super::{node::Node, ring::Digest};

#[derive(Error, Debug)]
pub enum DhtError {
	#[error("no live successor")]
	NoLiveSuccessor,
	#[error("empty response to {0}")]
	EmptyResponse(&'static str),
	#[error("{op} failed after {attempts} attempts: {last}")]
	RetryExhausted {
		op: &'static str,
		attempts: u32,
		last: Box<DhtError>
	},
	#[error("routing towards {id} gave up after {hops} hops")]
	HopBound { id: Digest, hops: usize },
	#[error("failed to join via {node}: {message}")]
	JoinFailure { node: Node, message: String },
	#[error("RPC error: {0}")]
	Rpc(#[from] tarpc::client::RpcError),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("remote call timed out")]
	Timeout(#[from] tokio::time::error::Elapsed),
	#[error("task error: {0}")]
	TaskJoin(#[from] tokio::task::JoinError)
}

impl DhtError {
	/// Whether retrying could help. Communication failures and stale
	/// routing state are transient; a ring with no live successor is not.
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			DhtError::Rpc(_)
				| DhtError::Io(_)
				| DhtError::Timeout(_)
				| DhtError::EmptyResponse(_)
				| DhtError::HopBound { .. }
		)
	}
}

pub type DhtResult<T> = Result<T, DhtError>;
