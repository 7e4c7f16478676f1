use std::future::Future;
use std::time::Duration;
use log::warn;
use super::error::{DhtError, DhtResult};

/// Bounded exponential-backoff retry for fallible remote operations.
///
/// The operation runs at most `limit + 1` times. Only transient errors
/// are retried; anything else propagates immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub op: &'static str,
	pub limit: u32,
	pub base_delay: Duration
}

impl RetryPolicy {
	pub fn new(op: &'static str, limit: u32, base_delay_ms: u64) -> Self {
		RetryPolicy {
			op,
			limit,
			base_delay: Duration::from_millis(base_delay_ms)
		}
	}

	pub async fn run<T, F, Fut>(&self, mut body: F) -> DhtResult<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = DhtResult<T>>
	{
		let mut delay = self.base_delay;
		let mut attempts = 0;
		loop {
			match body().await {
				Ok(v) => return Ok(v),
				Err(e) if e.is_transient() && attempts < self.limit => {
					attempts += 1;
					warn!("{}: attempt {} failed, retrying in {:?}: {}", self.op, attempts, delay, e);
					tokio::time::sleep(delay).await;
					delay *= 2;
				},
				Err(e) if e.is_transient() => {
					return Err(DhtError::RetryExhausted {
						op: self.op,
						attempts: attempts + 1,
						last: Box::new(e)
					});
				},
				Err(e) => return Err(e)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn transient() -> DhtError {
		DhtError::EmptyResponse("test")
	}

	#[tokio::test]
	async fn succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new("test", 3, 1);
		let result = policy
			.run(|| async {
				if calls.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(transient())
				} else {
					Ok(42)
				}
			})
			.await;
		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn exhausts_the_budget() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new("test", 2, 1);
		let result: DhtResult<()> = policy
			.run(|| async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(transient())
			})
			.await;
		assert!(matches!(result, Err(DhtError::RetryExhausted { attempts: 3, .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn fatal_errors_pass_through() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new("test", 5, 1);
		let result: DhtResult<()> = policy
			.run(|| async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(DhtError::NoLiveSuccessor)
			})
			.await;
		assert!(matches!(result, Err(DhtError::NoLiveSuccessor)));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
