use std::default::Default;

/// Protocol parameters. Intervals are in milliseconds; an interval of 0
/// disables the corresponding background task.
#[derive(Debug, Clone)]
pub struct Config {
	/// Ring exponent m: identifiers live on a ring of size 2^m
	pub ring_bits: u8,
	/// Successor list length, counting the immediate successor
	pub num_successors: usize,
	pub stabilize_interval: u64,
	pub stabilize_retries: u32,
	pub fix_finger_interval: u64,
	pub update_successors_interval: u64,
	pub update_successors_retries: u32,
	pub migrate_interval: u64,
	pub find_successor_retries: u32,
	pub find_predecessor_retries: u32,
	/// Timeout for one remote exchange
	pub call_timeout: u64,
	/// Timeout for a liveness probe; short, because it gates how fast
	/// dead peers are evicted from routing
	pub ping_timeout: u64,
	/// Base delay of the exponential backoff between retries
	pub retry_base_delay: u64,
	/// Max number of concurrent connections buffered by the listener
	pub max_connections: u64
}

impl Default for Config {
	fn default() -> Self {
		Self {
			ring_bits: 32,
			num_successors: 4,
			stabilize_interval: 1000,
			stabilize_retries: 4,
			fix_finger_interval: 4000,
			update_successors_interval: 1000,
			update_successors_retries: 6,
			migrate_interval: 5000,
			find_successor_retries: 3,
			find_predecessor_retries: 3,
			call_timeout: 3000,
			ping_timeout: 500,
			retry_base_delay: 50,
			max_connections: 16
		}
	}
}
